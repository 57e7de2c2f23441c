//! External collaborator interfaces.
//!
//! The core never acquires imagery or computes indices itself. It drives
//! these traits and passes `ArtifactRef`s between them.

mod artifact;
mod command;
mod traits;

pub use artifact::{ArtifactKind, ArtifactRef, IndexKind};
pub use command::CommandCollaborators;
pub use traits::{
    Acquirer, Analyzer, Catalog, CatalogEntry, ChangeDetector, CollaboratorResult, Collaborators,
    ContextProvider, RasterSampler, Reporter,
};
