pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod notification;
pub mod output;
pub mod scheduler;
pub mod supervisor;

pub use collaborators::{ArtifactRef, Collaborators, CommandCollaborators};
pub use config::GeowatchConfig;
pub use error::{CollaboratorError, GeowatchError, Result};
pub use executor::{MissionExecutor, ShutdownMode, TaskRegistry};
pub use job::{Job, JobStatus, JobStore, MissionRequest};
pub use scheduler::RecurringScheduler;
pub use supervisor::{BatchReport, MissionSupervisor, QualityGate};
