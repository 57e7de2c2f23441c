//! Configuration types and loading.
//!
//! - `GeowatchConfig`: top-level configuration with validation
//! - Per-component sections: executor, scheduler, supervisor, notification
//! - `CollaboratorCommands`: shell bindings for external collaborators
//! - `DataPaths`: on-disk layout of the data directory

mod settings;

pub use settings::{
    CONFIG_FILE_NAME, CollaboratorCommands, DataPaths, ExecutorConfig, GeowatchConfig,
    NotificationConfig, SchedulerConfig, SupervisorConfig,
};
