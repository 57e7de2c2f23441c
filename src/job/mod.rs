//! Job records and their durable store.
//!
//! - `Job`: one mission execution or one recurring-mission definition
//! - `JobStatus`: lifecycle states and the allowed transitions between them
//! - `JobStore`: per-id serialized persistence, one YAML file per job

mod status;
mod store;
mod types;

pub use status::{JobStatus, StatusTransition};
pub use store::JobStore;
pub use types::{
    BoundingBox, GeoPoint, Job, JobResults, MissionRequest, Recurrence, ResultsPatch, Sensor,
    TimeWindow,
};

/// Tag carried by children spawned from a recurring definition.
pub const TAG_DAILY_RUN: &str = "DAILY_RUN";
/// Tag carried by supervisor grid missions.
pub const TAG_GRID: &str = "GRID";
/// Tag carried by supervisor self-correction retries.
pub const TAG_GRID_RETRY: &str = "GRID_RETRY";
