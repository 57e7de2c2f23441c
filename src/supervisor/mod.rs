//! Batch supervision of grid missions.
//!
//! - `generate_grid`: tiles a square around a center point
//! - `QualityGate`: rejects empty or degenerate index rasters
//! - `classify` / `corrected_window`: failure rule table and parameter correction
//! - `MissionSupervisor`: bounded fan-out with one self-correction retry per mission

mod batch;
mod correction;
mod grid;
mod quality;

pub use batch::{BatchReport, MissionSupervisor};
pub use correction::{CorrectionStrategy, MissionFailure, classify, corrected_window};
pub use grid::{MAX_GRID_CELLS, generate_grid};
pub use quality::{QualityGate, QualityVerdict, inspect_band};
