//! Command result output.
//!
//! - `OutputWriter`: renders jobs, runs and batch reports as text or JSON

mod writer;

pub use writer::OutputWriter;
