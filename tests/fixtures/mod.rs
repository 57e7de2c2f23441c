//! Shared test fixtures.

#![allow(dead_code)]

pub mod mock_collaborators;

use chrono::Utc;

use geowatch::job::{BoundingBox, MissionRequest, Recurrence, Sensor, TimeWindow};

pub use mock_collaborators::*;

pub fn vienna() -> BoundingBox {
    BoundingBox {
        min_lon: 16.2,
        min_lat: 48.1,
        max_lon: 16.5,
        max_lat: 48.3,
    }
}

pub fn request() -> MissionRequest {
    MissionRequest::new(vienna(), TimeWindow::last_days(30, Utc::now()).unwrap(), Sensor::Optical)
}

pub fn daily_request() -> MissionRequest {
    request().with_recurrence(Recurrence::Daily)
}
