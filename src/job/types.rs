use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{JobStatus, StatusTransition};
use crate::collaborators::ArtifactRef;
use crate::error::{GeowatchError, Result};

/// WGS84 bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let values = [min_lon, min_lat, max_lon, max_lat];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeowatchError::InvalidArgument(
                "bounding box coordinates must be finite".into(),
            ));
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(GeowatchError::InvalidArgument(format!(
                "bounding box min must be below max: [{}, {}, {}, {}]",
                min_lon, min_lat, max_lon, max_lat
            )));
        }
        if !(-180.0..=180.0).contains(&min_lon)
            || !(-180.0..=180.0).contains(&max_lon)
            || !(-90.0..=90.0).contains(&min_lat)
            || !(-90.0..=90.0).contains(&max_lat)
        {
            return Err(GeowatchError::InvalidArgument(
                "bounding box outside WGS84 range".into(),
            ));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

impl FromStr for BoundingBox {
    type Err = GeowatchError;

    /// Parse `min_lon,min_lat,max_lon,max_lat`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| GeowatchError::InvalidArgument(format!("bbox '{}': {}", s, e)))?;

        match parts.as_slice() {
            [min_lon, min_lat, max_lon, max_lat] => {
                Self::new(*min_lon, *min_lat, *max_lon, *max_lat)
            }
            _ => Err(GeowatchError::InvalidArgument(format!(
                "bbox '{}' must have 4 comma-separated values",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(GeowatchError::InvalidArgument(format!(
                "time window start {} must precede end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `span` ending at `end`.
    pub fn ending_at(end: DateTime<Utc>, span: Duration) -> Result<Self> {
        let start = end.checked_sub_signed(span).ok_or_else(|| {
            GeowatchError::InvalidArgument(format!("time window span {} out of range", span))
        })?;
        Self::new(start, end)
    }

    pub fn last_days(days: u32, end: DateTime<Utc>) -> Result<Self> {
        let span = Duration::try_days(i64::from(days)).ok_or_else(|| {
            GeowatchError::InvalidArgument(format!("{} days is out of range", days))
        })?;
        Self::ending_at(end, span)
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Same end, span multiplied by `factor`.
    pub fn expanded(&self, factor: u32) -> Result<Self> {
        let span = i32::try_from(factor.max(1))
            .ok()
            .and_then(|f| self.span().checked_mul(f))
            .ok_or_else(|| {
                GeowatchError::InvalidArgument(format!(
                    "expanding {} by {} overflows",
                    self, factor
                ))
            })?;
        Self::ending_at(self.end, span)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sensor {
    #[default]
    Optical,
    Radar,
}

impl Sensor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optical => "OPTICAL",
            Self::Radar => "RADAR",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
}

impl Recurrence {
    /// Spawn period of a recurring definition.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Daily => Some(Duration::hours(24)),
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::Daily => f.write_str("DAILY"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    #[serde(default)]
    pub raw_artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub processed_artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub context_artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub report_ref: Option<ArtifactRef>,
}

impl JobResults {
    /// Key-wise merge: every field present in the patch overwrites, absent
    /// fields are left untouched.
    pub fn apply(&mut self, patch: ResultsPatch) {
        if let Some(raw) = patch.raw_artifacts {
            self.raw_artifacts = raw;
        }
        if let Some(processed) = patch.processed_artifacts {
            self.processed_artifacts = processed;
        }
        if let Some(context) = patch.context_artifacts {
            self.context_artifacts = context;
        }
        if let Some(report) = patch.report_ref {
            self.report_ref = Some(report);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw_artifacts.is_empty()
            && self.processed_artifacts.is_empty()
            && self.context_artifacts.is_empty()
            && self.report_ref.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsPatch {
    pub raw_artifacts: Option<Vec<ArtifactRef>>,
    pub processed_artifacts: Option<Vec<ArtifactRef>>,
    pub context_artifacts: Option<Vec<ArtifactRef>>,
    pub report_ref: Option<ArtifactRef>,
}

impl ResultsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.raw_artifacts = Some(artifacts);
        self
    }

    pub fn with_processed(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.processed_artifacts = Some(artifacts);
        self
    }

    pub fn with_context(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.context_artifacts = Some(artifacts);
        self
    }

    pub fn with_report(mut self, report: Option<ArtifactRef>) -> Self {
        self.report_ref = report;
        self
    }
}

/// Parameters of a mission, consumed by `JobStore::create`.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionRequest {
    pub region: BoundingBox,
    pub time_window: TimeWindow,
    pub sensor: Sensor,
    pub recurrence: Recurrence,
    pub parent_job_id: Option<String>,
    pub retry_of: Option<String>,
    pub tag: Option<String>,
}

impl MissionRequest {
    pub fn new(region: BoundingBox, time_window: TimeWindow, sensor: Sensor) -> Self {
        Self {
            region,
            time_window,
            sensor,
            recurrence: Recurrence::None,
            parent_job_id: None,
            retry_of: None,
            tag: None,
        }
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_parent(mut self, parent_job_id: impl Into<String>) -> Self {
        self.parent_job_id = Some(parent_job_id.into());
        self
    }

    pub fn with_retry_of(mut self, job_id: impl Into<String>) -> Self {
        self.retry_of = Some(job_id.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub region: BoundingBox,
    pub time_window: TimeWindow,
    pub sensor: Sensor,

    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default)]
    pub results: JobResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub status_history: Vec<StatusTransition>,
}

impl Job {
    pub fn from_request(id: impl Into<String>, request: MissionRequest) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            region: request.region,
            time_window: request.time_window,
            sensor: request.sensor,
            recurrence: request.recurrence,
            last_run: None,
            parent_job_id: request.parent_job_id,
            retry_of: request.retry_of,
            tag: request.tag,
            results: JobResults::default(),
            error: None,
            status_history: Vec::new(),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring()
    }
}
