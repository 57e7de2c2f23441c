use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArtifactRef;
use crate::error::CollaboratorError;
use crate::job::{BoundingBox, Sensor, TimeWindow};

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Raw imagery search and download.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(
        &self,
        region: &BoundingBox,
        window: &TimeWindow,
        sensor: Sensor,
    ) -> CollaboratorResult<Vec<ArtifactRef>>;
}

/// Auxiliary context such as weather or climate series.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn fetch(
        &self,
        region: &BoundingBox,
        window: &TimeWindow,
    ) -> CollaboratorResult<Vec<ArtifactRef>>;
}

/// Index computation over raw artifacts. An empty result means nothing usable
/// was produced.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, raw: &[ArtifactRef]) -> CollaboratorResult<Vec<ArtifactRef>>;
}

#[async_trait]
pub trait ChangeDetector: Send + Sync {
    async fn compute_delta(
        &self,
        current: &ArtifactRef,
        prior: &ArtifactRef,
    ) -> CollaboratorResult<Option<ArtifactRef>>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn register(&self, entry: &CatalogEntry) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, job_id: &str, artifacts: &[ArtifactRef])
    -> CollaboratorResult<ArtifactRef>;
}

/// Reads pixel values of a raster artifact. No-data pixels are `NaN`.
#[async_trait]
pub trait RasterSampler: Send + Sync {
    async fn first_band(&self, artifact: &ArtifactRef) -> CollaboratorResult<Vec<f32>>;
}

/// Metadata record registered for every processed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_id: String,
    pub artifact: ArtifactRef,
    pub region: BoundingBox,
    pub acquired_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl CatalogEntry {
    pub fn new(
        job_id: &str,
        artifact: ArtifactRef,
        region: BoundingBox,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            item_id: format!("{}-{}", job_id, artifact.stem()),
            artifact,
            region,
            acquired_at,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// The set of collaborators a mission runs against. Context enrichment,
/// change detection, and cataloging are optional.
#[derive(Clone)]
pub struct Collaborators {
    pub acquirer: Arc<dyn Acquirer>,
    pub analyzer: Arc<dyn Analyzer>,
    pub reporter: Arc<dyn Reporter>,
    pub context: Option<Arc<dyn ContextProvider>>,
    pub change_detector: Option<Arc<dyn ChangeDetector>>,
    pub catalog: Option<Arc<dyn Catalog>>,
}

impl Collaborators {
    pub fn new(
        acquirer: Arc<dyn Acquirer>,
        analyzer: Arc<dyn Analyzer>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            acquirer,
            analyzer,
            reporter,
            context: None,
            change_detector: None,
            catalog: None,
        }
    }

    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_change_detector(mut self, detector: Arc<dyn ChangeDetector>) -> Self {
        self.change_detector = Some(detector);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("context", &self.context.is_some())
            .field("change_detector", &self.change_detector.is_some())
            .field("catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}
