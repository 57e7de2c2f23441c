//! In-process collaborators with call recording and failure injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use geowatch::collaborators::{
    Acquirer, Analyzer, ArtifactKind, ArtifactRef, Catalog, CatalogEntry, ChangeDetector,
    CollaboratorResult, Collaborators, ContextProvider, IndexKind, RasterSampler, Reporter,
};
use geowatch::error::CollaboratorError;
use geowatch::job::{BoundingBox, Sensor, TimeWindow};

#[derive(Debug, Clone)]
enum FailureRule {
    Once(CollaboratorError),
    Always(CollaboratorError),
}

/// Acquirer producing one raw scene per call. The uri encodes the region and
/// the window length, e.g. `raw/S2_16.3688_48.2032_30d.tif`.
#[derive(Default)]
pub struct MockAcquirer {
    calls: Mutex<HashMap<String, usize>>,
    rules: Mutex<HashMap<String, FailureRule>>,
    empty: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl MockAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` so concurrent calls overlap.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn fail_once(&self, region: &BoundingBox, error: CollaboratorError) {
        self.rules
            .lock()
            .insert(region.to_string(), FailureRule::Once(error));
    }

    pub fn fail_always(&self, region: &BoundingBox, error: CollaboratorError) {
        self.rules
            .lock()
            .insert(region.to_string(), FailureRule::Always(error));
    }

    pub fn return_empty(&self, region: &BoundingBox) {
        self.empty.lock().push(region.to_string());
    }

    pub fn calls_for(&self, region: &BoundingBox) -> usize {
        self.calls
            .lock()
            .get(&region.to_string())
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn scene_uri(region: &BoundingBox, window: &TimeWindow) -> String {
        format!(
            "raw/S2_{:.4}_{:.4}_{}d.tif",
            region.min_lon,
            region.min_lat,
            window.span().num_days()
        )
    }
}

#[async_trait]
impl Acquirer for MockAcquirer {
    async fn acquire(
        &self,
        region: &BoundingBox,
        window: &TimeWindow,
        _sensor: Sensor,
    ) -> CollaboratorResult<Vec<ArtifactRef>> {
        let key = region.to_string();
        *self.calls.lock().entry(key.clone()).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        let rule = {
            let mut rules = self.rules.lock();
            match rules.get(&key).cloned() {
                Some(FailureRule::Once(err)) => {
                    rules.remove(&key);
                    Some(err)
                }
                Some(FailureRule::Always(err)) => Some(err),
                None => None,
            }
        };
        if let Some(err) = rule {
            return Err(err);
        }

        if self.empty.lock().contains(&key) {
            return Ok(Vec::new());
        }

        Ok(vec![ArtifactRef::raw(Self::scene_uri(region, window))])
    }
}

/// Produces an NDVI product per raw scene.
#[derive(Default)]
pub struct MockAnalyzer {
    empty: bool,
    error: Option<CollaboratorError>,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn producing_nothing() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, raw: &[ArtifactRef]) -> CollaboratorResult<Vec<ArtifactRef>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(raw
            .iter()
            .map(|a| {
                let stem = a.stem().trim_start_matches("S2_");
                ArtifactRef::index(format!("processed/{}_NDVI.tif", stem), IndexKind::Ndvi)
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MockReporter {
    error: Option<CollaboratorError>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: CollaboratorError) -> Self {
        Self { error: Some(error) }
    }
}

#[async_trait]
impl Reporter for MockReporter {
    async fn report(
        &self,
        job_id: &str,
        _artifacts: &[ArtifactRef],
    ) -> CollaboratorResult<ArtifactRef> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(ArtifactRef::new(
            format!("reports/Evidence_Pack_{}.pdf", job_id),
            ArtifactKind::Report,
        ))
    }
}

pub struct MockContext {
    error: Option<CollaboratorError>,
}

impl MockContext {
    pub fn new() -> Self {
        Self { error: None }
    }

    pub fn failing(error: CollaboratorError) -> Self {
        Self { error: Some(error) }
    }
}

#[async_trait]
impl ContextProvider for MockContext {
    async fn fetch(
        &self,
        _region: &BoundingBox,
        window: &TimeWindow,
    ) -> CollaboratorResult<Vec<ArtifactRef>> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(vec![ArtifactRef::new(
            format!("context/weather_{}.json", window.end.format("%Y%m%d")),
            ArtifactKind::Context,
        )])
    }
}

/// Records `(current, prior)` pairs and answers with a delta artifact.
#[derive(Default)]
pub struct MockChangeDetector {
    pairs: Mutex<Vec<(String, String)>>,
}

impl MockChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.pairs.lock().clone()
    }
}

#[async_trait]
impl ChangeDetector for MockChangeDetector {
    async fn compute_delta(
        &self,
        current: &ArtifactRef,
        prior: &ArtifactRef,
    ) -> CollaboratorResult<Option<ArtifactRef>> {
        self.pairs
            .lock()
            .push((current.uri.clone(), prior.uri.clone()));
        Ok(Some(ArtifactRef::new(
            format!("processed/{}_CHANGE.tif", current.stem()),
            ArtifactKind::Delta,
        )))
    }
}

#[derive(Default)]
pub struct MockCatalog {
    entries: Mutex<Vec<CatalogEntry>>,
    fail: bool,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn register(&self, entry: &CatalogEntry) -> CollaboratorResult<()> {
        if self.fail {
            return Err(CollaboratorError::Network("catalog unreachable".into()));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Serves bands by uri substring; anything unmatched gets a varied band.
#[derive(Default)]
pub struct MockSampler {
    bands: Mutex<Vec<(String, Vec<f32>)>>,
    unreadable: Mutex<Vec<String>>,
}

impl MockSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn band_for(&self, uri_fragment: &str, band: Vec<f32>) {
        self.bands.lock().push((uri_fragment.to_string(), band));
    }

    pub fn unreadable(&self, uri_fragment: &str) {
        self.unreadable.lock().push(uri_fragment.to_string());
    }

    pub fn varied_band() -> Vec<f32> {
        vec![0.12, 0.35, f32::NAN, 0.61, 0.48]
    }
}

#[async_trait]
impl RasterSampler for MockSampler {
    async fn first_band(&self, artifact: &ArtifactRef) -> CollaboratorResult<Vec<f32>> {
        if self
            .unreadable
            .lock()
            .iter()
            .any(|f| artifact.uri.contains(f.as_str()))
        {
            return Err(CollaboratorError::Failed(format!(
                "{}: not a valid GeoTIFF",
                artifact.uri
            )));
        }
        let band = self
            .bands
            .lock()
            .iter()
            .find(|(fragment, _)| artifact.uri.contains(fragment.as_str()))
            .map(|(_, band)| band.clone());
        Ok(band.unwrap_or_else(Self::varied_band))
    }
}

/// Bundle of mocks with handles kept for assertions.
pub struct MockSet {
    pub acquirer: Arc<MockAcquirer>,
    pub analyzer: Arc<MockAnalyzer>,
    pub detector: Arc<MockChangeDetector>,
    pub catalog: Arc<MockCatalog>,
    pub sampler: Arc<MockSampler>,
}

impl MockSet {
    pub fn new() -> Self {
        Self::with_acquirer(MockAcquirer::new())
    }

    pub fn with_acquirer(acquirer: MockAcquirer) -> Self {
        Self {
            acquirer: Arc::new(acquirer),
            analyzer: Arc::new(MockAnalyzer::new()),
            detector: Arc::new(MockChangeDetector::new()),
            catalog: Arc::new(MockCatalog::new()),
            sampler: Arc::new(MockSampler::new()),
        }
    }

    /// Acquire, analyze and report only.
    pub fn minimal(&self) -> Collaborators {
        Collaborators::new(
            self.acquirer.clone(),
            self.analyzer.clone(),
            Arc::new(MockReporter::new()),
        )
    }

    /// Every optional collaborator wired in.
    pub fn full(&self) -> Collaborators {
        self.minimal()
            .with_context(Arc::new(MockContext::new()))
            .with_change_detector(self.detector.clone())
            .with_catalog(self.catalog.clone())
    }
}
