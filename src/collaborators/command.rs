use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{
    Acquirer, Analyzer, ArtifactRef, Catalog, CatalogEntry, ChangeDetector, CollaboratorResult,
    Collaborators, ContextProvider, RasterSampler, Reporter,
};
use crate::config::CollaboratorCommands;
use crate::error::CollaboratorError;
use crate::job::{BoundingBox, Sensor, TimeWindow};

/// Collaborators backed by shell commands.
///
/// Inputs travel as `GEOWATCH_*` environment variables, outputs come back on
/// stdout one artifact uri per line. A non-zero exit status is classified
/// from its stderr.
#[derive(Debug, Clone)]
pub struct CommandCollaborators {
    commands: CollaboratorCommands,
}

impl CommandCollaborators {
    pub fn new(commands: CollaboratorCommands) -> Self {
        Self { commands }
    }

    /// Bundle into `Collaborators`. Optional collaborators without a bound
    /// command are left out entirely.
    pub fn into_collaborators(self) -> Collaborators {
        let this = Arc::new(self);
        let mut collaborators = Collaborators::new(this.clone(), this.clone(), this.clone());
        if this.commands.context.is_some() {
            collaborators = collaborators.with_context(this.clone());
        }
        if this.commands.delta.is_some() {
            collaborators = collaborators.with_change_detector(this.clone());
        }
        if this.commands.catalog.is_some() {
            collaborators = collaborators.with_catalog(this.clone());
        }
        collaborators
    }

    pub fn sampler(&self) -> Option<Arc<dyn RasterSampler>> {
        self.commands
            .sample
            .is_some()
            .then(|| Arc::new(self.clone()) as Arc<dyn RasterSampler>)
    }

    async fn run(
        &self,
        name: &str,
        command: Option<&String>,
        env: &[(&str, String)],
    ) -> CollaboratorResult<String> {
        let Some(command) = command else {
            return Err(CollaboratorError::NotConfigured(name.to_string()));
        };

        debug!(collaborator = name, command = %command, "Running collaborator command");
        let output = Command::new(&self.commands.shell)
            .args(["-c", command])
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CollaboratorError::Failed(format!("{}: failed to spawn: {}", name, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("{} exited with {}", name, output.status)
            } else {
                stderr.into_owned()
            };
            return Err(CollaboratorError::from_message(&message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn region_env(region: &BoundingBox, window: &TimeWindow) -> Vec<(&'static str, String)> {
    vec![
        ("GEOWATCH_BBOX", region.to_string()),
        ("GEOWATCH_START", window.start.to_rfc3339()),
        ("GEOWATCH_END", window.end.to_rfc3339()),
    ]
}

fn artifacts_env(artifacts: &[ArtifactRef]) -> String {
    artifacts
        .iter()
        .map(|a| a.uri.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_artifacts(stdout: &str) -> Vec<ArtifactRef> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ArtifactRef::from_uri)
        .collect()
}

fn parse_band(stdout: &str) -> CollaboratorResult<Vec<f32>> {
    stdout
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| CollaboratorError::Failed(format!("invalid pixel value '{}'", token)))
        })
        .collect()
}

#[async_trait]
impl Acquirer for CommandCollaborators {
    async fn acquire(
        &self,
        region: &BoundingBox,
        window: &TimeWindow,
        sensor: Sensor,
    ) -> CollaboratorResult<Vec<ArtifactRef>> {
        let mut env = region_env(region, window);
        env.push(("GEOWATCH_SENSOR", sensor.to_string()));
        let stdout = self
            .run("acquire", self.commands.acquire.as_ref(), &env)
            .await?;
        Ok(parse_artifacts(&stdout))
    }
}

#[async_trait]
impl ContextProvider for CommandCollaborators {
    async fn fetch(
        &self,
        region: &BoundingBox,
        window: &TimeWindow,
    ) -> CollaboratorResult<Vec<ArtifactRef>> {
        let env = region_env(region, window);
        let stdout = self
            .run("context", self.commands.context.as_ref(), &env)
            .await?;
        Ok(parse_artifacts(&stdout))
    }
}

#[async_trait]
impl Analyzer for CommandCollaborators {
    async fn analyze(&self, raw: &[ArtifactRef]) -> CollaboratorResult<Vec<ArtifactRef>> {
        let env = [("GEOWATCH_ARTIFACTS", artifacts_env(raw))];
        let stdout = self
            .run("analyze", self.commands.analyze.as_ref(), &env)
            .await?;
        Ok(parse_artifacts(&stdout))
    }
}

#[async_trait]
impl ChangeDetector for CommandCollaborators {
    async fn compute_delta(
        &self,
        current: &ArtifactRef,
        prior: &ArtifactRef,
    ) -> CollaboratorResult<Option<ArtifactRef>> {
        let env = [
            ("GEOWATCH_CURRENT", current.uri.clone()),
            ("GEOWATCH_PRIOR", prior.uri.clone()),
        ];
        let stdout = self.run("delta", self.commands.delta.as_ref(), &env).await?;
        Ok(parse_artifacts(&stdout).into_iter().next())
    }
}

#[async_trait]
impl Catalog for CommandCollaborators {
    async fn register(&self, entry: &CatalogEntry) -> CollaboratorResult<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| CollaboratorError::Failed(format!("catalog entry: {}", e)))?;
        let env = [("GEOWATCH_ENTRY_JSON", json)];
        self.run("catalog", self.commands.catalog.as_ref(), &env)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Reporter for CommandCollaborators {
    async fn report(
        &self,
        job_id: &str,
        artifacts: &[ArtifactRef],
    ) -> CollaboratorResult<ArtifactRef> {
        let env = [
            ("GEOWATCH_JOB_ID", job_id.to_string()),
            ("GEOWATCH_ARTIFACTS", artifacts_env(artifacts)),
        ];
        let stdout = self
            .run("report", self.commands.report.as_ref(), &env)
            .await?;
        parse_artifacts(&stdout)
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::Failed("report command printed no artifact".into()))
    }
}

#[async_trait]
impl RasterSampler for CommandCollaborators {
    async fn first_band(&self, artifact: &ArtifactRef) -> CollaboratorResult<Vec<f32>> {
        let env = [("GEOWATCH_ARTIFACTS", artifact.uri.clone())];
        let stdout = self
            .run("sample", self.commands.sample.as_ref(), &env)
            .await?;
        parse_band(&stdout)
    }
}
