use std::io::{self, Write};

use serde::Serialize;

use crate::cli::{Display, OutputFormat};
use crate::collaborators::ArtifactRef;
use crate::job::Job;
use crate::scheduler::CycleReport;
use crate::supervisor::BatchReport;

/// Routes command results to styled text or JSON on stdout.
pub struct OutputWriter {
    format: OutputFormat,
    display: Display,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            display: Display::new(),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn emit_job(&self, job: &Job) {
        match self.format {
            OutputFormat::Text => self.display.print_job_detail(job),
            OutputFormat::Json => self.write_json(job),
        }
    }

    pub fn emit_jobs(&self, jobs: &[Job]) {
        match self.format {
            OutputFormat::Text => self.display.print_jobs_table(jobs),
            OutputFormat::Json => {
                let list: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
                self.write_json(&list);
            }
        }
    }

    pub fn emit_run(&self, job_id: &str, artifacts: &[ArtifactRef]) {
        match self.format {
            OutputFormat::Text => {
                self.display.print_success(&format!(
                    "Job {} completed with {} processed artifacts",
                    job_id,
                    artifacts.len()
                ));
                for artifact in artifacts {
                    println!("  {}", artifact);
                }
            }
            OutputFormat::Json => self.write_json(&RunOutput {
                job_id: job_id.to_string(),
                artifacts: artifacts.to_vec(),
            }),
        }
    }

    pub fn emit_batch(&self, report: &BatchReport) {
        match self.format {
            OutputFormat::Text => self.display.print_batch_report(report),
            OutputFormat::Json => self.write_json(report),
        }
    }

    pub fn emit_cycle(&self, report: &CycleReport) {
        match self.format {
            OutputFormat::Text => {
                for (parent, child) in &report.spawned {
                    self.display
                        .print_info(&format!("{} spawned {}", parent, child));
                }
                for parent in &report.deferred {
                    self.display
                        .print_warning(&format!("{} deferred, previous run still active", parent));
                }
                if report.spawned.is_empty() && report.deferred.is_empty() {
                    self.display.print_info("No recurring jobs due");
                }
            }
            OutputFormat::Json => self.write_json(&CycleOutput {
                spawned: report
                    .spawned
                    .iter()
                    .map(|(parent, child)| SpawnOutput {
                        parent_id: parent.clone(),
                        child_id: child.clone(),
                    })
                    .collect(),
                deferred: report.deferred.clone(),
            }),
        }
    }

    pub fn emit_message(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => self.write_json(&MessageOutput {
                message: message.to_string(),
            }),
        }
    }

    pub fn emit_raw<T: Serialize>(&self, text: &str, value: &T) {
        match self.format {
            OutputFormat::Text => println!("{}", text),
            OutputFormat::Json => self.write_json(value),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string(value) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct JobSummary {
    id: String,
    status: String,
    tag: Option<String>,
    recurrence: String,
    parent_job_id: Option<String>,
    created_at: String,
    region: [f64; 4],
    error: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status.to_string(),
            tag: job.tag.clone(),
            recurrence: job.recurrence.to_string(),
            parent_job_id: job.parent_job_id.clone(),
            created_at: job.created_at.to_rfc3339(),
            region: job.region.as_array(),
            error: job.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RunOutput {
    job_id: String,
    artifacts: Vec<ArtifactRef>,
}

#[derive(Debug, Clone, Serialize)]
struct SpawnOutput {
    parent_id: String,
    child_id: String,
}

#[derive(Debug, Clone, Serialize)]
struct CycleOutput {
    spawned: Vec<SpawnOutput>,
    deferred: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct MessageOutput {
    message: String,
}
