use console::{Style, style};

use crate::job::{Job, JobStatus};
use crate::supervisor::BatchReport;

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_job_detail(&self, job: &Job) {
        self.print_header(&format!("Job: {}", job.id));

        println!(
            "Status:     {}",
            self.status_style(job.status).apply_to(job.status.to_string())
        );
        println!("Region:     {}", job.region);
        println!("Window:     {}", job.time_window);
        println!("Sensor:     {}", job.sensor);
        println!("Recurrence: {}", job.recurrence);

        if let Some(tag) = &job.tag {
            println!("Tag:        {}", tag);
        }
        if let Some(parent) = &job.parent_job_id {
            println!("Parent:     {}", parent);
        }
        if let Some(original) = &job.retry_of {
            println!("Retry of:   {}", original);
        }
        if let Some(last_run) = job.last_run {
            println!("Last run:   {}", last_run.format("%Y-%m-%d %H:%M:%S"));
        }
        if let Some(error) = &job.error {
            println!("Error:      {}", style(error).red());
        }

        let results = &job.results;
        if !results.is_empty() {
            println!();
            println!("{}", style("Results:").bold());
            for (label, artifacts) in [
                ("raw", &results.raw_artifacts),
                ("processed", &results.processed_artifacts),
                ("context", &results.context_artifacts),
            ] {
                for artifact in artifacts {
                    println!("  {:<10} {}", style(label).dim(), artifact);
                }
            }
            if let Some(report) = &results.report_ref {
                println!("  {:<10} {}", style("report").dim(), report.uri);
            }
        }

        if !job.status_history.is_empty() {
            println!();
            println!("{}", style("History:").bold());
            for transition in &job.status_history {
                println!(
                    "  {} {} -> {}{}",
                    style(transition.at.format("%Y-%m-%d %H:%M:%S")).dim(),
                    transition.from,
                    transition.to,
                    transition
                        .reason
                        .as_deref()
                        .map(|r| format!(" ({})", r))
                        .unwrap_or_default()
                );
            }
        }
    }

    pub fn print_jobs_table(&self, jobs: &[Job]) {
        if jobs.is_empty() {
            println!("{}", style("No jobs found.").dim());
            return;
        }

        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
        println!(
            "Running: {}  Pending: {}  Completed: {}  Failed: {}",
            style(count(JobStatus::Running)).yellow(),
            style(count(JobStatus::Pending)).dim(),
            style(count(JobStatus::Completed)).green(),
            style(count(JobStatus::Failed)).red()
        );
        println!();

        println!(
            "{:<18} {:<11} {:<11} {:<20} {}",
            style("ID").bold(),
            style("Status").bold(),
            style("Tag").bold(),
            style("Created").bold(),
            style("Region").bold()
        );
        println!("{}", style("─".repeat(90)).dim());

        for job in jobs {
            let tag = match (&job.tag, job.is_recurring()) {
                (Some(tag), _) => tag.clone(),
                (None, true) => job.recurrence.to_string(),
                (None, false) => "-".to_string(),
            };
            println!(
                "{:<18} {:<11} {:<11} {:<20} {}",
                job.id,
                self.status_style(job.status).apply_to(job.status.to_string()),
                tag,
                job.created_at.format("%Y-%m-%d %H:%M:%S"),
                job.region
            );
        }
    }

    pub fn print_batch_report(&self, report: &BatchReport) {
        self.print_header(&format!("Batch: {}", report.batch_id));

        let percentage = (report.success_rate() * 100.0).round() as u8;
        println!(
            "Completed: {}/{} {} {}%",
            style(report.completed_missions).green(),
            report.total_missions,
            self.progress_bar(percentage, 30),
            percentage
        );
        println!("Retried:   {}", report.retried_missions);

        if report.failed_missions.is_empty() {
            println!("Failed:    {}", style("none").dim());
        } else {
            let ids: Vec<String> = report.failed_missions.iter().map(|i| i.to_string()).collect();
            println!(
                "Failed:    {} [{}]",
                style(report.failed_missions.len()).red().bold(),
                ids.join(", ")
            );
        }
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn print_warning(&self, message: &str) {
        println!("{} {}", style("!").yellow().bold(), message);
    }

    pub fn print_info(&self, message: &str) {
        println!("{} {}", style("→").cyan(), message);
    }

    fn status_style(&self, status: JobStatus) -> Style {
        match status {
            JobStatus::Pending => Style::new().dim(),
            JobStatus::Running => Style::new().yellow().bold(),
            JobStatus::Completed => Style::new().green(),
            JobStatus::Failed => Style::new().red().bold(),
        }
    }

    fn progress_bar(&self, percentage: u8, width: usize) -> String {
        let filled = (width as f64 * percentage.min(100) as f64 / 100.0) as usize;
        let empty = width - filled;

        format!(
            "{}{}",
            style("█".repeat(filled)).green(),
            style("░".repeat(empty)).dim()
        )
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
