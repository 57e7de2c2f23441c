use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use geowatch::cli::{Cli, Commands, ConfigAction, Display, OutputFormat, SensorArg, StatusFilterArg};
use geowatch::collaborators::CommandCollaborators;
use geowatch::config::{DataPaths, GeowatchConfig};
use geowatch::error::{GeowatchError, Result};
use geowatch::executor::{MissionExecutor, ShutdownMode};
use geowatch::job::{BoundingBox, GeoPoint, JobStore, MissionRequest, Recurrence, TimeWindow};
use geowatch::notification::{EventType, JobEvent, Notifier};
use geowatch::output::OutputWriter;
use geowatch::scheduler::RecurringScheduler;
use geowatch::supervisor::{MissionSupervisor, QualityGate};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("geowatch=debug")
    } else {
        EnvFilter::new("geowatch=info")
    };

    // Logs go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Everything a command needs, resolved from global flags.
struct AppContext {
    config: GeowatchConfig,
    paths: DataPaths,
    writer: OutputWriter,
}

impl AppContext {
    fn notifier(&self) -> Notifier {
        Notifier::new(
            self.config.notification.clone(),
            Some(self.paths.logs_dir.clone()),
        )
        .with_shell(self.config.collaborators.shell.clone())
    }

    async fn open_store(&self) -> Result<Arc<JobStore>> {
        self.paths.ensure_dirs().await?;
        Ok(Arc::new(JobStore::open(&self.paths.jobs_dir).await?))
    }

    async fn executor(&self) -> Result<Arc<MissionExecutor>> {
        let store = self.open_store().await?;
        let collaborators =
            CommandCollaborators::new(self.config.collaborators.clone()).into_collaborators();
        Ok(Arc::new(
            MissionExecutor::new(store, collaborators, self.config.executor.clone())
                .with_notifier(self.notifier()),
        ))
    }
}

async fn run(cli: Cli) -> Result<()> {
    let paths = DataPaths::new(cli.data_dir);
    let config_path = cli.config.unwrap_or_else(|| paths.config_file());
    let writer = OutputWriter::new(cli.output);

    // Config commands handle their own loading so a broken file can be inspected or replaced.
    let command = match cli.command {
        Commands::Config { action } => return cmd_config(&config_path, &writer, action).await,
        command => command,
    };

    let config = GeowatchConfig::load_file(&config_path).await?;
    let ctx = AppContext {
        config,
        paths,
        writer,
    };

    match command {
        Commands::Submit {
            bbox,
            days,
            start,
            end,
            sensor,
            daily,
            run,
        } => {
            let window = match (start, end) {
                (Some(start), Some(end)) => TimeWindow::new(start, end)?,
                _ => TimeWindow::last_days(days, Utc::now())?,
            };
            cmd_submit(&ctx, &bbox, window, sensor, daily, run).await
        }
        Commands::Run { job_id } => cmd_run(&ctx, &job_id).await,
        Commands::List { status } => cmd_list(&ctx, status).await,
        Commands::Status { job_id } => cmd_status(&ctx, &job_id).await,
        Commands::Schedule { once } => cmd_schedule(&ctx, once).await,
        Commands::Supervise { lat, lon, count } => cmd_supervise(&ctx, lat, lon, count).await,
        Commands::Config { .. } => Ok(()),
    }
}

async fn cmd_submit(
    ctx: &AppContext,
    bbox: &str,
    window: TimeWindow,
    sensor: SensorArg,
    daily: bool,
    run_now: bool,
) -> Result<()> {
    let region: BoundingBox = bbox.parse()?;
    let recurrence = if daily {
        Recurrence::Daily
    } else {
        Recurrence::None
    };
    let request = MissionRequest::new(region, window, sensor.into()).with_recurrence(recurrence);

    let executor = ctx.executor().await?;
    let job = executor.store().create(request).await?;
    ctx.notifier()
        .notify(&JobEvent::new(EventType::JobCreated, &job.id).with_message(job.region.to_string()))
        .await;
    info!(job_id = %job.id, recurrence = %job.recurrence, "Job submitted");

    if run_now {
        let artifacts = executor.run(&job.id).await?;
        ctx.writer.emit_run(&job.id, &artifacts);
    } else if ctx.writer.format() == OutputFormat::Text {
        ctx.writer
            .display()
            .print_success(&format!("Submitted {}", job.id));
    } else {
        ctx.writer.emit_job(&job);
    }
    Ok(())
}

async fn cmd_run(ctx: &AppContext, job_id: &str) -> Result<()> {
    let executor = ctx.executor().await?;
    let artifacts = executor.run(job_id).await?;
    ctx.writer.emit_run(job_id, &artifacts);
    Ok(())
}

async fn cmd_list(ctx: &AppContext, status: Option<StatusFilterArg>) -> Result<()> {
    let store = ctx.open_store().await?;
    let jobs = match status {
        Some(filter) => store.list_by_status(filter.into()),
        None => store.list(),
    };
    ctx.writer.emit_jobs(&jobs);
    Ok(())
}

async fn cmd_status(ctx: &AppContext, job_id: &str) -> Result<()> {
    let store = ctx.open_store().await?;
    let job = store
        .get(job_id)
        .ok_or_else(|| GeowatchError::JobNotFound(job_id.to_string()))?;
    ctx.writer.emit_job(&job);
    Ok(())
}

async fn cmd_schedule(ctx: &AppContext, once: bool) -> Result<()> {
    let executor = ctx.executor().await?;
    let scheduler = RecurringScheduler::new(executor, ctx.config.scheduler.clone())
        .with_notifier(ctx.notifier());

    if once {
        let report = scheduler.check_jobs(Utc::now()).await;
        ctx.writer.emit_cycle(&report);
        scheduler.registry().shutdown(ShutdownMode::Drain).await;
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping scheduler"),
            Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
        }
        let _ = stop_tx.send(true);
    });

    scheduler.run(stop_rx).await;
    scheduler.registry().shutdown(ShutdownMode::Drain).await;
    ctx.writer.emit_message("Scheduler stopped");
    Ok(())
}

async fn cmd_supervise(ctx: &AppContext, lat: f64, lon: f64, count: Option<usize>) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(GeowatchError::InvalidArgument(format!(
            "center ({}, {}) outside WGS84 range",
            lat, lon
        )));
    }

    let executor = ctx.executor().await?;
    let gate = CommandCollaborators::new(ctx.config.collaborators.clone())
        .sampler()
        .map(QualityGate::new)
        .unwrap_or_else(QualityGate::without_sampler);
    let supervisor = MissionSupervisor::new(executor, gate, ctx.config.supervisor.clone())
        .with_notifier(ctx.notifier());

    let count = count.unwrap_or(ctx.config.supervisor.default_count);
    let report = supervisor.run_grid(GeoPoint::new(lat, lon), count).await?;
    ctx.writer.emit_batch(&report);
    Ok(())
}

async fn cmd_config(config_path: &Path, writer: &OutputWriter, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = GeowatchConfig::load_file(config_path).await?;
            writer.emit_raw(&config.to_toml()?, &config);
        }
        ConfigAction::Validate => {
            GeowatchConfig::load_file(config_path).await?;
            if writer.format() == OutputFormat::Text {
                writer
                    .display()
                    .print_success(&format!("{} is valid", config_path.display()));
            } else {
                writer.emit_message("valid");
            }
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                writer.display().print_warning(&format!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                ));
                return Ok(());
            }
            let config = GeowatchConfig::default();
            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(config_path, config.to_toml()?).await?;
            writer.emit_message(&format!("Wrote {}", config_path.display()));
        }
    }
    Ok(())
}
