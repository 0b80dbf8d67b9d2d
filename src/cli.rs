use crate::{
    config::Config,
    controller::JobController,
    fetch::{PageSpeedClient, ReqwestTransport},
    host::{Clock, Host, SystemClock},
    notify::OutboxNotifier,
    processor::ChunkOutcome,
    scheduler::{Activation, FileScheduler},
    secrets::EnvSecrets,
    sheet::CsvSheet,
    store::FileStore,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "speed-sweep")]
#[command(about = "Resumable, time-sliced PageSpeed Insights sweep over a URL sheet")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./speed-sweep.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discard any running job and schedule a fresh sweep.
    Start {},
    /// Stop the running job and delete its progress.
    Cancel {},
    /// Run one activation now, e.g. from cron.
    RunChunk {},
    /// Dispatch scheduled activations until none remain.
    Worker {},
    /// Print the job phase, progress and pending activations as JSON.
    Status {},
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    let store = FileStore::new(Path::new(&cfg.paths.state_file));
    let sheet = CsvSheet::new(Path::new(&cfg.paths.sheet_file));
    let scheduler = FileScheduler::new(Path::new(&cfg.paths.schedule_file));
    let metrics = PageSpeedClient::new(&cfg, ReqwestTransport::new(&cfg)?);
    let notifier = OutboxNotifier::new(Path::new(&cfg.paths.outbox_dir));
    let host = Host {
        cfg: &cfg,
        store: &store,
        sheet: &sheet,
        scheduler: &scheduler,
        metrics: &metrics,
        secrets: &EnvSecrets,
        notifier: &notifier,
        clock: &SystemClock,
    };
    let controller = JobController::new(&host);

    match &args.cmd {
        Command::Start {} => {
            let receipt = controller.start()?;
            println!(
                "Update started: {} URLs queued as job {}. Run `speed-sweep worker` (or trigger \
                 `run-chunk` on a timer) to process them; a notice is sent on completion.",
                receipt.url_count, receipt.job_id
            );
            Ok(())
        }
        Command::Cancel {} => {
            let receipt = controller.cancel()?;
            if receipt.had_job {
                println!(
                    "Update cancelled; {} pending activation(s) removed.",
                    receipt.cancelled_activations
                );
            } else {
                println!("No update was running.");
            }
            Ok(())
        }
        Command::RunChunk {} => {
            let outcome = controller.activate(Activation::RunChunk)?;
            summarize(&cfg, &outcome)
        }
        Command::Worker {} => {
            info!("worker started at {}", now_rfc3339());
            let outcomes = controller.drain(&mut |d| std::thread::sleep(d))?;
            for outcome in &outcomes {
                summarize(&cfg, outcome)?;
            }
            info!("worker idle after {} activation(s)", outcomes.len());
            Ok(())
        }
        Command::Status {} => {
            let status = controller.status()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "now_ms": SystemClock.now_ms(),
                    "status": status,
                }))?
            );
            Ok(())
        }
    }
}

fn summarize(cfg: &Config, outcome: &ChunkOutcome) -> Result<()> {
    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    }
    Ok(())
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("speed-sweep.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("speed-sweep.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match resolve_log_path(cfg) {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            ensure_dir(parent)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file || cfg.logging.file_path.is_empty() {
        return None;
    }
    Some(PathBuf::from(&cfg.logging.file_path))
}
