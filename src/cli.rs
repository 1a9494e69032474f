use crate::{
    cancel::{CancelToken, EXIT_CANCELLED, cancel_on_interrupt},
    config::Config,
    engine,
    error::PrepError,
    exec::SystemRunner,
    pipeline::Pipeline,
    util::{ensure_dir, expand_inputs},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ocr-prep")]
#[command(about = "Version-gated parallel page-image preprocessing for OCR")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./ocr-prep.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the OCR engine version and print the gate result.
    Doctor {},
    /// Gate the engine, then filter every page image.
    Run {
        /// Page images or directories of page images.
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Worker pool size (overrides global.threads).
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Run {
            input,
            threads,
            out_dir,
        } => run(&cfg, input, *threads, out_dir.as_deref()),
    }
}

/// Process exit status for an error returned by [`dispatch`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let cancelled = err
        .chain()
        .any(|e| e.downcast_ref::<PrepError>().is_some_and(PrepError::is_cancelled));
    if cancelled { EXIT_CANCELLED } else { 1 }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    for candidate in ["ocr-prep.toml", "ocr-prep.example.toml"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Config::load(p);
        }
    }
    Ok(Config::default())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
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
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.out_dir).join("ocr-prep.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let report = engine::probe(cfg, &SystemRunner, &CancelToken::new())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    report.require()?;
    Ok(())
}

fn run(cfg: &Config, inputs: &[PathBuf], threads: Option<usize>, out_override: Option<&Path>) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(t) = threads {
        cfg.global.threads = t;
    }

    let pages = expand_inputs(inputs)?;
    if pages.is_empty() {
        return Err(anyhow!("no page images found in inputs"));
    }

    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone())?;

    let pipeline = Pipeline::new(&cfg, SystemRunner);
    let report = pipeline.run(&pages, &cancel)?;

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));

    let report_path = if cfg.output.write_report_json {
        let batch_dir = out_root.join(&report.batch_id);
        ensure_dir(&batch_dir)?;
        let path = batch_dir.join(&cfg.output.report_filename);
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        info!("report written to {}", path.display());
        Some(path)
    } else {
        None
    };

    if cfg.global.print_summary {
        let outputs: Vec<&PathBuf> = report.pages.iter().map(|p| &p.output).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "batch_id": report.batch_id,
                "counts": report.counts,
                "outputs": outputs,
                "report": report_path,
            }))?
        );
    }

    Ok(())
}
