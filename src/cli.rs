use crate::{
    config::Config,
    consent::{Consent, StdinPrompt},
    engine::python::PythonEngine,
    pipeline::{Pipeline, RunOptions, Selection},
    report::Report,
    requirements,
    submit::HttpTransport,
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "runtests")]
#[command(about = "Run a Python package's pytest suite and optionally upload the JSON report")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./runtests.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Doctor {},
    /// Run the test suite. Arguments after `--` go to pytest unchanged.
    Run {
        #[command(flatten)]
        upload: UploadFlags,
        #[arg(long, conflicts_with = "all")]
        network: bool,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        coverage: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        pytest_args: Vec<String>,
    },
    /// Upload a previously saved JSON report.
    Upload {
        file: PathBuf,
        #[command(flatten)]
        upload: UploadFlags,
    },
}

#[derive(ClapArgs, Debug)]
pub struct UploadFlags {
    #[arg(long, conflicts_with = "no_report")]
    pub report: bool,
    #[arg(long)]
    pub no_report: bool,
}

impl UploadFlags {
    pub fn consent(&self) -> Consent {
        Consent::from_flags(self.report, self.no_report)
    }
}

pub fn dispatch(args: Args) -> Result<i32> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Run {
            upload,
            network,
            all,
            coverage,
            pytest_args,
        } => {
            let selection = match (*network, *all) {
                (_, true) => Selection::All,
                (true, false) => Selection::Network,
                _ => Selection::Local,
            };
            let opts = RunOptions {
                pytest_args: pytest_args.clone(),
                selection,
                coverage: *coverage,
                consent: upload.consent(),
            };
            run(&cfg, &opts)
        }
        Command::Upload { file, upload } => {
            upload_saved(&cfg, file, upload.consent())?;
            Ok(0)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("runtests.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stderr keeps pytest's and our own report output on stdout readable.
    let console_layer = if cfg.logging.json {
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

    let (file_layer, guard) = match resolve_log_path(cfg) {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            ensure_dir(parent)?;
            let file = std::fs::File::create(&path)
                .with_context(|| format!("create log file: {}", path.display()))?;
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
        .with(console_layer)
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
    Some(PathBuf::from(&cfg.runner.work_dir).join("runtests.log"))
}

fn doctor(cfg: &Config) -> Result<i32> {
    let pipeline = Pipeline::new(cfg, PythonEngine::new(cfg)?);
    let env = pipeline.inspect()?;
    println!("{}", serde_json::to_string_pretty(&env)?);
    if let Err(err) = requirements::ensure_installed(&cfg.package.test_requires, &env.distributions)
    {
        warn!("{err:#}");
        return Ok(1);
    }
    Ok(0)
}

fn run(cfg: &Config, opts: &RunOptions) -> Result<i32> {
    let pipeline = Pipeline::new(cfg, PythonEngine::new(cfg)?);
    let transport = HttpTransport::new(cfg.report.timeout_seconds)?;
    let mut stdout = std::io::stdout();
    pipeline.run(opts, &transport, &mut StdinPrompt, &mut stdout)
}

fn upload_saved(cfg: &Config, file: &Path, consent: Consent) -> Result<()> {
    let mut report = Report::load(file)?;
    info!("loaded {} ({} warnings)", file.display(), report.warnings.len());
    let pipeline = Pipeline::new(cfg, PythonEngine::new(cfg)?);
    let transport = HttpTransport::new(cfg.report.timeout_seconds)?;
    let mut stdout = std::io::stdout();
    pipeline.deliver(&mut report, consent, &transport, &mut StdinPrompt, &mut stdout)?;
    Ok(())
}
