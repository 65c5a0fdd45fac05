use crate::{
    config::Config,
    engine::{soffice::SofficeEngine, Engine},
    formats::{extension_of, known_formats},
    pipeline::{ConversionRequest, Pipeline},
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "quack-convert")]
#[command(about = "Document conversion service (upload + headless office suite + scratch cleanup)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./quack-convert.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP conversion service.
    Serve {
        /// Override server.bind_address.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Check that the office suite can be launched.
    Doctor {},
    /// Convert one local file through the same pipeline the server uses.
    Convert {
        #[arg(long)]
        input: PathBuf,
        /// Target format, e.g. pdf.
        #[arg(long)]
        to: String,
        /// Source format; defaults to the input's extension.
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the format -> MIME table.
    Formats {},
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let mut cfg = if args.config.is_some() {
        Config::load(&cfg_path)?
    } else {
        Config::load_or_default(&cfg_path)?
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind_address = bind.clone();
            }
            serve(&cfg)
        }
        Command::Doctor {} => doctor(&cfg),
        Command::Convert {
            input,
            to,
            from,
            out_dir,
        } => convert(&cfg, input, to, from.as_deref(), out_dir.as_deref()),
        Command::Formats {} => {
            let table = known_formats(&cfg.formats.mime_overrides);
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(())
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> PathBuf {
    if let Some(p) = user {
        return p.to_path_buf();
    }
    let default = PathBuf::from("quack-convert.toml");
    if default.exists() {
        default
    } else {
        PathBuf::from("quack-convert.example.toml")
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = if args.log_level.is_some() {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

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
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
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

    Some(PathBuf::from("logs").join("quack-convert.log"))
}

fn serve(cfg: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "building tokio runtime")?;
    info!(version = env!("CARGO_PKG_VERSION"), "quack-convert starting");
    runtime.block_on(crate::server::serve(cfg))
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = SofficeEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if !diag.ok {
        return Err(anyhow!("office suite not usable: {}", engine.exe().display()));
    }
    Ok(())
}

fn convert(
    cfg: &Config,
    input: &Path,
    to: &str,
    from: Option<&str>,
    out_override: Option<&Path>,
) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    let file_name = input
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string);
    let source_format = match from {
        Some(f) => f.to_string(),
        None => file_name
            .as_deref()
            .and_then(extension_of)
            .ok_or_else(|| anyhow!("no --from given and input has no extension"))?,
    };

    let payload =
        std::fs::read(input).with_context(|| format!("reading input: {}", input.display()))?;

    // Local runs name the output after the input file, not the staged copy.
    let mut cfg = cfg.clone();
    cfg.output.use_upload_stem = true;

    let engine = SofficeEngine::new(&cfg)?;
    let pipeline = Pipeline::new(&cfg, engine);

    let started = now_rfc3339();
    let converted = pipeline.run_job(&ConversionRequest {
        file_name,
        payload,
        source_format,
        target_format: to.to_string(),
    })?;

    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    ensure_dir(&out_dir)?;
    let out_path = out_dir.join(&converted.file_name);
    std::fs::write(&out_path, &converted.bytes)
        .with_context(|| format!("writing output: {}", out_path.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "output": out_path,
            "content_type": converted.content_type,
            "started": started,
            "finished": now_rfc3339(),
            "report": converted.report,
            "status": "ok"
        }))?
    );

    Ok(())
}
