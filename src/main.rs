use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskd::{auth::TokenVerifier, config::DaemonConfig, rest, storage::Storage, AppContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskd", about = "Collaborative task-management backend daemon", version)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "TASKD_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides the config file)
    #[arg(long, env = "TASKD_PORT")]
    port: Option<u16>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TASKD_BIND")]
    bind_address: Option<String>,

    /// Data directory for the SQLite database
    #[arg(long, env = "TASKD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TASKD_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "TASKD_LOG_JSON")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args);

    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind_address) = args.bind_address {
        config.bind_address = bind_address;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    config.log_summary();

    let storage = Storage::new_with_slow_query(
        &config.data_dir,
        config.observability.slow_query_threshold_ms,
    )
    .await?;
    let verifier = TokenVerifier::from_config(&config.auth)?;

    let app = Arc::new(AppContext {
        config: Arc::new(config),
        storage: Arc::new(storage),
        verifier,
        started_at: std::time::Instant::now(),
    });

    info!("taskd {} starting", env!("CARGO_PKG_VERSION"));
    rest::serve(app).await
}

/// Initialize tracing. Returns the file-appender guard, which must stay
/// alive for the lifetime of the process when file logging is enabled.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log.clone().unwrap_or_else(|| "info".to_string());

    if let Some(log_file) = &args.log_file {
        let dir = log_file.parent().unwrap_or_else(|| std::path::Path::new("."));
        let prefix = log_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "taskd.log".to_string());
        let appender = tracing_appender::rolling::daily(dir, prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if args.json_logs {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }
        Some(guard)
    } else if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
        None
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
        None
    }
}
