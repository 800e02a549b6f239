use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use turnstile::config::{LogFormat, LoggingConfig, TurnstileConfig};
use turnstile::http::{router, HttpServer};
use turnstile::ratelimit::SlidingWindowLimiter;

/// Sliding-window admission control in front of the admin login endpoint.
#[derive(Parser, Debug)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TurnstileConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.http_addr = addr;
    }

    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Turnstile starting");
    if let Some(path) = &args.config {
        info!(path = %path.display(), "Read configuration file");
    }
    info!(
        http_addr = %config.server.http_addr,
        quota = config.limiter.quota,
        window_secs = config.limiter.window_secs,
        scope = %config.limiter.scope,
        "Configuration loaded"
    );

    let limiter = SlidingWindowLimiter::start(config.limiter.settings())?;

    let app = router(limiter, config.server.trust_forwarded_headers);
    let server = HttpServer::bind(config.server.http_addr, app).await?;

    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Resolves on the first interrupt or terminate signal the process receives.
async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("interrupt handler could not be registered");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("terminate handler could not be registered")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    info!(signal = signal_name, "Draining connections before exit");
}
