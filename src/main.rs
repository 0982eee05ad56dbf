use anyhow::Context;
use clap::Parser;
use std::{fs::OpenOptions, path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use whois_proxy::{config::LoggingConfig, Config, WhoisProxy};

#[derive(Parser)]
#[command(name = "whois-proxy")]
#[command(about = "Caching WHOIS proxy", long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Environment overrides may live in a .env file
    dotenvy::dotenv().ok();

    let config = Config::load(Some(args.config.as_path()))
        .with_context(|| format!("cannot load configuration file {}", args.config.display()))?;

    init_tracing(&config.logging).context("cannot init logger")?;
    info!(config = %args.config.display(), "Configuration loaded successfully");

    let proxy = WhoisProxy::bind(config.service)
        .await
        .context("can't start whois server")?;
    info!("Whois Proxy Server starts at {}", proxy.local_addr()?);

    proxy.run_until(shutdown_signal()).await?;

    info!("Finished");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let default_filter = if logging.debug {
        "whois_proxy=debug"
    } else {
        "whois_proxy=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stdout_layer = fmt::layer().with_ansi(!logging.disable_color);

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed create log file {}", path))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, gracefully shutting down...");
}
