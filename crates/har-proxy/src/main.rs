use anyhow::Context;
use clap::Parser;
use har_proxy::admin_api::AdminApiServer;
use har_proxy::config::Config;
use har_proxy::instance::ProxyRegistry;
use std::sync::Arc;
use tracing::{error, info};

/// Forward HTTP proxy that records traffic as HAR, driven by a REST API
#[derive(Parser, Debug)]
#[command(name = "har-proxy", author, version)]
struct Args {
    /// Control API port
    #[arg(short, long, env = "HAR_PROXY_PORT")]
    port: Option<u16>,

    /// Control API bind address
    #[arg(long, env = "HAR_PROXY_HOST")]
    host: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "HAR_PROXY_CONFIG")]
    config: Option<String>,

    /// Record headers and timings only, no bodies
    #[arg(long)]
    no_capture_content: bool,

    /// Largest body copy kept per request or response
    #[arg(long, env = "HAR_PROXY_MAX_CAPTURE_BYTES")]
    max_capture_bytes: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long, env = "HAR_PROXY_LOG_JSON")]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => Config::default(),
    };

    if let Some(port) = args.port {
        config.admin.port = port;
    }
    if let Some(host) = &args.host {
        config.admin.host = host.clone();
    }
    if args.no_capture_content {
        config.capture.capture_content = false;
    }
    if let Some(max) = args.max_capture_bytes {
        config.capture.max_body_bytes = max;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;
    info!(
        "har-proxy v{} starting (capture_content={}, max_body_bytes={})",
        env!("CARGO_PKG_VERSION"),
        config.capture.capture_content,
        config.capture.max_body_bytes
    );

    let registry = Arc::new(ProxyRegistry::new(&config));
    let (host, port) = (config.admin.host.as_str(), config.admin.port);
    let server = AdminApiServer::bind(host, port, Arc::clone(&registry))
        .await
        .with_context(|| format!("Failed to bind control API on {host}:{port}"))?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Control API failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    registry.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
