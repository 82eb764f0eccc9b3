use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tsubame::config::Config;
use tsubame::error::TsubameError;
use tsubame::fetch::HttpFetcher;
use tsubame::lifecycle::LifecycleController;
use tsubame::reload::ReloadManager;
use tsubame::server::InterceptionServer;

/// Tsubame - offline caching orchestrator for server-rendered web apps
#[derive(Parser, Debug)]
#[command(name = "tsubame")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Precache manifest, overriding `precache.manifest` from the config
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tsubame::logging::init_subscriber()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    let args = Args::parse();

    let config = Config::from_file(&args.config).map_err(TsubameError::Config)?;
    config.validate().map_err(TsubameError::Config)?;
    let manifest = config
        .precache
        .load_manifest(args.manifest.as_deref())
        .map_err(TsubameError::Config)?;

    tracing::info!(
        config_file = %args.config.display(),
        origin = %config.server.origin,
        routes = config.routes.len(),
        fallbacks = config.fallbacks.len(),
        precache_entries = manifest.len(),
        "Configuration loaded successfully"
    );

    if args.test {
        tracing::info!("Configuration test passed");
        return Ok(());
    }

    let fetcher = HttpFetcher::new(config.server.fetch_timeout_seconds.map(Duration::from_secs))
        .map_err(TsubameError::from)?;
    let controller =
        LifecycleController::from_config(&config, Arc::new(fetcher)).map_err(TsubameError::Config)?;

    let report = controller
        .install(&manifest)
        .await
        .map_err(TsubameError::from)?;
    tracing::info!(
        installed = report.installed,
        skipped = report.skipped,
        failed = report.failed.len(),
        readiness = ?report.readiness,
        "Initial install finished"
    );

    let listen_address = config.server.listen_address();
    let listener = TcpListener::bind(&listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", listen_address))?;

    let controller = Arc::new(controller);

    let reload_manager = ReloadManager::new(args.config.clone(), args.manifest.clone());
    register_reload_signal(&reload_manager);
    let (stop_reload, reload_stopped) = oneshot::channel::<()>();
    let reloader = tokio::spawn(reload_manager.watch(controller.clone(), async move {
        let _ = reload_stopped.await;
    }));

    let server = Arc::new(InterceptionServer::new(controller));
    server
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    let _ = stop_reload.send(());
    if let Err(e) = reloader.await {
        tracing::warn!(error = %e, "Reload task ended abnormally");
    }

    Ok(())
}

#[cfg(unix)]
fn register_reload_signal(reload_manager: &ReloadManager) {
    match reload_manager.register_signal_handler() {
        Ok(()) => tracing::info!("SIGHUP installs a new worker from the current manifest"),
        Err(e) => tracing::warn!(error = %e, "Reload on SIGHUP unavailable"),
    }
}

#[cfg(not(unix))]
fn register_reload_signal(_reload_manager: &ReloadManager) {}
