// Redeploy module
// Handles SIGHUP by re-reading the precache manifest and installing a new
// worker generation without restarting the server

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::constants::RELOAD_CHECK_INTERVAL_MS;
use crate::error::TsubameError;
use crate::lifecycle::LifecycleController;
use crate::precache::{InstallReport, PrecacheManifest};

/// ReloadManager installs a new worker generation when SIGHUP arrives.
///
/// Only the precache manifest is reloaded. Routes, fallbacks and server
/// settings take effect on restart.
pub struct ReloadManager {
    config_path: PathBuf,
    manifest_override: Option<PathBuf>,
    reload_requested: Arc<AtomicBool>,
}

impl ReloadManager {
    /// Create a ReloadManager for the config file (and optional manifest
    /// override) the process was started with
    pub fn new(config_path: PathBuf, manifest_override: Option<PathBuf>) -> Self {
        Self {
            config_path,
            manifest_override,
            reload_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register SIGHUP signal handler that flags a reload request
    #[cfg(unix)]
    pub fn register_signal_handler(&self) -> Result<(), String> {
        use signal_hook::consts::SIGHUP;
        use signal_hook::flag;

        flag::register(SIGHUP, Arc::clone(&self.reload_requested))
            .map_err(|e| format!("Failed to register SIGHUP handler: {}", e))?;

        Ok(())
    }

    /// Check if reload was requested via SIGHUP
    pub fn is_reload_requested(&self) -> bool {
        self.reload_requested.load(Ordering::Relaxed)
    }

    /// Clear the reload request flag, returning whether it was set
    fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::Relaxed)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Re-read the configuration and build the manifest it describes.
    /// The configuration is validated first.
    pub fn load_manifest(&self) -> Result<PrecacheManifest, String> {
        let config = Config::from_file(&self.config_path)?;
        config.validate()?;
        config
            .precache
            .load_manifest(self.manifest_override.as_deref())
    }

    /// Install a new worker generation from the current manifest
    pub async fn reload(
        &self,
        controller: &LifecycleController,
    ) -> Result<InstallReport, TsubameError> {
        let manifest = self.load_manifest().map_err(TsubameError::Config)?;
        tracing::info!(
            config_file = %self.config_path.display(),
            entries = manifest.len(),
            "Reloading precache manifest"
        );
        Ok(controller.install(&manifest).await?)
    }

    /// Serve reload requests until `shutdown` resolves. A failed reload is
    /// logged and the active worker keeps serving.
    pub async fn watch<F>(self, controller: Arc<LifecycleController>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(Duration::from_millis(RELOAD_CHECK_INTERVAL_MS));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => return,
            }
            if !self.take_reload_request() {
                continue;
            }

            match self.reload(&controller).await {
                Ok(report) => tracing::info!(
                    installed = report.installed,
                    skipped = report.skipped,
                    failed = report.failed.len(),
                    readiness = ?report.readiness,
                    waiting = controller.waiting_worker().is_some(),
                    "Reload installed a new worker"
                ),
                Err(e) => tracing::error!(error = %e, "Reload failed, keeping the active worker"),
            }
        }
    }
}
