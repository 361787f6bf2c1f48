//! Extension host.
//!
//! Ties discovery, lifecycles and shutdown together. Each extension is
//! driven on its own task, so a failing or panicking extension only fails
//! itself.

use std::path::Path;
use std::sync::Arc;

use plughost_extension_sdk::BoxedExtension;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigStore, LoadOutcome};
use crate::error::{ExtensionError, Result};
use crate::extension::{
    DiscoveryReport, ExtensionDescriptor, ExtensionLifecycle, ExtensionRegistry, LifecycleState,
    ModuleLoader, ModuleSource,
};
use crate::settings::HostSettings;

/// Module label for extensions registered directly rather than discovered.
pub const BUILTIN_MODULE: &str = "<builtin>";

/// Result of driving one extension through a batch transition.
#[derive(Debug)]
pub struct TransitionReport {
    pub name: String,
    pub state: LifecycleState,
    pub error: Option<ExtensionError>,
}

impl TransitionReport {
    fn new(lifecycle: &ExtensionLifecycle, result: Result<()>) -> Self {
        Self {
            name: lifecycle.name().to_string(),
            state: lifecycle.state(),
            error: result.err(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Owns the registry and drives every extension's lifecycle.
pub struct ExtensionHost {
    settings: HostSettings,
    store: Arc<ConfigStore>,
    registry: ExtensionRegistry,
    shutdown: CancellationToken,
}

impl ExtensionHost {
    pub fn new(settings: HostSettings) -> Self {
        let store = Arc::new(ConfigStore::new(settings.configs_dir.clone()));
        Self {
            registry: ExtensionRegistry::new(Arc::clone(&store)),
            settings,
            store,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Token cancelled when shutdown is requested.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Create the libs, plugins, configs and logs directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.settings.libs_dir,
            &self.settings.plugins_dir,
            &self.settings.configs_dir,
            &self.settings.logs_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Load dependencies and discover extension modules from the configured
    /// directories.
    pub fn discover(&mut self, loader: &mut dyn ModuleLoader) -> Result<DiscoveryReport> {
        let libs_dir = self.settings.libs_dir.clone();
        let plugins_dir = self.settings.plugins_dir.clone();
        self.registry.discover(loader, &libs_dir, &plugins_dir)
    }

    /// Register an extension linked into the host.
    pub fn register(&mut self, extension: BoxedExtension) -> Result<ExtensionDescriptor> {
        self.registry
            .register(ModuleSource::builtin(BUILTIN_MODULE), extension)
    }

    pub fn register_from(
        &mut self,
        source: ModuleSource,
        extension: BoxedExtension,
    ) -> Result<ExtensionDescriptor> {
        self.registry.register(source, extension)
    }

    pub fn descriptors(&self) -> Vec<ExtensionDescriptor> {
        self.registry.descriptors()
    }

    /// Init, run `on_init` and start every extension, each on its own task.
    ///
    /// Reports come back in registration order. One extension failing does
    /// not affect the others.
    pub async fn start_all(&self) -> Vec<TransitionReport> {
        let tasks: Vec<_> = self
            .registry
            .iter()
            .map(|entry| {
                let lifecycle = entry.lifecycle();
                let cancel = self.shutdown.child_token();
                let task = tokio::spawn(async move {
                    let mut lifecycle = lifecycle.lock().await;
                    let result = start_sequence(&mut lifecycle, cancel).await;
                    TransitionReport::new(&lifecycle, result)
                });
                (entry.clone(), task)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (entry, task) in tasks {
            let report = match task.await {
                Ok(report) => report,
                Err(e) => {
                    let lifecycle = entry.lifecycle();
                    let mut lifecycle = lifecycle.lock().await;
                    lifecycle.fail(&e);
                    TransitionReport::new(&lifecycle, Err(ExtensionError::HookPanicked {
                        extension: entry.name().to_string(),
                        stage: crate::error::HookStage::Load,
                    }))
                }
            };
            reports.push(report);
        }

        let running = reports
            .iter()
            .filter(|r| r.state == LifecycleState::Running)
            .count();
        tracing::info!(
            running,
            failed = reports.len() - running,
            "Extensions started"
        );
        reports
    }

    /// Stop every running extension, each on its own task.
    ///
    /// Extensions that are not running are left as they are.
    pub async fn stop_all(&self) -> Vec<TransitionReport> {
        let tasks: Vec<_> = self
            .registry
            .iter()
            .filter(|entry| entry.state() == LifecycleState::Running)
            .map(|entry| {
                let lifecycle = entry.lifecycle();
                let task = tokio::spawn(async move {
                    let mut lifecycle = lifecycle.lock().await;
                    let result = lifecycle.stop(CancellationToken::new()).await;
                    TransitionReport::new(&lifecycle, result)
                });
                (entry.clone(), task)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (entry, task) in tasks {
            let report = match task.await {
                Ok(report) => report,
                Err(e) => {
                    let lifecycle = entry.lifecycle();
                    let mut lifecycle = lifecycle.lock().await;
                    lifecycle.fail(&e);
                    TransitionReport::new(&lifecycle, Err(ExtensionError::HookPanicked {
                        extension: entry.name().to_string(),
                        stage: crate::error::HookStage::Unload,
                    }))
                }
            };
            reports.push(report);
        }

        tracing::info!(stopped = reports.iter().filter(|r| r.is_ok()).count(), "Extensions stopped");
        reports
    }

    /// Reload the configuration of one extension from disk.
    pub async fn reload_config(&self, name: &str) -> Result<Option<LoadOutcome>> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| ExtensionError::NotFound(name.to_string()))?;
        let lifecycle = entry.lifecycle();
        let mut lifecycle = lifecycle.lock().await;
        lifecycle.reload_config().await
    }

    /// Wait until shutdown is requested through the token or Ctrl+C.
    pub async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = ctrl_c() => {
                tracing::info!("Received Ctrl+C, starting graceful shutdown");
                self.shutdown.cancel();
            }
        }
    }

    /// Start everything, wait for shutdown, then stop everything.
    ///
    /// Returns the stop reports.
    pub async fn run(&self) -> Vec<TransitionReport> {
        self.start_all().await;
        self.wait_for_shutdown().await;
        self.stop_all().await
    }

    pub fn logs_dir(&self) -> &Path {
        &self.settings.logs_dir
    }
}

async fn start_sequence(lifecycle: &mut ExtensionLifecycle, cancel: CancellationToken) -> Result<()> {
    lifecycle.init().await?;
    lifecycle.on_init().await?;
    lifecycle.start(cancel).await
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_extension_sdk::{Extension, HookResult};

    struct Idle;

    #[async_trait::async_trait]
    impl Extension for Idle {
        async fn load(&mut self, _cancel: CancellationToken) -> HookResult {
            Ok(())
        }

        async fn unload(&mut self, _cancel: CancellationToken) -> HookResult {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reload_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let host = ExtensionHost::new(HostSettings::default().rooted_at(dir.path()));

        let err = host.reload_config("Missing").await.unwrap_err();
        assert!(matches!(err, ExtensionError::NotFound(name) if name == "Missing"));
    }

    #[tokio::test]
    async fn test_run_stops_after_token_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = ExtensionHost::new(HostSettings::default().rooted_at(dir.path()));
        host.register(Box::new(Idle)).unwrap();

        host.shutdown_token().cancel();
        let reports = host.run().await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].state, LifecycleState::Stopped);
        assert_eq!(host.descriptors()[0].module, Path::new(BUILTIN_MODULE));
    }
}
