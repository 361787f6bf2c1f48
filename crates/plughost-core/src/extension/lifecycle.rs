//! Per-extension lifecycle state machine.
//!
//! ```text
//! Uninitialized --init--> Initializing --(config loaded)--> ConfigLoaded
//! ConfigLoaded  --on_init--> ConfigLoaded
//! ConfigLoaded  --start----> Running
//! Running       --begin_stop--> Stopping
//! Stopping      --complete_stop (config saved)--> Stopped
//! any non-terminal --fail--> Failed
//! ```
//!
//! Configuration is loaded before `on_init` runs and saved only after
//! `unload` returns, so the extension can still change it while stopping.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use plughost_extension_sdk::{BoxedExtension, CancellationToken, HookResult};
use serde::{Deserialize, Serialize};

use super::loader::ModuleSource;
use crate::config::{ConfigBinding, ConfigStore, LoadOutcome};
use crate::error::{ExtensionError, HookStage, Result};

/// Lifecycle state of one extension instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initializing,
    ConfigLoaded,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Whether `self -> to` is an edge of the state graph.
    pub fn can_transition_to(&self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, to) {
            (from, Failed) => !from.is_terminal(),
            (Uninitialized, Initializing)
            | (Initializing, ConfigLoaded)
            | (ConfigLoaded, Running)
            | (Running, Stopping)
            | (Stopping, Stopped) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initializing => write!(f, "Initializing"),
            Self::ConfigLoaded => write!(f, "ConfigLoaded"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Read-only, cloneable view of a lifecycle's current state.
///
/// Readable while the lifecycle itself is locked by a running hook.
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<RwLock<LifecycleState>>);

impl StateHandle {
    pub fn get(&self) -> LifecycleState {
        *self.0.read()
    }

    fn set(&self, state: LifecycleState) {
        *self.0.write() = state;
    }
}

/// Drives one extension through its states.
pub struct ExtensionLifecycle {
    name: String,
    state: StateHandle,
    store: Arc<ConfigStore>,
    binding: Option<ConfigBinding>,
    // Declared before `module` so the extension is dropped before the
    // library that holds its code.
    extension: BoxedExtension,
    module: ModuleSource,
}

impl ExtensionLifecycle {
    pub fn new(extension: BoxedExtension, module: ModuleSource, store: Arc<ConfigStore>) -> Self {
        Self {
            name: extension.name().to_string(),
            state: StateHandle::default(),
            store,
            binding: None,
            extension,
            module,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn module_path(&self) -> &Path {
        self.module.path()
    }

    /// Config binding, once `init` has derived it.
    pub fn binding(&self) -> Option<&ConfigBinding> {
        self.binding.as_ref()
    }

    pub fn extension(&self) -> &BoxedExtension {
        &self.extension
    }

    /// `Uninitialized -> ConfigLoaded`: derive the binding and load config.
    pub async fn init(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::Uninitialized, "init")?;
        self.set_state(LifecycleState::Initializing);

        if let Err(e) = self.bind_and_load().await {
            self.fail(&e);
            return Err(e);
        }

        self.set_state(LifecycleState::ConfigLoaded);
        Ok(())
    }

    /// Run the extension's setup hook. State stays `ConfigLoaded`.
    pub async fn on_init(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::ConfigLoaded, "on_init")?;
        self.run_hook(HookStage::OnInit, None).await
    }

    /// `ConfigLoaded -> Running` once the `load` hook succeeds.
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<()> {
        self.expect_state(LifecycleState::ConfigLoaded, "start")?;
        self.run_hook(HookStage::Load, Some(cancel)).await?;
        self.set_state(LifecycleState::Running);
        tracing::info!(extension = %self.name, "Extension running");
        Ok(())
    }

    /// `Running -> Stopping`, then run the `unload` hook.
    pub async fn begin_stop(&mut self, cancel: CancellationToken) -> Result<()> {
        self.expect_state(LifecycleState::Running, "stop")?;
        self.set_state(LifecycleState::Stopping);
        self.run_hook(HookStage::Unload, Some(cancel)).await
    }

    /// `Stopping -> Stopped`, saving config as the final act.
    ///
    /// A failed save is logged; the extension still ends `Stopped`.
    pub async fn complete_stop(&mut self) -> Result<()> {
        self.expect_state(LifecycleState::Stopping, "complete stop of")?;

        if let (Some(binding), Some(doc)) = (self.binding.as_ref(), self.extension.config()) {
            match self.store.save(binding, doc).await {
                Ok(()) => {
                    tracing::debug!(
                        extension = %self.name,
                        path = %binding.path().display(),
                        "Config saved"
                    );
                }
                Err(e) => {
                    tracing::error!(extension = %self.name, error = %e, "Failed to save config");
                }
            }
        }

        self.set_state(LifecycleState::Stopped);
        tracing::info!(extension = %self.name, "Extension stopped");
        Ok(())
    }

    /// `begin_stop` followed by `complete_stop`.
    pub async fn stop(&mut self, cancel: CancellationToken) -> Result<()> {
        self.begin_stop(cancel).await?;
        self.complete_stop().await
    }

    /// Re-read the config file, replacing the in-memory value.
    ///
    /// Allowed only while `ConfigLoaded` or `Running`. Returns `None` for
    /// extensions without configuration. A failed reload keeps the previous
    /// value and the current state.
    pub async fn reload_config(&mut self) -> Result<Option<LoadOutcome>> {
        let state = self.state();
        if !matches!(state, LifecycleState::ConfigLoaded | LifecycleState::Running) {
            return Err(ExtensionError::ReloadNotPermitted {
                extension: self.name.clone(),
                state,
            });
        }

        let (Some(binding), Some(doc)) = (self.binding.as_ref(), self.extension.config_mut())
        else {
            return Ok(None);
        };

        let outcome = self.store.reload(binding, doc).await?;
        tracing::info!(extension = %self.name, "Config reloaded");
        Ok(Some(outcome))
    }

    /// Move to `Failed` from any non-terminal state.
    pub fn fail(&mut self, reason: &dyn std::fmt::Display) {
        let state = self.state();
        if state.is_terminal() {
            return;
        }
        tracing::error!(extension = %self.name, from = %state, "Extension failed: {}", reason);
        self.set_state(LifecycleState::Failed);
    }

    async fn bind_and_load(&mut self) -> Result<()> {
        let Some(doc) = self.extension.config_mut() else {
            tracing::debug!(extension = %self.name, "Extension declares no config");
            return Ok(());
        };

        // Binding fails on an unsupported hint before any file is touched.
        let binding = self.store.bind(&self.name, doc.type_hint())?;
        let outcome = self.store.load(&binding, doc).await?;

        tracing::info!(
            extension = %self.name,
            path = %binding.path().display(),
            created = outcome == LoadOutcome::Created,
            "Config loaded"
        );
        self.binding = Some(binding);
        Ok(())
    }

    async fn run_hook(&mut self, stage: HookStage, cancel: Option<CancellationToken>) -> Result<()> {
        let cancel = cancel.unwrap_or_default();
        let hook = match stage {
            HookStage::OnInit => self.extension.on_init(),
            HookStage::Load => self.extension.load(cancel),
            HookStage::Unload => self.extension.unload(cancel),
        };
        let outcome: std::result::Result<HookResult, _> =
            AssertUnwindSafe(hook).catch_unwind().await;

        let err = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(source)) => ExtensionError::Hook {
                extension: self.name.clone(),
                stage,
                source,
            },
            Err(_) => ExtensionError::HookPanicked {
                extension: self.name.clone(),
                stage,
            },
        };
        self.fail(&err);
        Err(err)
    }

    fn expect_state(&self, expected: LifecycleState, action: &'static str) -> Result<()> {
        let from = self.state();
        if from == expected {
            Ok(())
        } else {
            Err(ExtensionError::InvalidTransition {
                extension: self.name.clone(),
                from,
                action,
            })
        }
    }

    fn set_state(&self, to: LifecycleState) {
        debug_assert!(
            self.state().can_transition_to(to),
            "illegal transition {} -> {}",
            self.state(),
            to
        );
        self.state.set(to);
    }
}

impl std::fmt::Debug for ExtensionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionLifecycle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("binding", &self.binding)
            .field("module", &self.module)
            .finish()
    }
}
