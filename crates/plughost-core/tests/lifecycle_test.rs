//! Extension lifecycle tests.
//!
//! Covers hook ordering, the config load/save points around the hooks,
//! rejected transitions, and failure handling.

mod common;

use std::sync::Arc;

use common::{current_config, Fault, Journal, Recorder, RecorderJsonConfig, Stateless};
use plughost_core::{
    ConfigError, ConfigStore, ExtensionError, ExtensionLifecycle, HookStage, LifecycleState,
    LoadOutcome, ModuleSource,
};
use plughost_extension_sdk::prelude::*;

fn lifecycle(extension: BoxedExtension, configs: &std::path::Path) -> ExtensionLifecycle {
    ExtensionLifecycle::new(
        extension,
        ModuleSource::builtin("test"),
        Arc::new(ConfigStore::new(configs)),
    )
}

fn read_config(path: &std::path::Path) -> RecorderJsonConfig {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_full_lifecycle_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Echo.json");
    std::fs::write(&path, r#"{"greeting":"hello","runCount":4}"#).unwrap();

    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("Echo", &journal)), dir.path());
    let state = lc.state_handle();
    assert_eq!(state.get(), LifecycleState::Uninitialized);

    lc.init().await.unwrap();
    assert_eq!(state.get(), LifecycleState::ConfigLoaded);
    assert_eq!(lc.binding().unwrap().path(), path.as_path());

    lc.on_init().await.unwrap();
    assert_eq!(state.get(), LifecycleState::ConfigLoaded);

    lc.start(CancellationToken::new()).await.unwrap();
    assert_eq!(state.get(), LifecycleState::Running);

    lc.stop(CancellationToken::new()).await.unwrap();
    assert_eq!(state.get(), LifecycleState::Stopped);

    // on_init saw the loaded value, and the save happened after unload.
    assert_eq!(
        journal.entries(),
        vec!["Echo:on_init greeting=hello", "Echo:load", "Echo:unload"]
    );
    assert_eq!(
        read_config(&path),
        RecorderJsonConfig {
            greeting: "hello".into(),
            run_count: 5,
        }
    );
}

#[tokio::test]
async fn test_missing_config_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let configs = dir.path().join("configs");
    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("Fresh", &journal)), &configs);

    lc.init().await.unwrap();

    let path = configs.join("Fresh.json");
    assert!(path.exists());
    assert_eq!(read_config(&path), RecorderJsonConfig::default());

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"runCount\""), "{}", raw);
}

#[tokio::test]
async fn test_begin_stop_then_complete_stop() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("Split", &journal)), dir.path());

    lc.init().await.unwrap();
    lc.on_init().await.unwrap();
    lc.start(CancellationToken::new()).await.unwrap();

    lc.begin_stop(CancellationToken::new()).await.unwrap();
    assert_eq!(lc.state(), LifecycleState::Stopping);
    // Not saved yet.
    assert_eq!(read_config(&dir.path().join("Split.json")).run_count, 0);

    lc.complete_stop().await.unwrap();
    assert_eq!(lc.state(), LifecycleState::Stopped);
    assert_eq!(read_config(&dir.path().join("Split.json")).run_count, 1);
}

#[tokio::test]
async fn test_invalid_transitions_leave_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("Strict", &journal)), dir.path());

    let err = lc.start(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::InvalidTransition {
            from: LifecycleState::Uninitialized,
            ..
        }
    ));
    assert_eq!(lc.state(), LifecycleState::Uninitialized);

    lc.init().await.unwrap();
    let err = lc.stop(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ExtensionError::InvalidTransition { .. }));
    assert_eq!(lc.state(), LifecycleState::ConfigLoaded);

    let err = lc.init().await.unwrap_err();
    assert!(matches!(err, ExtensionError::InvalidTransition { .. }));
    assert_eq!(lc.state(), LifecycleState::ConfigLoaded);

    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_on_init_failure_fails_extension() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let ext = Recorder::new("Grumpy", &journal).with_fault(Fault::FailOnInit);
    let mut lc = lifecycle(Box::new(ext), dir.path());

    lc.init().await.unwrap();
    let err = lc.on_init().await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::Hook {
            stage: HookStage::OnInit,
            ..
        }
    ));
    assert_eq!(lc.state(), LifecycleState::Failed);

    // Failed is terminal.
    let err = lc.start(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::InvalidTransition {
            from: LifecycleState::Failed,
            ..
        }
    ));
    assert_eq!(journal.entries(), vec!["Grumpy:on_init greeting="]);
}

#[tokio::test]
async fn test_hook_panic_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let ext = Recorder::new("Boom", &journal).with_fault(Fault::PanicOnInit);
    let mut lc = lifecycle(Box::new(ext), dir.path());

    lc.init().await.unwrap();
    let err = lc.on_init().await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::HookPanicked {
            stage: HookStage::OnInit,
            ..
        }
    ));
    assert_eq!(lc.state(), LifecycleState::Failed);
}

#[tokio::test]
async fn test_load_failure_fails_extension() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let ext = Recorder::new("Lazy", &journal).with_fault(Fault::FailLoad);
    let mut lc = lifecycle(Box::new(ext), dir.path());

    lc.init().await.unwrap();
    lc.on_init().await.unwrap();
    let err = lc.start(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::Hook {
            stage: HookStage::Load,
            ..
        }
    ));
    assert_eq!(lc.state(), LifecycleState::Failed);
}

#[tokio::test]
async fn test_unload_failure_skips_save() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let ext = Recorder::new("Stubborn", &journal).with_fault(Fault::FailUnload);
    let mut lc = lifecycle(Box::new(ext), dir.path());

    lc.init().await.unwrap();
    lc.on_init().await.unwrap();
    lc.start(CancellationToken::new()).await.unwrap();

    let path = dir.path().join("Stubborn.json");
    std::fs::write(&path, r#"{"greeting":"edited on disk","runCount":9}"#).unwrap();

    let err = lc.stop(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::Hook {
            stage: HookStage::Unload,
            ..
        }
    ));
    assert_eq!(lc.state(), LifecycleState::Failed);
    assert_eq!(read_config(&path).greeting, "edited on disk");
}

#[tokio::test]
async fn test_malformed_config_fails_init() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("Broken", &journal)), dir.path());

    let err = lc.init().await.unwrap_err();
    assert!(matches!(err, ExtensionError::Config(ConfigError::Parse { .. })));
    assert_eq!(lc.state(), LifecycleState::Failed);
    // The bad file is left for the operator to fix.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LegacyTomlConfig {
    value: u32,
}

impl ExtensionConfig for LegacyTomlConfig {}

#[derive(Default)]
struct Legacy {
    config: TypedConfig<LegacyTomlConfig>,
}

#[async_trait]
impl Extension for Legacy {
    fn config(&self) -> Option<&dyn ConfigDocument> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigDocument> {
        Some(&mut self.config)
    }

    async fn load(&mut self, _cancel: CancellationToken) -> HookResult {
        Ok(())
    }

    async fn unload(&mut self, _cancel: CancellationToken) -> HookResult {
        Ok(())
    }
}

#[tokio::test]
async fn test_unsupported_config_kind_fails_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let configs = dir.path().join("configs");
    let mut lc = lifecycle(Box::new(Legacy::default()), &configs);

    let err = lc.init().await.unwrap_err();
    match err {
        ExtensionError::Config(ConfigError::UnsupportedFormat(hint)) => {
            assert_eq!(hint, "LegacyTomlConfig")
        }
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }
    assert_eq!(lc.state(), LifecycleState::Failed);
    assert!(lc.binding().is_none());
    assert!(!configs.exists());
}

#[tokio::test]
async fn test_name_escaping_configs_dir_fails_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let configs = dir.path().join("configs");
    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("../Escape", &journal)), &configs);

    let err = lc.init().await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::Config(ConfigError::InvalidName(ref name)) if name == "../Escape"
    ));
    assert_eq!(lc.state(), LifecycleState::Failed);
    assert!(!configs.exists());
    assert!(!dir.path().join("Escape.json").exists());
}

#[tokio::test]
async fn test_extension_without_config_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let configs = dir.path().join("configs");
    let mut lc = lifecycle(Box::new(Stateless), &configs);

    lc.init().await.unwrap();
    lc.on_init().await.unwrap();
    lc.start(CancellationToken::new()).await.unwrap();
    assert_eq!(lc.reload_config().await.unwrap(), None);
    lc.stop(CancellationToken::new()).await.unwrap();

    assert_eq!(lc.name(), "Stateless");
    assert_eq!(lc.state(), LifecycleState::Stopped);
    assert!(!configs.exists());
}

#[tokio::test]
async fn test_reload_config() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let mut lc = lifecycle(Box::new(Recorder::new("Live", &journal)), dir.path());

    let err = lc.reload_config().await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::ReloadNotPermitted {
            state: LifecycleState::Uninitialized,
            ..
        }
    ));

    lc.init().await.unwrap();
    lc.on_init().await.unwrap();
    lc.start(CancellationToken::new()).await.unwrap();

    let path = dir.path().join("Live.json");
    std::fs::write(&path, r#"{"greeting":"reloaded","runCount":2}"#).unwrap();
    assert_eq!(lc.reload_config().await.unwrap(), Some(LoadOutcome::Loaded));
    let doc = lc.extension().config().unwrap();
    assert_eq!(current_config(doc).greeting, "reloaded");

    // A bad file keeps the previous value and the extension running.
    std::fs::write(&path, "[1, 2").unwrap();
    assert!(lc.reload_config().await.is_err());
    assert_eq!(lc.state(), LifecycleState::Running);
    assert_eq!(current_config(lc.extension().config().unwrap()).greeting, "reloaded");

    std::fs::write(&path, r#"{"greeting":"reloaded","runCount":2}"#).unwrap();
    lc.stop(CancellationToken::new()).await.unwrap();
    let err = lc.reload_config().await.unwrap_err();
    assert!(matches!(
        err,
        ExtensionError::ReloadNotPermitted {
            state: LifecycleState::Stopped,
            ..
        }
    ));
}
