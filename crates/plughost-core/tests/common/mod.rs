//! Shared fixtures for plughost-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use plughost_extension_sdk::prelude::*;

/// Ordered record of hook calls, shared between a test and its extensions.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderJsonConfig {
    pub greeting: String,
    pub run_count: u32,
}

impl ExtensionConfig for RecorderJsonConfig {}

/// Where a [`Recorder`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    FailOnInit,
    FailLoad,
    FailUnload,
    PanicOnInit,
    PanicLoad,
}

/// Extension that journals its hooks and bumps `runCount` on unload.
pub struct Recorder {
    name: String,
    config: TypedConfig<RecorderJsonConfig>,
    journal: Journal,
    fault: Fault,
}

impl Recorder {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            config: TypedConfig::new(),
            journal: journal.clone(),
            fault: Fault::None,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    fn log(&self, hook: &str) {
        self.journal.push(format!("{}:{}", self.name, hook));
    }
}

#[async_trait]
impl Extension for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> Option<&dyn ConfigDocument> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigDocument> {
        Some(&mut self.config)
    }

    async fn on_init(&mut self) -> HookResult {
        self.log(&format!("on_init greeting={}", self.config.get().greeting));
        match self.fault {
            Fault::FailOnInit => Err(HookError::failed("on_init refused")),
            Fault::PanicOnInit => panic!("on_init exploded"),
            _ => Ok(()),
        }
    }

    async fn load(&mut self, _cancel: CancellationToken) -> HookResult {
        self.log("load");
        match self.fault {
            Fault::FailLoad => Err(HookError::failed("load refused")),
            Fault::PanicLoad => panic!("load exploded"),
            _ => Ok(()),
        }
    }

    async fn unload(&mut self, _cancel: CancellationToken) -> HookResult {
        self.log("unload");
        if self.fault == Fault::FailUnload {
            return Err(HookError::failed("unload refused"));
        }
        self.config.get_mut().run_count += 1;
        Ok(())
    }
}

/// Extension with no configuration at all.
pub struct Stateless;

#[async_trait]
impl Extension for Stateless {
    async fn load(&mut self, _cancel: CancellationToken) -> HookResult {
        Ok(())
    }

    async fn unload(&mut self, _cancel: CancellationToken) -> HookResult {
        Ok(())
    }
}

/// Decode the JSON form of an extension's current config.
pub fn current_config(doc: &dyn ConfigDocument) -> RecorderJsonConfig {
    let bytes = doc.encode("json").unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
