//! Extension registry.
//!
//! Owns one [`ExtensionLifecycle`] per discovered extension, in discovery
//! order, and fills itself from module directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plughost_extension_sdk::BoxedExtension;
use serde::Serialize;
use tokio::sync::Mutex;

use super::lifecycle::{ExtensionLifecycle, LifecycleState, StateHandle};
use super::loader::{scan_dir, LoadedModule, ModuleLoader, ModuleSource};
use crate::config::ConfigStore;
use crate::error::{ExtensionError, Result};

/// Snapshot of one registered extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionDescriptor {
    pub name: String,
    /// Module the extension was loaded from.
    pub module: PathBuf,
    pub state: LifecycleState,
}

/// A lifecycle plus the data readable without locking it.
#[derive(Clone)]
pub struct RegisteredExtension {
    name: String,
    module: PathBuf,
    state: StateHandle,
    lifecycle: Arc<Mutex<ExtensionLifecycle>>,
}

impl RegisteredExtension {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &Path {
        &self.module
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn lifecycle(&self) -> Arc<Mutex<ExtensionLifecycle>> {
        Arc::clone(&self.lifecycle)
    }

    pub fn descriptor(&self) -> ExtensionDescriptor {
        ExtensionDescriptor {
            name: self.name.clone(),
            module: self.module.clone(),
            state: self.state(),
        }
    }
}

/// Outcome of scanning the dependency and extension directories.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub dependencies: usize,
    pub registered: Vec<ExtensionDescriptor>,
    /// Files or extensions that were skipped, with the reason.
    pub skipped: Vec<(PathBuf, ExtensionError)>,
}

/// Registry of extensions, keyed by unique name.
pub struct ExtensionRegistry {
    store: Arc<ConfigStore>,
    entries: Vec<RegisteredExtension>,
}

impl ExtensionRegistry {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            entries: Vec::new(),
        }
    }

    /// Register one extension instance.
    ///
    /// Names are unique: a second extension with the same name is rejected.
    pub fn register(
        &mut self,
        source: ModuleSource,
        extension: BoxedExtension,
    ) -> Result<ExtensionDescriptor> {
        let name = extension.name().to_string();
        if self.get(&name).is_some() {
            return Err(ExtensionError::AlreadyRegistered(name));
        }

        let module = source.path().to_path_buf();
        let lifecycle = ExtensionLifecycle::new(extension, source, Arc::clone(&self.store));
        let entry = RegisteredExtension {
            name,
            module,
            state: lifecycle.state_handle(),
            lifecycle: Arc::new(Mutex::new(lifecycle)),
        };
        let descriptor = entry.descriptor();
        self.entries.push(entry);
        Ok(descriptor)
    }

    /// Register every extension of a loaded module, skipping duplicates.
    pub fn register_module(&mut self, module: LoadedModule, report: &mut DiscoveryReport) {
        let LoadedModule { source, extensions } = module;
        if extensions.is_empty() {
            tracing::debug!("Module exports no extensions: {}", source.path().display());
        }

        for extension in extensions {
            let name = extension.name().to_string();
            match self.register(source.clone(), extension) {
                Ok(descriptor) => {
                    tracing::info!(
                        extension = %descriptor.name,
                        "Discovered extension in {}",
                        descriptor.module.display()
                    );
                    report.registered.push(descriptor);
                }
                Err(e) => {
                    tracing::error!(
                        extension = %name,
                        "Skipping extension from {}: {}",
                        source.path().display(),
                        e
                    );
                    report.skipped.push((source.path().to_path_buf(), e));
                }
            }
        }
    }

    /// Load dependency libraries from `libs_dir`, then every extension
    /// module in `plugins_dir`.
    ///
    /// Both directories are created when missing. A module that fails to
    /// load is logged and skipped; discovery continues with the next file.
    pub fn discover(
        &mut self,
        loader: &mut dyn ModuleLoader,
        libs_dir: &Path,
        plugins_dir: &Path,
    ) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        for path in scan_dir(libs_dir, loader)? {
            match loader.load_dependency(&path) {
                Ok(()) => report.dependencies += 1,
                Err(e) => {
                    tracing::error!(module = %path.display(), "Failed to load dependency: {}", e);
                    report.skipped.push((path, e));
                }
            }
        }

        for path in scan_dir(plugins_dir, loader)? {
            match loader.load_module(&path) {
                Ok(module) => self.register_module(module, &mut report),
                Err(e) => {
                    tracing::error!(module = %path.display(), "Failed to load module: {}", e);
                    report.skipped.push((path, e));
                }
            }
        }

        tracing::info!(
            dependencies = report.dependencies,
            extensions = report.registered.len(),
            skipped = report.skipped.len(),
            "Discovery finished"
        );
        Ok(report)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredExtension> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Registered extensions in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredExtension> {
        self.entries.iter()
    }

    pub fn descriptors(&self) -> Vec<ExtensionDescriptor> {
        self.entries.iter().map(|e| e.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
