//! Module loading.
//!
//! A module is a native shared library. Dependency libraries are opened
//! first so their symbols are available to the extension modules that follow.

pub mod native;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plughost_extension_sdk::BoxedExtension;

use crate::error::Result;

pub use native::NativeModuleLoader;

/// Where an extension came from.
///
/// Holds the library open for as long as any extension created by it is
/// alive.
#[derive(Clone)]
pub struct ModuleSource {
    path: PathBuf,
    library: Option<Arc<libloading::Library>>,
}

impl ModuleSource {
    /// A module backed by a loaded library.
    pub fn native(path: impl Into<PathBuf>, library: Arc<libloading::Library>) -> Self {
        Self {
            path: path.into(),
            library: Some(library),
        }
    }

    /// Extensions linked into the host binary, or created by tests.
    pub fn builtin(label: impl Into<PathBuf>) -> Self {
        Self {
            path: label.into(),
            library: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }
}

impl std::fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSource")
            .field("path", &self.path)
            .field("native", &self.is_native())
            .finish()
    }
}

/// Extensions produced by one module.
pub struct LoadedModule {
    pub source: ModuleSource,
    pub extensions: Vec<BoxedExtension>,
}

/// Opens modules and asks them for their extensions.
pub trait ModuleLoader: Send {
    /// Open a dependency library so later modules can resolve its symbols.
    fn load_dependency(&mut self, path: &Path) -> Result<()>;

    /// Open an extension module and instantiate every extension it exports.
    fn load_module(&mut self, path: &Path) -> Result<LoadedModule>;

    /// Whether `path` looks like something this loader can open.
    fn accepts(&self, path: &Path) -> bool {
        is_native_module(path)
    }
}

/// Check if a file is a native shared library for this platform.
pub fn is_native_module(path: &Path) -> bool {
    let expected = std::env::consts::DLL_EXTENSION;
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Files in `dir` accepted by `loader`, sorted by file name.
///
/// A missing directory is created and yields no files.
pub fn scan_dir(dir: &Path, loader: &dyn ModuleLoader) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && loader.accepts(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
