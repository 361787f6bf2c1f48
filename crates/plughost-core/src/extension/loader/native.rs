//! Native module loader for .so/.dylib/.dll files.

use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use plughost_extension_sdk::{
    AbiVersionFn, CreateExtensionsFn, ABI_VERSION, ABI_VERSION_SYMBOL, CREATE_EXTENSIONS_SYMBOL,
};

use super::{LoadedModule, ModuleLoader, ModuleSource};
use crate::error::{ExtensionError, Result};

/// Loader for native extension modules.
pub struct NativeModuleLoader {
    /// Dependency libraries, kept open for the life of the loader.
    dependencies: Vec<Library>,
}

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self {
            dependencies: Vec::new(),
        }
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }
}

impl Default for NativeModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load_dependency(&mut self, path: &Path) -> Result<()> {
        let library = unsafe { open_global(path) }.map_err(|e| ExtensionError::ModuleLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.dependencies.push(library);
        tracing::debug!("Loaded dependency library: {}", path.display());
        Ok(())
    }

    fn load_module(&mut self, path: &Path) -> Result<LoadedModule> {
        let library = unsafe {
            Library::new(path).map_err(|e| ExtensionError::ModuleLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        let abi_version = unsafe {
            let version: Symbol<AbiVersionFn> =
                library
                    .get(ABI_VERSION_SYMBOL)
                    .map_err(|_| ExtensionError::SymbolNotFound {
                        path: path.to_path_buf(),
                        symbol: String::from_utf8_lossy(ABI_VERSION_SYMBOL).into_owned(),
                    })?;
            version()
        };
        if abi_version != ABI_VERSION {
            return Err(ExtensionError::IncompatibleAbi {
                path: path.to_path_buf(),
                expected: ABI_VERSION,
                got: abi_version,
            });
        }

        let batch = unsafe {
            let create: Symbol<CreateExtensionsFn> = library
                .get(CREATE_EXTENSIONS_SYMBOL)
                .map_err(|_| ExtensionError::SymbolNotFound {
                    path: path.to_path_buf(),
                    symbol: String::from_utf8_lossy(CREATE_EXTENSIONS_SYMBOL).into_owned(),
                })?;
            let raw = create();
            if raw.is_null() {
                return Err(ExtensionError::NullPointer(path.to_path_buf()));
            }
            *Box::from_raw(raw)
        };

        Ok(LoadedModule {
            source: ModuleSource::native(path, Arc::new(library)),
            extensions: batch.into_inner(),
        })
    }
}

/// Open a library with its symbols visible to libraries opened later.
#[cfg(unix)]
unsafe fn open_global(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL).map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open_global(path: &Path) -> std::result::Result<Library, libloading::Error> {
    Library::new(path)
}
