//! File-backed configuration store.
//!
//! Loads a configuration from disk, or creates and persists the default when
//! the file is missing, and saves it back. Calls against the same path are
//! serialized; different paths proceed in parallel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use plughost_extension_sdk::{CodecRegistry, ConfigDocument, ConfigFormat, ExtensionConfig, TypedConfig};
use tokio::sync::Mutex;

use super::binding::ConfigBinding;
use crate::error::ConfigError;

/// What a load did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file existed and was read.
    Loaded,
    /// The file was missing; the default was written and returned.
    Created,
}

/// Config store rooted at a configs directory.
#[derive(Debug)]
pub struct ConfigStore {
    configs_dir: PathBuf,
    /// One lock per file path.
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl ConfigStore {
    pub fn new(configs_dir: impl Into<PathBuf>) -> Self {
        Self {
            configs_dir: configs_dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn configs_dir(&self) -> &Path {
        &self.configs_dir
    }

    /// Bind an extension to its config file inside this store.
    pub fn bind(&self, extension: &str, type_hint: &str) -> Result<ConfigBinding, ConfigError> {
        ConfigBinding::derive(&self.configs_dir, extension, type_hint)
    }

    /// Load the bound file into `doc`, creating it with defaults if missing.
    pub async fn load(
        &self,
        binding: &ConfigBinding,
        doc: &mut dyn ConfigDocument,
    ) -> Result<LoadOutcome, ConfigError> {
        self.load_document(binding.path(), binding.format(), doc)
            .await
    }

    /// Re-read the bound file, replacing the value held by `doc`.
    pub async fn reload(
        &self,
        binding: &ConfigBinding,
        doc: &mut dyn ConfigDocument,
    ) -> Result<LoadOutcome, ConfigError> {
        self.load(binding, doc).await
    }

    /// Serialize `doc` and replace the bound file.
    pub async fn save(
        &self,
        binding: &ConfigBinding,
        doc: &dyn ConfigDocument,
    ) -> Result<(), ConfigError> {
        let path = binding.path();
        let bytes = doc
            .encode(binding.format().tag())
            .map_err(|source| ConfigError::Encode {
                path: path.to_path_buf(),
                source,
            })?;

        let lock = self.lock_for(path);
        let _guard = lock.lock().await;
        write_atomic(path, &bytes).await
    }

    /// Load a typed value from `path`, format chosen by its extension.
    pub async fn load_value<T: ExtensionConfig>(&self, path: &Path) -> Result<T, ConfigError> {
        let format = format_of(path)?;
        let mut doc = TypedConfig::<T>::new();
        self.load_document(path, format, &mut doc).await?;
        Ok(doc.into_inner())
    }

    /// Save a typed value to `path`, format chosen by its extension.
    pub async fn save_value<T: ExtensionConfig>(
        &self,
        value: &T,
        path: &Path,
    ) -> Result<(), ConfigError> {
        let format = format_of(path)?;
        let bytes = CodecRegistry::<T>::with_builtin()
            .resolve(format.tag())
            .and_then(|codec| codec.serialize(value))
            .map_err(|source| ConfigError::Encode {
                path: path.to_path_buf(),
                source,
            })?;

        let lock = self.lock_for(path);
        let _guard = lock.lock().await;
        write_atomic(path, &bytes).await
    }

    async fn load_document(
        &self,
        path: &Path,
        format: ConfigFormat,
        doc: &mut dyn ConfigDocument,
    ) -> Result<LoadOutcome, ConfigError> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                doc.decode(format.tag(), &bytes)
                    .map_err(|source| ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Ok(LoadOutcome::Loaded)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                doc.reset_to_default();
                let bytes = doc
                    .encode(format.tag())
                    .map_err(|source| ConfigError::Encode {
                        path: path.to_path_buf(),
                        source,
                    })?;
                write_atomic(path, &bytes).await?;
                tracing::debug!(path = %path.display(), "Created default config");
                Ok(LoadOutcome::Created)
            }
            Err(e) => Err(ConfigError::io(path, e)),
        }
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn format_of(path: &Path) -> Result<ConfigFormat, ConfigError> {
    ConfigFormat::from_path(path)
        .map_err(|_| ConfigError::UnsupportedFormat(path.display().to_string()))
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
///
/// Readers see either the old file or the new one, never a partial write.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let result = async {
        tokio::fs::write(&temp_path, bytes).await?;
        let file = tokio::fs::File::open(&temp_path).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(ConfigError::io(path, e));
    }
    Ok(())
}
