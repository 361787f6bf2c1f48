//! Association between one extension and its config file.

use std::path::{Path, PathBuf};

use plughost_extension_sdk::ConfigFormat;

use crate::error::ConfigError;

/// Fixed file path and format for one extension's configuration.
///
/// Both are derived once, when the binding is created, and never change. The
/// file name contains the extension name, so two extensions never share a
/// file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBinding {
    extension: String,
    path: PathBuf,
    format: ConfigFormat,
}

impl ConfigBinding {
    /// Derive `{configs_dir}/{extension}.{ext}` from the config type hint.
    ///
    /// Fails with [`ConfigError::UnsupportedFormat`] for an unrecognized hint
    /// and [`ConfigError::InvalidName`] for a name that would leave
    /// `configs_dir`. Touches no files.
    pub fn derive(
        configs_dir: &Path,
        extension: &str,
        type_hint: &str,
    ) -> Result<Self, ConfigError> {
        if !is_file_stem(extension) {
            return Err(ConfigError::InvalidName(extension.to_string()));
        }
        let format = ConfigFormat::from_type_hint(type_hint)
            .map_err(|_| ConfigError::UnsupportedFormat(type_hint.to_string()))?;
        let path = configs_dir.join(format!("{}.{}", extension, format.file_extension()));
        Ok(Self {
            extension: extension.to_string(),
            path,
            format,
        })
    }

    /// Bind to an explicit path; the format comes from its file extension.
    pub fn at_path(extension: &str, path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let format = ConfigFormat::from_path(&path)
            .map_err(|_| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        Ok(Self {
            extension: extension.to_string(),
            path,
            format,
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }
}

/// A single path component that names a file inside its directory.
fn is_file_stem(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':', '\0'])
}
