//! Typed extension configuration.
//!
//! An extension declares its configuration shape as a plain serde struct that
//! implements [`ExtensionConfig`] and keeps it in a [`TypedConfig`]. The host
//! only ever sees the object-safe [`ConfigDocument`] view, so it can load and
//! save any shape without knowing the concrete type.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{self, CodecRegistry};
use crate::error::CodecError;

/// A configuration shape an extension can declare.
///
/// The type hint decides the on-disk format: it must contain `json`, `xml`,
/// `yaml` or `yml` (case-insensitive), e.g. `EchoJsonConfig`.
pub trait ExtensionConfig:
    Serialize + DeserializeOwned + Default + Send + Sync + 'static
{
    /// Declared kind of this configuration, used to pick the file format.
    fn type_hint() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    Json,
    Xml,
    Yaml,
}

impl ConfigFormat {
    /// Pick a format from a type hint such as `MyPluginYamlConfig`.
    ///
    /// The first match wins in the order json, xml, yaml/yml.
    pub fn from_type_hint(hint: &str) -> Result<Self, CodecError> {
        let lower = hint.to_ascii_lowercase();
        if lower.contains("json") {
            Ok(Self::Json)
        } else if lower.contains("xml") {
            Ok(Self::Xml)
        } else if lower.contains("yaml") || lower.contains("yml") {
            Ok(Self::Yaml)
        } else {
            Err(CodecError::UnsupportedFormat(hint.to_string()))
        }
    }

    /// Pick a format from a file extension (`.json`, `.xml`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Result<Self, CodecError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(CodecError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Codec tag for this format.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Json => codec::JSON,
            Self::Xml => codec::XML,
            Self::Yaml => codec::YAML,
        }
    }

    /// File extension written for this format, without the dot.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Yaml => "yaml",
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Object-safe view of an extension's configuration value.
pub trait ConfigDocument: Send + Sync {
    /// Type hint of the underlying configuration shape.
    fn type_hint(&self) -> &str;

    /// Replace the current value with the shape's default.
    fn reset_to_default(&mut self);

    /// Serialize the current value with the codec registered for `tag`.
    fn encode(&self, tag: &str) -> Result<Vec<u8>, CodecError>;

    /// Deserialize `bytes` with the codec registered for `tag` and replace
    /// the current value. On error the current value is left untouched.
    fn decode(&mut self, tag: &str, bytes: &[u8]) -> Result<(), CodecError>;
}

/// Holds one typed configuration value plus the codecs able to persist it.
pub struct TypedConfig<T> {
    value: T,
    codecs: Arc<CodecRegistry<T>>,
}

impl<T: ExtensionConfig> TypedConfig<T> {
    /// Default value with the built-in codecs.
    pub fn new() -> Self {
        Self::with_codecs(Arc::new(CodecRegistry::with_builtin()))
    }

    /// Default value with a custom codec table.
    pub fn with_codecs(codecs: Arc<CodecRegistry<T>>) -> Self {
        Self {
            value: T::default(),
            codecs,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutable access for the owning extension, e.g. to record runtime state
    /// before the final save.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry<T>> {
        &self.codecs
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: ExtensionConfig> Default for TypedConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ExtensionConfig + std::fmt::Debug> std::fmt::Debug for TypedConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedConfig")
            .field("value", &self.value)
            .field("codecs", &self.codecs)
            .finish()
    }
}

impl<T: ExtensionConfig> ConfigDocument for TypedConfig<T> {
    fn type_hint(&self) -> &str {
        T::type_hint()
    }

    fn reset_to_default(&mut self) {
        self.value = T::default();
    }

    fn encode(&self, tag: &str) -> Result<Vec<u8>, CodecError> {
        self.codecs.resolve(tag)?.serialize(&self.value)
    }

    fn decode(&mut self, tag: &str, bytes: &[u8]) -> Result<(), CodecError> {
        self.value = self.codecs.resolve(tag)?.deserialize(bytes)?;
        Ok(())
    }
}

/// Last path segment of a fully qualified type name, without generics.
///
/// `my_plugin::config::EchoJsonConfig<u8>` becomes `EchoJsonConfig`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
