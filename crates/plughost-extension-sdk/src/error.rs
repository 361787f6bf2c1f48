//! Error types shared between the host and extension modules.

/// Errors raised while encoding or decoding a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// No codec is registered for the requested format tag, or a type hint
    /// names no supported format.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Well-formed XML that does not describe a value of the expected shape.
    #[error("XML content error: {0}")]
    XmlShape(String),

    #[error("Config is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Error returned by an extension's own lifecycle hooks.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HookError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Result type for extension hooks.
pub type HookResult<T = ()> = std::result::Result<T, HookError>;
