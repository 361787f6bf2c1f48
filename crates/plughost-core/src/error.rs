//! Error types for the host core.

use std::path::PathBuf;

use plughost_extension_sdk::{CodecError, HookError};

use crate::extension::lifecycle::LifecycleState;

/// Config persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The type hint or file extension names no supported format. Raised
    /// before any file I/O.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The extension name cannot be used as a config file name. Raised
    /// before any file I/O.
    #[error("Invalid extension name for a config file: {0:?}")]
    InvalidName(String),

    /// The file exists but its content could not be turned into the
    /// declared configuration shape.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Failed to encode config {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lifecycle stage a hook error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    OnInit,
    Load,
    Unload,
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnInit => write!(f, "on_init"),
            Self::Load => write!(f, "load"),
            Self::Unload => write!(f, "unload"),
        }
    }
}

/// Extension discovery and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Failed to load module {path}: {reason}")]
    ModuleLoad { path: PathBuf, reason: String },

    #[error("Incompatible ABI in {path}: expected {expected}, got {got}")]
    IncompatibleAbi {
        path: PathBuf,
        expected: u32,
        got: u32,
    },

    #[error("Symbol not found in {path}: {symbol}")]
    SymbolNotFound { path: PathBuf, symbol: String },

    #[error("Null pointer returned by {0}")]
    NullPointer(PathBuf),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hook {stage} of {extension} failed: {source}")]
    Hook {
        extension: String,
        stage: HookStage,
        #[source]
        source: HookError,
    },

    #[error("Hook {stage} of {extension} panicked")]
    HookPanicked { extension: String, stage: HookStage },

    #[error("Cannot {action} {extension} while {from}")]
    InvalidTransition {
        extension: String,
        from: LifecycleState,
        action: &'static str,
    },

    #[error("Cannot reload config of {extension} while {state}")]
    ReloadNotPermitted {
        extension: String,
        state: LifecycleState,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for extension operations
pub type Result<T> = std::result::Result<T, ExtensionError>;
