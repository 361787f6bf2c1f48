//! plughost Extension SDK
//!
//! Everything an extension module needs to be discovered and driven by the
//! plughost host: the [`Extension`] contract, typed configuration that the
//! host persists as JSON, XML or YAML, and the [`export_extensions!`] macro
//! that publishes a module's extensions.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use plughost_extension_sdk::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase", default)]
//! pub struct GreeterJsonConfig {
//!     pub greeting: String,
//! }
//!
//! impl ExtensionConfig for GreeterJsonConfig {}
//!
//! #[derive(Default)]
//! pub struct Greeter {
//!     config: TypedConfig<GreeterJsonConfig>,
//! }
//!
//! #[async_trait]
//! impl Extension for Greeter {
//!     fn config(&self) -> Option<&dyn ConfigDocument> { Some(&self.config) }
//!     fn config_mut(&mut self) -> Option<&mut dyn ConfigDocument> { Some(&mut self.config) }
//!
//!     async fn load(&mut self, _cancel: CancellationToken) -> HookResult { Ok(()) }
//!     async fn unload(&mut self, _cancel: CancellationToken) -> HookResult { Ok(()) }
//! }
//!
//! export_extensions!(Greeter::default());
//! ```
//!
//! The config above lands in `./configs/Greeter.json`.

pub mod codec;
pub mod config;
pub mod error;
#[macro_use]
pub mod macros;
pub mod types;

pub use codec::{Codec, CodecRegistry, DeserializeFn, SerializeFn};
pub use config::{short_type_name, ConfigDocument, ConfigFormat, ExtensionConfig, TypedConfig};
pub use error::{CodecError, HookError, HookResult};
pub use types::{
    AbiVersionFn, BoxedExtension, CreateExtensionsFn, Extension, ExtensionBatch, ABI_VERSION,
    ABI_VERSION_SYMBOL, CREATE_EXTENSIONS_SYMBOL,
};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module with common imports
pub mod prelude {
    pub use crate::config::{ConfigDocument, ConfigFormat, ExtensionConfig, TypedConfig};
    pub use crate::error::{HookError, HookResult};
    pub use crate::types::{BoxedExtension, Extension, ExtensionBatch};
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use tokio_util::sync::CancellationToken;

    // Macros are automatically available due to #[macro_use]
}
