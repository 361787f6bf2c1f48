//! Extension capability contract and module ABI types.

use tokio_util::sync::CancellationToken;

use crate::config::{short_type_name, ConfigDocument};
use crate::error::HookResult;

/// Module ABI version.
///
/// Incremented whenever the `Extension` trait or the exported entry points
/// change shape. The host refuses modules reporting a different value.
pub const ABI_VERSION: u32 = 1;

/// Symbol exporting the module's ABI version: `extern "C" fn() -> u32`.
pub const ABI_VERSION_SYMBOL: &[u8] = b"plughost_abi_version";

/// Symbol exporting the discovery entry point:
/// `extern "C" fn() -> *mut ExtensionBatch`.
pub const CREATE_EXTENSIONS_SYMBOL: &[u8] = b"plughost_create_extensions";

/// The extension capability contract.
///
/// The host drives every extension through the same sequence: config load,
/// [`on_init`](Extension::on_init), [`load`](Extension::load), and on shutdown
/// [`unload`](Extension::unload) followed by config save. Hooks run on the
/// host's runtime; an extension is never driven from two tasks at once.
#[async_trait::async_trait]
pub trait Extension: Send + Sync {
    /// Extension name. Defaults to the implementing type's short name and is
    /// used to name the extension's config file.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Declared configuration, if the extension has one.
    fn config(&self) -> Option<&dyn ConfigDocument> {
        None
    }

    /// Mutable access to the declared configuration.
    fn config_mut(&mut self) -> Option<&mut dyn ConfigDocument> {
        None
    }

    /// Setup hook. Runs after the configuration has been loaded.
    async fn on_init(&mut self) -> HookResult {
        Ok(())
    }

    /// Start hook.
    async fn load(&mut self, cancel: CancellationToken) -> HookResult;

    /// Stop hook. Configuration is saved after this returns successfully.
    async fn unload(&mut self, cancel: CancellationToken) -> HookResult;
}

/// Boxed extension as handed across the module boundary.
pub type BoxedExtension = Box<dyn Extension>;

/// Extensions produced by one module's discovery entry point.
///
/// Modules return this behind a raw pointer from
/// `plughost_create_extensions`; the host takes ownership with
/// `Box::from_raw`.
pub struct ExtensionBatch {
    extensions: Vec<BoxedExtension>,
}

impl ExtensionBatch {
    pub fn new(extensions: Vec<BoxedExtension>) -> Self {
        Self { extensions }
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn into_inner(self) -> Vec<BoxedExtension> {
        self.extensions
    }
}

/// Signature of `plughost_abi_version`.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of `plughost_create_extensions`.
pub type CreateExtensionsFn = unsafe extern "C" fn() -> *mut ExtensionBatch;
