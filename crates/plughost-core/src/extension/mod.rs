//! Extension system.
//!
//! - `loader`: open native modules and collect the extensions they export
//! - `registry`: unique-name registry filled by discovery
//! - `lifecycle`: per-extension state machine with config load and save

pub mod lifecycle;
pub mod loader;
pub mod registry;

pub use lifecycle::{ExtensionLifecycle, LifecycleState, StateHandle};
pub use loader::{is_native_module, LoadedModule, ModuleLoader, ModuleSource, NativeModuleLoader};
pub use registry::{DiscoveryReport, ExtensionDescriptor, ExtensionRegistry, RegisteredExtension};
