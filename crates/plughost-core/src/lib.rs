//! plughost core
//!
//! Discovers extension modules, drives each extension through its
//! lifecycle, persists extension configuration as JSON, XML or YAML, and
//! collects logs for a single flush at shutdown.
//!
//! ## Modules
//!
//! - `settings`: directory layout and log prefix, overridable from the environment
//! - `config`: config bindings and the file-backed store
//! - `extension`: module loading, registry and lifecycle state machine
//! - `host`: batch start/stop with per-extension failure isolation
//! - `logging`: in-memory log sink and its `tracing` layer
//! - `console`: line-oriented command loop with `exit`/`quit`

pub mod config;
pub mod console;
pub mod error;
pub mod extension;
pub mod host;
pub mod logging;
pub mod settings;

pub use config::{ConfigBinding, ConfigStore, LoadOutcome};
pub use console::{run_command_loop, spawn_stdin_loop, ConsoleCommand, ConsoleExit, ConsoleReport};
pub use error::{ConfigError, ExtensionError, HookStage, Result};
pub use extension::{
    is_native_module, DiscoveryReport, ExtensionDescriptor, ExtensionLifecycle, ExtensionRegistry,
    LifecycleState, LoadedModule, ModuleLoader, ModuleSource, NativeModuleLoader,
    RegisteredExtension, StateHandle,
};
pub use host::{ExtensionHost, TransitionReport, BUILTIN_MODULE};
pub use logging::{LogEvent, LogSink, LogSinkLayer};
pub use settings::HostSettings;

pub use plughost_extension_sdk as sdk;
