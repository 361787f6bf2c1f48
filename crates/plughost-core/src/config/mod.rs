//! Extension configuration persistence.

pub mod binding;
pub mod store;

pub use binding::ConfigBinding;
pub use store::{ConfigStore, LoadOutcome};
