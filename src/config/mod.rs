//! Configuration file loading.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, DispatcherConfig, LoggingConfig, SignInConfig};
