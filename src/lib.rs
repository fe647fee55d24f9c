//! Observable properties and a UI-thread dispatcher.
//!
//! [`property::Property`] holds a value, notifies listeners on change and
//! supports one-way and bidirectional binding. [`dispatch::Dispatcher`] owns
//! the UI thread's callback queue and spawns background workers. The
//! [`signin`] module wires both together into a headless Sign-In form.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod property;
pub mod shutdown;
pub mod signin;

pub use dispatch::{Dispatcher, DispatcherHandle};
pub use error::{BindingViolation, DispatchError, PropertyError};
pub use property::Property;
