mod channel;
mod config;
mod device;
pub mod diagnostics;
mod session;
pub mod signal;
pub mod synthetic;
mod worker;

pub use channel::*;
pub use config::*;
pub use device::*;
pub use session::*;
pub use signal::{SignalStateMachine, StateError};
pub use worker::*;
