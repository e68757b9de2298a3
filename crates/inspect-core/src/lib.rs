mod config;
mod core;
mod error;
mod observer;
mod scheduler;

pub use config::Config;
pub use core::{ProtocolCore, Stats};
pub use error::{ConfigError, CoreError};
pub use inspect_queue::ConnectionState;
pub use observer::Observer;
pub use scheduler::{Scheduler, SchedulerHooks};
