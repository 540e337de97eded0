pub mod config;
pub mod error;
pub mod event;

pub use config::RelayConfig;
pub use error::ConfigError;
pub use event::*;
