// Processor Core - Job Registry, Domain & Ports
// NO infrastructure dependencies: brokers plug in through `port::Broker`

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
