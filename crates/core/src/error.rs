// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker error: {0}")]
    Broker(#[from] crate::port::BrokerError),

    #[error("Registry is not installed")]
    RegistryNotInstalled,

    #[error("Registry is already installed")]
    RegistryAlreadyInstalled,

    #[error("Registry is closed")]
    RegistryClosed,
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
