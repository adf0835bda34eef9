// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}
