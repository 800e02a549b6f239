//! Errors raised while configuring or running Turnstile.
//!
//! Admission decisions never fail; these cover setup and serving only.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TurnstileError {
    /// The configuration file or environment could not be read or is invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A limiter cannot slide a window of zero length
    #[error("limiter window must be non-zero")]
    InvalidWindow,

    /// Background work was requested outside a tokio runtime
    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    /// Binding or serving the HTTP listener failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TurnstileError>;
