//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Parse error in {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet and key handling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Private key cannot be empty")]
    EmptyKey,

    #[error("Invalid private key format: expected hex string")]
    InvalidKeyFormat,

    #[error("Invalid private key length: expected 64 hex chars, got {length}")]
    InvalidKeyLength { length: usize },
}

/// Network and remote endpoint errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Proxy source {endpoint} unavailable: {reason}")]
    SourceUnavailable { endpoint: String, reason: String },

    #[error("Bad proxy '{proxy}': {reason}")]
    BadProxy { proxy: String, reason: String },
}

/// Conditions that abort a whole run before any remote call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("No wallets found")]
    NoWallets,

    #[error("No proxies found")]
    NoProxies,

    #[error("Proxy count ({proxies}) is less than wallet count ({wallets})")]
    NotEnoughProxies { proxies: usize, wallets: usize },
}

impl PreconditionError {
    /// Checks the wallet/proxy counts a run needs.
    pub fn check(wallets: usize, proxies: usize) -> Result<(), PreconditionError> {
        if wallets == 0 {
            return Err(PreconditionError::NoWallets);
        }
        if proxies == 0 {
            return Err(PreconditionError::NoProxies);
        }
        if proxies < wallets {
            return Err(PreconditionError::NotEnoughProxies { proxies, wallets });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_order() {
        assert_eq!(
            PreconditionError::check(0, 0),
            Err(PreconditionError::NoWallets)
        );
        assert_eq!(
            PreconditionError::check(2, 0),
            Err(PreconditionError::NoProxies)
        );
        assert_eq!(
            PreconditionError::check(3, 2),
            Err(PreconditionError::NotEnoughProxies {
                proxies: 2,
                wallets: 3
            })
        );
        assert!(PreconditionError::check(2, 2).is_ok());
    }

    #[test]
    fn test_wallet_error_display() {
        let err = WalletError::InvalidKeyLength { length: 12 };
        assert_eq!(
            err.to_string(),
            "Invalid private key length: expected 64 hex chars, got 12"
        );
    }
}
