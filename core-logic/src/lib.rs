//! # Core Logic - Shared Utilities for the LayerEdge runner
//!
//! This crate provides the pieces that do not depend on the referral API
//! itself: proxy list handling, the wallet list, flat JSON stores, the retry
//! wrapper and logging.
//!
//! ## Modules
//!
//! - [`config`] - Proxy endpoint representation
//! - [`error`] - Typed error handling with thiserror
//! - `utils` - Wallet store, proxy lists, retry, logger

pub mod config;
pub mod error;
pub(crate) mod utils;

pub use config::ProxyConfig;
pub use error::{ConfigError, NetworkError, PreconditionError, WalletError};

pub use utils::{
    load_json_list, normalize_private_key, read_json_list, retry_request, save_json_list,
    setup_logger, ProxyManager, RequestOutcome, RetryConfig, WalletEntry, WalletManager,
    PROGRESS_TARGET, PROXIES_PER_WALLET,
};
