//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod json_store;
pub(crate) mod logger;
pub(crate) mod proxy_manager;
pub(crate) mod retry;
pub(crate) mod wallet_manager;

// Selective exports - only public utilities
pub use json_store::{load_json_list, read_json_list, save_json_list};
pub use logger::{setup_logger, PROGRESS_TARGET};
pub use proxy_manager::{ProxyManager, PROXIES_PER_WALLET};
pub use retry::{retry_request, RequestOutcome, RetryConfig};
pub use wallet_manager::{normalize_private_key, WalletEntry, WalletManager};
