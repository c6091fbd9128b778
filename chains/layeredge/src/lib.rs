//! LayerEdge runner - multi-wallet referral and light-node automation
//!
//! Drives the LayerEdge referral API for every stored wallet, each through
//! its own group of rotating HTTP proxies.
//!
//! # Components
//!
//! - **[`ProxyPoolManager`]**: pulls candidates from a public proxy list,
//!   probes them in concurrent batches and keeps the live ones
//! - **[`AccountRunner`]**: per-wallet state machine running register,
//!   check-in, node connect and points lookup with proxy fallback
//! - **[`LayerEdgeClient`]**: HTTP session bound to one wallet and one proxy
//! - **[`bot`]**: progress events, notifiers and the command handlers
//!
//! # Configuration
//!
//! Configuration is loaded from `config/config.toml`. See the [`config`]
//! module for available options; `REF_CODE`, `TELEGRAM_BOT_TOKEN` and
//! `TELEGRAM_CHAT_ID` override it from the environment.
//!
//! # Files
//!
//! - `wallets.json` - `[{"privateKey": "0x..."}]`, append only
//! - `proxies.txt` - one proxy per line, overwritten by `load-proxies`
//! - `walletInfo.json` - `[{"address": "0x...", "points": 0}]`

pub mod bot;
pub mod client;
pub mod config;
pub mod proxy_pool;
pub mod runner;
pub mod wallet;

pub use client::{CheckIn, HttpSessionFactory, LayerEdgeClient, NodeSession, SessionFactory};
pub use config::LayerEdgeConfig;
pub use proxy_pool::{
    HttpLivenessProbe, LivenessProbe, ProxyPoolManager, ProxyScrapeSource, ProxySource,
};
pub use runner::{AccountResult, AccountRunner, AccountState, RunReport};
pub use wallet::Wallet;
