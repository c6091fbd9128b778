//! Command handlers behind the front end.
//!
//! Every handler takes an explicit [`SessionContext`] and reports progress
//! through its notifier. Precondition problems are reported as events and
//! return `Ok(None)`; only store or source failures come back as `Err`.

use crate::bot::notification::{Notifier, RunEvent};
use crate::client::SessionFactory;
use crate::config::StorageSettings;
use crate::proxy_pool::{LivenessProbe, PoolReport, ProxyPoolManager, ProxySource};
use crate::runner::{AccountResult, AccountRun, AccountRunner, RunReport};
use crate::wallet::Wallet;
use anyhow::{Context, Result};
use core_logic::{
    load_json_list, save_json_list, ConfigError, ProxyConfig, ProxyManager, WalletEntry,
    WalletError, WalletManager,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// Language tag chosen by the user. Only English text is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Persian,
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "fa" | "persian" => Ok(Language::Persian),
            other => Err(ConfigError::InvalidValue {
                field: "language".to_string(),
                reason: format!("unknown language '{}'", other),
            }),
        }
    }
}

/// Per-chat state handed to every handler.
pub struct SessionContext {
    pub chat_id: Option<String>,
    pub awaiting_private_key: bool,
    pub language: Language,
    notifier: Arc<dyn Notifier>,
}

impl SessionContext {
    pub fn new(chat_id: Option<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            chat_id,
            awaiting_private_key: false,
            language: Language::default(),
            notifier,
        }
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    async fn notify(&self, event: RunEvent) {
        self.notifier.notify(event).await;
    }

    /// Asks for a key; the next text input goes to [`add_private_key`].
    pub async fn request_private_key(&mut self) {
        self.awaiting_private_key = true;
        self.notify(RunEvent::PrivateKeyPrompt).await;
    }

    /// Consumes `input` as a private key if one was requested.
    pub async fn submit_text(&mut self, storage: &Storage, input: &str) -> Option<bool> {
        if !self.awaiting_private_key {
            return None;
        }
        self.awaiting_private_key = false;
        Some(add_private_key(self, storage, input).await)
    }
}

/// Flat-file stores the handlers read and write.
pub struct Storage {
    pub wallets: WalletManager,
    pub proxies: PathBuf,
    pub results: PathBuf,
}

impl Storage {
    pub fn new(
        wallets: impl Into<PathBuf>,
        proxies: impl Into<PathBuf>,
        results: impl Into<PathBuf>,
    ) -> Self {
        Self {
            wallets: WalletManager::new(wallets),
            proxies: proxies.into(),
            results: results.into(),
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.wallets, &settings.proxies, &settings.results)
    }

    pub fn load_proxies(&self) -> Result<Vec<ProxyConfig>> {
        ProxyManager::load_proxies(&self.proxies)
    }

    pub fn load_results(&self) -> Vec<AccountResult> {
        load_json_list(&self.results)
    }

    /// Replaces the result list.
    pub fn save_results(&self, results: &[AccountResult]) -> Result<()> {
        save_json_list(&self.results, results)
    }

    /// Adds one result to the stored list.
    pub fn append_result(&self, result: AccountResult) -> Result<()> {
        let mut results = self.load_results();
        results.push(result);
        self.save_results(&results)
    }

    pub fn results_path(&self) -> &Path {
        &self.results
    }
}

/// Validates, normalizes and stores a private key. Returns whether it was
/// stored.
pub async fn add_private_key(ctx: &SessionContext, storage: &Storage, input: &str) -> bool {
    let entry = match WalletEntry::from_input(input) {
        Ok(entry) => entry,
        Err(WalletError::EmptyKey) => {
            ctx.notify(RunEvent::PrivateKeyEmpty).await;
            return false;
        }
        Err(_) => {
            ctx.notify(RunEvent::PrivateKeyInvalid).await;
            return false;
        }
    };

    match storage.wallets.append(entry) {
        Ok(count) => {
            info!("Private key added, {} wallets stored", count);
            ctx.notify(RunEvent::PrivateKeySuccess).await;
            true
        }
        Err(e) => {
            error!("Failed to store private key: {:#}", e);
            ctx.notify(RunEvent::PrivateKeyFail {
                error: format!("{:#}", e),
            })
            .await;
            false
        }
    }
}

/// Generates a wallet, stores it and runs all four steps once through a
/// single proxy, whatever registration answers.
pub async fn create_wallet_and_run<F: SessionFactory>(
    ctx: &SessionContext,
    storage: &Storage,
    runner: &AccountRunner<F>,
) -> Result<Option<AccountRun>> {
    ctx.notify(RunEvent::NewWallet).await;

    let (wallet, entry) = Wallet::random();
    ctx.notify(RunEvent::WalletCreated {
        address: wallet.address().to_string(),
    })
    .await;

    let wallet_count = storage
        .wallets
        .append(entry.clone())
        .context("Failed to store new wallet")?;
    ctx.notify(RunEvent::WalletAdded).await;

    let proxies = storage.load_proxies()?;
    if proxies.is_empty() {
        ctx.notify(RunEvent::NoProxies).await;
        return Ok(None);
    }

    let pick = (wallet_count.saturating_sub(1)).min(proxies.len() - 1);
    let account = runner
        .run_single(&entry, &proxies[pick], ctx.notifier())
        .await;

    if let Some(result) = &account.result {
        storage.append_result(result.clone())?;
    }
    Ok(Some(account))
}

/// Renders the stored results. Returns how many were shown.
pub async fn show_info(ctx: &SessionContext, storage: &Storage) -> usize {
    let results = storage.load_results();
    if results.is_empty() {
        ctx.notify(RunEvent::NoWalletsInfo).await;
        return 0;
    }

    let details: String = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "Wallet {}:\nAddress: {}\nPoints: {}\n\n",
                i + 1,
                r.address,
                r.points
            )
        })
        .collect();

    ctx.notify(RunEvent::Info {
        total: results.len(),
        details,
    })
    .await;
    results.len()
}

/// Refills the proxy list for the stored wallets and overwrites it.
pub async fn load_proxies<S: ProxySource, P: LivenessProbe>(
    ctx: &SessionContext,
    storage: &Storage,
    pool: &ProxyPoolManager<S, P>,
) -> Result<Option<PoolReport>> {
    let wallet_count = storage.wallets.count()?;
    if wallet_count == 0 {
        ctx.notify(RunEvent::NoWallets).await;
        return Ok(None);
    }

    let required = ProxyManager::required_proxy_count(wallet_count);
    ctx.notify(RunEvent::ClearingProxies).await;
    ctx.notify(RunEvent::NeedProxies {
        min: required,
        wallets: wallet_count,
    })
    .await;

    let report = pool.acquire(required, ctx.notifier()).await?;

    ProxyManager::save_proxies(&storage.proxies, &report.proxies)?;
    ctx.notify(RunEvent::ProxiesSaved {
        count: report.proxies.len(),
    })
    .await;
    Ok(Some(report))
}

/// Runs every stored wallet and overwrites the result list.
pub async fn run<F: SessionFactory>(
    ctx: &SessionContext,
    storage: &Storage,
    runner: &AccountRunner<F>,
) -> Result<Option<RunReport>> {
    let wallets = storage.wallets.load()?;
    let proxies = storage.load_proxies()?;

    let report = match runner.run(&wallets, &proxies, ctx.notifier()).await {
        Ok(report) => report,
        Err(e) => {
            info!("Run not started: {}", e);
            return Ok(None);
        }
    };

    storage
        .save_results(&report.results)
        .context("Failed to save wallet info")?;

    ctx.notify(RunEvent::AccountDivider).await;
    ctx.notify(RunEvent::Done {
        count: wallets.len(),
    })
    .await;
    ctx.notify(RunEvent::RunAgain).await;
    Ok(Some(report))
}
