use anyhow::{Error, Result};
use async_trait::async_trait;
use core_logic::PROGRESS_TARGET;
use reqwest::Client;
use serde_json::Number;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The four remote steps run for every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Register,
    CheckIn,
    Connect,
    Points,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Register => "registerWallet",
            StepKind::CheckIn => "dailyCheckIn",
            StepKind::Connect => "connectNode",
            StepKind::Points => "checkPoints",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress and outcome events emitted by the pool manager, the runner and
/// the command handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    // account runner
    StartBot,
    NoWallets,
    NoProxies,
    NotEnoughProxies { proxies: usize, wallets: usize },
    Processing { count: usize },
    AccountDivider,
    AccountInfo { current: usize, total: usize, wallet: String },
    TryingProxy { current: usize, total: usize, proxy: String },
    StepStarted { step: StepKind, at_ms: i64 },
    StepFinished { step: StepKind, at_ms: i64, duration_ms: u128 },
    RegisterSuccess,
    RegisterFail,
    CheckInSuccess,
    CheckInAlready { next_time: String },
    ConnectSuccess,
    PointsSuccess,
    PointsInfo { address: String, points: Number },
    AccountSuccess { current: usize, proxy: String },
    ProxyFail { proxy: String, error: String },
    AllProxiesFail { wallet: String },
    SkipAccount { current: usize },
    Done { count: usize },
    RunAgain,
    // proxy pool
    ClearingProxies,
    NeedProxies { min: usize, wallets: usize },
    TestingBatch { count: usize, start: usize, end: usize },
    FoundProxies { count: usize, total: usize },
    NeedMoreProxies { count: usize },
    NoMoreProxies,
    ProxiesNotEnough { count: usize, min: usize },
    ProxiesEnough { count: usize },
    ProxiesSaved { count: usize },
    FetchFail,
    // wallet handling
    NewWallet,
    WalletCreated { address: String },
    WalletAdded,
    PrivateKeyPrompt,
    PrivateKeyEmpty,
    PrivateKeyInvalid,
    PrivateKeySuccess,
    PrivateKeyFail { error: String },
    Info { total: usize, details: String },
    NoWalletsInfo,
}

impl RunEvent {
    /// Stable identifier, usable by front ends to pick their own wording.
    pub fn key(&self) -> &'static str {
        match self {
            RunEvent::StartBot => "startBot",
            RunEvent::NoWallets => "noWallets",
            RunEvent::NoProxies => "noProxies",
            RunEvent::NotEnoughProxies { .. } => "notEnoughProxies",
            RunEvent::Processing { .. } => "processing",
            RunEvent::AccountDivider => "accountDivider",
            RunEvent::AccountInfo { .. } => "accountInfo",
            RunEvent::TryingProxy { .. } => "tryingProxy",
            RunEvent::StepStarted { step, .. } => match step {
                StepKind::Register => "registerStart",
                StepKind::CheckIn => "checkInStart",
                StepKind::Connect => "connectStart",
                StepKind::Points => "pointsStart",
            },
            RunEvent::StepFinished { step, .. } => match step {
                StepKind::Register => "registerDone",
                StepKind::CheckIn => "checkInDone",
                StepKind::Connect => "connectDone",
                StepKind::Points => "pointsDone",
            },
            RunEvent::RegisterSuccess => "registerSuccess",
            RunEvent::RegisterFail => "registerFail",
            RunEvent::CheckInSuccess => "checkInSuccess",
            RunEvent::CheckInAlready { .. } => "checkInAlready",
            RunEvent::ConnectSuccess => "connectSuccess",
            RunEvent::PointsSuccess => "pointsSuccess",
            RunEvent::PointsInfo { .. } => "pointsInfo",
            RunEvent::AccountSuccess { .. } => "accountSuccess",
            RunEvent::ProxyFail { .. } => "proxyFail",
            RunEvent::AllProxiesFail { .. } => "allProxiesFail",
            RunEvent::SkipAccount { .. } => "skipAccount",
            RunEvent::Done { .. } => "done",
            RunEvent::RunAgain => "runAgain",
            RunEvent::ClearingProxies => "clearingProxies",
            RunEvent::NeedProxies { .. } => "needProxies",
            RunEvent::TestingBatch { .. } => "testingBatch",
            RunEvent::FoundProxies { .. } => "foundProxies",
            RunEvent::NeedMoreProxies { .. } => "needMoreProxies",
            RunEvent::NoMoreProxies => "noMoreProxies",
            RunEvent::ProxiesNotEnough { .. } => "proxiesNotEnough",
            RunEvent::ProxiesEnough { .. } => "proxiesEnough",
            RunEvent::ProxiesSaved { .. } => "proxiesSaved",
            RunEvent::FetchFail => "fetchFail",
            RunEvent::NewWallet => "newWallet",
            RunEvent::WalletCreated { .. } => "walletCreated",
            RunEvent::WalletAdded => "walletAdded",
            RunEvent::PrivateKeyPrompt => "privateKeyPrompt",
            RunEvent::PrivateKeyEmpty => "privateKeyEmpty",
            RunEvent::PrivateKeyInvalid => "privateKeyInvalid",
            RunEvent::PrivateKeySuccess => "privateKeySuccess",
            RunEvent::PrivateKeyFail { .. } => "privateKeyFail",
            RunEvent::Info { .. } => "info",
            RunEvent::NoWalletsInfo => "noWalletsInfo",
        }
    }

    /// Events that report something going wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunEvent::NoWallets
                | RunEvent::NoProxies
                | RunEvent::NotEnoughProxies { .. }
                | RunEvent::RegisterFail
                | RunEvent::ProxyFail { .. }
                | RunEvent::AllProxiesFail { .. }
                | RunEvent::SkipAccount { .. }
                | RunEvent::NoMoreProxies
                | RunEvent::ProxiesNotEnough { .. }
                | RunEvent::FetchFail
                | RunEvent::PrivateKeyEmpty
                | RunEvent::PrivateKeyInvalid
                | RunEvent::PrivateKeyFail { .. }
        )
    }
}

fn plural(count: usize) -> &'static str {
    if count > 1 {
        "s"
    } else {
        ""
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::StartBot => write!(f, "🔄 LayerEdge bot starting..."),
            RunEvent::NoWallets => write!(f, "❌ No wallets found. Please add a wallet first."),
            RunEvent::NoProxies => write!(f, "❌ No proxies found. Please load proxies first."),
            RunEvent::NotEnoughProxies { proxies, wallets } => write!(
                f,
                "⚠️ Proxy count ({}) is less than wallet count ({}). Please load more proxies.",
                proxies, wallets
            ),
            RunEvent::Processing { count } => {
                write!(f, "Processing {} account{}", count, plural(*count))
            }
            RunEvent::AccountDivider => write!(f, "➖➖➖➖➖"),
            RunEvent::AccountInfo {
                current,
                total,
                wallet,
            } => write!(
                f,
                "Processing Account {}/{}\nWallet: {}",
                current, total, wallet
            ),
            RunEvent::TryingProxy {
                current,
                total,
                proxy,
            } => write!(f, "Trying proxy {}/{}: {}", current, total, proxy),
            RunEvent::StepStarted { step, at_ms } => {
                write!(f, "[{}] Starting {}...", at_ms, step)
            }
            RunEvent::StepFinished {
                step,
                at_ms,
                duration_ms,
            } => write!(f, "[{}] {} took {}ms", at_ms, step, duration_ms),
            RunEvent::RegisterSuccess => write!(f, "✅ Wallet registered"),
            RunEvent::RegisterFail => write!(
                f,
                "⚠️ Wallet registration failed, trying next proxy..."
            ),
            RunEvent::CheckInSuccess => write!(f, "✅ Daily check-in completed"),
            RunEvent::CheckInAlready { next_time } => write!(
                f,
                "⚠️ Daily check-in already completed. Next check-in: {}",
                next_time
            ),
            RunEvent::ConnectSuccess => write!(f, "✅ Node connected"),
            RunEvent::PointsSuccess => write!(f, "✅ Points retrieved"),
            RunEvent::PointsInfo { address, points } => {
                write!(f, "Points for {}: {}", address, points)
            }
            RunEvent::AccountSuccess { current, proxy } => write!(
                f,
                "✅ Account {} processing completed with proxy {}",
                current, proxy
            ),
            RunEvent::ProxyFail { proxy, error } => {
                write!(f, "❌ Proxy {} failed: {}", proxy, error)
            }
            RunEvent::AllProxiesFail { wallet } => write!(
                f,
                "⚠️ All proxies failed for wallet {}, skipping to next wallet.",
                wallet
            ),
            RunEvent::SkipAccount { current } => write!(
                f,
                "⚠️ Skipping Account {} due to proxy failures.",
                current
            ),
            RunEvent::Done { count } => write!(
                f,
                "✅ Processed {} account{} (some may have been skipped)",
                count,
                plural(*count)
            ),
            RunEvent::RunAgain => write!(f, "Run again in 24 hours!"),
            RunEvent::ClearingProxies => {
                write!(f, "🔄 Clearing old proxies and fetching fresh ones...")
            }
            RunEvent::NeedProxies { min, wallets } => write!(
                f,
                "Need at least {} active proxies for {} wallets...",
                min, wallets
            ),
            RunEvent::TestingBatch { count, start, end } => write!(
                f,
                "Testing batch of {} proxies (from {} to {})...",
                count, start, end
            ),
            RunEvent::FoundProxies { count, total } => write!(
                f,
                "✅ Found {} active proxies in this batch. Total: {}",
                count, total
            ),
            RunEvent::NeedMoreProxies { count } => write!(
                f,
                "Still need {} more proxies, fetching next batch...",
                count
            ),
            RunEvent::NoMoreProxies => write!(f, "⚠️ No more proxies available from the source."),
            RunEvent::ProxiesNotEnough { count, min } => write!(
                f,
                "⚠️ Only found {} active proxies, less than required ({}).",
                count, min
            ),
            RunEvent::ProxiesEnough { count } => write!(f, "✅ Found enough proxies: {}", count),
            RunEvent::ProxiesSaved { count } => write!(f, "✅ Saved {} active proxies", count),
            RunEvent::FetchFail => write!(f, "❌ Failed to fetch proxies from the source."),
            RunEvent::NewWallet => write!(f, "🔄 Creating a new wallet..."),
            RunEvent::WalletCreated { address } => {
                write!(f, "✅ New wallet created - Address: {}", address)
            }
            RunEvent::WalletAdded => write!(f, "✅ Wallet added to the wallet list"),
            RunEvent::PrivateKeyPrompt => write!(
                f,
                "Please enter your private key (e.g., f2b3... or 0xf2b3...):"
            ),
            RunEvent::PrivateKeyEmpty => write!(f, "❌ Private key cannot be empty!"),
            RunEvent::PrivateKeyInvalid => write!(
                f,
                "❌ Invalid private key format (must be 64 hex characters)!"
            ),
            RunEvent::PrivateKeySuccess => write!(f, "✅ Private key added successfully!"),
            RunEvent::PrivateKeyFail { error } => {
                write!(f, "❌ Failed to add private key: {}", error)
            }
            RunEvent::Info { total, details } => write!(
                f,
                "Wallet Info:\nTotal Wallets: {}\n\n{}",
                total, details
            ),
            RunEvent::NoWalletsInfo => write!(f, "No wallets available to show info."),
        }
    }
}

/// Receives progress events. Delivery is best effort: implementations log
/// their own failures and never hand them back to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: RunEvent);
}

/// Writes every event to the `task_result` log target.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: RunEvent) {
        if event.is_failure() {
            warn!(target: "task_result", "{}", event);
        } else {
            info!(target: "task_result", "{}", event);
        }
    }
}

/// Forwards each event to several notifiers in order.
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, event: RunEvent) {
        for target in &self.targets {
            target.notify(event.clone()).await;
        }
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

/// Sends each event as a plain text message to one chat.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Send a message to Telegram
    pub async fn send_message(&self, message: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        );

        let payload = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": message,
            "disable_notification": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::new(e).context("Failed to send Telegram request"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::msg(format!(
                "Telegram API error: {} - {}",
                status, text
            )));
        }

        debug!(target: PROGRESS_TARGET, "Message sent to chat {}", self.config.chat_id);
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: RunEvent) {
        if let Err(e) = self.send_message(&event.to_string()).await {
            error!(
                "Failed to send message to {}: {:#}",
                self.config.chat_id, e
            );
        }
    }
}
