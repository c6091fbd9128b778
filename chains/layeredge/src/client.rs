//! HTTP session against the LayerEdge referral API.
//!
//! One [`LayerEdgeClient`] is bound to one wallet and at most one proxy.
//! Every call goes through [`retry_request`]; an exhausted call is a soft
//! failure of that step, while signing or client construction errors are
//! returned as `Err` and abort the proxy attempt.

use crate::wallet::Wallet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use core_logic::{
    retry_request, NetworkError, ProxyConfig, RequestOutcome, RetryConfig, WalletEntry,
};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::{Client, Method};
use serde_json::{json, Number, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Exact confirmation returned by the node-action endpoint.
pub const NODE_ACTION_CONFIRMATION: &str = "node action executed successfully";

/// Status code the check-in endpoint uses for "already claimed today".
const ALREADY_CHECKED_IN_STATUS: i64 = 405;

static COOLDOWN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"after\s+([^!]+)!").expect("valid cooldown regex"));

/// Outcome of a completed daily check-in call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckIn {
    Claimed,
    AlreadyDone { next_time: String },
}

/// Remote operations for one wallet through one proxy.
#[async_trait]
pub trait NodeSession: Send + Sync {
    fn address(&self) -> &str;

    /// `true` when the API answered with a non-empty body.
    async fn register_wallet(&self) -> Result<bool>;

    /// `None` when the call never completed.
    async fn daily_check_in(&self) -> Result<Option<CheckIn>>;

    /// `true` only on the exact confirmation message.
    async fn connect_node(&self) -> Result<bool>;

    /// `None` when the call never completed or returned nothing.
    async fn check_points(&self) -> Result<Option<Number>>;
}

/// Builds sessions bound to a proxy and a stored wallet.
pub trait SessionFactory: Send + Sync {
    type Session: NodeSession;

    fn build(&self, proxy: Option<&ProxyConfig>, wallet: &WalletEntry) -> Result<Self::Session>;
}

/// Settings shared by every session.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub referral_code: String,
    pub origin: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ClientSettings {
    pub fn from_config(config: &crate::config::LayerEdgeConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            referral_code: config.referral_code.clone(),
            origin: config.origin.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            retry: config.retry_config(),
        }
    }
}

pub struct LayerEdgeClient {
    http: Client,
    settings: ClientSettings,
    wallet: Wallet,
}

impl LayerEdgeClient {
    pub fn new(
        settings: ClientSettings,
        wallet: Wallet,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&settings.origin).context("Invalid origin header")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/", settings.origin))
                .context("Invalid referer header")?,
        );

        let mut client_builder = Client::builder()
            .default_headers(headers)
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout);
        if let Some(proxy_conf) = proxy {
            let mut proxy = reqwest::Proxy::all(&proxy_conf.url).map_err(|e| {
                NetworkError::BadProxy {
                    proxy: proxy_conf.url.clone(),
                    reason: e.to_string(),
                }
            })?;
            if let (Some(u), Some(p)) = (&proxy_conf.username, &proxy_conf.password) {
                proxy = proxy.basic_auth(u, p);
            }
            client_builder = client_builder.proxy(proxy);
        }
        let http = client_builder.build()?;

        Ok(Self {
            http,
            settings,
            wallet,
        })
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Sends one request with retries. Responses with status < 500 are
    /// handed back as text; 5xx and transport errors are retried.
    async fn request(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> RequestOutcome<String> {
        let url = format!("{}{}", self.settings.base_url, path);

        retry_request(&self.settings.retry, operation, || {
            let mut request = self.http.request(method.clone(), &url);
            if let Some(payload) = &body {
                request = request.json(payload);
            }
            let url = url.clone();
            let timeout_ms = self.settings.timeout.as_millis() as u64;
            async move {
                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) if e.is_timeout() => {
                        return Err(anyhow::Error::new(NetworkError::Timeout {
                            timeout_ms,
                            endpoint: url,
                        }));
                    }
                    Err(e) => return Err(e.into()),
                };
                let status = response.status();
                if status.is_server_error() {
                    return Err(anyhow::Error::new(NetworkError::HttpError {
                        status_code: status.as_u16(),
                        endpoint: url,
                    }));
                }
                Ok::<String, anyhow::Error>(response.text().await?)
            }
        })
        .await
    }

    fn timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl NodeSession for LayerEdgeClient {
    fn address(&self) -> &str {
        self.wallet.address()
    }

    async fn register_wallet(&self) -> Result<bool> {
        let path = format!(
            "/api/referral/register-wallet/{}",
            self.settings.referral_code
        );
        let body = json!({ "walletAddress": self.wallet.address() });

        match self.request("registerWallet", Method::POST, &path, Some(body)).await {
            RequestOutcome::Completed(text) => Ok(!text.trim().is_empty()),
            RequestOutcome::Exhausted { last_error, .. } => {
                debug!("registerWallet gave up: {}", last_error);
                Ok(false)
            }
        }
    }

    async fn daily_check_in(&self) -> Result<Option<CheckIn>> {
        let timestamp = Self::timestamp_ms();
        let message = format!(
            "I am claiming my daily node point for {} at {}",
            self.wallet.address(),
            timestamp
        );
        let sign = self.wallet.sign_message(&message).await?;
        let body = json!({
            "sign": sign,
            "timestamp": timestamp,
            "walletAddress": self.wallet.address(),
        });

        let outcome = self
            .request(
                "dailyCheckIn",
                Method::POST,
                "/api/light-node/claim-node-points",
                Some(body),
            )
            .await;

        Ok(outcome
            .completed()
            .filter(|text| !text.trim().is_empty())
            .map(|text| classify_check_in(&text)))
    }

    async fn connect_node(&self) -> Result<bool> {
        let timestamp = Self::timestamp_ms();
        let message = format!(
            "Node activation request for {} at {}",
            self.wallet.address(),
            timestamp
        );
        let sign = self.wallet.sign_message(&message).await?;
        let path = format!(
            "/api/light-node/node-action/{}/start",
            self.wallet.address()
        );
        let body = json!({ "sign": sign, "timestamp": timestamp });

        let outcome = self
            .request("connectNode", Method::POST, &path, Some(body))
            .await;

        Ok(outcome
            .completed()
            .map(|text| is_node_confirmation(&text))
            .unwrap_or(false))
    }

    async fn check_points(&self) -> Result<Option<Number>> {
        let path = format!(
            "/api/referral/wallet-details/{}",
            self.wallet.address()
        );

        let outcome = self.request("checkPoints", Method::GET, &path, None).await;

        Ok(outcome
            .completed()
            .filter(|text| !text.trim().is_empty())
            .map(|text| extract_node_points(&text)))
    }
}

/// Builds [`LayerEdgeClient`]s from shared settings.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    settings: ClientSettings,
}

impl HttpSessionFactory {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl SessionFactory for HttpSessionFactory {
    type Session = LayerEdgeClient;

    fn build(&self, proxy: Option<&ProxyConfig>, wallet: &WalletEntry) -> Result<LayerEdgeClient> {
        let wallet = Wallet::from_entry(wallet)?;
        LayerEdgeClient::new(self.settings.clone(), wallet, proxy)
    }
}

/// Interprets a check-in response body.
///
/// `{"statusCode": 405, "message": "..."}` means the claim was already made;
/// anything else that came back counts as claimed.
pub fn classify_check_in(body: &str) -> CheckIn {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return CheckIn::Claimed;
    };

    let status = value.get("statusCode").and_then(Value::as_i64);
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty());

    match (status, message) {
        (Some(ALREADY_CHECKED_IN_STATUS), Some(message)) => CheckIn::AlreadyDone {
            next_time: next_check_in_time(message),
        },
        _ => CheckIn::Claimed,
    }
}

/// Pulls the cooldown out of messages like `"... after 3h!"`.
///
/// When the phrase is missing the next slot is assumed to be 24 hours out.
/// That fallback can hide an upstream wording change, so it is logged.
pub fn next_check_in_time(message: &str) -> String {
    if let Some(window) = COOLDOWN_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
    {
        return window.to_string();
    }

    warn!(
        "Unrecognized check-in cooldown message, assuming 24h: {}",
        message
    );
    (Local::now() + ChronoDuration::hours(24))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn is_node_confirmation(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .is_some_and(|m| m == NODE_ACTION_CONFIRMATION)
}

/// `data.nodePoints` as sent, or 0 when the field is absent or not a
/// positive number.
fn extract_node_points(body: &str) -> Number {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| match &value["data"]["nodePoints"] {
            Value::Number(n) if n.as_f64().is_some_and(|p| p > 0.0) => Some(n.clone()),
            _ => None,
        })
        .unwrap_or_else(|| Number::from(0u64))
}
