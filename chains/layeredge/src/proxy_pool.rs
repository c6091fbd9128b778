//! Proxy Pool - fetch, probe and accumulate live proxies
//!
//! Candidates are pulled from a remote list in fixed-size batches. Each batch
//! is probed concurrently against a liveness URL and the survivors are kept
//! as `http://host:port` until the requested count is reached or the source
//! runs dry.

use crate::bot::notification::{Notifier, RunEvent};
use crate::config::ProxyPoolSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::{NetworkError, ProxyConfig};
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Remote list of candidate `host:port` strings.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Returns up to `limit` candidates starting at `offset`. An empty vector
    /// means the source is exhausted; an error means it could not be reached.
    async fn fetch_batch(&self, offset: usize, limit: usize) -> Result<Vec<String>>;
}

/// Decides whether a candidate forwards traffic.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, candidate: &str) -> bool;
}

/// ProxyScrape `displayproxies` list. The endpoint returns everything at
/// once, so batches are sliced out of the full response.
pub struct ProxyScrapeSource {
    client: Client,
    url: String,
}

impl ProxyScrapeSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build proxy source client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ProxySource for ProxyScrapeSource {
    async fn fetch_batch(&self, offset: usize, limit: usize) -> Result<Vec<String>> {
        let unavailable = |reason: String| NetworkError::SourceUnavailable {
            endpoint: self.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if body.trim().is_empty() {
            return Err(unavailable("empty response".to_string()).into());
        }

        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .skip(offset)
            .take(limit)
            .map(str::to_string)
            .collect())
    }
}

/// GETs the liveness URL through `http://{candidate}`; alive only on 200.
pub struct HttpLivenessProbe {
    target: String,
    timeout: Duration,
}

impl HttpLivenessProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpLivenessProbe {
    async fn is_alive(&self, candidate: &str) -> bool {
        let proxy = match reqwest::Proxy::all(format!("http://{}", candidate)) {
            Ok(p) => p,
            Err(e) => {
                debug!("Bad proxy candidate {}: {}", candidate, e);
                return false;
            }
        };

        let client = match Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                debug!("Failed to build client for {}: {}", candidate, e);
                return false;
            }
        };

        match client.get(&self.target).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_pause: Duration::from_secs(1),
        }
    }
}

impl From<&ProxyPoolSettings> for PoolSettings {
    fn from(settings: &ProxyPoolSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            batch_pause: Duration::from_millis(settings.batch_pause_ms),
        }
    }
}

/// What one acquisition produced.
#[derive(Debug, Clone)]
pub struct PoolReport {
    pub proxies: Vec<ProxyConfig>,
    pub required: usize,
    pub batches: usize,
}

impl PoolReport {
    /// Source ran dry before `required` live proxies were found.
    pub fn is_short(&self) -> bool {
        self.proxies.len() < self.required
    }

    pub fn shortfall(&self) -> usize {
        self.required.saturating_sub(self.proxies.len())
    }
}

pub struct ProxyPoolManager<S, P> {
    source: S,
    probe: P,
    settings: PoolSettings,
}

impl<S: ProxySource, P: LivenessProbe> ProxyPoolManager<S, P> {
    pub fn new(source: S, probe: P, settings: PoolSettings) -> Self {
        Self {
            source,
            probe,
            settings,
        }
    }

    /// Accumulates live proxies until `min_count` is reached (then truncates
    /// to exactly `min_count`) or the source is exhausted (then returns what
    /// was found). An unreachable source aborts with an error.
    pub async fn acquire(&self, min_count: usize, notifier: &dyn Notifier) -> Result<PoolReport> {
        let batch_size = self.settings.batch_size.max(1);
        let mut active: Vec<ProxyConfig> = Vec::new();
        let mut offset = 0;
        let mut batches = 0;

        while active.len() < min_count {
            let candidates = match self.source.fetch_batch(offset, batch_size).await {
                Ok(c) => c,
                Err(e) => {
                    notifier.notify(RunEvent::FetchFail).await;
                    return Err(e.context("Proxy source unreachable"));
                }
            };

            if candidates.is_empty() {
                notifier.notify(RunEvent::NoMoreProxies).await;
                info!("No more proxies available after {} batches", batches);
                break;
            }

            notifier
                .notify(RunEvent::TestingBatch {
                    count: candidates.len(),
                    start: offset,
                    end: offset + batch_size,
                })
                .await;

            let found = self.probe_batch(&candidates).await;
            batches += 1;
            let found_count = found.len();
            active.extend(found);

            info!(
                "Batch {}: {} active proxies, total {}",
                batches,
                found_count,
                active.len()
            );
            notifier
                .notify(RunEvent::FoundProxies {
                    count: found_count,
                    total: active.len(),
                })
                .await;

            offset += batch_size;

            if active.len() < min_count {
                notifier
                    .notify(RunEvent::NeedMoreProxies {
                        count: min_count - active.len(),
                    })
                    .await;
                tokio::time::sleep(self.settings.batch_pause).await;
            }
        }

        if active.len() < min_count {
            notifier
                .notify(RunEvent::ProxiesNotEnough {
                    count: active.len(),
                    min: min_count,
                })
                .await;
        } else {
            active.truncate(min_count);
            notifier
                .notify(RunEvent::ProxiesEnough {
                    count: active.len(),
                })
                .await;
        }

        Ok(PoolReport {
            proxies: active,
            required: min_count,
            batches,
        })
    }

    /// Probes every candidate at once, keeping the source order.
    async fn probe_batch(&self, candidates: &[String]) -> Vec<ProxyConfig> {
        let probe = &self.probe;
        let results: Vec<(&String, bool)> = stream::iter(candidates.iter())
            .map(|candidate| async move { (candidate, probe.is_alive(candidate).await) })
            .buffered(candidates.len().max(1))
            .collect()
            .await;

        results
            .into_iter()
            .filter(|(_, alive)| *alive)
            .map(|(candidate, _)| ProxyConfig::new(candidate))
            .collect()
    }
}
