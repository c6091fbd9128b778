use crate::config::ProxyConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Candidate proxies tried per wallet.
pub const PROXIES_PER_WALLET: usize = 3;

pub struct ProxyManager;

impl ProxyManager {
    pub const PROXY_FILE: &'static str = "proxies.txt";

    /// Loads proxies from a newline separated list.
    /// Lines may be `ip:port`, `ip:port:username:password` or full URLs.
    pub fn load_proxies(path: &Path) -> Result<Vec<ProxyConfig>> {
        if !path.exists() {
            warn!("{} not found. Running without proxies.", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut proxies = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match ProxyConfig::parse(trimmed) {
                Some(proxy) => proxies.push(proxy),
                None => warn!("Skipping invalid proxy line: {}", trimmed),
            }
        }

        info!("Loaded {} proxies from {}", proxies.len(), path.display());
        Ok(proxies)
    }

    /// Overwrites `path` with one proxy per line.
    pub fn save_proxies(path: &Path, proxies: &[ProxyConfig]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = proxies
            .iter()
            .map(ProxyConfig::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved {} proxies to {}", proxies.len(), path.display());
        Ok(())
    }

    /// Number of live proxies a pool should hold for `wallet_count` wallets.
    pub fn required_proxy_count(wallet_count: usize) -> usize {
        PROXIES_PER_WALLET.max(wallet_count.saturating_mul(PROXIES_PER_WALLET))
    }

    /// Splits `proxies` into consecutive groups of up to three.
    /// Group `i` belongs to wallet `i`.
    pub fn partition_groups<T>(proxies: &[T]) -> Vec<&[T]> {
        proxies.chunks(PROXIES_PER_WALLET).collect()
    }
}
