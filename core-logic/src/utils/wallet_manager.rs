use crate::error::WalletError;
use crate::utils::json_store::{read_json_list, save_json_list};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One stored wallet. Only the key is persisted; the address is derived.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WalletEntry {
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

impl WalletEntry {
    /// Validates and normalizes `input` into a `0x`-prefixed key.
    pub fn from_input(input: &str) -> Result<Self, WalletError> {
        Ok(Self {
            private_key: normalize_private_key(input)?,
        })
    }
}

impl fmt::Debug for WalletEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletEntry")
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

/// Accepts 64 hex characters with or without a `0x` prefix.
pub fn normalize_private_key(input: &str) -> Result<String, WalletError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(WalletError::EmptyKey);
    }

    let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if bare.len() != 64 {
        return Err(WalletError::InvalidKeyLength { length: bare.len() });
    }
    if !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidKeyFormat);
    }

    Ok(format!("0x{}", bare))
}

/// Append-only wallet list backed by a JSON file.
pub struct WalletManager {
    path: PathBuf,
}

impl WalletManager {
    pub const WALLETS_FILE: &'static str = "wallets.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fails on a file that exists but does not parse; stored keys are never
    /// read as an empty list.
    pub fn load(&self) -> Result<Vec<WalletEntry>> {
        Ok(read_json_list(&self.path)?)
    }

    /// Returns the number of stored wallets
    pub fn count(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    /// Appends `entry` and rewrites the file. Returns the new wallet count.
    pub fn append(&self, entry: WalletEntry) -> Result<usize> {
        let mut wallets = self
            .load()
            .with_context(|| format!("Refusing to rewrite {}", self.path.display()))?;
        wallets.push(entry);
        save_json_list(&self.path, &wallets)?;
        info!(
            "Stored wallet #{} in {}",
            wallets.len(),
            self.path.display()
        );
        Ok(wallets.len())
    }
}
