use anyhow::{Context, Result};
use core_logic::WalletEntry;
use ethers::prelude::*;
use ethers::utils::to_checksum;

/// Signer derived from a stored private key.
#[derive(Clone)]
pub struct Wallet {
    signer: LocalWallet,
    address: String,
}

impl Wallet {
    pub fn from_entry(entry: &WalletEntry) -> Result<Self> {
        let signer = entry
            .private_key
            .parse::<LocalWallet>()
            .context("Invalid private key")?;
        Ok(Self::from_signer(signer))
    }

    /// Generates a fresh random key.
    pub fn random() -> (Self, WalletEntry) {
        let signer = LocalWallet::new(&mut rand::thread_rng());
        let entry = WalletEntry {
            private_key: format!("0x{}", hex::encode(signer.signer().to_bytes())),
        };
        (Self::from_signer(signer), entry)
    }

    fn from_signer(signer: LocalWallet) -> Self {
        let address = to_checksum(&signer.address(), None);
        Self { signer, address }
    }

    /// EIP-55 checksummed address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Address cut down for progress lines.
    pub fn short_address(&self) -> String {
        format!("{}...", &self.address[..10])
    }

    /// EIP-191 personal-sign, hex encoded with `0x`.
    pub async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self
            .signer
            .sign_message(message)
            .await
            .context("Failed to sign message")?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish()
    }
}
