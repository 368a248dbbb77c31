//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Fee-payer keypair loaded from disk
#[derive(Clone)]
pub struct Wallet {
    keypair: Arc<Keypair>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("pubkey", &self.pubkey()).finish()
    }
}

impl Wallet {
    /// Load a keypair file: a JSON array of 64 bytes, the raw 64 bytes, or
    /// the base58 text wallets export
    ///
    /// A leading `~/` expands to `$HOME`.
    pub fn from_file(path: &str) -> Result<Self> {
        let path = expand_home(path);
        let raw = Zeroizing::new(
            std::fs::read(&path).with_context(|| format!("Failed to read keypair file: {}", path))?,
        );

        let text = std::str::from_utf8(&raw).map(str::trim).unwrap_or_default();
        let bytes = if raw.len() == 64 {
            Zeroizing::new(raw.to_vec())
        } else if text.starts_with('[') {
            Zeroizing::new(
                serde_json::from_slice::<Vec<u8>>(&raw).context("Failed to parse keypair JSON")?,
            )
        } else {
            Zeroizing::new(
                bs58::decode(text)
                    .into_vec()
                    .context("Keypair file is neither JSON, raw bytes nor base58")?,
            )
        };

        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes).context("Invalid keypair bytes")?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}
