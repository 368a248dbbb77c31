//! Transaction anchors
//!
//! Every message carries a 32-byte anchor value that bounds its validity:
//! either a recent blockhash, which the ledger accepts only until its block
//! height passes `last_valid_block_height`, or the stored value of a durable
//! nonce account, which stays valid until the nonce is advanced.

use solana_sdk::{hash::Hash, pubkey::Pubkey};

/// Validity anchor for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Recent blockhash with the last block height at which it is accepted
    Blockhash {
        blockhash: Hash,
        last_valid_block_height: u64,
    },

    /// Durable nonce: consumed exactly once, the stored value changes after use
    DurableNonce {
        nonce_account: Pubkey,
        nonce_authority: Pubkey,
        nonce_value: Hash,
    },
}

impl Anchor {
    pub fn blockhash(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Anchor::Blockhash {
            blockhash,
            last_valid_block_height,
        }
    }

    pub fn durable_nonce(nonce_account: Pubkey, nonce_authority: Pubkey, nonce_value: Hash) -> Self {
        Anchor::DurableNonce {
            nonce_account,
            nonce_authority,
            nonce_value,
        }
    }

    /// The 32-byte value written into the message
    pub fn hash(&self) -> Hash {
        match self {
            Anchor::Blockhash { blockhash, .. } => *blockhash,
            Anchor::DurableNonce { nonce_value, .. } => *nonce_value,
        }
    }

    /// Check if this anchor is a durable nonce
    pub fn is_durable(&self) -> bool {
        matches!(self, Anchor::DurableNonce { .. })
    }

    /// Last valid block height for blockhash anchors; durable nonces have none
    pub fn last_valid_block_height(&self) -> Option<u64> {
        match self {
            Anchor::Blockhash {
                last_valid_block_height,
                ..
            } => Some(*last_valid_block_height),
            Anchor::DurableNonce { .. } => None,
        }
    }

    /// `(nonce_account, nonce_authority)` for durable anchors
    pub fn nonce_accounts(&self) -> Option<(Pubkey, Pubkey)> {
        match self {
            Anchor::DurableNonce {
                nonce_account,
                nonce_authority,
                ..
            } => Some((*nonce_account, *nonce_authority)),
            Anchor::Blockhash { .. } => None,
        }
    }

    /// Whether a blockhash anchor has lapsed at `block_height`
    ///
    /// The anchor is still accepted at exactly `last_valid_block_height`.
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        self.last_valid_block_height()
            .map(|last_valid| block_height > last_valid)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blockhash_expiry_boundary() {
        let anchor = Anchor::blockhash(Hash::new_unique(), 150);
        assert!(!anchor.is_durable());
        assert!(!anchor.is_expired_at(149));
        assert!(!anchor.is_expired_at(150));
        assert!(anchor.is_expired_at(151));
    }

    #[test]
    fn test_durable_nonce_never_expires_by_height() {
        let value = Hash::new_unique();
        let account = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let anchor = Anchor::durable_nonce(account, authority, value);

        assert!(anchor.is_durable());
        assert_eq!(anchor.hash(), value);
        assert_eq!(anchor.last_valid_block_height(), None);
        assert_eq!(anchor.nonce_accounts(), Some((account, authority)));
        assert!(!anchor.is_expired_at(u64::MAX));
    }
}
