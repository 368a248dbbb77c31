//! Durable nonce account state
//!
//! A nonce account is an 80-byte system-program account holding a versioned,
//! bincode-encoded [`Versions`]: the authority allowed to advance it, the
//! stored nonce value, and the fee schedule captured when it was last advanced.

use solana_nonce::{
    state::{Data, DurableNonce, State},
    versions::Versions,
};
use solana_sdk::{hash::Hash, pubkey::Pubkey};
use tracing::debug;

use super::nonce_errors::{NonceError, NonceResult};
use crate::rpc_manager::{Account, RpcClient};
use crate::tx_builder::instructions::{NONCE_ACCOUNT_LENGTH, SYSTEM_PROGRAM_ID};
use crate::tx_builder::Anchor;

/// Contents of an initialized nonce account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceData {
    pub authority: Pubkey,
    pub durable_nonce: Hash,
    pub lamports_per_signature: u64,
}

impl NonceData {
    pub fn new(authority: Pubkey, durable_nonce: Hash, lamports_per_signature: u64) -> Self {
        Self {
            authority,
            durable_nonce,
            lamports_per_signature,
        }
    }

    /// Account data as the system program stores it
    pub fn to_account_data(&self) -> NonceResult<Vec<u8>> {
        let invalid = |e: bincode::Error| NonceError::InvalidAccountData {
            account: Pubkey::default(),
            message: e.to_string(),
        };
        // `DurableNonce::from_blockhash` re-hashes its input; the stored value
        // is taken as-is here
        let durable_nonce: DurableNonce =
            bincode::deserialize(self.durable_nonce.as_ref()).map_err(invalid)?;
        let state = State::Initialized(Data::new(
            self.authority,
            durable_nonce,
            self.lamports_per_signature,
        ));
        bincode::serialize(&Versions::new(state)).map_err(invalid)
    }

    /// Anchor that signs against the stored nonce value
    pub fn anchor(&self, nonce_account: Pubkey) -> Anchor {
        Anchor::durable_nonce(nonce_account, self.authority, self.durable_nonce)
    }
}

impl From<&Data> for NonceData {
    fn from(data: &Data) -> Self {
        Self {
            authority: data.authority,
            durable_nonce: data.blockhash(),
            lamports_per_signature: data.get_lamports_per_signature(),
        }
    }
}

/// Decode nonce state from a fetched account
pub fn parse_nonce_account(address: &Pubkey, account: &Account) -> NonceResult<NonceData> {
    if account.owner != SYSTEM_PROGRAM_ID {
        return Err(NonceError::InvalidOwner {
            account: *address,
            owner: account.owner,
        });
    }
    if account.data.len() != NONCE_ACCOUNT_LENGTH as usize {
        return Err(NonceError::InvalidAccountData {
            account: *address,
            message: format!(
                "expected {} bytes, found {}",
                NONCE_ACCOUNT_LENGTH,
                account.data.len()
            ),
        });
    }

    let versions: Versions =
        bincode::deserialize(&account.data).map_err(|e| NonceError::InvalidAccountData {
            account: *address,
            message: e.to_string(),
        })?;

    match versions.state() {
        State::Initialized(data) => Ok(NonceData::from(data)),
        State::Uninitialized => Err(NonceError::Uninitialized(*address)),
    }
}

/// Fetch and decode a nonce account
pub async fn fetch_nonce_data(client: &RpcClient, nonce_account: &Pubkey) -> NonceResult<NonceData> {
    let account = client
        .get_account_info(nonce_account)
        .await?
        .ok_or(NonceError::AccountNotFound(*nonce_account))?;
    let data = parse_nonce_account(nonce_account, &account)?;
    debug!(
        nonce_account = %nonce_account,
        nonce = %data.durable_nonce,
        authority = %data.authority,
        "fetched nonce account"
    );
    Ok(data)
}

/// Anchor for a transaction that will be signed by `nonce_authority`
///
/// Fails with `AuthorityMismatch` when the account is controlled by a
/// different key, since the advance instruction would be rejected.
pub async fn fetch_durable_anchor(
    client: &RpcClient,
    nonce_account: &Pubkey,
    nonce_authority: &Pubkey,
) -> NonceResult<Anchor> {
    let data = fetch_nonce_data(client, nonce_account).await?;
    if data.authority != *nonce_authority {
        return Err(NonceError::AuthorityMismatch {
            account: *nonce_account,
            expected: *nonce_authority,
            actual: data.authority,
        });
    }
    Ok(data.anchor(*nonce_account))
}
