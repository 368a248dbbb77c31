//! Message assembly
//!
//! Compiles instructions into the canonical account table and indexed
//! instruction form the ledger signs over.
//!
//! ## Account ordering
//! 1. The fee payer is forced in first as a writable signer
//! 2. Every reference (instruction accounts, then the program id as a
//!    readonly non-signer) is collected and deduplicated by address, OR-ing
//!    signer and writable flags
//! 3. The table is partitioned into signer-writable, signer-readonly,
//!    non-signer-writable, non-signer-readonly, each kept in first-seen order
//!
//! The same instructions and fee payer always yield the same table.

use std::collections::HashMap;

use solana_sdk::{hash::Hash, pubkey::Pubkey};

use crate::tx_builder::anchor::Anchor;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{AccountReference, Instruction};
use crate::tx_builder::shortvec;

/// Largest table a u8 account index can address
pub const MAX_ACCOUNTS: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// Instruction with program and accounts rewritten as table indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// Deduplicated, canonically ordered account table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTable {
    accounts: Vec<AccountReference>,
}

impl AccountTable {
    pub fn accounts(&self) -> &[AccountReference] {
        &self.accounts
    }

    pub fn keys(&self) -> Vec<Pubkey> {
        self.accounts.iter().map(|a| a.pubkey).collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn index_of(&self, pubkey: &Pubkey) -> Option<u8> {
        self.accounts
            .iter()
            .position(|a| &a.pubkey == pubkey)
            .and_then(|i| u8::try_from(i).ok())
    }

    pub fn header(&self) -> Result<MessageHeader, TransactionBuilderError> {
        let count = |pred: fn(&AccountReference) -> bool| self.accounts.iter().filter(|a| pred(*a)).count();
        let signers = count(|a| a.is_signer);
        let readonly_signed = count(|a| a.is_signer && !a.is_writable);
        let readonly_unsigned = count(|a| !a.is_signer && !a.is_writable);

        let to_u8 = |n: usize| {
            u8::try_from(n).map_err(|_| TransactionBuilderError::TooManyAccounts {
                count: n,
                max: u8::MAX as usize,
            })
        };
        Ok(MessageHeader {
            num_required_signatures: to_u8(signers)?,
            num_readonly_signed_accounts: to_u8(readonly_signed)?,
            num_readonly_unsigned_accounts: to_u8(readonly_unsigned)?,
        })
    }
}

/// Account table plus index-form instructions, without an anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledAccounts {
    pub table: AccountTable,
    pub instructions: Vec<CompiledInstruction>,
}

/// Build the account table and index-form instructions
///
/// Legal at any point of construction; calling it twice on the same input
/// returns equal results.
pub fn compile_accounts(
    instructions: &[Instruction],
    fee_payer: &Pubkey,
) -> Result<CompiledAccounts, TransactionBuilderError> {
    let mut seen: Vec<AccountReference> = Vec::new();
    let mut position: HashMap<Pubkey, usize> = HashMap::new();

    let mut add = |reference: AccountReference| match position.get(&reference.pubkey) {
        Some(&i) => seen[i].merge(&reference),
        None => {
            position.insert(reference.pubkey, seen.len());
            seen.push(reference);
        }
    };

    add(AccountReference::writable(*fee_payer, true));
    for ix in instructions {
        for account in ix.accounts() {
            add(*account);
        }
        add(AccountReference::readonly(*ix.program_id(), false));
    }

    let group = |signer: bool, writable: bool| {
        seen.iter()
            .filter(move |a| a.is_signer == signer && a.is_writable == writable)
            .copied()
    };
    let accounts: Vec<AccountReference> = group(true, true)
        .chain(group(true, false))
        .chain(group(false, true))
        .chain(group(false, false))
        .collect();

    if accounts.len() > MAX_ACCOUNTS {
        return Err(TransactionBuilderError::TooManyAccounts {
            count: accounts.len(),
            max: MAX_ACCOUNTS,
        });
    }

    let index: HashMap<Pubkey, u8> = accounts
        .iter()
        .enumerate()
        .map(|(i, a)| (a.pubkey, i as u8))
        .collect();
    let lookup = |key: &Pubkey| {
        index
            .get(key)
            .copied()
            .ok_or_else(|| TransactionBuilderError::wire(format!("account {} missing from table", key)))
    };

    let compiled = instructions
        .iter()
        .map(|ix| -> Result<CompiledInstruction, TransactionBuilderError> {
            Ok(CompiledInstruction {
                program_id_index: lookup(ix.program_id())?,
                accounts: ix
                    .accounts()
                    .iter()
                    .map(|a| lookup(&a.pubkey))
                    .collect::<Result<Vec<_>, _>>()?,
                data: ix.data().to_vec(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledAccounts {
        table: AccountTable { accounts },
        instructions: compiled,
    })
}

/// The signed payload of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message anchored to `anchor`
    ///
    /// # Errors
    ///
    /// - `MissingAnchor` when no anchor is supplied
    /// - `TooManyAccounts` when the table cannot be indexed by a u8
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: &Pubkey,
        anchor: Option<&Anchor>,
    ) -> Result<Self, TransactionBuilderError> {
        let anchor = anchor.ok_or(TransactionBuilderError::MissingAnchor)?;
        let compiled = compile_accounts(instructions, fee_payer)?;

        Ok(Self {
            header: compiled.table.header()?,
            account_keys: compiled.table.keys(),
            recent_blockhash: anchor.hash(),
            instructions: compiled.instructions,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Keys occupying signature slots, in slot order
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signers = self.header.num_required_signatures as usize;
        if index >= self.account_keys.len() {
            return false;
        }
        if index < signers {
            index < signers.saturating_sub(self.header.num_readonly_signed_accounts as usize)
        } else {
            let unsigned = self.account_keys.len() - signers;
            index - signers < unsigned.saturating_sub(self.header.num_readonly_unsigned_accounts as usize)
        }
    }

    /// Wire bytes: the exact bytes signers sign
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionBuilderError> {
        let mut out = Vec::with_capacity(
            3 + 3 + self.account_keys.len() * 32 + 32 + self.instructions.len() * 16,
        );
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        shortvec::encode_len(&mut out, self.account_keys.len())?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_ref());
        }

        out.extend_from_slice(self.recent_blockhash.as_ref());

        shortvec::encode_len(&mut out, self.instructions.len())?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            shortvec::encode_len(&mut out, ix.accounts.len())?;
            out.extend_from_slice(&ix.accounts);
            shortvec::encode_len(&mut out, ix.data.len())?;
            out.extend_from_slice(&ix.data);
        }

        Ok(out)
    }

    /// Parse message bytes, rejecting trailing data
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionBuilderError> {
        let mut reader = WireReader::new(bytes);
        let message = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }

    pub(crate) fn read(reader: &mut WireReader<'_>) -> Result<Self, TransactionBuilderError> {
        let header = MessageHeader {
            num_required_signatures: reader.u8()?,
            num_readonly_signed_accounts: reader.u8()?,
            num_readonly_unsigned_accounts: reader.u8()?,
        };

        let key_count = reader.len()?;
        let mut account_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            account_keys.push(Pubkey::new_from_array(reader.array()?));
        }

        let recent_blockhash = Hash::new_from_array(reader.array()?);

        let ix_count = reader.len()?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.u8()?;
            let n = reader.len()?;
            let accounts = reader.bytes(n)?.to_vec();
            let n = reader.len()?;
            let data = reader.bytes(n)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        let message = Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        };
        message.sanitize()?;
        Ok(message)
    }

    fn sanitize(&self) -> Result<(), TransactionBuilderError> {
        let keys = self.account_keys.len();
        let signers = self.header.num_required_signatures as usize;
        if signers == 0 || signers > keys {
            return Err(TransactionBuilderError::wire(format!(
                "{} required signatures with {} account keys",
                signers, keys
            )));
        }
        if self.header.num_readonly_signed_accounts as usize >= signers
            || self.header.num_readonly_unsigned_accounts as usize > keys - signers
        {
            return Err(TransactionBuilderError::wire("inconsistent message header"));
        }
        for ix in &self.instructions {
            let out_of_table = std::iter::once(&ix.program_id_index)
                .chain(ix.accounts.iter())
                .any(|i| *i as usize >= keys);
            if out_of_table {
                return Err(TransactionBuilderError::wire("instruction index out of bounds"));
            }
        }
        Ok(())
    }
}

/// Cursor over wire bytes
pub(crate) struct WireReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], TransactionBuilderError> {
        if self.bytes.len() - self.offset < n {
            return Err(TransactionBuilderError::wire(format!(
                "truncated at offset {}: need {} bytes",
                self.offset, n
            )));
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, TransactionBuilderError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], TransactionBuilderError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.bytes(N)?);
        Ok(buf)
    }

    pub(crate) fn len(&mut self) -> Result<usize, TransactionBuilderError> {
        let (len, consumed) = shortvec::decode_len(&self.bytes[self.offset..])?;
        self.offset += consumed;
        Ok(len)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub(crate) fn finish(&self) -> Result<(), TransactionBuilderError> {
        if self.offset != self.bytes.len() {
            return Err(TransactionBuilderError::wire(format!(
                "{} trailing bytes",
                self.bytes.len() - self.offset
            )));
        }
        Ok(())
    }
}
