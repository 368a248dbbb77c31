//! Instruction building and ordering validation
//!
//! This module holds the program-agnostic [`Instruction`] value, a fluent
//! [`InstructionBuilder`], encoders for the system and compute-budget
//! program instructions the pipeline itself needs, and instruction planning
//! with correct ordering for durable nonce transactions:
//! 1. advance_nonce_account (if durable)
//! 2. Compute budget instructions (CU limit, priority fee)
//! 3. Program instructions

use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;

use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::layout::{Discriminant, EncodingError, FieldKind, Layout, LayoutValues};

pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::system_program::ID;
pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ComputeBudget111111111111111111111111111111");
pub const SYSVAR_RECENT_BLOCKHASHES_ID: Pubkey =
    Pubkey::from_str_const("SysvarRecentB1ockHashes11111111111111111111");
pub const SYSVAR_RENT_ID: Pubkey =
    Pubkey::from_str_const("SysvarRent111111111111111111111111111111111");

/// Size of a nonce account's data
pub const NONCE_ACCOUNT_LENGTH: u64 = 80;

/// An account an instruction touches, with its access flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountReference {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountReference {
    pub fn new(pubkey: Pubkey, is_signer: bool, is_writable: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable,
        }
    }

    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self::new(pubkey, is_signer, true)
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self::new(pubkey, is_signer, false)
    }

    /// Fold another reference to the same address into this one
    ///
    /// Flags only ever widen: signer or writable on either side wins.
    pub fn merge(&mut self, other: &AccountReference) {
        debug_assert_eq!(self.pubkey, other.pubkey);
        self.is_signer |= other.is_signer;
        self.is_writable |= other.is_writable;
    }
}

/// One program invocation
///
/// Immutable once built. An address appears at most once in `accounts`;
/// repeated references are merged at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    program_id: Pubkey,
    accounts: Vec<AccountReference>,
    data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: Pubkey, accounts: Vec<AccountReference>, data: Vec<u8>) -> Self {
        let mut merged: Vec<AccountReference> = Vec::with_capacity(accounts.len());
        for account in accounts {
            match merged.iter_mut().find(|a| a.pubkey == account.pubkey) {
                Some(existing) => existing.merge(&account),
                None => merged.push(account),
            }
        }
        Self {
            program_id,
            accounts: merged,
            data,
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn accounts(&self) -> &[AccountReference] {
        &self.accounts
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Fluent builder for [`Instruction`]
#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    program_id: Pubkey,
    accounts: Vec<AccountReference>,
    data: Vec<u8>,
}

impl InstructionBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            accounts: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn account(mut self, account: AccountReference) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn signer(self, pubkey: Pubkey, is_writable: bool) -> Self {
        self.account(AccountReference::new(pubkey, true, is_writable))
    }

    pub fn writable(self, pubkey: Pubkey) -> Self {
        self.account(AccountReference::writable(pubkey, false))
    }

    pub fn readonly(self, pubkey: Pubkey) -> Self {
        self.account(AccountReference::readonly(pubkey, false))
    }

    /// Raw instruction data
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Instruction data encoded through a layout
    pub fn encode(mut self, layout: &Layout, values: &LayoutValues) -> Result<Self, EncodingError> {
        self.data = layout.encode(values)?;
        Ok(self)
    }

    pub fn build(self) -> Instruction {
        Instruction::new(self.program_id, self.accounts, self.data)
    }
}

static CREATE_ACCOUNT: Lazy<Layout> = Lazy::new(|| {
    Layout::new("create_account", Discriminant::U32(0))
        .field("lamports", FieldKind::U64)
        .field("space", FieldKind::U64)
        .field("owner", FieldKind::Pubkey)
});
static ASSIGN: Lazy<Layout> =
    Lazy::new(|| Layout::new("assign", Discriminant::U32(1)).field("owner", FieldKind::Pubkey));
static TRANSFER: Lazy<Layout> =
    Lazy::new(|| Layout::new("transfer", Discriminant::U32(2)).field("lamports", FieldKind::U64));
static ADVANCE_NONCE: Lazy<Layout> =
    Lazy::new(|| Layout::new("advance_nonce_account", Discriminant::U32(4)));
static INITIALIZE_NONCE: Lazy<Layout> = Lazy::new(|| {
    Layout::new("initialize_nonce_account", Discriminant::U32(6))
        .field("authority", FieldKind::Pubkey)
});
static ALLOCATE: Lazy<Layout> =
    Lazy::new(|| Layout::new("allocate", Discriminant::U32(8)).field("space", FieldKind::U64));
static SET_COMPUTE_UNIT_LIMIT: Lazy<Layout> = Lazy::new(|| {
    Layout::new("set_compute_unit_limit", Discriminant::U8(2)).field("units", FieldKind::U32)
});
static SET_COMPUTE_UNIT_PRICE: Lazy<Layout> = Lazy::new(|| {
    Layout::new("set_compute_unit_price", Discriminant::U8(3))
        .field("micro_lamports", FieldKind::U64)
});

/// Layout of the system program's transfer instruction
pub fn transfer_layout() -> &'static Layout {
    &TRANSFER
}

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(SYSTEM_PROGRAM_ID)
        .signer(*from, true)
        .writable(*to)
        .encode(&TRANSFER, &LayoutValues::new().with("lamports", lamports))?
        .build())
}

pub fn create_account(
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(SYSTEM_PROGRAM_ID)
        .signer(*from, true)
        .signer(*to, true)
        .encode(
            &CREATE_ACCOUNT,
            &LayoutValues::new()
                .with("lamports", lamports)
                .with("space", space)
                .with("owner", *owner),
        )?
        .build())
}

pub fn assign(pubkey: &Pubkey, owner: &Pubkey) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(SYSTEM_PROGRAM_ID)
        .signer(*pubkey, true)
        .encode(&ASSIGN, &LayoutValues::new().with("owner", *owner))?
        .build())
}

pub fn allocate(pubkey: &Pubkey, space: u64) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(SYSTEM_PROGRAM_ID)
        .signer(*pubkey, true)
        .encode(&ALLOCATE, &LayoutValues::new().with("space", space))?
        .build())
}

pub fn advance_nonce_account(
    nonce_account: &Pubkey,
    nonce_authority: &Pubkey,
) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(SYSTEM_PROGRAM_ID)
        .writable(*nonce_account)
        .readonly(SYSVAR_RECENT_BLOCKHASHES_ID)
        .signer(*nonce_authority, false)
        .encode(&ADVANCE_NONCE, &LayoutValues::new())?
        .build())
}

pub fn initialize_nonce_account(
    nonce_account: &Pubkey,
    nonce_authority: &Pubkey,
) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(SYSTEM_PROGRAM_ID)
        .writable(*nonce_account)
        .readonly(SYSVAR_RECENT_BLOCKHASHES_ID)
        .readonly(SYSVAR_RENT_ID)
        .encode(
            &INITIALIZE_NONCE,
            &LayoutValues::new().with("authority", *nonce_authority),
        )?
        .build())
}

/// `create_account` + `initialize_nonce_account` for a fresh nonce account
pub fn create_nonce_account(
    from: &Pubkey,
    nonce_account: &Pubkey,
    nonce_authority: &Pubkey,
    lamports: u64,
) -> Result<Vec<Instruction>, TransactionBuilderError> {
    Ok(vec![
        create_account(
            from,
            nonce_account,
            lamports,
            NONCE_ACCOUNT_LENGTH,
            &SYSTEM_PROGRAM_ID,
        )?,
        initialize_nonce_account(nonce_account, nonce_authority)?,
    ])
}

pub fn set_compute_unit_limit(units: u32) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(COMPUTE_BUDGET_PROGRAM_ID)
        .encode(&SET_COMPUTE_UNIT_LIMIT, &LayoutValues::new().with("units", units))?
        .build())
}

pub fn set_compute_unit_price(micro_lamports: u64) -> Result<Instruction, TransactionBuilderError> {
    Ok(InstructionBuilder::new(COMPUTE_BUDGET_PROGRAM_ID)
        .encode(
            &SET_COMPUTE_UNIT_PRICE,
            &LayoutValues::new().with("micro_lamports", micro_lamports),
        )?
        .build())
}

/// Compute budget requested for a transaction (0 = leave unset)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    pub unit_price_micro_lamports: u64,
}

/// Ordered instructions with the anchor mode they were planned for
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,

    /// - `true`: First instruction must be advance_nonce_account
    /// - `false`: Standard blockhash-based transaction
    pub is_durable: bool,
}

/// Order instructions for a transaction
///
/// `exec_durable` is `(nonce_account, nonce_authority)` in durable mode.
///
/// 1. `advance_nonce_account` (durable mode only, unless the caller already
///    placed it first)
/// 2. Compute budget instructions
/// 3. Program instructions, in caller order
pub fn plan_instructions(
    exec_durable: Option<(Pubkey, Pubkey)>,
    budget: &ComputeBudget,
    program_instructions: &[Instruction],
) -> Result<InstructionPlan, TransactionBuilderError> {
    let mut instructions = Vec::with_capacity(program_instructions.len() + 3);
    let mut rest = program_instructions;

    if let Some((nonce_account, nonce_authority)) = exec_durable {
        let advance = advance_nonce_account(&nonce_account, &nonce_authority)?;
        if let Some((first, tail)) = rest.split_first() {
            if first == &advance {
                rest = tail;
            }
        }
        instructions.push(advance);
    }

    if budget.unit_limit > 0 {
        instructions.push(set_compute_unit_limit(budget.unit_limit)?);
    }
    if budget.unit_price_micro_lamports > 0 {
        instructions.push(set_compute_unit_price(budget.unit_price_micro_lamports)?);
    }

    instructions.extend(rest.iter().cloned());

    Ok(InstructionPlan {
        instructions,
        is_durable: exec_durable.is_some(),
    })
}

/// Check if an instruction is the system program's advance_nonce_account
pub fn is_advance_nonce(ix: &Instruction) -> bool {
    ix.program_id() == &SYSTEM_PROGRAM_ID && ix.data() == [4, 0, 0, 0]
}

/// Validate instruction ordering for the anchor mode
///
/// # Errors
///
/// Returns `TransactionBuilderError::InvalidInstructionOrder` if:
/// - Instruction list is empty
/// - Durable transaction doesn't start with advance_nonce
/// - Multiple advance_nonce instructions found
/// - advance_nonce found in non-durable transaction
pub fn sanity_check_ix_order(
    instructions: &[Instruction],
    is_durable: bool,
) -> Result<(), TransactionBuilderError> {
    let Some(first) = instructions.first() else {
        return Err(TransactionBuilderError::invalid_order(
            "Instruction list is empty",
        ));
    };

    if is_durable {
        if !is_advance_nonce(first) {
            return Err(TransactionBuilderError::invalid_order(format!(
                "Durable nonce transaction must start with advance_nonce_account, got program_id: {}",
                first.program_id()
            )));
        }

        for (idx, ix) in instructions.iter().enumerate().skip(1) {
            if is_advance_nonce(ix) {
                return Err(TransactionBuilderError::invalid_order(format!(
                    "Multiple advance_nonce_account instructions found (at position {}). Only one allowed at position 0",
                    idx
                )));
            }
        }
    } else if let Some(idx) = instructions.iter().position(is_advance_nonce) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Non-durable transaction should not have advance_nonce_account (found at position {})",
            idx
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_ix() -> Instruction {
        InstructionBuilder::new(Pubkey::new_unique())
            .writable(Pubkey::new_unique())
            .data(vec![1, 2, 3, 4])
            .build()
    }

    #[test]
    fn test_builder_merges_repeated_references() {
        let key = Pubkey::new_unique();
        let ix = InstructionBuilder::new(Pubkey::new_unique())
            .readonly(key)
            .signer(key, false)
            .writable(key)
            .build();

        assert_eq!(ix.accounts().len(), 1);
        assert_eq!(ix.accounts()[0], AccountReference::new(key, true, true));
    }

    #[test]
    fn test_transfer_encoding() {
        let from = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let ix = transfer(&from, &to, 42).unwrap();

        assert_eq!(ix.program_id(), &SYSTEM_PROGRAM_ID);
        assert_eq!(
            ix.accounts(),
            &[
                AccountReference::new(from, true, true),
                AccountReference::new(to, false, true)
            ]
        );
        assert_eq!(ix.data()[..4], [2, 0, 0, 0]);
        assert_eq!(ix.data()[4..], 42u64.to_le_bytes());
    }

    #[test]
    fn test_advance_nonce_accounts() {
        let nonce = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ix = advance_nonce_account(&nonce, &authority).unwrap();

        assert!(is_advance_nonce(&ix));
        assert_eq!(ix.accounts()[0], AccountReference::writable(nonce, false));
        assert_eq!(
            ix.accounts()[1],
            AccountReference::readonly(SYSVAR_RECENT_BLOCKHASHES_ID, false)
        );
        assert_eq!(ix.accounts()[2], AccountReference::readonly(authority, true));
    }

    #[test]
    fn test_create_nonce_account_pair() {
        let from = Pubkey::new_unique();
        let nonce = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ixs = create_nonce_account(&from, &nonce, &authority, 1_500_000).unwrap();

        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[0].data()[..4], [0, 0, 0, 0]);
        assert_eq!(ixs[0].data()[12..20], NONCE_ACCOUNT_LENGTH.to_le_bytes());
        assert_eq!(ixs[1].data()[..4], [6, 0, 0, 0]);
        assert_eq!(&ixs[1].data()[4..], authority.as_ref());
    }

    #[test]
    fn test_compute_budget_encoding() {
        let limit = set_compute_unit_limit(200_000).unwrap();
        assert_eq!(limit.program_id(), &COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(limit.data().len(), 5);
        assert_eq!(limit.data()[0], 2);

        let price = set_compute_unit_price(10_000).unwrap();
        assert_eq!(price.data().len(), 9);
        assert_eq!(price.data()[0], 3);
    }

    #[test]
    fn test_plan_durable_order() {
        let durable = Some((Pubkey::new_unique(), Pubkey::new_unique()));
        let budget = ComputeBudget {
            unit_limit: 200_000,
            unit_price_micro_lamports: 10_000,
        };
        let user = program_ix();

        let plan = plan_instructions(durable, &budget, &[user.clone()]).unwrap();

        assert!(plan.is_durable);
        assert_eq!(plan.instructions.len(), 4);
        assert!(is_advance_nonce(&plan.instructions[0]));
        assert_eq!(plan.instructions[1].program_id(), &COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(plan.instructions[2].program_id(), &COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(plan.instructions[3], user);
        assert!(sanity_check_ix_order(&plan.instructions, true).is_ok());
    }

    #[test]
    fn test_plan_does_not_duplicate_caller_advance() {
        let nonce = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let advance = advance_nonce_account(&nonce, &authority).unwrap();

        let plan =
            plan_instructions(Some((nonce, authority)), &ComputeBudget::default(), &[advance, program_ix()])
                .unwrap();
        assert_eq!(plan.instructions.len(), 2);
        assert!(sanity_check_ix_order(&plan.instructions, true).is_ok());
    }

    #[test]
    fn test_plan_blockhash_without_budget() {
        let user = program_ix();
        let plan = plan_instructions(None, &ComputeBudget::default(), &[user.clone()]).unwrap();

        assert!(!plan.is_durable);
        assert_eq!(plan.instructions, vec![user]);
    }

    #[test]
    fn test_sanity_check_empty_list() {
        assert!(sanity_check_ix_order(&[], false).is_err());
    }

    #[test]
    fn test_sanity_check_durable_missing_advance_nonce() {
        let result = sanity_check_ix_order(&[program_ix()], true);
        if let Err(TransactionBuilderError::InvalidInstructionOrder(msg)) = result {
            assert!(msg.contains("must start with advance_nonce"));
        } else {
            panic!("Expected InvalidInstructionOrder error");
        }
    }

    #[test]
    fn test_sanity_check_multiple_advance_nonce() {
        let authority = Pubkey::new_unique();
        let instructions = vec![
            advance_nonce_account(&Pubkey::new_unique(), &authority).unwrap(),
            set_compute_unit_limit(200_000).unwrap(),
            advance_nonce_account(&Pubkey::new_unique(), &authority).unwrap(),
        ];

        let result = sanity_check_ix_order(&instructions, true);
        if let Err(TransactionBuilderError::InvalidInstructionOrder(msg)) = result {
            assert!(msg.contains("Multiple advance_nonce"));
        } else {
            panic!("Expected InvalidInstructionOrder error");
        }
    }

    #[test]
    fn test_sanity_check_non_durable_has_advance_nonce() {
        let instructions = vec![
            program_ix(),
            advance_nonce_account(&Pubkey::new_unique(), &Pubkey::new_unique()).unwrap(),
        ];

        let result = sanity_check_ix_order(&instructions, false);
        if let Err(TransactionBuilderError::InvalidInstructionOrder(msg)) = result {
            assert!(msg.contains("found at position 1"));
        } else {
            panic!("Expected InvalidInstructionOrder error");
        }
    }
}
