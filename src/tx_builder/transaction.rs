//! Transaction assembly, signing, and wire serialization
//!
//! A [`TransactionDraft`] collects instructions and an anchor, then compiles
//! into a [`Transaction`]: the message plus one signature slot per required
//! signer. Slots may be filled across several `sign` calls by different
//! parties; only a fully signed transaction serializes.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Signature, Signer},
};

use crate::tx_builder::anchor::Anchor;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::instructions::{
    plan_instructions, sanity_check_ix_order, ComputeBudget, Instruction,
};
use crate::tx_builder::message::{compile_accounts, CompiledAccounts, Message, WireReader};
use crate::tx_builder::shortvec;

/// Largest serialized transaction the ledger accepts
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// Transaction under construction
///
/// Lifecycle: created empty, instructions appended, anchor attached, then
/// compiled. Account compilation is available at every step; a full message
/// needs the anchor.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    fee_payer: Pubkey,
    instructions: Vec<Instruction>,
    anchor: Option<Anchor>,
    compute_budget: ComputeBudget,
}

impl TransactionDraft {
    pub fn new(fee_payer: Pubkey) -> Self {
        Self {
            fee_payer,
            instructions: Vec::new(),
            anchor: None,
            compute_budget: ComputeBudget::default(),
        }
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_instructions(&mut self, instructions: impl IntoIterator<Item = Instruction>) -> &mut Self {
        self.instructions.extend(instructions);
        self
    }

    pub fn set_anchor(&mut self, anchor: Anchor) -> &mut Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn set_compute_budget(&mut self, budget: ComputeBudget) -> &mut Self {
        self.compute_budget = budget;
        self
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }

    /// Instructions in the order they will be compiled, including the
    /// advance-nonce and compute-budget instructions the anchor and budget add
    pub fn planned_instructions(&self) -> Result<Vec<Instruction>, TransactionBuilderError> {
        let exec_durable = self.anchor.and_then(|a| a.nonce_accounts());
        let plan = plan_instructions(exec_durable, &self.compute_budget, &self.instructions)?;
        sanity_check_ix_order(&plan.instructions, plan.is_durable)?;
        Ok(plan.instructions)
    }

    /// Account table and index-form instructions; does not need an anchor
    pub fn compile_accounts(&self) -> Result<CompiledAccounts, TransactionBuilderError> {
        compile_accounts(&self.planned_instructions()?, &self.fee_payer)
    }

    pub fn compile(&self) -> Result<Message, TransactionBuilderError> {
        let anchor = self.anchor.as_ref().ok_or(TransactionBuilderError::MissingAnchor)?;
        Message::compile(&self.planned_instructions()?, &self.fee_payer, Some(anchor))
    }

    pub fn into_transaction(self) -> Result<Transaction, TransactionBuilderError> {
        let message = self.compile()?;
        let anchor = self.anchor.ok_or(TransactionBuilderError::MissingAnchor)?;
        Transaction::new(message, anchor)
    }
}

/// Compiled transaction with its signature slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    message: Message,
    message_bytes: Vec<u8>,
    anchor: Anchor,
    signatures: Vec<Option<Signature>>,
}

impl Transaction {
    /// Wrap a compiled message; every signature slot starts empty
    pub fn new(message: Message, anchor: Anchor) -> Result<Self, TransactionBuilderError> {
        if message.recent_blockhash != anchor.hash() {
            return Err(TransactionBuilderError::AnchorMismatch {
                message: message.recent_blockhash,
                anchor: anchor.hash(),
            });
        }
        let message_bytes = message.serialize()?;
        let slots = message.signer_keys().len();
        Ok(Self {
            message,
            message_bytes,
            anchor,
            signatures: vec![None; slots],
        })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The exact bytes signatures are computed over
    pub fn message_bytes(&self) -> &[u8] {
        &self.message_bytes
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn signatures(&self) -> &[Option<Signature>] {
        &self.signatures
    }

    /// Fill every slot whose address matches one of `signers`
    ///
    /// Signers with no matching slot are ignored. Returns the number of
    /// slots written.
    pub fn sign(&mut self, signers: &[&dyn Signer]) -> usize {
        let mut written = 0;
        for signer in signers {
            let pubkey = signer.pubkey();
            if let Some(slot) = self.slot_of(&pubkey) {
                self.signatures[slot] = Some(signer.sign_message(&self.message_bytes));
                written += 1;
            }
        }
        written
    }

    /// Attach a signature produced elsewhere
    ///
    /// Returns `false` without modifying anything when `pubkey` has no slot
    /// or the signature does not verify against the message bytes.
    pub fn add_signature(&mut self, pubkey: &Pubkey, signature: Signature) -> bool {
        match self.slot_of(pubkey) {
            Some(slot) if signature.verify(pubkey.as_ref(), &self.message_bytes) => {
                self.signatures[slot] = Some(signature);
                true
            }
            _ => false,
        }
    }

    fn slot_of(&self, pubkey: &Pubkey) -> Option<usize> {
        self.message.signer_keys().iter().position(|k| k == pubkey)
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(Option::is_some)
    }

    pub fn missing_signers(&self) -> Vec<Pubkey> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, sig)| sig.is_none())
            .map(|(key, _)| *key)
            .collect()
    }

    /// Fee payer's signature, which identifies the transaction on the ledger
    pub fn signature(&self) -> Option<Signature> {
        self.signatures.first().copied().flatten()
    }

    pub fn verify_signatures(&self) -> bool {
        self.is_fully_signed()
            && self
                .message
                .signer_keys()
                .iter()
                .zip(&self.signatures)
                .all(|(key, sig)| {
                    sig.map(|s| s.verify(key.as_ref(), &self.message_bytes))
                        .unwrap_or(false)
                })
    }

    /// Wire bytes: compact-u16 signature count, signatures, message bytes
    ///
    /// # Errors
    ///
    /// - `IncompleteSignatures` if any slot is empty
    /// - `TransactionTooLarge` if the result exceeds [`MAX_TRANSACTION_SIZE`]
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionBuilderError> {
        if !self.is_fully_signed() {
            return Err(TransactionBuilderError::IncompleteSignatures {
                missing: self.missing_signers(),
                required: self.signatures.len(),
            });
        }

        let mut out = Vec::with_capacity(3 + self.signatures.len() * 64 + self.message_bytes.len());
        shortvec::encode_len(&mut out, self.signatures.len())?;
        for signature in self.signatures.iter().flatten() {
            out.extend_from_slice(signature.as_ref());
        }
        out.extend_from_slice(&self.message_bytes);

        if out.len() > MAX_TRANSACTION_SIZE {
            return Err(TransactionBuilderError::TransactionTooLarge {
                size: out.len(),
                max: MAX_TRANSACTION_SIZE,
            });
        }
        Ok(out)
    }
}

/// Transaction parsed back from wire bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
    pub message_bytes: Vec<u8>,
}

impl DecodedTransaction {
    pub fn from_wire(bytes: &[u8]) -> Result<Self, TransactionBuilderError> {
        let mut reader = WireReader::new(bytes);
        let count = reader.len()?;
        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            signatures.push(Signature::from(reader.array::<64>()?));
        }

        let message_start = bytes.len() - reader.remaining();
        let message = Message::read(&mut reader)?;
        reader.finish()?;

        if signatures.len() != message.header.num_required_signatures as usize {
            return Err(TransactionBuilderError::wire(format!(
                "{} signatures for {} required signers",
                signatures.len(),
                message.header.num_required_signatures
            )));
        }

        Ok(Self {
            signatures,
            message,
            message_bytes: bytes[message_start..].to_vec(),
        })
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    pub fn verify_signatures(&self) -> bool {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .all(|(key, sig)| sig.verify(key.as_ref(), &self.message_bytes))
    }
}
