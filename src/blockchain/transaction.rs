//! Transaction building, signing, and serialization.
//!
//! # Responsibilities
//! - Build system-program transfer instructions
//! - Compile instructions into a legacy message (deduplicated, ordered account keys)
//! - Sign with the fee payer's key only
//! - Serialize to the wire format accepted by `sendTransaction`
//!
//! # Wire Format
//! ```text
//! transaction := shortvec<signature> message
//! message     := header account_keys recent_blockhash shortvec<instruction>
//! header      := u8 required_signatures, u8 readonly_signed, u8 readonly_unsigned
//! instruction := u8 program_index shortvec<u8 account_index> shortvec<u8 data>
//! ```

use base64::Engine;
use thiserror::Error;

use crate::blockchain::keys::{Hash, Keypair, Pubkey, Signature};

/// The native system program (all-zero key).
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

/// System program instruction index for `Transfer`.
const SYSTEM_TRANSFER_DISCRIMINANT: u32 = 2;

/// Account indices are a single byte on the wire.
const MAX_ACCOUNT_KEYS: usize = 256;

/// Errors raised while assembling or signing a transaction envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction has no instructions")]
    EmptyInstructions,

    #[error("transfer amount must be greater than zero")]
    ZeroLamports,

    #[error("transaction references {0} accounts, at most 256 are addressable")]
    TooManyAccounts(usize),

    #[error("transaction requires {0} signatures, only single-signer transactions are supported")]
    UnsupportedSignerCount(u8),

    #[error("signing key {actual} does not match fee payer {expected}")]
    SignerMismatch { expected: Pubkey, actual: Pubkey },
}

/// Account reference inside an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: false }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    /// System transfer of `lamports` from `from` (signer) to `to`.
    pub fn system_transfer(from: Pubkey, to: Pubkey, lamports: u64) -> Self {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&SYSTEM_TRANSFER_DISCRIMINANT.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());

        Self {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![AccountMeta::writable(from, true), AccountMeta::writable(to, false)],
            data,
        }
    }

    /// Decode the lamport amount if this is a system transfer.
    pub fn transfer_lamports(&self) -> Option<u64> {
        decode_transfer(self.program_id, &self.data)
    }
}

fn decode_transfer(program_id: Pubkey, data: &[u8]) -> Option<u64> {
    if program_id != SYSTEM_PROGRAM_ID || data.len() != 12 {
        return None;
    }
    let discriminant = u32::from_le_bytes(data[0..4].try_into().ok()?);
    if discriminant != SYSTEM_TRANSFER_DISCRIMINANT {
        return None;
    }
    Some(u64::from_le_bytes(data[4..12].try_into().ok()?))
}

/// Message header: how many leading keys sign, and which keys are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// Instruction with account keys replaced by indices into `Message::account_keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// The signed payload of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions with `payer` as the first (fee-paying) signer.
    pub fn compile(
        instructions: &[Instruction],
        payer: Pubkey,
        recent_blockhash: Hash,
    ) -> Result<Self, TransactionError> {
        if instructions.is_empty() {
            return Err(TransactionError::EmptyInstructions);
        }

        // Insertion-ordered key set with merged privileges; payer always first.
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::writable(payer, true)];
        let mut merge = |meta: AccountMeta| {
            if let Some(existing) = metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                metas.push(meta);
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(*meta);
            }
            merge(AccountMeta::readonly(ix.program_id, false));
        }

        let total = metas.len();
        if total > MAX_ACCOUNT_KEYS {
            return Err(TransactionError::TooManyAccounts(total));
        }
        let count =
            |n: usize| u8::try_from(n).map_err(|_| TransactionError::TooManyAccounts(total));

        let group = |signer: bool, writable: bool| {
            metas
                .iter()
                .filter(move |m| m.is_signer == signer && m.is_writable == writable)
                .map(|m| m.pubkey)
        };
        let writable_signed: Vec<Pubkey> = group(true, true).collect();
        let readonly_signed: Vec<Pubkey> = group(true, false).collect();
        let writable_unsigned: Vec<Pubkey> = group(false, true).collect();
        let readonly_unsigned: Vec<Pubkey> = group(false, false).collect();

        let header = MessageHeader {
            num_required_signatures: count(writable_signed.len() + readonly_signed.len())?,
            num_readonly_signed_accounts: count(readonly_signed.len())?,
            num_readonly_unsigned_accounts: count(readonly_unsigned.len())?,
        };

        let account_keys: Vec<Pubkey> = writable_signed
            .into_iter()
            .chain(readonly_signed)
            .chain(writable_unsigned)
            .chain(readonly_unsigned)
            .collect();

        let index_of = |key: &Pubkey| -> u8 {
            // Every key was inserted above; the bound check keeps the cast lossless.
            account_keys.iter().position(|k| k == key).unwrap_or_default() as u8
        };
        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Fee payer (always the first account key).
    pub fn payer(&self) -> Pubkey {
        self.account_keys[0]
    }

    /// Lamport amounts of every system transfer in the message, in order.
    pub fn transfers(&self) -> Vec<(Pubkey, Pubkey, u64)> {
        self.instructions
            .iter()
            .filter_map(|ix| {
                let program_id = *self.account_keys.get(ix.program_id_index as usize)?;
                let lamports = decode_transfer(program_id, &ix.data)?;
                let from = *self.account_keys.get(*ix.accounts.first()? as usize)?;
                let to = *self.account_keys.get(*ix.accounts.get(1)? as usize)?;
                Some((from, to, lamports))
            })
            .collect()
    }

    /// Serialize to the bytes that get signed.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + 1 + 32 * self.account_keys.len() + 32 + 64);
        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        encode_length(&mut buf, self.account_keys.len());
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }

        buf.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_length(&mut buf, self.instructions.len());
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_length(&mut buf, ix.accounts.len());
            buf.extend_from_slice(&ix.accounts);
            encode_length(&mut buf, ix.data.len());
            buf.extend_from_slice(&ix.data);
        }
        buf
    }
}

/// Append a compact-u16 ("shortvec") length prefix.
pub fn encode_length(buf: &mut Vec<u8>, len: usize) {
    let mut rem = len;
    loop {
        let byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

/// Unsigned transaction envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    message: Message,
}

impl Transaction {
    /// Assemble an envelope from instructions, a blockhash, and the fee payer.
    pub fn new(
        instructions: &[Instruction],
        recent_blockhash: Hash,
        payer: Pubkey,
    ) -> Result<Self, TransactionError> {
        if instructions.iter().any(|ix| ix.transfer_lamports() == Some(0)) {
            return Err(TransactionError::ZeroLamports);
        }
        let message = Message::compile(instructions, payer, recent_blockhash)?;
        Ok(Self { message })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Sign with the fee payer's key, consuming the envelope.
    ///
    /// Any key other than the declared payer is rejected.
    pub fn sign(self, signer: &Keypair) -> Result<SignedTransaction, TransactionError> {
        let required = self.message.header.num_required_signatures;
        if required != 1 {
            return Err(TransactionError::UnsupportedSignerCount(required));
        }

        let expected = self.message.payer();
        let actual = signer.pubkey();
        if expected != actual {
            return Err(TransactionError::SignerMismatch { expected, actual });
        }

        let signature = signer.sign_message(&self.message.serialize());
        Ok(SignedTransaction {
            message: self.message,
            signature,
        })
    }
}

/// A transaction carrying exactly one payer signature. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    message: Message,
    signature: Signature,
}

impl SignedTransaction {
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The payer signature, which is also the transaction id.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn payer(&self) -> Pubkey {
        self.message.payer()
    }

    /// Check the signature against the payer key.
    pub fn verify(&self) -> bool {
        self.payer().verify(&self.message.serialize(), &self.signature)
    }

    /// Full wire encoding (signatures followed by message).
    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut buf = Vec::with_capacity(1 + 64 + message.len());
        encode_length(&mut buf, 1);
        buf.extend_from_slice(self.signature.as_bytes());
        buf.extend_from_slice(&message);
        buf
    }

    /// Base64 wire encoding for `sendTransaction`.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.serialize())
    }
}
