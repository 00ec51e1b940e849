//! Manual Solana transaction wire format and signing.
//!
//! We build Solana transactions entirely by hand, without `solana-sdk`.
//! The wire format is a compact binary layout documented here:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```
//!
//! A transaction with several signers is filled slot by slot: each signer
//! signs the same message bytes and its signature lands at the index of its
//! key in `account_keys`. Unfilled slots stay all-zero.

use std::fmt;

use ed25519_dalek::VerifyingKey;
use serde::{Serialize, Serializer};

use crate::address::Pubkey;
use crate::error::SolError;
use crate::keypair::Keypair;

/// Largest serialized transaction the network accepts (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes (max 0x1_ffff, but u16 caps at 0xffff)
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SolError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(SolError::SerializationError(
            "compact-u16 value overflow".into(),
        ));
    }

    Ok((value as u16, consumed))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolAccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl SolAccountMeta {
    pub fn writable_signer(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable: true,
        }
    }

    pub fn readonly_signer(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable: false,
        }
    }

    pub fn writable(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }
}

/// A Solana instruction (before it is compiled into a transaction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A 64-byte Ed25519 signature. The first signature of a transaction is
/// also its identifier on the network.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// An all-zero signature marks a slot nobody has signed yet.
    pub fn is_unset(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Strict Ed25519 verification of `message` under `pubkey`.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(pubkey.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&self.0);
        key.verify_strict(message, &signature).is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl std::str::FromStr for Signature {
    type Err = SolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SolError::SerializationError(format!("base58 decode failed: {e}")))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            SolError::SerializationError(format!("expected 64 signature bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A complete Solana transaction (unsigned, partially or fully signed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolTransaction {
    /// One slot per required signer, in `account_keys` order.
    pub signatures: Vec<Signature>,

    /// All account keys referenced by this transaction, in canonical order:
    ///   1. writable signers
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<Pubkey>,

    /// Number of required signatures (first N accounts are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned: u8,

    /// Recent blockhash (32 bytes).
    pub recent_blockhash: [u8; 32],

    /// Compiled instructions (account references replaced with indices).
    pub compiled_instructions: Vec<CompiledInstruction>,
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the transaction's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index into `account_keys` for the program to invoke.
    pub program_id_index: u8,
    /// Indices into `account_keys` for each account the instruction reads/writes.
    pub account_indices: Vec<u8>,
    /// Opaque instruction data.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Transaction building
// ---------------------------------------------------------------------------

/// Build a transaction from a set of instructions with a single fee payer.
///
/// The fee payer is always the first signer and is placed at index 0 in the
/// account keys. All signature slots start out empty.
pub fn compile_transaction(
    instructions: &[SolInstruction],
    fee_payer: &Pubkey,
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    if instructions.is_empty() {
        return Err(SolError::TransactionBuildError(
            "transaction needs at least one instruction".into(),
        ));
    }

    // Instruction account lists are tiny, a Vec keeps insertion order for free.
    struct AccountEntry {
        pubkey: Pubkey,
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: Pubkey, signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    // Fee payer is always signer + writable.
    upsert(*fee_payer, true, true);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        // Program IDs are non-signer, read-only accounts.
        upsert(ix.program_id, false, false);
    }

    // Stable sort keeps insertion order inside each category, so the fee
    // payer (inserted first, writable signer) stays at index 0.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    if entries.len() > u8::MAX as usize {
        return Err(SolError::TransactionBuildError(format!(
            "too many accounts: {}",
            entries.len()
        )));
    }

    let num_signers = entries.iter().filter(|e| e.is_signer).count() as u8;
    let num_readonly_signed = entries
        .iter()
        .filter(|e| e.is_signer && !e.is_writable)
        .count() as u8;
    let num_readonly_unsigned = entries
        .iter()
        .filter(|e| !e.is_signer && !e.is_writable)
        .count() as u8;

    let account_keys: Vec<Pubkey> = entries.iter().map(|e| e.pubkey).collect();

    let index_of = |key: &Pubkey| -> Result<u8, SolError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| SolError::TransactionBuildError(format!("{key} not in account keys")))
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let program_id_index = index_of(&ix.program_id)?;
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey))
            .collect::<Result<Vec<u8>, SolError>>()?;

        compiled.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(SolTransaction {
        signatures: vec![Signature::default(); num_signers as usize],
        account_keys,
        num_required_signatures: num_signers,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the transaction message (the bytes that get signed).
pub fn serialize_message(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(256);

    // Header: 3 bytes.
    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&encode_compact_u16(compact_len(tx.account_keys.len())?));
    for key in &tx.account_keys {
        buf.extend_from_slice(key.as_bytes());
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(compact_len(
        tx.compiled_instructions.len(),
    )?));
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);

        buf.extend_from_slice(&encode_compact_u16(compact_len(ix.account_indices.len())?));
        buf.extend_from_slice(&ix.account_indices);

        buf.extend_from_slice(&encode_compact_u16(compact_len(ix.data.len())?));
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

fn compact_len(len: usize) -> Result<u16, SolError> {
    u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("length {len} exceeds compact-u16")))
}

impl SolTransaction {
    /// The transaction identifier: the fee payer's signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first().filter(|s| !s.is_unset())
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// The accounts that must sign, in slot order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn message_bytes(&self) -> Result<Vec<u8>, SolError> {
        serialize_message(self)
    }

    /// Sign with a local keypair, filling that key's slot.
    ///
    /// Fails if the keypair is not one of the required signers; a stray
    /// signature would be rejected by the network anyway.
    pub fn partial_sign(&mut self, keypair: &Keypair) -> Result<(), SolError> {
        let pubkey = keypair.pubkey();
        let slot = self.signer_slot(&pubkey)?;
        let message = self.message_bytes()?;
        self.signatures[slot] = keypair.sign_message(&message);
        Ok(())
    }

    /// Place an externally produced signature, verifying it first.
    pub fn add_signature(&mut self, pubkey: &Pubkey, signature: Signature) -> Result<(), SolError> {
        let slot = self.signer_slot(pubkey)?;
        let message = self.message_bytes()?;
        if !signature.verify(pubkey, &message) {
            return Err(SolError::SigningError(format!(
                "signature for {pubkey} does not verify against the message"
            )));
        }
        self.signatures[slot] = signature;
        Ok(())
    }

    /// Signers whose slot is empty or holds a signature that does not verify.
    pub fn missing_signers(&self) -> Result<Vec<Pubkey>, SolError> {
        let message = self.message_bytes()?;
        Ok(self
            .signer_keys()
            .iter()
            .zip(self.signatures.iter().chain(std::iter::repeat(&Signature::default())))
            .filter(|(key, sig)| sig.is_unset() || !sig.verify(key, &message))
            .map(|(key, _)| *key)
            .collect())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.len() == self.signer_keys().len()
            && self.missing_signers().map(|m| m.is_empty()).unwrap_or(false)
    }

    /// Whether the account at `index` may be written by this transaction.
    pub fn is_writable_index(&self, index: usize) -> bool {
        let num_signed = self.num_required_signatures as usize;
        if index < num_signed {
            index < num_signed - self.num_readonly_signed as usize
        } else {
            index < self.account_keys.len() - self.num_readonly_unsigned as usize
        }
    }

    /// Rebuild the instruction list from the compiled form.
    pub fn instructions(&self) -> Result<Vec<SolInstruction>, SolError> {
        let key_at = |index: u8| -> Result<Pubkey, SolError> {
            self.account_keys.get(index as usize).copied().ok_or_else(|| {
                SolError::SerializationError(format!("account index {index} out of range"))
            })
        };

        self.compiled_instructions
            .iter()
            .map(|cix| {
                let program_id = key_at(cix.program_id_index)?;
                let accounts = cix
                    .account_indices
                    .iter()
                    .map(|&i| {
                        Ok(SolAccountMeta {
                            pubkey: key_at(i)?,
                            is_signer: (i as usize) < self.num_required_signatures as usize,
                            is_writable: self.is_writable_index(i as usize),
                        })
                    })
                    .collect::<Result<Vec<_>, SolError>>()?;
                Ok(SolInstruction {
                    program_id,
                    accounts,
                    data: cix.data.clone(),
                })
            })
            .collect()
    }

    /// Serialize into the wire format accepted by `sendTransaction`.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, SolError> {
        let message = self.message_bytes()?;
        let mut wire = Vec::with_capacity(3 + 64 * self.signatures.len() + message.len());
        wire.extend_from_slice(&encode_compact_u16(compact_len(self.signatures.len())?));
        for sig in &self.signatures {
            wire.extend_from_slice(sig.as_bytes());
        }
        wire.extend_from_slice(&message);
        if wire.len() > PACKET_DATA_SIZE {
            return Err(SolError::TransactionBuildError(format!(
                "transaction is {} bytes, limit is {PACKET_DATA_SIZE}",
                wire.len()
            )));
        }
        Ok(wire)
    }

    /// Parse a wire-format transaction.
    pub fn from_wire_bytes(raw_tx: &[u8]) -> Result<Self, SolError> {
        let mut reader = Reader::new(raw_tx);

        let num_sigs = reader.compact_u16()? as usize;
        let mut signatures = Vec::with_capacity(num_sigs);
        for _ in 0..num_sigs {
            let mut sig = [0u8; 64];
            sig.copy_from_slice(reader.take(64)?);
            signatures.push(Signature::new(sig));
        }

        let header = reader.take(3)?;
        let (num_required_signatures, num_readonly_signed, num_readonly_unsigned) =
            (header[0], header[1], header[2]);

        let num_accounts = reader.compact_u16()? as usize;
        let mut account_keys = Vec::with_capacity(num_accounts);
        for _ in 0..num_accounts {
            account_keys.push(reader.pubkey()?);
        }

        let mut recent_blockhash = [0u8; 32];
        recent_blockhash.copy_from_slice(reader.take(32)?);

        let num_instructions = reader.compact_u16()? as usize;
        let mut compiled_instructions = Vec::with_capacity(num_instructions);
        for _ in 0..num_instructions {
            let program_id_index = reader.take(1)?[0];
            let n = reader.compact_u16()? as usize;
            let account_indices = reader.take(n)?.to_vec();
            let n = reader.compact_u16()? as usize;
            let data = reader.take(n)?.to_vec();
            compiled_instructions.push(CompiledInstruction {
                program_id_index,
                account_indices,
                data,
            });
        }

        if !reader.is_empty() {
            return Err(SolError::SerializationError(
                "trailing bytes after transaction message".into(),
            ));
        }
        if signatures.len() != num_required_signatures as usize {
            return Err(SolError::SerializationError(format!(
                "{} signatures for {} required signers",
                signatures.len(),
                num_required_signatures
            )));
        }
        if (num_required_signatures as usize) > account_keys.len()
            || (num_readonly_unsigned as usize)
                > account_keys.len() - num_required_signatures as usize
            || num_readonly_signed > num_required_signatures
        {
            return Err(SolError::SerializationError(
                "message header inconsistent with account keys".into(),
            ));
        }

        Ok(SolTransaction {
            signatures,
            account_keys,
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            recent_blockhash,
            compiled_instructions,
        })
    }

    fn signer_slot(&self, pubkey: &Pubkey) -> Result<usize, SolError> {
        let slot = self
            .signer_keys()
            .iter()
            .position(|k| k == pubkey)
            .ok_or_else(|| {
                SolError::SigningError(format!("{pubkey} is not a required signer"))
            })?;
        if self.signatures.len() != self.signer_keys().len() {
            return Err(SolError::SigningError(format!(
                "transaction has {} signature slots for {} signers",
                self.signatures.len(),
                self.signer_keys().len()
            )));
        }
        Ok(slot)
    }
}

/// Cursor over wire bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SolError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| SolError::SerializationError("transaction too short".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn compact_u16(&mut self) -> Result<u16, SolError> {
        let (value, consumed) = decode_compact_u16(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    fn pubkey(&mut self) -> Result<Pubkey, SolError> {
        let mut key = [0u8; 32];
        key.copy_from_slice(self.take(32)?);
        Ok(Pubkey::new(key))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}
