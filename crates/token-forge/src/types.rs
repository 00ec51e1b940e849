use chain_sol::{Pubkey, Signature};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorKind, ForgeError};

/// What the user asks for. `decimals` is kept as entered and parsed by the
/// orchestrator so that bad text surfaces as `InvalidInput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInput {
    pub name: String,
    pub symbol: String,
    pub decimals: String,
    pub revoke_freeze: bool,
}

impl TokenInput {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: impl Into<String>,
        revoke_freeze: bool,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: decimals.into(),
            revoke_freeze,
        }
    }
}

/// A recent blockhash plus the last block height at which a transaction
/// referencing it is still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessToken {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

impl FreshnessToken {
    pub fn blockhash_base58(&self) -> String {
        chain_sol::bytes_to_address(&self.blockhash)
    }
}

/// Everything a finished launch produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenCreationResult {
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub initial_supply: u64,
    pub mint_authority: Pubkey,
    /// `None` once revoked.
    pub freeze_authority: Option<Pubkey>,
    pub signatures: Vec<Signature>,
}

/// How far a launch got before it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreationProgress {
    pub mint: Option<Pubkey>,
    pub token_account: Option<Pubkey>,
    /// Signatures of every transaction the ledger accepted for processing.
    pub submitted: Vec<Signature>,
    /// A transaction that was sent but whose delivery could not be
    /// established. It may still land.
    pub in_flight: Option<Signature>,
    pub failed_stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct CreationFailure {
    pub error: ForgeError,
    pub progress: CreationProgress,
}

impl CreationFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Safe to run the whole launch again only when the failure was a
    /// transport problem and no transaction can have reached the ledger.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self.error, ForgeError::NetworkError(_))
            && self.progress.submitted.is_empty()
            && self.progress.in_flight.is_none()
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.error.to_string(),
            retry_safe: self.is_retry_safe(),
            progress: self.progress.clone(),
        }
    }
}

/// Serializable failure summary for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_safe: bool,
    pub progress: CreationProgress,
}
