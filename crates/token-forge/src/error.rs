use std::fmt;

use chain_sol::{Pubkey, Signature, SolError};
use serde::Serialize;
use thiserror::Error;

use crate::rpc::RpcError;

/// Every way a token launch can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient funds: {required} lamports required, {available} available")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Signature request rejected by the user")]
    UserRejected,

    #[error("Incomplete signatures, missing: {}", KeyList(.missing))]
    IncompleteSignatures { missing: Vec<Pubkey> },

    #[error("Ledger rejected transaction: {reason}")]
    LedgerRejected { reason: String },

    #[error("Confirmation timed out for {signature}")]
    Timeout { signature: Signature },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Transaction plan has no instructions")]
    EmptyPlan,
}

/// Flat discriminant of [`ForgeError`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotConnected,
    InvalidInput,
    InsufficientFunds,
    UserRejected,
    IncompleteSignatures,
    LedgerRejected,
    Timeout,
    NetworkError,
    EmptyPlan,
}

impl ForgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::NotConnected => ErrorKind::NotConnected,
            ForgeError::InvalidInput(_) => ErrorKind::InvalidInput,
            ForgeError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ForgeError::UserRejected => ErrorKind::UserRejected,
            ForgeError::IncompleteSignatures { .. } => ErrorKind::IncompleteSignatures,
            ForgeError::LedgerRejected { .. } => ErrorKind::LedgerRejected,
            ForgeError::Timeout { .. } => ErrorKind::Timeout,
            ForgeError::NetworkError(_) => ErrorKind::NetworkError,
            ForgeError::EmptyPlan => ErrorKind::EmptyPlan,
        }
    }
}

impl From<SolError> for ForgeError {
    fn from(e: SolError) -> Self {
        ForgeError::InvalidInput(e.to_string())
    }
}

impl From<RpcError> for ForgeError {
    fn from(e: RpcError) -> Self {
        ForgeError::NetworkError(e.to_string())
    }
}

struct KeyList<'a>(&'a [Pubkey]);

impl fmt::Display for KeyList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
