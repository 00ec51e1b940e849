use std::fmt::{self, Debug};
use std::str::FromStr;

use async_trait::async_trait;
use chain_sol::{Pubkey, Signature};
use serde::{Deserialize, Serialize};

use crate::rpc::errors::RpcError;
use crate::types::FreshnessToken;

/// How settled a transaction is. Ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level: {other}")),
        }
    }
}

/// Options forwarded with `sendTransaction`. Encoding is always base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: Commitment,
    /// Node-side rebroadcast attempts. `None` leaves the node default.
    pub max_retries: Option<usize>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
            max_retries: None,
        }
    }
}

/// One entry of a `getSignatureStatuses` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<usize>,
    /// Execution error rendered as text; `None` when the transaction succeeded.
    pub err: Option<String>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// The commitment this status proves. Nodes that omit
    /// `confirmationStatus` report rooted transactions with `confirmations: null`.
    pub fn commitment(&self) -> Commitment {
        match (self.confirmation_status, self.confirmations) {
            (Some(status), _) => status,
            (None, None) => Commitment::Finalized,
            (None, Some(_)) => Commitment::Confirmed,
        }
    }

    pub fn satisfies(&self, target: Commitment) -> bool {
        self.commitment() >= target
    }
}

/// The slice of the Solana JSON-RPC surface a token launch needs.
#[async_trait]
pub trait LedgerRpc: Send + Sync + Debug + 'static {
    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64) -> Result<u64, RpcError>;

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, RpcError>;

    async fn get_latest_blockhash(&self) -> Result<FreshnessToken, RpcError>;

    /// Submit a serialized, fully signed transaction. Returns the signature
    /// the node assigned to it.
    async fn send_transaction(
        &self,
        wire_transaction: &[u8],
        options: &SendOptions,
    ) -> Result<Signature, RpcError>;

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError>;

    async fn get_block_height(&self) -> Result<u64, RpcError>;
}
