//! Submission and confirmation of signed plans.
//!
//! A plan is sent exactly once. Confirmation polling is read-only, so a
//! failed status query is logged and polled again until the deadline.

use std::sync::Arc;
use std::time::Duration;

use chain_sol::Signature;
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::ForgeConfig;
use crate::error::ForgeError;
use crate::rpc::{Commitment, LedgerRpc, RpcError, SendOptions};
use crate::signer::SignedPlan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub signature: Signature,
    pub slot: u64,
    /// The commitment the ledger reported when polling stopped.
    pub commitment: Commitment,
    pub finalized: bool,
}

/// Node error codes that refuse one particular transaction: preflight
/// failure, signature verification failure, signature count mismatch,
/// unsupported version and an undecodable payload. Any other error object
/// is about the node itself.
const TRANSACTION_REJECTED_CODES: [i64; 5] = [-32002, -32003, -32013, -32015, -32602];

/// A send that did not end with an accepted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub error: ForgeError,
    /// The node may have received the transaction regardless.
    pub in_flight: bool,
}

impl SendFailure {
    fn refused(error: ForgeError) -> Self {
        Self {
            error,
            in_flight: false,
        }
    }
}

impl From<SendFailure> for ForgeError {
    fn from(failure: SendFailure) -> Self {
        failure.error
    }
}

#[derive(Debug)]
pub struct Broadcaster<R: LedgerRpc> {
    rpc: Arc<R>,
    commitment: Commitment,
    send_options: SendOptions,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl<R: LedgerRpc> Broadcaster<R> {
    pub fn new(rpc: Arc<R>, config: &ForgeConfig) -> Self {
        Self {
            rpc,
            commitment: config.commitment,
            send_options: config.send_options(),
            confirm_timeout: config.confirm_timeout,
            poll_interval: config.poll_interval,
        }
    }

    /// Send and confirm.
    pub async fn submit(&self, signed: &SignedPlan) -> Result<SubmissionResult, ForgeError> {
        let signature = self.send(signed).await?;
        self.confirm(signed, signature).await
    }

    /// Hand the transaction to the node once. A node-side rejection (failed
    /// preflight, stale blockhash, bad signature) is `LedgerRejected`. A
    /// lost reply is resolved with one status lookup; if that is
    /// inconclusive the failure is marked in flight.
    #[instrument(skip_all, fields(label = signed.label()))]
    pub async fn send(&self, signed: &SignedPlan) -> Result<Signature, SendFailure> {
        let wire = signed.wire_bytes().map_err(SendFailure::refused)?;
        let expected = signed.signature();
        debug!(bytes = wire.len(), signature = %expected, "sending transaction");

        let returned = match self.rpc.send_transaction(&wire, &self.send_options).await {
            Ok(signature) => signature,
            Err(RpcError::Node { code, message }) if TRANSACTION_REJECTED_CODES.contains(&code) => {
                warn!(code, reason = %message, "transaction rejected");
                return Err(SendFailure::refused(ForgeError::LedgerRejected {
                    reason: message,
                }));
            }
            Err(e @ RpcError::Node { .. }) => {
                warn!(error = %e, "node refused the request");
                return Err(SendFailure::refused(ForgeError::NetworkError(e.to_string())));
            }
            Err(RpcError::InvalidResponse(reason)) => {
                // A result came back, so the node took the transaction.
                warn!(%reason, "unreadable send response, treating transaction as accepted");
                expected
            }
            Err(e @ RpcError::Transport(_)) => {
                warn!(error = %e, "send failed, looking the transaction up");
                return self.recover_lost_send(expected, e).await;
            }
        };

        if returned != expected {
            warn!(%returned, %expected, "node returned an unexpected signature");
        }
        Ok(expected)
    }

    async fn recover_lost_send(
        &self,
        signature: Signature,
        cause: RpcError,
    ) -> Result<Signature, SendFailure> {
        match self.rpc.get_signature_statuses(&[signature]).await {
            Ok(statuses) if statuses.first().is_some_and(Option::is_some) => {
                info!("transaction reached the ledger despite the send error");
                Ok(signature)
            }
            _ => Err(SendFailure {
                error: ForgeError::NetworkError(cause.to_string()),
                in_flight: true,
            }),
        }
    }

    /// Poll until `signature` reaches the configured commitment, its
    /// blockhash expires or `confirm_timeout` elapses.
    #[instrument(skip_all, fields(label = signed.label(), signature = %signature))]
    pub async fn confirm(
        &self,
        signed: &SignedPlan,
        signature: Signature,
    ) -> Result<SubmissionResult, ForgeError> {
        let start = Instant::now();
        let last_valid_block_height = signed.freshness().last_valid_block_height;

        loop {
            match self.rpc.get_signature_statuses(&[signature]).await {
                Ok(statuses) => match statuses.into_iter().next().flatten() {
                    Some(status) => {
                        if let Some(reason) = &status.err {
                            warn!(%reason, slot = status.slot, "transaction failed on-chain");
                            return Err(ForgeError::LedgerRejected {
                                reason: reason.clone(),
                            });
                        }
                        let reached = status.commitment();
                        if reached >= self.commitment {
                            info!(slot = status.slot, commitment = %reached, "transaction confirmed");
                            return Ok(SubmissionResult {
                                signature,
                                slot: status.slot,
                                commitment: reached,
                                finalized: reached == Commitment::Finalized,
                            });
                        }
                        debug!(commitment = %reached, "waiting for commitment");
                    }
                    None => self.check_expiry(signature, last_valid_block_height).await?,
                },
                Err(e) => warn!(error = %e, "status query failed"),
            }

            if start.elapsed() >= self.confirm_timeout {
                warn!(elapsed = ?start.elapsed(), "confirmation timed out");
                return Err(ForgeError::Timeout { signature });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn check_expiry(
        &self,
        signature: Signature,
        last_valid_block_height: u64,
    ) -> Result<(), ForgeError> {
        match self.rpc.get_block_height().await {
            Ok(height) if height > last_valid_block_height => {
                warn!(height, last_valid_block_height, "blockhash expired before landing");
                Err(ForgeError::Timeout { signature })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "block height query failed");
                Ok(())
            }
        }
    }
}
