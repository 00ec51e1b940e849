//! Signing: local ephemeral keys first, then the external wallet.

use std::path::Path;

use async_trait::async_trait;
use chain_sol::{Keypair, Pubkey, Signature, SolTransaction};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::ForgeError;
use crate::plan::TransactionPlan;
use crate::types::FreshnessToken;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Request rejected by the user")]
    Rejected,

    #[error("Wallet failed to sign: {0}")]
    SigningFailed(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),
}

/// An external signer that holds the user's key and may take arbitrarily
/// long to answer (hardware device, browser extension, human approval).
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn public_key(&self) -> Option<Pubkey>;

    fn is_connected(&self) -> bool {
        self.public_key().is_some()
    }

    /// Return `transaction` with the wallet's slot filled. Other slots must
    /// be left as they were.
    async fn sign_transaction(
        &self,
        transaction: SolTransaction,
    ) -> Result<SolTransaction, WalletError>;
}

/// A wallet backed by a Solana CLI keypair file (JSON array of 64 bytes).
#[derive(Debug)]
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(json).map_err(|e| WalletError::InvalidKeypair(e.to_string()))?,
        );
        let keypair =
            Keypair::from_bytes(&bytes).map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;
        Ok(Self { keypair })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let json = Zeroizing::new(
            std::fs::read_to_string(path)
                .map_err(|e| WalletError::InvalidKeypair(format!("{}: {e}", path.display())))?,
        );
        Self::from_json(&json)
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(
        &self,
        mut transaction: SolTransaction,
    ) -> Result<SolTransaction, WalletError> {
        transaction
            .partial_sign(&self.keypair)
            .map_err(|e| WalletError::SigningFailed(e.to_string()))?;
        Ok(transaction)
    }
}

/// A plan whose every signature slot holds a valid signature. Only the
/// [`DualSigner`] can produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPlan {
    plan: TransactionPlan,
}

impl SignedPlan {
    pub fn plan(&self) -> &TransactionPlan {
        &self.plan
    }

    pub fn label(&self) -> &str {
        self.plan.label()
    }

    pub fn freshness(&self) -> &FreshnessToken {
        self.plan.freshness()
    }

    /// The transaction id: the fee payer's signature.
    pub fn signature(&self) -> Signature {
        self.plan
            .transaction()
            .signatures
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn wire_bytes(&self) -> Result<Vec<u8>, ForgeError> {
        Ok(self.plan.transaction().to_wire_bytes()?)
    }
}

pub struct DualSigner;

impl DualSigner {
    /// Fill every signature slot of `plan`: `local_keys` first, then the
    /// wallet. Signatures coming back from the wallet are only kept if they
    /// verify against the message as it was before the wallet saw it.
    pub async fn sign(
        mut plan: TransactionPlan,
        local_keys: &[&Keypair],
        wallet: &dyn WalletSigner,
    ) -> Result<SignedPlan, ForgeError> {
        for key in local_keys {
            plan.transaction_mut().partial_sign(key)?;
        }

        let wallet_key = match wallet.public_key() {
            Some(key) if wallet.is_connected() => key,
            _ => return Err(ForgeError::NotConnected),
        };

        let message = plan.message_bytes()?;
        debug!(
            label = plan.label(),
            signers = plan.required_signers().len(),
            "requesting wallet signature"
        );

        let returned = wallet
            .sign_transaction(plan.transaction().clone())
            .await
            .map_err(|e| match e {
                WalletError::NotConnected => ForgeError::NotConnected,
                WalletError::Rejected => ForgeError::UserRejected,
                other => {
                    warn!(error = %other, "wallet failed to sign");
                    ForgeError::IncompleteSignatures {
                        missing: vec![wallet_key],
                    }
                }
            })?;

        let transaction = plan.transaction_mut();
        let signers = transaction.signer_keys().to_vec();
        for (slot, key) in signers.iter().enumerate() {
            if !transaction.signatures[slot].is_unset() {
                continue;
            }
            let Some(candidate) = returned
                .signer_keys()
                .iter()
                .position(|k| k == key)
                .and_then(|i| returned.signatures.get(i))
            else {
                continue;
            };
            if !candidate.is_unset() && candidate.verify(key, &message) {
                transaction.signatures[slot] = *candidate;
            }
        }

        let missing = transaction.missing_signers()?;
        if !missing.is_empty() {
            warn!(label = plan.label(), missing = missing.len(), "plan not fully signed");
            return Err(ForgeError::IncompleteSignatures { missing });
        }

        Ok(SignedPlan { plan })
    }
}
