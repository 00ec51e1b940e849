//! Ed25519 keypairs.
//!
//! A new mint account must co-sign the transaction that creates it, so every
//! token launch generates a throwaway keypair whose public key becomes the
//! mint address. The secret half never leaves memory and is wiped on drop
//! (ed25519-dalek zeroizes `SigningKey` when its `zeroize` feature is on).

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::address::Pubkey;
use crate::error::SolError;
use crate::transaction::Signature;

pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the operating system RNG.
    ///
    /// Collisions in a 256-bit key space are not a practical concern, so no
    /// uniqueness check is performed against the ledger.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut seed = *seed;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Parse the 64-byte `secret || public` layout used by Solana CLI
    /// keypair files.
    ///
    /// The trailing public key must match the one derived from the secret,
    /// otherwise the file is corrupt and signing would produce signatures
    /// for an unexpected address.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        if bytes.len() != 64 {
            return Err(SolError::InvalidPrivateKey(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let keypair = Self::from_seed(&seed);
        seed.zeroize();

        if keypair.pubkey().as_bytes()[..] != bytes[32..] {
            return Err(SolError::InvalidPrivateKey(
                "public key does not match secret key".into(),
            ));
        }

        Ok(keypair)
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign an arbitrary message (for transactions: the serialized message).
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
