//! Program Derived Address (PDA) derivation.
//!
//! A PDA is `SHA-256(seed_0 || ... || seed_n || bump || program_id ||
//! "ProgramDerivedAddress")`, accepted only if the hash is NOT a valid
//! Ed25519 point (so no private key can exist for it). Any deviation from
//! this layout yields addresses the on-chain programs will not recognize.

use sha2::{Digest, Sha256};

use crate::address::Pubkey;
use crate::error::SolError;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

pub const MAX_SEEDS: usize = 16;
pub const MAX_SEED_LEN: usize = 32;

/// Find a valid PDA for the given seeds and program.
///
/// Iterates bump seeds from 255 down to 0 and returns the first off-curve
/// result together with its bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), SolError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(SolError::InvalidAddress(format!(
            "at most {} seeds allowed alongside the bump, got {}",
            MAX_SEEDS - 1,
            seeds.len()
        )));
    }

    for bump in (0u8..=255).rev() {
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        let bump_seed = [bump];
        with_bump.push(&bump_seed);
        if let Ok(address) = create_program_address(&with_bump, program_id) {
            return Ok((address, bump));
        }
    }

    Err(SolError::InvalidAddress(
        "could not find valid PDA bump seed".into(),
    ))
}

/// Create a PDA from a complete seed list (bump included).
///
/// Fails if a seed is too long or if the hash lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey, SolError> {
    if seeds.len() > MAX_SEEDS {
        return Err(SolError::InvalidAddress(format!(
            "at most {MAX_SEEDS} seeds allowed, got {}",
            seeds.len()
        )));
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        if seed.len() > MAX_SEED_LEN {
            return Err(SolError::InvalidAddress(format!(
                "seed longer than {MAX_SEED_LEN} bytes"
            )));
        }
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return Err(SolError::InvalidAddress(
            "derived address is on the ed25519 curve".into(),
        ));
    }

    Ok(Pubkey::new(hash))
}

/// Check if 32 bytes represent a valid Ed25519 curve point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
