//! Solana primitives for the token forge.
//!
//! This crate handles addresses, ephemeral keypairs, program-derived
//! addresses, the System / SPL Token / Associated Token Account instructions
//! needed to launch a token, and the compact transaction wire format, all
//! without pulling in `solana-sdk` (which drags in tokio and 200+ transitive
//! dependencies).
//!
//! Instead we implement Solana's compact binary wire format by hand, using
//! `ed25519-dalek` for Ed25519 signing and `bs58` for Base58 encoding.

pub mod address;
pub mod error;
pub mod keypair;
pub mod pda;
pub mod spl_token;
pub mod system_program;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, bytes_to_address, validate_address, Pubkey};
pub use error::SolError;
pub use keypair::Keypair;
pub use pda::{create_program_address, find_program_address, is_on_curve};
pub use spl_token::{
    create_associated_token_account, create_associated_token_account_idempotent,
    derive_associated_token_address, initialize_mint, mint_to, set_authority, AuthorityType,
    TokenInstruction, ACCOUNT_LEN, ASSOCIATED_TOKEN_PROGRAM_ID, MAX_DECIMALS, MINT_LEN,
    RENT_SYSVAR_ID, TOKEN_PROGRAM_ID,
};
pub use system_program::{create_account, SYSTEM_PROGRAM_ID};
pub use transaction::{
    compile_transaction, decode_compact_u16, encode_compact_u16, serialize_message,
    CompiledInstruction, Signature, SolAccountMeta, SolInstruction, SolTransaction,
    PACKET_DATA_SIZE,
};
