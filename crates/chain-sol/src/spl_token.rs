//! SPL Token and Associated Token Account instructions.
//!
//! Implements the subset of the SPL Token program needed to launch a token
//! (initialize a mint, mint the initial supply, change authorities) plus
//! associated token account (ATA) derivation and creation, without pulling
//! in the `solana-sdk` or the `spl-token` crates.

use std::fmt;

use crate::address::Pubkey;
use crate::error::SolError;
use crate::pda::find_program_address;
use crate::system_program::SYSTEM_PROGRAM_ID;
use crate::transaction::{SolAccountMeta, SolInstruction};

// ---------------------------------------------------------------------------
// Well-known program IDs and sizes
// ---------------------------------------------------------------------------

/// SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e, 0x0d,
    0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8, 0xdb, 0xe9,
    0xf8, 0x59,
]);

/// Rent sysvar: `SysvarRent111111111111111111111111111111111`
pub const RENT_SYSVAR_ID: Pubkey = Pubkey::new([
    0x06, 0xa7, 0xd5, 0x17, 0x19, 0x2c, 0x5c, 0x51, 0x21, 0x8c, 0xc9, 0x4c, 0x3d, 0x4a, 0xf1,
    0x7f, 0x58, 0xda, 0xee, 0x08, 0x9b, 0xa1, 0xfd, 0x44, 0xe3, 0xdb, 0xd9, 0x8a, 0x00, 0x00,
    0x00, 0x00,
]);

/// Size of a packed `Mint` account.
pub const MINT_LEN: u64 = 82;

/// Size of a packed token `Account`.
pub const ACCOUNT_LEN: u64 = 165;

/// Largest decimal precision accepted for new mints.
pub const MAX_DECIMALS: u8 = 9;

// Instruction tags of the SPL Token program.
const INITIALIZE_MINT_TAG: u8 = 0;
const SET_AUTHORITY_TAG: u8 = 6;
const MINT_TO_TAG: u8 = 7;

// Instruction tags of the Associated Token Account program.
const ATA_CREATE_TAG: u8 = 0;
const ATA_CREATE_IDEMPOTENT_TAG: u8 = 1;

// ---------------------------------------------------------------------------
// Authority types
// ---------------------------------------------------------------------------

/// Which authority a `SetAuthority` instruction changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthorityType {
    MintTokens = 0,
    FreezeAccount = 1,
    AccountOwner = 2,
    CloseAccount = 3,
}

impl TryFrom<u8> for AuthorityType {
    type Error = SolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AuthorityType::MintTokens),
            1 => Ok(AuthorityType::FreezeAccount),
            2 => Ok(AuthorityType::AccountOwner),
            3 => Ok(AuthorityType::CloseAccount),
            other => Err(SolError::InvalidInstruction(format!(
                "unknown authority type {other}"
            ))),
        }
    }
}

impl fmt::Display for AuthorityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityType::MintTokens => write!(f, "mint tokens"),
            AuthorityType::FreezeAccount => write!(f, "freeze account"),
            AuthorityType::AccountOwner => write!(f, "account owner"),
            AuthorityType::CloseAccount => write!(f, "close account"),
        }
    }
}

// ---------------------------------------------------------------------------
// Instruction data packing
// ---------------------------------------------------------------------------

/// The SPL Token instructions this crate knows how to pack and unpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInstruction {
    InitializeMint {
        decimals: u8,
        mint_authority: Pubkey,
        freeze_authority: Option<Pubkey>,
    },
    SetAuthority {
        authority_type: AuthorityType,
        new_authority: Option<Pubkey>,
    },
    MintTo {
        amount: u64,
    },
}

impl TokenInstruction {
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(67);
        match self {
            TokenInstruction::InitializeMint {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                buf.push(INITIALIZE_MINT_TAG);
                buf.push(*decimals);
                buf.extend_from_slice(mint_authority.as_bytes());
                pack_pubkey_option(freeze_authority.as_ref(), &mut buf);
            }
            TokenInstruction::SetAuthority {
                authority_type,
                new_authority,
            } => {
                buf.push(SET_AUTHORITY_TAG);
                buf.push(*authority_type as u8);
                pack_pubkey_option(new_authority.as_ref(), &mut buf);
            }
            TokenInstruction::MintTo { amount } => {
                buf.push(MINT_TO_TAG);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
        }
        buf
    }

    pub fn unpack(data: &[u8]) -> Result<Self, SolError> {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| SolError::InvalidInstruction("empty instruction data".into()))?;

        let instruction = match tag {
            INITIALIZE_MINT_TAG => {
                let (&decimals, rest) = rest
                    .split_first()
                    .ok_or_else(|| SolError::InvalidInstruction("missing decimals".into()))?;
                let (mint_authority, rest) = unpack_pubkey(rest)?;
                let (freeze_authority, rest) = unpack_pubkey_option(rest)?;
                ensure_consumed(rest)?;
                TokenInstruction::InitializeMint {
                    decimals,
                    mint_authority,
                    freeze_authority,
                }
            }
            SET_AUTHORITY_TAG => {
                let (&authority_type, rest) = rest.split_first().ok_or_else(|| {
                    SolError::InvalidInstruction("missing authority type".into())
                })?;
                let (new_authority, rest) = unpack_pubkey_option(rest)?;
                ensure_consumed(rest)?;
                TokenInstruction::SetAuthority {
                    authority_type: AuthorityType::try_from(authority_type)?,
                    new_authority,
                }
            }
            MINT_TO_TAG => {
                let amount: [u8; 8] = rest.try_into().map_err(|_| {
                    SolError::InvalidInstruction("MintTo expects an 8-byte amount".into())
                })?;
                TokenInstruction::MintTo {
                    amount: u64::from_le_bytes(amount),
                }
            }
            other => {
                return Err(SolError::InvalidInstruction(format!(
                    "unsupported token instruction tag {other}"
                )))
            }
        };

        Ok(instruction)
    }
}

/// `COption<Pubkey>`: 0 for none, 1 followed by the key for some.
fn pack_pubkey_option(value: Option<&Pubkey>, buf: &mut Vec<u8>) {
    match value {
        Some(key) => {
            buf.push(1);
            buf.extend_from_slice(key.as_bytes());
        }
        None => buf.push(0),
    }
}

fn unpack_pubkey(data: &[u8]) -> Result<(Pubkey, &[u8]), SolError> {
    if data.len() < 32 {
        return Err(SolError::InvalidInstruction("truncated pubkey".into()));
    }
    let (key, rest) = data.split_at(32);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(key);
    Ok((Pubkey::new(bytes), rest))
}

fn unpack_pubkey_option(data: &[u8]) -> Result<(Option<Pubkey>, &[u8]), SolError> {
    match data.split_first() {
        Some((0, rest)) => Ok((None, rest)),
        Some((1, rest)) => unpack_pubkey(rest).map(|(key, rest)| (Some(key), rest)),
        _ => Err(SolError::InvalidInstruction(
            "malformed optional pubkey".into(),
        )),
    }
}

fn ensure_consumed(rest: &[u8]) -> Result<(), SolError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(SolError::InvalidInstruction(format!(
            "{} trailing bytes in instruction data",
            rest.len()
        )))
    }
}

// ---------------------------------------------------------------------------
// SPL Token instructions
// ---------------------------------------------------------------------------

/// Build an `InitializeMint` instruction.
///
/// The mint account must already exist (allocated with [`MINT_LEN`] bytes
/// and owned by the token program) in the same or an earlier transaction.
pub fn initialize_mint(
    mint: &Pubkey,
    decimals: u8,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
) -> Result<SolInstruction, SolError> {
    if decimals > MAX_DECIMALS {
        return Err(SolError::InvalidInstruction(format!(
            "decimals must be <= {MAX_DECIMALS}, got {decimals}"
        )));
    }
    if mint == mint_authority {
        return Err(SolError::InvalidInstruction(
            "mint cannot be its own mint authority".into(),
        ));
    }

    let data = TokenInstruction::InitializeMint {
        decimals,
        mint_authority: *mint_authority,
        freeze_authority: freeze_authority.copied(),
    }
    .pack();

    Ok(SolInstruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*mint),
            SolAccountMeta::readonly(RENT_SYSVAR_ID),
        ],
        data,
    })
}

/// Build a `MintTo` instruction.
///
/// `amount` is in base units: for a token with 6 decimals,
/// `amount = 1_000_000` mints 1 whole token.
pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<SolInstruction, SolError> {
    if amount == 0 {
        return Err(SolError::InvalidInstruction(
            "mint amount must be > 0".into(),
        ));
    }
    if mint == destination {
        return Err(SolError::InvalidInstruction(
            "destination must be a token account, not the mint".into(),
        ));
    }

    Ok(SolInstruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*mint),
            SolAccountMeta::writable(*destination),
            SolAccountMeta::readonly_signer(*authority),
        ],
        data: TokenInstruction::MintTo { amount }.pack(),
    })
}

/// Build a `SetAuthority` instruction. `None` revokes the authority for good.
pub fn set_authority(
    account: &Pubkey,
    current_authority: &Pubkey,
    authority_type: AuthorityType,
    new_authority: Option<&Pubkey>,
) -> Result<SolInstruction, SolError> {
    if new_authority == Some(current_authority) {
        return Err(SolError::InvalidInstruction(format!(
            "new {authority_type} authority equals the current one"
        )));
    }

    Ok(SolInstruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable(*account),
            SolAccountMeta::readonly_signer(*current_authority),
        ],
        data: TokenInstruction::SetAuthority {
            authority_type,
            new_authority: new_authority.copied(),
        }
        .pack(),
    })
}

// ---------------------------------------------------------------------------
// Associated Token Account (PDA) derivation and creation
// ---------------------------------------------------------------------------

/// Derive the associated token account address for a wallet + mint pair.
///
/// The ATA is a Program Derived Address (PDA) with seeds:
///   `[wallet_address, token_program_id, mint_address]`
/// derived from the Associated Token Account program.
pub fn derive_associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey, SolError> {
    find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Build an Associated Token Account `Create` instruction.
///
/// Fails on-chain if the account already exists. `associated` must be the
/// canonical derivation for (`owner`, `mint`); anything else is rejected
/// here since the ATA program would refuse it anyway.
pub fn create_associated_token_account(
    payer: &Pubkey,
    associated: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<SolInstruction, SolError> {
    build_create_ata(payer, associated, owner, mint, ATA_CREATE_TAG)
}

/// Like [`create_associated_token_account`] but succeeds if the account
/// already exists.
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    associated: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<SolInstruction, SolError> {
    build_create_ata(payer, associated, owner, mint, ATA_CREATE_IDEMPOTENT_TAG)
}

fn build_create_ata(
    payer: &Pubkey,
    associated: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    tag: u8,
) -> Result<SolInstruction, SolError> {
    let expected = derive_associated_token_address(owner, mint)?;
    if *associated != expected {
        return Err(SolError::InvalidInstruction(format!(
            "{associated} is not the associated token account of {owner} for mint {mint}"
        )));
    }

    Ok(SolInstruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable_signer(*payer),
            SolAccountMeta::writable(*associated),
            SolAccountMeta::readonly(*owner),
            SolAccountMeta::readonly(*mint),
            SolAccountMeta::readonly(SYSTEM_PROGRAM_ID),
            SolAccountMeta::readonly(TOKEN_PROGRAM_ID),
        ],
        data: vec![tag],
    })
}
