//! System Program instructions.

use crate::address::Pubkey;
use crate::error::SolError;
use crate::transaction::{SolAccountMeta, SolInstruction};

/// The Solana System Program public key: 32 zero bytes.
/// Base58: `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

/// System Program `CreateAccount` instruction index (little-endian u32).
const SYSTEM_CREATE_ACCOUNT_IX_INDEX: u32 = 0;

/// Build a System Program `CreateAccount` instruction.
///
/// Allocates `space` bytes for `new_account`, funds it with `lamports` from
/// `payer` and assigns it to `owner`. Both `payer` and `new_account` must
/// sign the enclosing transaction.
///
/// # Wire format
///
/// u32 LE index (0) + u64 LE lamports + u64 LE space + 32-byte owner.
/// Total data: 52 bytes.
pub fn create_account(
    payer: &Pubkey,
    new_account: &Pubkey,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Result<SolInstruction, SolError> {
    if payer == new_account {
        return Err(SolError::InvalidInstruction(
            "payer and new account must differ".into(),
        ));
    }
    if space == 0 {
        return Err(SolError::InvalidInstruction(
            "account space must be > 0".into(),
        ));
    }

    let mut data = Vec::with_capacity(52);
    data.extend_from_slice(&SYSTEM_CREATE_ACCOUNT_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner.as_bytes());

    Ok(SolInstruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable_signer(*payer),
            SolAccountMeta::writable_signer(*new_account),
        ],
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYER: Pubkey = Pubkey::new([1u8; 32]);
    const NEW: Pubkey = Pubkey::new([2u8; 32]);
    const OWNER: Pubkey = Pubkey::new([3u8; 32]);

    #[test]
    fn create_account_data_layout() {
        let ix = create_account(&PAYER, &NEW, 1_461_600, 82, &OWNER).unwrap();

        assert_eq!(ix.data.len(), 52);
        assert_eq!(&ix.data[..4], &[0, 0, 0, 0]);
        assert_eq!(&ix.data[4..12], &1_461_600u64.to_le_bytes());
        assert_eq!(&ix.data[12..20], &82u64.to_le_bytes());
        assert_eq!(&ix.data[20..], OWNER.as_bytes());
    }

    #[test]
    fn create_account_both_accounts_sign() {
        let ix = create_account(&PAYER, &NEW, 1, 82, &OWNER).unwrap();

        assert_eq!(ix.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 2);
        for (meta, key) in ix.accounts.iter().zip([PAYER, NEW]) {
            assert_eq!(meta.pubkey, key);
            assert!(meta.is_signer);
            assert!(meta.is_writable);
        }
    }

    #[test]
    fn create_account_rejects_self_funding() {
        assert!(create_account(&PAYER, &PAYER, 1, 82, &OWNER).is_err());
    }

    #[test]
    fn create_account_rejects_zero_space() {
        assert!(create_account(&PAYER, &NEW, 1, 0, &OWNER).is_err());
    }
}
