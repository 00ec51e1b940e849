//! Transaction assembly.
//!
//! A plan is one ledger transaction in the making: an ordered instruction
//! list, the fee payer and the freshness token it was compiled against.
//! Its signature slots are filled by [`crate::signer::DualSigner`].

use chain_sol::{compile_transaction, Pubkey, SolInstruction, SolTransaction};

use crate::error::ForgeError;
use crate::types::FreshnessToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    label: String,
    instructions: Vec<SolInstruction>,
    fee_payer: Pubkey,
    freshness: FreshnessToken,
    transaction: SolTransaction,
}

/// Compile `instructions` into an unsigned transaction paid for by `fee_payer`.
pub fn assemble(
    label: impl Into<String>,
    instructions: Vec<SolInstruction>,
    fee_payer: &Pubkey,
    freshness: FreshnessToken,
) -> Result<TransactionPlan, ForgeError> {
    if instructions.is_empty() {
        return Err(ForgeError::EmptyPlan);
    }

    let transaction = compile_transaction(&instructions, fee_payer, &freshness.blockhash)?;
    // Empty signature slots occupy their full width, so the size is final.
    transaction.to_wire_bytes()?;

    Ok(TransactionPlan {
        label: label.into(),
        instructions,
        fee_payer: *fee_payer,
        freshness,
        transaction,
    })
}

impl TransactionPlan {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn instructions(&self) -> &[SolInstruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn freshness(&self) -> &FreshnessToken {
        &self.freshness
    }

    /// Keys that must sign, fee payer first.
    pub fn required_signers(&self) -> &[Pubkey] {
        self.transaction.signer_keys()
    }

    pub fn message_bytes(&self) -> Result<Vec<u8>, ForgeError> {
        Ok(self.transaction.message_bytes()?)
    }

    pub fn transaction(&self) -> &SolTransaction {
        &self.transaction
    }

    pub(crate) fn transaction_mut(&mut self) -> &mut SolTransaction {
        &mut self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::{
        create_account, initialize_mint, Keypair, SolAccountMeta, PACKET_DATA_SIZE,
        TOKEN_PROGRAM_ID,
    };

    fn freshness() -> FreshnessToken {
        FreshnessToken {
            blockhash: [0xAB; 32],
            last_valid_block_height: 300,
        }
    }

    #[test]
    fn empty_plan_is_rejected() {
        let payer = Pubkey::new([1u8; 32]);
        let err = assemble("nothing", vec![], &payer, freshness()).unwrap_err();
        assert_eq!(err, ForgeError::EmptyPlan);
    }

    #[test]
    fn fee_payer_is_first_required_signer() {
        let payer = Keypair::from_seed(&[1u8; 32]).pubkey();
        let mint = Keypair::from_seed(&[2u8; 32]).pubkey();
        let instructions = vec![
            create_account(&payer, &mint, 1_461_600, 82, &TOKEN_PROGRAM_ID).unwrap(),
            initialize_mint(&mint, 6, &payer, Some(&payer)).unwrap(),
        ];

        let plan = assemble("create-mint", instructions.clone(), &payer, freshness()).unwrap();

        assert_eq!(plan.label(), "create-mint");
        assert_eq!(plan.required_signers(), &[payer, mint]);
        assert_eq!(plan.instructions(), instructions.as_slice());
        assert_eq!(plan.transaction().recent_blockhash, [0xAB; 32]);
        assert_eq!(plan.freshness().last_valid_block_height, 300);
    }

    #[test]
    fn message_bytes_match_compiled_transaction() {
        let payer = Keypair::from_seed(&[1u8; 32]).pubkey();
        let mint = Keypair::from_seed(&[2u8; 32]).pubkey();
        let plan = assemble(
            "init",
            vec![initialize_mint(&mint, 0, &payer, None).unwrap()],
            &payer,
            freshness(),
        )
        .unwrap();

        assert_eq!(
            plan.message_bytes().unwrap(),
            plan.transaction().message_bytes().unwrap()
        );
        // Only the fee payer signs: initialize-mint needs no signature.
        assert_eq!(plan.required_signers(), &[payer]);
    }

    #[test]
    fn plan_over_packet_size_is_rejected_before_signing() {
        let payer = Keypair::from_seed(&[1u8; 32]).pubkey();
        let ix = SolInstruction {
            program_id: TOKEN_PROGRAM_ID,
            accounts: vec![SolAccountMeta::writable(Pubkey::new([3u8; 32]))],
            data: vec![7u8; PACKET_DATA_SIZE],
        };

        let err = assemble("huge", vec![ix], &payer, freshness()).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidInput(_)), "{err}");
    }
}
