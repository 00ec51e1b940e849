//! The token launch workflow.
//!
//! ```text
//! preconditions ─► derive mint + token account ─► build instructions
//!                                                        │
//!        ┌───────────────── per plan ◄──────────────────┘
//!        ▼
//!   fresh blockhash ─► assemble ─► local sign ─► wallet sign ─► send ─► confirm
//! ```
//!
//! Nothing is ever resubmitted. Whatever fails, the caller gets the error
//! plus the progress made so far and decides what to do.

use std::sync::Arc;

use chain_sol::{
    create_account, create_associated_token_account, derive_associated_token_address,
    initialize_mint, mint_to, set_authority, AuthorityType, Keypair, Pubkey, SolInstruction,
    ACCOUNT_LEN, MAX_DECIMALS, MINT_LEN, TOKEN_PROGRAM_ID,
};
use tracing::{error, info, instrument, warn};

use crate::broadcast::Broadcaster;
use crate::config::{ForgeConfig, Sequencing};
use crate::error::ForgeError;
use crate::plan::assemble;
use crate::rpc::LedgerRpc;
use crate::signer::{DualSigner, WalletSigner};
use crate::types::{CreationFailure, CreationProgress, TokenCreationResult, TokenInput};

pub const STAGE_PRECONDITIONS: &str = "preconditions";
pub const STAGE_CREATE_TOKEN: &str = "create-token";
pub const STAGE_CREATE_MINT: &str = "create-mint";
pub const STAGE_MINT_SUPPLY: &str = "mint-supply";

#[derive(Debug)]
pub struct TokenForge<R: LedgerRpc> {
    rpc: Arc<R>,
    config: ForgeConfig,
    broadcaster: Broadcaster<R>,
}

/// One transaction to land: its instructions and whether the mint key co-signs.
struct Stage {
    label: &'static str,
    instructions: Vec<SolInstruction>,
    mint_signs: bool,
}

struct Validated {
    owner: Pubkey,
    name: String,
    symbol: String,
    decimals: u8,
}

impl<R: LedgerRpc> TokenForge<R> {
    pub fn new(rpc: Arc<R>, config: ForgeConfig) -> Self {
        let broadcaster = Broadcaster::new(rpc.clone(), &config);
        Self {
            rpc,
            config,
            broadcaster,
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Launch a new token owned by `wallet`.
    #[instrument(skip_all, fields(name = %input.name, symbol = %input.symbol))]
    pub async fn create_token(
        &self,
        input: &TokenInput,
        wallet: &dyn WalletSigner,
    ) -> Result<TokenCreationResult, CreationFailure> {
        let mut progress = CreationProgress {
            failed_stage: Some(STAGE_PRECONDITIONS.to_string()),
            ..Default::default()
        };

        match self.run(input, wallet, &mut progress).await {
            Ok(result) => {
                info!(mint = %result.mint, token_account = %result.token_account, "token created");
                Ok(result)
            }
            Err(error) => {
                match &error {
                    ForgeError::NotConnected
                    | ForgeError::InvalidInput(_)
                    | ForgeError::InsufficientFunds { .. }
                    | ForgeError::UserRejected => {
                        warn!(stage = ?progress.failed_stage, %error, "token creation stopped")
                    }
                    _ => error!(
                        stage = ?progress.failed_stage,
                        submitted = progress.submitted.len(),
                        in_flight = progress.in_flight.is_some(),
                        %error,
                        "token creation failed"
                    ),
                }
                Err(CreationFailure { error, progress })
            }
        }
    }

    async fn run(
        &self,
        input: &TokenInput,
        wallet: &dyn WalletSigner,
        progress: &mut CreationProgress,
    ) -> Result<TokenCreationResult, ForgeError> {
        let Validated {
            owner,
            name,
            symbol,
            decimals,
        } = validate(input, wallet)?;

        let mint_rent = self
            .rpc
            .get_minimum_balance_for_rent_exemption(MINT_LEN)
            .await?;
        let account_rent = self
            .rpc
            .get_minimum_balance_for_rent_exemption(ACCOUNT_LEN)
            .await?;

        if self.config.check_balance {
            let required = mint_rent
                .saturating_add(account_rent)
                .saturating_add(self.config.fee_buffer_lamports);
            let available = self.rpc.get_balance(&owner).await?;
            if available <= required {
                return Err(ForgeError::InsufficientFunds {
                    required,
                    available,
                });
            }
        }

        let mint = Keypair::generate();
        let mint_address = mint.pubkey();
        progress.mint = Some(mint_address);
        let token_account = derive_associated_token_address(&owner, &mint_address)?;
        progress.token_account = Some(token_account);
        info!(mint = %mint_address, %token_account, decimals, "derived addresses");

        let stages = self.stages(
            &owner,
            &mint_address,
            &token_account,
            decimals,
            mint_rent,
            input.revoke_freeze,
        )?;

        for stage in stages {
            progress.failed_stage = Some(stage.label.to_string());

            let freshness = self.rpc.get_latest_blockhash().await?;
            let plan = assemble(stage.label, stage.instructions, &owner, freshness)?;
            let local_keys: Vec<&Keypair> = if stage.mint_signs {
                vec![&mint]
            } else {
                Vec::new()
            };

            let signed = DualSigner::sign(plan, &local_keys, wallet).await?;
            let signature = match self.broadcaster.send(&signed).await {
                Ok(signature) => signature,
                Err(failure) => {
                    progress.in_flight = failure.in_flight.then(|| signed.signature());
                    return Err(failure.error);
                }
            };
            progress.submitted.push(signature);
            let submission = self.broadcaster.confirm(&signed, signature).await?;
            info!(
                stage = stage.label,
                %signature,
                slot = submission.slot,
                "stage landed"
            );
        }
        progress.failed_stage = None;

        Ok(TokenCreationResult {
            mint: mint_address,
            token_account,
            name,
            symbol,
            decimals,
            initial_supply: self.config.initial_supply,
            mint_authority: owner,
            freeze_authority: (!input.revoke_freeze).then_some(owner),
            signatures: progress.submitted.clone(),
        })
    }

    /// Instruction order is fixed: create, initialize, token account,
    /// mint-to, then the optional freeze revocation.
    fn stages(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        token_account: &Pubkey,
        decimals: u8,
        mint_rent: u64,
        revoke_freeze: bool,
    ) -> Result<Vec<Stage>, ForgeError> {
        let mint_instructions = vec![
            create_account(owner, mint, mint_rent, MINT_LEN, &TOKEN_PROGRAM_ID)?,
            initialize_mint(mint, decimals, owner, Some(owner))?,
        ];

        let mut supply_instructions = vec![
            create_associated_token_account(owner, token_account, owner, mint)?,
            mint_to(mint, token_account, owner, self.config.initial_supply)?,
        ];
        if revoke_freeze {
            supply_instructions.push(set_authority(
                mint,
                owner,
                AuthorityType::FreezeAccount,
                None,
            )?);
        }

        Ok(match self.config.sequencing {
            Sequencing::SinglePlan => {
                let mut instructions = mint_instructions;
                instructions.extend(supply_instructions);
                vec![Stage {
                    label: STAGE_CREATE_TOKEN,
                    instructions,
                    mint_signs: true,
                }]
            }
            Sequencing::TwoPlan => vec![
                Stage {
                    label: STAGE_CREATE_MINT,
                    instructions: mint_instructions,
                    mint_signs: true,
                },
                Stage {
                    label: STAGE_MINT_SUPPLY,
                    instructions: supply_instructions,
                    mint_signs: false,
                },
            ],
        })
    }
}

fn validate(input: &TokenInput, wallet: &dyn WalletSigner) -> Result<Validated, ForgeError> {
    let owner = match wallet.public_key() {
        Some(key) if wallet.is_connected() => key,
        _ => return Err(ForgeError::NotConnected),
    };

    let name = input.name.trim();
    if name.is_empty() {
        return Err(ForgeError::InvalidInput("token name must not be empty".into()));
    }
    let symbol = input.symbol.trim();
    if symbol.is_empty() {
        return Err(ForgeError::InvalidInput("token symbol must not be empty".into()));
    }

    let decimals = parse_decimals(&input.decimals)?;

    Ok(Validated {
        owner,
        name: name.to_string(),
        symbol: symbol.to_string(),
        decimals,
    })
}

/// Parse user-entered decimals, accepting only whole numbers in 0..=9.
pub fn parse_decimals(text: &str) -> Result<u8, ForgeError> {
    let trimmed = text.trim();
    let invalid = || {
        ForgeError::InvalidInput(format!(
            "decimals must be a whole number between 0 and {MAX_DECIMALS}, got {text:?}"
        ))
    };
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match trimmed.parse::<u8>() {
        Ok(decimals) if decimals <= MAX_DECIMALS => Ok(decimals),
        _ => Err(invalid()),
    }
}
