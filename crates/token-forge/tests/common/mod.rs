//! In-memory stand-ins for the ledger and the wallet.
//!
//! `MockLedger` decodes every submitted wire transaction, verifies its
//! signatures and executes the System / SPL Token / Associated Token Account
//! instructions a launch uses against simulated accounts, so the tests see
//! the same accept/reject decisions a validator would make.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chain_sol::{
    derive_associated_token_address, AuthorityType, Keypair, Pubkey, Signature, SolInstruction,
    SolTransaction, TokenInstruction, ACCOUNT_LEN, ASSOCIATED_TOKEN_PROGRAM_ID, MINT_LEN,
    SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use token_forge::{
    Commitment, ForgeConfig, FreshnessToken, LedgerRpc, RpcError, SendOptions, SignatureStatus,
    WalletError, WalletSigner,
};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
pub const FEE_PER_SIGNATURE: u64 = 5_000;
const BLOCKHASH_VALIDITY: u64 = 150;

/// Rent-exempt minimum the way the runtime computes it:
/// (128 bytes of account overhead + data) * 3480 lamports/byte-year * 2 years.
pub fn rent_exempt_minimum(data_len: u64) -> u64 {
    (128 + data_len) * 3_480 * 2
}

pub fn test_config() -> ForgeConfig {
    ForgeConfig {
        poll_interval: Duration::from_millis(1),
        confirm_timeout: Duration::from_secs(5),
        ..ForgeConfig::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintState {
    pub decimals: u8,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub supply: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountState {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AccountData {
    Empty,
    Mint(MintState),
    Token(TokenAccountState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SimAccount {
    lamports: u64,
    owner: Pubkey,
    space: u64,
    data: AccountData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingBehavior {
    /// Reported as processed for `processed_polls` polls, then confirmed.
    Confirm { processed_polls: usize },
    /// Accepted by the node but never lands; block height keeps advancing.
    Drop,
    /// Accepted and executed with an error; no state changes.
    FailOnChain { reason: &'static str },
    /// Accepted but never reported; block height stays put.
    Stall,
}

#[derive(Debug, Clone)]
pub enum SendFault {
    /// The request fails before the node sees the transaction.
    Unreachable(RpcError),
    /// The node processes the transaction, then its reply is lost.
    ReplyLost(RpcError),
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Pubkey, u64>,
    accounts: HashMap<Pubkey, SimAccount>,
    blockhashes: HashMap<[u8; 32], u64>,
    next_blockhash: u8,
    block_height: u64,
    slot: u64,
    sent: Vec<SolTransaction>,
    send_options: Vec<SendOptions>,
    statuses: HashMap<Signature, (u64, usize)>,
}

#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    expire_blockhashes: bool,
    landing: LandingBehavior,
    send_fault: Option<SendFault>,
    fail_balance_query: bool,
    pub rent_queries: AtomicUsize,
    pub balance_queries: AtomicUsize,
    pub send_attempts: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                block_height: 1_000,
                slot: 5_000,
                ..Default::default()
            }),
            expire_blockhashes: false,
            landing: LandingBehavior::Confirm { processed_polls: 1 },
            send_fault: None,
            fail_balance_query: false,
            rent_queries: AtomicUsize::new(0),
            balance_queries: AtomicUsize::new(0),
            send_attempts: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(self, owner: &Pubkey, lamports: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(*owner, lamports);
        self
    }

    /// Every blockhash handed out is already stale by the time it is used.
    pub fn with_expired_blockhashes(mut self) -> Self {
        self.expire_blockhashes = true;
        self
    }

    pub fn with_landing(mut self, landing: LandingBehavior) -> Self {
        self.landing = landing;
        self
    }

    pub fn with_send_fault(mut self, fault: SendFault) -> Self {
        self.send_fault = Some(fault);
        self
    }

    pub fn with_unreachable_balance(mut self) -> Self {
        self.fail_balance_query = true;
        self
    }

    pub fn sent_transactions(&self) -> Vec<SolTransaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn send_options(&self) -> Vec<SendOptions> {
        self.state.lock().unwrap().send_options.clone()
    }

    pub fn send_count(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn balance(&self, owner: &Pubkey) -> u64 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(owner)
            .copied()
            .unwrap_or(0)
    }

    pub fn mint(&self, address: &Pubkey) -> Option<MintState> {
        match &self.state.lock().unwrap().accounts.get(address)?.data {
            AccountData::Mint(mint) => Some(mint.clone()),
            _ => None,
        }
    }

    pub fn token_account(&self, address: &Pubkey) -> Option<TokenAccountState> {
        match &self.state.lock().unwrap().accounts.get(address)?.data {
            AccountData::Token(account) => Some(account.clone()),
            _ => None,
        }
    }

    pub fn account_exists(&self, address: &Pubkey) -> bool {
        self.state.lock().unwrap().accounts.contains_key(address)
    }

    fn reject(message: impl Into<String>) -> RpcError {
        RpcError::Node {
            code: -32002,
            message: format!("Transaction simulation failed: {}", message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Instruction execution
// ---------------------------------------------------------------------------

fn execute(state: &mut LedgerState, tx: &SolTransaction) -> Result<(), String> {
    let fee_payer = *tx.fee_payer().ok_or("no fee payer")?;
    let fee = FEE_PER_SIGNATURE * tx.signatures.len() as u64;
    debit(state, &fee_payer, fee)?;

    let instructions = tx.instructions().map_err(|e| e.to_string())?;
    for (index, ix) in instructions.iter().enumerate() {
        let result = if ix.program_id == SYSTEM_PROGRAM_ID {
            execute_system(state, ix)
        } else if ix.program_id == TOKEN_PROGRAM_ID {
            execute_token(state, ix)
        } else if ix.program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
            execute_associated(state, ix)
        } else {
            Err(format!("unknown program {}", ix.program_id))
        };
        result.map_err(|e| format!("Error processing Instruction {index}: {e}"))?;
    }
    Ok(())
}

fn debit(state: &mut LedgerState, key: &Pubkey, lamports: u64) -> Result<(), String> {
    let balance = state.balances.entry(*key).or_insert(0);
    if *balance < lamports {
        return Err(format!("insufficient lamports: {balance} < {lamports}"));
    }
    *balance -= lamports;
    Ok(())
}

fn execute_system(state: &mut LedgerState, ix: &SolInstruction) -> Result<(), String> {
    if ix.data.len() != 52 || ix.data[..4] != [0, 0, 0, 0] {
        return Err("unsupported system instruction".into());
    }
    let [payer, new_account] = ix.accounts.as_slice() else {
        return Err("create-account takes two accounts".into());
    };
    if !payer.is_signer || !new_account.is_signer {
        return Err("missing required signature for create-account".into());
    }
    if state.accounts.contains_key(&new_account.pubkey) {
        return Err("account already in use".into());
    }

    let lamports = u64::from_le_bytes(ix.data[4..12].try_into().unwrap());
    let space = u64::from_le_bytes(ix.data[12..20].try_into().unwrap());
    let owner = Pubkey::new(ix.data[20..52].try_into().unwrap());

    debit(state, &payer.pubkey, lamports)?;
    state.accounts.insert(
        new_account.pubkey,
        SimAccount {
            lamports,
            owner,
            space,
            data: AccountData::Empty,
        },
    );
    Ok(())
}

fn execute_token(state: &mut LedgerState, ix: &SolInstruction) -> Result<(), String> {
    let instruction = TokenInstruction::unpack(&ix.data).map_err(|e| e.to_string())?;
    match instruction {
        TokenInstruction::InitializeMint {
            decimals,
            mint_authority,
            freeze_authority,
        } => {
            let mint = ix.accounts.first().ok_or("missing mint account")?;
            let account = state
                .accounts
                .get_mut(&mint.pubkey)
                .ok_or("mint account does not exist")?;
            if account.owner != TOKEN_PROGRAM_ID || account.space != MINT_LEN {
                return Err("mint account has wrong owner or size".into());
            }
            if account.lamports < rent_exempt_minimum(MINT_LEN) {
                return Err("mint account is not rent exempt".into());
            }
            if account.data != AccountData::Empty {
                return Err("mint already initialized".into());
            }
            account.data = AccountData::Mint(MintState {
                decimals,
                mint_authority: Some(mint_authority),
                freeze_authority,
                supply: 0,
            });
            Ok(())
        }
        TokenInstruction::MintTo { amount } => {
            let [mint, destination, authority] = ix.accounts.as_slice() else {
                return Err("mint-to takes three accounts".into());
            };
            if !authority.is_signer {
                return Err("mint authority did not sign".into());
            }
            let AccountData::Token(token) = &state
                .accounts
                .get(&destination.pubkey)
                .ok_or("destination does not exist")?
                .data
            else {
                return Err("destination is not a token account".into());
            };
            if token.mint != mint.pubkey {
                return Err("destination belongs to another mint".into());
            }

            let mint_account = state
                .accounts
                .get_mut(&mint.pubkey)
                .ok_or("mint does not exist")?;
            let AccountData::Mint(mint_state) = &mut mint_account.data else {
                return Err("mint is not initialized".into());
            };
            if mint_state.mint_authority != Some(authority.pubkey) {
                return Err("wrong mint authority".into());
            }
            mint_state.supply += amount;

            if let Some(SimAccount {
                data: AccountData::Token(token),
                ..
            }) = state.accounts.get_mut(&destination.pubkey)
            {
                token.amount += amount;
            }
            Ok(())
        }
        TokenInstruction::SetAuthority {
            authority_type,
            new_authority,
        } => {
            let [account, current] = ix.accounts.as_slice() else {
                return Err("set-authority takes two accounts".into());
            };
            if !current.is_signer {
                return Err("current authority did not sign".into());
            }
            let mint_account = state
                .accounts
                .get_mut(&account.pubkey)
                .ok_or("account does not exist")?;
            let AccountData::Mint(mint_state) = &mut mint_account.data else {
                return Err("set-authority only simulated for mints".into());
            };
            let slot = match authority_type {
                AuthorityType::MintTokens => &mut mint_state.mint_authority,
                AuthorityType::FreezeAccount => &mut mint_state.freeze_authority,
                other => return Err(format!("{other} is not a mint authority")),
            };
            if *slot != Some(current.pubkey) {
                return Err("wrong current authority".into());
            }
            *slot = new_authority;
            Ok(())
        }
    }
}

fn execute_associated(state: &mut LedgerState, ix: &SolInstruction) -> Result<(), String> {
    let idempotent = match ix.data.as_slice() {
        [] | [0] => false,
        [1] => true,
        _ => return Err("unsupported associated token instruction".into()),
    };
    let [payer, associated, owner, mint, system, token_program] = ix.accounts.as_slice() else {
        return Err("create-associated-account takes six accounts".into());
    };
    if !payer.is_signer || !payer.is_writable || !associated.is_writable {
        return Err("payer must sign and accounts must be writable".into());
    }
    if system.pubkey != SYSTEM_PROGRAM_ID || token_program.pubkey != TOKEN_PROGRAM_ID {
        return Err("wrong program accounts".into());
    }
    let expected = derive_associated_token_address(&owner.pubkey, &mint.pubkey)
        .map_err(|e| e.to_string())?;
    if expected != associated.pubkey {
        return Err("associated address does not match derivation".into());
    }
    if !matches!(
        state.accounts.get(&mint.pubkey).map(|a| &a.data),
        Some(AccountData::Mint(_))
    ) {
        return Err("mint is not initialized".into());
    }
    if state.accounts.contains_key(&associated.pubkey) {
        return if idempotent {
            Ok(())
        } else {
            Err("associated account already exists".into())
        };
    }

    let rent = rent_exempt_minimum(ACCOUNT_LEN);
    debit(state, &payer.pubkey, rent)?;
    state.accounts.insert(
        associated.pubkey,
        SimAccount {
            lamports: rent,
            owner: TOKEN_PROGRAM_ID,
            space: ACCOUNT_LEN,
            data: AccountData::Token(TokenAccountState {
                mint: mint.pubkey,
                owner: owner.pubkey,
                amount: 0,
            }),
        },
    );
    Ok(())
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64) -> Result<u64, RpcError> {
        self.rent_queries.fetch_add(1, Ordering::SeqCst);
        Ok(rent_exempt_minimum(data_len))
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, RpcError> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance_query {
            return Err(RpcError::Transport("connection reset by peer".into()));
        }
        Ok(self.balance(pubkey))
    }

    async fn get_latest_blockhash(&self) -> Result<FreshnessToken, RpcError> {
        let mut state = self.state.lock().unwrap();
        state.next_blockhash = state.next_blockhash.wrapping_add(1);
        let blockhash = [state.next_blockhash; 32];
        let last_valid_block_height = state.block_height + BLOCKHASH_VALIDITY;
        state.blockhashes.insert(blockhash, last_valid_block_height);
        Ok(FreshnessToken {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_transaction(
        &self,
        wire_transaction: &[u8],
        options: &SendOptions,
    ) -> Result<Signature, RpcError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        match &self.send_fault {
            Some(SendFault::Unreachable(error)) => Err(error.clone()),
            Some(SendFault::ReplyLost(error)) => {
                self.accept(wire_transaction, options)?;
                Err(error.clone())
            }
            None => self.accept(wire_transaction, options),
        }
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        let mut state = self.state.lock().unwrap();
        let (processed_polls, err) = match self.landing {
            LandingBehavior::Confirm { processed_polls } => (processed_polls, None),
            LandingBehavior::FailOnChain { reason } => (0, Some(reason.to_string())),
            LandingBehavior::Drop | LandingBehavior::Stall => (0, None),
        };
        Ok(signatures
            .iter()
            .map(|signature| {
                let (slot, polls) = state.statuses.get_mut(signature)?;
                *polls += 1;
                let status = if *polls > processed_polls {
                    Commitment::Confirmed
                } else {
                    Commitment::Processed
                };
                Some(SignatureStatus {
                    slot: *slot,
                    confirmations: Some(*polls),
                    err: err.clone(),
                    confirmation_status: Some(status),
                })
            })
            .collect())
    }

    async fn get_block_height(&self) -> Result<u64, RpcError> {
        let mut state = self.state.lock().unwrap();
        if self.landing == LandingBehavior::Drop {
            state.block_height += 50;
        }
        Ok(state.block_height)
    }
}

impl MockLedger {
    /// What a validator does with a transaction it receives.
    fn accept(
        &self,
        wire_transaction: &[u8],
        options: &SendOptions,
    ) -> Result<Signature, RpcError> {
        let tx = SolTransaction::from_wire_bytes(wire_transaction)
            .map_err(|e| RpcError::Node {
                code: -32602,
                message: format!("failed to deserialize transaction: {e}"),
            })?;

        let mut state = self.state.lock().unwrap();
        state.send_options.push(*options);

        let live = state
            .blockhashes
            .get(&tx.recent_blockhash)
            .is_some_and(|&last_valid| state.block_height <= last_valid);
        if self.expire_blockhashes || !live {
            return Err(Self::reject("Blockhash not found"));
        }
        if !tx.is_fully_signed() {
            return Err(RpcError::Node {
                code: -32003,
                message: "Transaction signature verification failure".into(),
            });
        }

        let signature = tx.signatures[0];
        match self.landing {
            LandingBehavior::Drop | LandingBehavior::Stall => {
                state.sent.push(tx);
                return Ok(signature);
            }
            LandingBehavior::FailOnChain { .. } => {
                let slot = state.slot + 1;
                state.slot = slot;
                state.statuses.insert(signature, (slot, 0));
                state.sent.push(tx);
                return Ok(signature);
            }
            LandingBehavior::Confirm { .. } => {}
        }

        let mut next = LedgerState {
            balances: state.balances.clone(),
            accounts: state.accounts.clone(),
            ..Default::default()
        };
        execute(&mut next, &tx).map_err(Self::reject)?;
        state.balances = next.balances;
        state.accounts = next.accounts;

        state.slot += 1;
        state.block_height += 1;
        let slot = state.slot;
        state.statuses.insert(signature, (slot, 0));
        state.sent.push(tx);
        Ok(signature)
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MockWallet {
    keypair: Option<Keypair>,
    /// Number of prompts approved before every further one is rejected.
    approvals: Option<usize>,
    pub sign_calls: AtomicUsize,
    seen: Mutex<Vec<SolTransaction>>,
}

impl MockWallet {
    pub fn new(seed: u8) -> Self {
        Self {
            keypair: Some(Keypair::from_seed(&[seed; 32])),
            approvals: None,
            sign_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            keypair: None,
            ..Self::new(0)
        }
    }

    pub fn rejecting(seed: u8) -> Self {
        Self::rejecting_after(seed, 0)
    }

    pub fn rejecting_after(seed: u8, approvals: usize) -> Self {
        Self {
            approvals: Some(approvals),
            ..Self::new(seed)
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.public_key().expect("wallet is connected")
    }

    pub fn sign_count(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Transactions as they arrived at the wallet, before it signed.
    pub fn seen(&self) -> Vec<SolTransaction> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(Keypair::pubkey)
    }

    async fn sign_transaction(
        &self,
        mut transaction: SolTransaction,
    ) -> Result<SolTransaction, WalletError> {
        let call = self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(transaction.clone());
        let keypair = self.keypair.as_ref().ok_or(WalletError::NotConnected)?;
        if self.approvals.is_some_and(|approvals| call >= approvals) {
            return Err(WalletError::Rejected);
        }
        // Simulate a user looking at the approval prompt.
        tokio::time::sleep(Duration::from_millis(2)).await;
        transaction
            .partial_sign(keypair)
            .map_err(|e| WalletError::SigningFailed(e.to_string()))?;
        Ok(transaction)
    }
}
