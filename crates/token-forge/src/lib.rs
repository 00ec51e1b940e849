//! Client-side SPL token launches.
//!
//! A launch allocates a mint account, initializes it, opens the owner's
//! associated token account, mints the initial supply and optionally gives
//! up the freeze authority. The new mint's ephemeral key signs locally; the
//! owner's key lives behind a [`WalletSigner`] that may take any amount of
//! time to answer.
//!
//! ```text
//! TokenForge ─► plan::assemble ─► DualSigner ─► Broadcaster ─► LedgerRpc
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod explorer;
pub mod forge;
pub mod plan;
pub mod rpc;
pub mod signer;
pub mod telemetry;
pub mod types;

pub use broadcast::{Broadcaster, SendFailure, SubmissionResult};
pub use config::{Cluster, ConfigError, ForgeConfig, Sequencing};
pub use error::{ErrorKind, ForgeError};
pub use explorer::{explorer_url, ExplorerKind};
pub use forge::{parse_decimals, TokenForge};
pub use plan::{assemble, TransactionPlan};
pub use rpc::{Commitment, JsonRpcClient, LedgerRpc, RpcError, SendOptions, SignatureStatus};
pub use signer::{DualSigner, KeypairWallet, SignedPlan, WalletError, WalletSigner};
pub use types::{
    CreationFailure, CreationProgress, ErrorReport, FreshnessToken, TokenCreationResult,
    TokenInput,
};
