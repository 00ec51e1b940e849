use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use token_forge::{
    explorer_url, telemetry::setup_telemetry, Cluster, Commitment, ExplorerKind, ForgeConfig,
    JsonRpcClient, KeypairWallet, Sequencing, TokenCreationResult, TokenForge, TokenInput,
};

/// Create a new SPL token owned by the given keypair.
#[derive(Parser, Debug)]
#[command(name = "create-token", author, version, about, long_about = None)]
struct Cli {
    /// Token name. Validated and echoed back; not written on-chain.
    #[arg(long)]
    name: String,

    /// Token symbol. Validated and echoed back; not written on-chain.
    #[arg(long)]
    symbol: String,

    /// Decimal places, 0 to 9.
    #[arg(long, default_value = "9")]
    decimals: String,

    /// Give up the freeze authority after minting.
    #[arg(long)]
    revoke_freeze: bool,

    /// Owner keypair file (Solana CLI JSON format).
    #[arg(long, env = "FORGE_KEYPAIR")]
    keypair: PathBuf,

    /// JSON config file; command-line flags override its values.
    #[arg(long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "FORGE_CLUSTER")]
    cluster: Option<Cluster>,

    /// Defaults to the cluster's public endpoint.
    #[arg(long, env = "FORGE_RPC_URL")]
    rpc_url: Option<String>,

    #[arg(long, env = "FORGE_COMMITMENT")]
    commitment: Option<Commitment>,

    /// single-plan or two-plan.
    #[arg(long, env = "FORGE_SEQUENCING")]
    sequencing: Option<Sequencing>,

    /// Base units minted into the owner's token account.
    #[arg(long, env = "FORGE_INITIAL_SUPPLY")]
    initial_supply: Option<u64>,

    #[arg(long, env = "FORGE_SKIP_BALANCE_CHECK")]
    skip_balance_check: bool,

    #[arg(long, env = "FORGE_CONFIRM_TIMEOUT_SECONDS")]
    confirm_timeout_seconds: Option<u64>,

    #[arg(long, env = "FORGE_SKIP_PREFLIGHT")]
    skip_preflight: bool,

    #[arg(long, env = "FORGE_MAX_RETRIES")]
    max_retries: Option<usize>,
}

impl Cli {
    fn forge_config(&self) -> anyhow::Result<ForgeConfig> {
        let mut config = match &self.config {
            Some(path) => ForgeConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ForgeConfig::default(),
        };

        if let Some(cluster) = &self.cluster {
            config.rpc_url = cluster.rpc_url().to_string();
            config.cluster = cluster.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(commitment) = self.commitment {
            config.commitment = commitment;
        }
        if let Some(sequencing) = self.sequencing {
            config.sequencing = sequencing;
        }
        if let Some(initial_supply) = self.initial_supply {
            config.initial_supply = initial_supply;
        }
        if self.skip_balance_check {
            config.check_balance = false;
        }
        if let Some(seconds) = self.confirm_timeout_seconds {
            config.confirm_timeout = Duration::from_secs(seconds);
        }
        if self.skip_preflight {
            config.skip_preflight = true;
        }
        if self.max_retries.is_some() {
            config.max_retries = self.max_retries;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct LaunchOutput<'a> {
    #[serde(flatten)]
    result: &'a TokenCreationResult,
    mint_url: String,
    token_account_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    setup_telemetry();

    let cli = Cli::parse();
    let config = cli.forge_config()?;
    let wallet = KeypairWallet::from_file(&cli.keypair)?;
    let rpc = Arc::new(JsonRpcClient::new(&config.rpc_url, config.commitment)?);
    let cluster = config.cluster.clone();
    let forge = TokenForge::new(rpc, config);

    let input = TokenInput::new(cli.name, cli.symbol, cli.decimals, cli.revoke_freeze);
    match forge.create_token(&input, &wallet).await {
        Ok(result) => {
            let output = LaunchOutput {
                result: &result,
                mint_url: explorer_url(&cluster, ExplorerKind::Address, &result.mint.to_string())?
                    .to_string(),
                token_account_url: explorer_url(
                    &cluster,
                    ExplorerKind::Address,
                    &result.token_account.to_string(),
                )?
                .to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.report())?);
            Ok(ExitCode::FAILURE)
        }
    }
}
