use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rpc::{Commitment, SendOptions};

/// Base units minted into the owner's account when a launch does not say otherwise.
pub const DEFAULT_INITIAL_SUPPLY: u64 = 1_000_000_000_000;

/// Headroom for two signature fees on top of the rent deposits.
pub const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which network the launch targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cluster {
    MainnetBeta,
    #[default]
    Devnet,
    Testnet,
    /// Any other endpoint, identified by its RPC URL.
    Custom(String),
}

impl Cluster {
    /// The public RPC endpoint for well-known clusters, or the custom URL itself.
    pub fn rpc_url(&self) -> &str {
        match self {
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Custom(url) => url,
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::MainnetBeta => f.write_str("mainnet-beta"),
            Cluster::Devnet => f.write_str("devnet"),
            Cluster::Testnet => f.write_str("testnet"),
            Cluster::Custom(url) => f.write_str(url),
        }
    }
}

impl From<String> for Cluster {
    fn from(value: String) -> Self {
        match value.as_str() {
            "mainnet-beta" | "mainnet" => Cluster::MainnetBeta,
            "devnet" => Cluster::Devnet,
            "testnet" => Cluster::Testnet,
            _ => Cluster::Custom(value),
        }
    }
}

impl From<Cluster> for String {
    fn from(value: Cluster) -> Self {
        value.to_string()
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("cluster must not be empty".into());
        }
        Ok(Cluster::from(s.to_string()))
    }
}

/// How the launch instructions are split into transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sequencing {
    /// Everything in one atomic transaction.
    #[default]
    SinglePlan,
    /// Mint creation first, then account creation and minting once the
    /// first transaction is confirmed.
    TwoPlan,
}

impl FromStr for Sequencing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-plan" | "single" => Ok(Sequencing::SinglePlan),
            "two-plan" | "two" => Ok(Sequencing::TwoPlan),
            other => Err(format!("unknown sequencing: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub rpc_url: String,
    pub cluster: Cluster,
    pub commitment: Commitment,
    pub sequencing: Sequencing,
    pub initial_supply: u64,
    pub fee_buffer_lamports: u64,
    pub check_balance: bool,
    #[serde(rename = "confirm_timeout_ms", with = "duration_ms")]
    pub confirm_timeout: Duration,
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        let cluster = Cluster::default();
        Self {
            rpc_url: cluster.rpc_url().to_string(),
            cluster,
            commitment: Commitment::Confirmed,
            sequencing: Sequencing::SinglePlan,
            initial_supply: DEFAULT_INITIAL_SUPPLY,
            fee_buffer_lamports: DEFAULT_FEE_BUFFER_LAMPORTS,
            check_balance: true,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            skip_preflight: false,
            max_retries: None,
        }
    }
}

impl ForgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("rpc_url must not be empty".into()));
        }
        if self.initial_supply == 0 {
            return Err(ConfigError::Invalid("initial_supply must be > 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be > 0".into()));
        }
        if self.confirm_timeout < self.poll_interval {
            return Err(ConfigError::Invalid(
                "confirm_timeout must not be shorter than poll_interval".into(),
            ));
        }
        Ok(())
    }

    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            skip_preflight: self.skip_preflight,
            preflight_commitment: self.commitment,
            max_retries: self.max_retries,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
