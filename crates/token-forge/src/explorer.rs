use reqwest::Url;

use crate::config::Cluster;
use crate::error::ForgeError;

const EXPLORER_BASE: &str = "https://explorer.solana.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerKind {
    Address,
    Transaction,
}

impl ExplorerKind {
    fn path(&self) -> &'static str {
        match self {
            ExplorerKind::Address => "address",
            ExplorerKind::Transaction => "tx",
        }
    }
}

/// Link to `value` (an address or a transaction signature) on the Solana
/// explorer, pointed at `cluster`.
pub fn explorer_url(cluster: &Cluster, kind: ExplorerKind, value: &str) -> Result<Url, ForgeError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ForgeError::InvalidInput(format!(
            "not a base58 value: {value:?}"
        )));
    }

    let base = format!("{EXPLORER_BASE}/{}/{value}", kind.path());
    let url = match cluster {
        Cluster::MainnetBeta => Url::parse(&base),
        Cluster::Devnet => Url::parse_with_params(&base, &[("cluster", "devnet")]),
        Cluster::Testnet => Url::parse_with_params(&base, &[("cluster", "testnet")]),
        Cluster::Custom(rpc_url) => Url::parse_with_params(
            &base,
            &[("cluster", "custom"), ("customUrl", rpc_url.as_str())],
        ),
    };
    url.map_err(|e| ForgeError::InvalidInput(format!("explorer url: {e}")))
}
