pub mod errors;
pub mod json_rpc;
pub mod ledger_rpc;

pub use errors::RpcError;
pub use json_rpc::JsonRpcClient;
pub use ledger_rpc::{Commitment, LedgerRpc, SendOptions, SignatureStatus};
