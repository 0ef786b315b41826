//! JSON-RPC server for the devchain.
//!
//! Exposes the `eth_*` subset the scenario needs plus `evm_mine` for
//! instant block production and `miner_start`/`miner_stop` for a
//! background miner, using the same wire shapes as [`ecf_rpc::wire`].

use std::net::SocketAddr;
use std::time::Duration;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use ecf_core::types::{Address, TxHash};
use ecf_rpc::wire::{self, RpcReceipt, RpcTransaction};

use crate::chain::Devchain;
use crate::error::{DevchainError, TX_REJECTED_CODE};

/// Gas limit for `eth_sendTransaction` requests that name none.
pub const DEFAULT_TX_GAS: u64 = 90_000;

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

fn invalid_params(e: impl std::fmt::Display) -> ErrorObjectOwned {
    rpc_error(-32602, &e.to_string())
}

fn rejected(e: DevchainError) -> ErrorObjectOwned {
    rpc_error(TX_REJECTED_CODE, &e.to_string())
}

/// The devchain JSON-RPC interface.
#[rpc(server)]
pub trait DevchainRpc {
    /// Unlocked accounts.
    #[method(name = "eth_accounts")]
    async fn accounts(&self) -> Result<Vec<Address>, ErrorObjectOwned>;

    /// Balance at the latest block; the block tag is accepted and ignored.
    #[method(name = "eth_getBalance")]
    async fn get_balance(&self, address: Address, block: Option<String>) -> Result<String, ErrorObjectOwned>;

    /// Queue a transaction from an unlocked account.
    #[method(name = "eth_sendTransaction")]
    async fn send_transaction(&self, tx: RpcTransaction) -> Result<TxHash, ErrorObjectOwned>;

    /// Receipt of a mined transaction, `null` while pending.
    #[method(name = "eth_getTransactionReceipt")]
    async fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<RpcReceipt>, ErrorObjectOwned>;

    /// Read-only call against the latest state.
    #[method(name = "eth_call")]
    async fn call(&self, tx: RpcTransaction, block: Option<String>) -> Result<String, ErrorObjectOwned>;

    /// Latest block number.
    #[method(name = "eth_blockNumber")]
    async fn block_number(&self) -> Result<String, ErrorObjectOwned>;

    /// Mine one block now.
    #[method(name = "evm_mine")]
    async fn evm_mine(&self) -> Result<String, ErrorObjectOwned>;

    /// Start mining a block every `miner_interval_ms`.
    #[method(name = "miner_start")]
    async fn miner_start(&self, threads: Option<u32>) -> Result<bool, ErrorObjectOwned>;

    /// Stop the background miner.
    #[method(name = "miner_stop")]
    async fn miner_stop(&self) -> Result<bool, ErrorObjectOwned>;
}

/// Implementation of the devchain JSON-RPC server.
pub struct RpcServerImpl {
    chain: Devchain,
    miner: Mutex<Option<JoinHandle<()>>>,
}

impl RpcServerImpl {
    pub fn new(chain: Devchain) -> Self {
        Self { chain, miner: Mutex::new(None) }
    }
}

#[async_trait]
impl DevchainRpcServer for RpcServerImpl {
    async fn accounts(&self) -> Result<Vec<Address>, ErrorObjectOwned> {
        Ok(self.chain.accounts())
    }

    async fn get_balance(&self, address: Address, _block: Option<String>) -> Result<String, ErrorObjectOwned> {
        Ok(wire::encode_quantity(self.chain.balance(&address)))
    }

    async fn send_transaction(&self, tx: RpcTransaction) -> Result<TxHash, ErrorObjectOwned> {
        let tx = tx.into_request(DEFAULT_TX_GAS).map_err(invalid_params)?;
        self.chain.submit(tx).map_err(rejected)
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<RpcReceipt>, ErrorObjectOwned> {
        Ok(self.chain.receipt(&hash).as_ref().map(RpcReceipt::from))
    }

    async fn call(&self, tx: RpcTransaction, _block: Option<String>) -> Result<String, ErrorObjectOwned> {
        let tx = tx.into_request(0).map_err(invalid_params)?;
        let output = self.chain.call(&tx).map_err(rejected)?;
        Ok(wire::encode_data(&output))
    }

    async fn block_number(&self) -> Result<String, ErrorObjectOwned> {
        Ok(wire::encode_quantity(u128::from(self.chain.height())))
    }

    async fn evm_mine(&self) -> Result<String, ErrorObjectOwned> {
        self.chain.mine(1);
        Ok("0x0".to_string())
    }

    async fn miner_start(&self, _threads: Option<u32>) -> Result<bool, ErrorObjectOwned> {
        let mut miner = self.miner.lock();
        if miner.is_some() {
            return Ok(true);
        }
        let chain = self.chain.clone();
        let interval = Duration::from_millis(chain.config().miner_interval_ms.max(1));
        *miner = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                chain.mine(1);
            }
        }));
        info!(?interval, "background miner started");
        Ok(true)
    }

    async fn miner_stop(&self) -> Result<bool, ErrorObjectOwned> {
        if let Some(handle) = self.miner.lock().take() {
            handle.abort();
            info!("background miner stopped");
        }
        Ok(true)
    }
}

/// Start the JSON-RPC server on `addr`.
///
/// Returns the bound address (useful with port 0) and a [`ServerHandle`]
/// that can be used to stop the server.
pub async fn start_rpc_server(addr: &str, chain: Devchain) -> Result<(SocketAddr, ServerHandle), DevchainError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| DevchainError::Server(format!("RPC server error: {e}")))?;
    let local = server
        .local_addr()
        .map_err(|e| DevchainError::Server(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(chain);
    let handle = server.start(rpc_impl.into_rpc());
    info!("devchain RPC listening on {local}");

    Ok((local, handle))
}
