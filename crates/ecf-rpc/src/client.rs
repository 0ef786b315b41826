//! [`NodeClient`] over Ethereum JSON-RPC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use jsonrpsee::core::ClientError as RpcError;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use ecf_core::error::ClientError;
use ecf_core::traits::NodeClient;
use ecf_core::types::{Address, Receipt, TransactionRequest, TxHash, Wei};

use crate::config::{MiningMode, RpcConfig};
use crate::wire::{self, LATEST, RpcReceipt, RpcTransaction};

fn map_rpc_error(e: RpcError) -> ClientError {
    match e {
        RpcError::Call(obj) => ClientError::Rejected {
            code: obj.code(),
            message: obj.message().to_string(),
        },
        other => ClientError::Transport(other.to_string()),
    }
}

fn push<P: Serialize>(params: &mut ArrayParams, value: P) -> Result<(), ClientError> {
    params
        .insert(value)
        .map_err(|e| ClientError::Transport(format!("failed to encode params: {e}")))
}

/// A node reached over HTTP JSON-RPC.
pub struct RpcNodeClient {
    client: HttpClient,
    config: RpcConfig,
    miner_started: AtomicBool,
}

impl RpcNodeClient {
    pub fn new(config: RpcConfig) -> Result<Self, ClientError> {
        let client = HttpClientBuilder::default()
            .request_timeout(config.request_timeout())
            .build(&config.endpoint)
            .map_err(|e| ClientError::Transport(format!("failed to create RPC client: {e}")))?;
        Ok(Self {
            client,
            config,
            miner_started: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn mining_mode(&self) -> MiningMode {
        self.config.mining
    }

    async fn request<R: DeserializeOwned>(&self, method: &str, params: ArrayParams) -> Result<R, ClientError> {
        debug!(method, "rpc request");
        self.client.request(method, params).await.map_err(map_rpc_error)
    }

    async fn mine_instant(&self, count: u64) -> Result<(), ClientError> {
        for _ in 0..count {
            let _: serde_json::Value = self.request("evm_mine", ArrayParams::new()).await?;
        }
        Ok(())
    }

    /// Start the node's miner once, then wait for the height to advance,
    /// like `admin.sleepBlocks` in the geth console.
    async fn mine_with_miner(&self, count: u64) -> Result<(), ClientError> {
        let target = self.block_number().await? + count;
        if !self.miner_started.swap(true, Ordering::SeqCst) {
            let mut params = ArrayParams::new();
            push(&mut params, 1u32)?;
            let _: serde_json::Value = self.request("miner_start", params).await?;
            info!("miner started on {}", self.config.endpoint);
        }

        let started = Instant::now();
        loop {
            let height = self.block_number().await?;
            if height >= target {
                return Ok(());
            }
            if started.elapsed() > self.config.block_timeout() {
                return Err(ClientError::Timeout(format!(
                    "height {height} after {:?}, waiting for {target}",
                    started.elapsed()
                )));
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
        self.request("eth_accounts", ArrayParams::new()).await
    }

    async fn balance(&self, address: Address) -> Result<Wei, ClientError> {
        let mut params = ArrayParams::new();
        push(&mut params, address)?;
        push(&mut params, LATEST)?;
        let balance: String = self.request("eth_getBalance", params).await?;
        wire::decode_quantity(&balance)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ClientError> {
        let mut params = ArrayParams::new();
        push(&mut params, RpcTransaction::from(&tx))?;
        self.request("eth_sendTransaction", params).await
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ClientError> {
        let mut params = ArrayParams::new();
        push(&mut params, hash)?;
        let receipt: Option<RpcReceipt> = self.request("eth_getTransactionReceipt", params).await?;
        receipt.map(Receipt::try_from).transpose()
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Vec<u8>, ClientError> {
        let mut params = ArrayParams::new();
        push(&mut params, RpcTransaction::from(&tx))?;
        push(&mut params, LATEST)?;
        let output: String = self.request("eth_call", params).await?;
        wire::decode_data(&output)
    }

    async fn mine_blocks(&self, count: u64) -> Result<(), ClientError> {
        match self.config.mining {
            MiningMode::Instant => self.mine_instant(count).await,
            MiningMode::Miner => self.mine_with_miner(count).await,
        }
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        let height: String = self.request("eth_blockNumber", ArrayParams::new()).await?;
        wire::decode_u64(&height)
    }
}
