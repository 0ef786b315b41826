//! The development chain: unlocked accounts, a pending pool, on-demand
//! block production and receipts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use ecf_core::artifacts::ContractKind;
use ecf_core::crypto::keccak256;
use ecf_core::error::ClientError;
use ecf_core::traits::{ExecutionTracer, NodeClient};
use ecf_core::types::{Address, Receipt, StorageSlot, TransactionRequest, TxContext, TxHash, Wei, Word};

use crate::config::DevchainConfig;
use crate::error::DevchainError;
use crate::executor::{Executor, NoopTracer};
use crate::gas;
use crate::state::WorldState;

/// Tracer shared between the chain and its owner, who inspects it later.
pub type SharedTracer = Arc<Mutex<dyn ExecutionTracer>>;

/// A mined block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<TxHash>,
    pub gas_used: u64,
}

#[derive(Debug, Clone)]
struct PendingTx {
    hash: TxHash,
    tx: TransactionRequest,
}

struct ChainState {
    config: DevchainConfig,
    world: WorldState,
    accounts: Vec<Address>,
    coinbase: Address,
    genesis_timestamp: u64,
    blocks: Vec<Block>,
    pending: VecDeque<PendingTx>,
    /// Next nonce per sender, counting pending transactions.
    pending_nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, Receipt>,
    tracer: Option<SharedTracer>,
}

/// Deterministic address of the `index`-th development account.
pub fn dev_account(index: usize) -> Address {
    let digest = keccak256(format!("ecf-devchain account {index}").as_bytes());
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address(out)
}

fn tx_hash(tx: &TransactionRequest, nonce: u64) -> TxHash {
    let mut preimage = Vec::with_capacity(96 + tx.data.len());
    preimage.extend_from_slice(tx.from.as_bytes());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    if let Some(to) = &tx.to {
        preimage.extend_from_slice(to.as_bytes());
    }
    preimage.extend_from_slice(&tx.value.to_be_bytes());
    preimage.extend_from_slice(&tx.gas.to_be_bytes());
    preimage.extend_from_slice(&tx.data);
    TxHash(keccak256(&preimage))
}

impl ChainState {
    fn height(&self) -> u64 {
        self.blocks.last().map_or(0, |b| b.number)
    }

    fn mine_block(&mut self) -> Block {
        let number = self.height() + 1;
        let timestamp = self.genesis_timestamp + number * self.config.block_interval_secs;
        let ctx = TxContext { origin: Address::ZERO, block_number: number, timestamp };

        let mut included = Vec::new();
        let mut gas_used = 0u64;
        while let Some(pending) = self.pending.pop_front() {
            if gas_used + pending.tx.gas > self.config.block_gas_limit {
                self.pending.push_front(pending);
                break;
            }
            let ctx = TxContext { origin: pending.tx.from, ..ctx };
            let outcome = match &self.tracer {
                Some(tracer) => {
                    let mut guard = tracer.lock();
                    Executor::new(&mut self.world, &mut *guard, ctx)
                        .execute_transaction(&pending.tx, self.config.gas_price, self.coinbase)
                }
                None => Executor::new(&mut self.world, &mut NoopTracer, ctx)
                    .execute_transaction(&pending.tx, self.config.gas_price, self.coinbase),
            };
            match outcome {
                Ok(outcome) => {
                    gas_used += outcome.gas_used;
                    debug!(hash = %pending.hash, status = ?outcome.status, gas = outcome.gas_used, "included transaction");
                    self.receipts.insert(
                        pending.hash,
                        Receipt {
                            tx_hash: pending.hash,
                            status: outcome.status,
                            block_number: number,
                            gas_used: outcome.gas_used,
                            contract_address: outcome.contract_address,
                        },
                    );
                    included.push(pending.hash);
                }
                Err(e) => warn!(hash = %pending.hash, "dropping invalid transaction: {e}"),
            }
        }

        self.world.add_balance(self.coinbase, self.config.block_reward);
        let block = Block { number, timestamp, transactions: included, gas_used };
        info!(number, txs = block.transactions.len(), gas_used, "mined block");
        self.blocks.push(block.clone());
        block
    }
}

/// In-memory chain. Clones share the same state.
#[derive(Clone)]
pub struct Devchain {
    inner: Arc<Mutex<ChainState>>,
}

impl Default for Devchain {
    fn default() -> Self {
        Self::new(DevchainConfig::default())
    }
}

impl Devchain {
    /// Create a chain with `config.accounts` funded, unlocked accounts.
    pub fn new(config: DevchainConfig) -> Self {
        let accounts: Vec<Address> = (0..config.accounts).map(dev_account).collect();
        let mut world = WorldState::new();
        for account in &accounts {
            world.add_balance(*account, config.initial_balance);
        }
        let coinbase = config
            .coinbase
            .or_else(|| accounts.first().copied())
            .unwrap_or(Address::ZERO);
        let genesis_timestamp = config
            .genesis_timestamp
            .unwrap_or_else(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default());
        info!(accounts = accounts.len(), %coinbase, "devchain created");

        let genesis = Block { number: 0, timestamp: genesis_timestamp, transactions: Vec::new(), gas_used: 0 };
        Self {
            inner: Arc::new(Mutex::new(ChainState {
                config,
                world,
                accounts,
                coinbase,
                genesis_timestamp,
                blocks: vec![genesis],
                pending: VecDeque::new(),
                pending_nonces: HashMap::new(),
                receipts: HashMap::new(),
                tracer: None,
            })),
        }
    }

    /// Attach a tracer that sees every mined transaction's execution.
    pub fn with_tracer(self, tracer: SharedTracer) -> Self {
        self.set_tracer(Some(tracer));
        self
    }

    pub fn set_tracer(&self, tracer: Option<SharedTracer>) {
        self.inner.lock().tracer = tracer;
    }

    pub fn config(&self) -> DevchainConfig {
        self.inner.lock().config.clone()
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.inner.lock().accounts.clone()
    }

    pub fn coinbase(&self) -> Address {
        self.inner.lock().coinbase
    }

    pub fn balance(&self, address: &Address) -> Wei {
        self.inner.lock().world.balance(address)
    }

    pub fn storage_at(&self, address: &Address, slot: &StorageSlot) -> Word {
        self.inner.lock().world.storage(address, slot)
    }

    pub fn code_at(&self, address: &Address) -> Option<ContractKind> {
        self.inner.lock().world.code(address)
    }

    pub fn height(&self) -> u64 {
        self.inner.lock().height()
    }

    pub fn block(&self, number: u64) -> Option<Block> {
        self.inner.lock().blocks.iter().find(|b| b.number == number).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn receipt(&self, hash: &TxHash) -> Option<Receipt> {
        self.inner.lock().receipts.get(hash).cloned()
    }

    /// Queue `tx` from an unlocked account; mined by the next block, or
    /// immediately when automine is on.
    pub fn submit(&self, tx: TransactionRequest) -> Result<TxHash, DevchainError> {
        let mut state = self.inner.lock();
        if !state.accounts.contains(&tx.from) {
            return Err(DevchainError::UnknownAccount(tx.from));
        }
        let need = gas::intrinsic_gas(&tx);
        if tx.gas < need {
            return Err(DevchainError::IntrinsicGas { gas: tx.gas, need });
        }
        if tx.gas > state.config.block_gas_limit {
            return Err(DevchainError::GasLimit { gas: tx.gas, limit: state.config.block_gas_limit });
        }
        let cost = u128::from(tx.gas)
            .saturating_mul(state.config.gas_price)
            .saturating_add(tx.value);
        let have = state.world.balance(&tx.from);
        if have < cost {
            return Err(DevchainError::InsufficientFunds { need: cost, have });
        }

        let next = state.world.nonce(&tx.from);
        let nonce = *state.pending_nonces.entry(tx.from).or_insert(next);
        state.pending_nonces.insert(tx.from, nonce + 1);
        let hash = tx_hash(&tx, nonce);
        debug!(%hash, from = %tx.from, nonce, create = tx.is_create(), "transaction queued");
        state.pending.push_back(PendingTx { hash, tx });

        if state.config.automine {
            state.mine_block();
        }
        Ok(hash)
    }

    /// Mine `count` blocks, returning the last one.
    pub fn mine(&self, count: u64) -> Option<Block> {
        let mut state = self.inner.lock();
        (0..count).map(|_| state.mine_block()).last()
    }

    /// Execute a read-only call against the latest state.
    pub fn call(&self, tx: &TransactionRequest) -> Result<Vec<u8>, DevchainError> {
        let state = self.inner.lock();
        let mut world = state.world.clone();
        let number = state.height();
        let ctx = TxContext {
            origin: tx.from,
            block_number: number,
            timestamp: state.genesis_timestamp + number * state.config.block_interval_secs,
        };
        let mut tx = tx.clone();
        if tx.gas == 0 {
            tx.gas = state.config.block_gas_limit;
        }
        drop(state);
        Executor::new(&mut world, &mut NoopTracer, ctx).call_readonly(&tx)
    }
}

#[async_trait]
impl NodeClient for Devchain {
    async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
        Ok(Devchain::accounts(self))
    }

    async fn balance(&self, address: Address) -> Result<Wei, ClientError> {
        Ok(Devchain::balance(self, &address))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ClientError> {
        Ok(self.submit(tx)?)
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ClientError> {
        Ok(Devchain::receipt(self, &hash))
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Vec<u8>, ClientError> {
        Ok(Devchain::call(self, &tx)?)
    }

    async fn mine_blocks(&self, count: u64) -> Result<(), ClientError> {
        self.mine(count);
        Ok(())
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.height())
    }
}
