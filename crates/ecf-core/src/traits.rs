//! Trait interfaces between crates.
//!
//! - [`NodeClient`] — the node RPC surface the scenario drives (ecf-rpc and
//!   ecf-devchain implement)
//! - [`ExecutionTracer`] — execution hooks fired by an interpreter
//!   (ecf-checker implements, ecf-devchain calls)

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{
    Address, CallKind, Receipt, StorageSlot, TransactionRequest, TxContext, TxHash, Wei, Word,
};

/// Operations a blockchain node exposes to an operator.
///
/// Transactions are submitted from unlocked node accounts; they take effect
/// once a block containing them is mined.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Unlocked accounts managed by the node, operator first.
    async fn accounts(&self) -> Result<Vec<Address>, ClientError>;

    /// Balance of an account or contract at the latest block.
    async fn balance(&self, address: Address) -> Result<Wei, ClientError>;

    /// Submit a transaction; returns its hash without waiting for inclusion.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ClientError>;

    /// Receipt of a mined transaction, `None` while pending.
    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ClientError>;

    /// Execute a read-only call against the latest state and return its output.
    async fn call(&self, tx: TransactionRequest) -> Result<Vec<u8>, ClientError>;

    /// Force production of `count` blocks, returning once they are mined.
    async fn mine_blocks(&self, count: u64) -> Result<(), ClientError>;

    /// Height of the latest block.
    async fn block_number(&self) -> Result<u64, ClientError>;

    /// Mine one block at a time until `hash` has a receipt.
    ///
    /// Default implementation polls [`receipt`](Self::receipt) and fails with
    /// [`ClientError::ReceiptTimeout`] after `max_blocks` blocks.
    async fn wait_for_receipt(&self, hash: TxHash, max_blocks: u64) -> Result<Receipt, ClientError> {
        let mut mined = 0;
        loop {
            if let Some(receipt) = self.receipt(hash).await? {
                return Ok(receipt);
            }
            if mined >= max_blocks {
                return Err(ClientError::ReceiptTimeout { tx: hash, blocks: mined });
            }
            self.mine_blocks(1).await?;
            mined += 1;
        }
    }
}

/// Hooks fired while contract code executes.
///
/// `on_enter`/`on_exit` bracket every run of contract code, including runs
/// entered through delegated calls. `on_call` fires just before control moves
/// into a callee, so the next `on_enter` can tell real calls from delegated
/// ones. All methods default to no-ops.
pub trait ExecutionTracer: Send {
    fn on_enter(&mut self, _ctx: &TxContext, _contract: Address) {}

    fn on_exit(&mut self, _ctx: &TxContext, _contract: Address) {}

    fn on_sload(&mut self, _contract: Address, _slot: &StorageSlot, _value: &Word) {}

    fn on_sstore(&mut self, _contract: Address, _slot: &StorageSlot, _value: &Word) {}

    fn on_call(&mut self, _caller: Address, _callee: Address, _value: Wei, _kind: CallKind) {}
}
