//! Transactions sent from one unlocked node account.

use tracing::{debug, info};

use ecf_core::abi::{self, Token};
use ecf_core::artifacts::ContractArtifact;
use ecf_core::constants::selectors;
use ecf_core::error::ClientError;
use ecf_core::traits::NodeClient;
use ecf_core::types::{Address, TransactionRequest, TxHash, Wei, Word};

use crate::config::ScenarioConfig;
use crate::error::ScenarioError;

/// Deploys, donates and pays on behalf of `account`.
pub struct Operator<'a, C: NodeClient + ?Sized> {
    client: &'a C,
    account: Address,
    cfg: &'a ScenarioConfig,
}

impl<'a, C: NodeClient + ?Sized> Operator<'a, C> {
    pub fn new(client: &'a C, account: Address, cfg: &'a ScenarioConfig) -> Self {
        Self { client, account, cfg }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Deploy `artifact` with constructor `args` and wait until it is mined.
    pub async fn deploy(&self, artifact: &ContractArtifact, args: &[Token]) -> Result<Address, ScenarioError> {
        let init_code = abi::encode_constructor(&artifact.bytecode()?, args);
        let tx = TransactionRequest::create(self.account, init_code, self.cfg.deploy_gas);
        let hash = self.client.send_transaction(tx).await?;
        debug!(%hash, contract = artifact.name, "deployment submitted");

        let receipt = self.client.wait_for_receipt(hash, self.cfg.max_receipt_wait_blocks).await?;
        let address = receipt.contract_address.ok_or(ClientError::ContractNotDeployed(hash))?;
        info!("{} deployed at {address}", artifact.name);
        Ok(address)
    }

    /// Call a contract method, attaching `value`.
    pub async fn invoke(&self, to: Address, data: Vec<u8>, value: Wei, gas: u64) -> Result<TxHash, ScenarioError> {
        let hash = self
            .client
            .send_transaction(TransactionRequest::invoke(self.account, to, data, value, gas))
            .await?;
        debug!(%hash, %to, value, "invocation submitted");
        Ok(hash)
    }

    /// `dao.donate(to)` with `value` wei.
    pub async fn donate(&self, dao: Address, to: Address, value: Wei) -> Result<TxHash, ScenarioError> {
        let data = abi::encode_call(selectors::DONATE, &[Token::Address(to)]);
        self.invoke(dao, data, value, self.cfg.donate_gas).await
    }

    /// Plain payment, which runs the recipient's fallback if it is a contract.
    pub async fn transfer(&self, to: Address, value: Wei, gas: u64) -> Result<TxHash, ScenarioError> {
        let hash = self
            .client
            .send_transaction(TransactionRequest::transfer(self.account, to, value, gas))
            .await?;
        debug!(%hash, %to, value, "payment submitted");
        Ok(hash)
    }

    /// `dao.credit(holder)` read at the latest block.
    ///
    /// Returned as a full word since the vulnerable build can wrap a
    /// credit below zero.
    pub async fn credit(&self, dao: Address, holder: Address) -> Result<Word, ScenarioError> {
        let data = abi::encode_call(selectors::CREDIT, &[Token::Address(holder)]);
        let output = self.client.call(TransactionRequest::invoke(self.account, dao, data, 0, 0)).await?;
        Ok(abi::decode_word(&output, 0)?)
    }

    pub async fn balance(&self, address: Address) -> Result<Wei, ScenarioError> {
        Ok(self.client.balance(address).await?)
    }

    /// Force `count` blocks.
    pub async fn mine(&self, count: u64) -> Result<(), ScenarioError> {
        if count > 0 {
            self.client.mine_blocks(count).await?;
        }
        Ok(())
    }
}
