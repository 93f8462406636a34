//! JSON-RPC backend on top of an alloy HTTP provider.

use crate::{BackendError, ChainBackend};
use alloy::providers::{
    DynProvider, PendingTransactionError, Provider, ProviderBuilder, WatchTxError,
};
use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, Bytes, B256};
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use std::{fmt, time::Duration};
use tracing::debug;
use url::Url;

/// [`ChainBackend`] talking to a node over HTTP JSON-RPC.
///
/// With a signer the provider fills and signs transactions locally; without
/// one, transactions are sent from `sender` and signed by the node.
#[derive(Clone)]
pub struct RpcBackend {
    provider: DynProvider,
    sender: Option<Address>,
    url: Url,
}

impl RpcBackend {
    /// Connects to `url`, signing with `signer` when given.
    pub fn connect(url: Url, signer: Option<PrivateKeySigner>, sender: Option<Address>) -> Self {
        let sender = sender.or_else(|| signer.as_ref().map(|signer| signer.address()));
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url.clone())
                .erased(),
            None => ProviderBuilder::new().connect_http(url.clone()).erased(),
        };
        Self {
            provider,
            sender,
            url,
        }
    }

    /// Account transactions are sent from, if known.
    pub const fn sender(&self) -> Option<Address> {
        self.sender
    }

    /// Endpoint the provider talks to.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    fn request(&self) -> TransactionRequest {
        let request = TransactionRequest::default();
        match self.sender {
            Some(from) => request.with_from(from),
            None => request,
        }
    }

    async fn send(
        &self,
        request: TransactionRequest,
        timeout: Duration,
    ) -> Result<TransactionReceipt, BackendError> {
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        debug!(target: "deplink::rpc", tx_hash = %pending.tx_hash(), "waiting for receipt");

        let receipt = pending
            .with_timeout(Some(timeout))
            .get_receipt()
            .await
            .map_err(|err| match err {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    BackendError::Timeout { timeout }
                }
                other => BackendError::Transport(other.to_string()),
            })?;

        if !receipt.status() {
            return Err(BackendError::Reverted {
                tx_hash: receipt.transaction_hash,
            });
        }
        Ok(receipt)
    }
}

impl fmt::Debug for RpcBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcBackend")
            .field("url", &self.url.as_str())
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChainBackend for RpcBackend {
    async fn code_at(&self, address: Address) -> Result<Bytes, BackendError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, BackendError> {
        let request = self.request().with_to(to).with_input(input);
        self.provider
            .call(request)
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))
    }

    async fn transact(
        &self,
        to: Address,
        input: Bytes,
        timeout: Duration,
    ) -> Result<B256, BackendError> {
        let request = self.request().with_to(to).with_input(input);
        let receipt = self.send(request, timeout).await?;
        Ok(receipt.transaction_hash)
    }

    async fn deploy(&self, code: Bytes, timeout: Duration) -> Result<Address, BackendError> {
        let request = self.request().with_deploy_code(code);
        let receipt = self.send(request, timeout).await?;
        receipt
            .contract_address
            .ok_or(BackendError::MissingContractAddress {
                tx_hash: receipt.transaction_hash,
            })
    }
}
