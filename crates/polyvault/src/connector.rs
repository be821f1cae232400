//! Pluggable per-chain wallet connectors, resolved by capability.

use crate::{chains::ChainDescriptor, errors::WalletError, wallet::WalletAccount};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What a connector hands back for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connector: &'static str,
    pub chain_id: String,
    pub address: String,
    pub public_key: String,
}

pub trait WalletConnector: Send + Sync {
    /// Stable identifier, e.g. `"vault"`.
    fn tag(&self) -> &'static str;

    fn supports(&self, chain: &ChainDescriptor) -> bool;

    fn connect(
        &self,
        chain: &ChainDescriptor,
        accounts: &[WalletAccount],
    ) -> eyre::Result<Connection>;
}

/// Serves the accounts derived by this vault for every chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultConnector;

impl WalletConnector for VaultConnector {
    fn tag(&self) -> &'static str {
        "vault"
    }

    fn supports(&self, _chain: &ChainDescriptor) -> bool {
        true
    }

    fn connect(
        &self,
        chain: &ChainDescriptor,
        accounts: &[WalletAccount],
    ) -> eyre::Result<Connection> {
        let account = accounts
            .iter()
            .find(|a| a.chain_id == chain.id)
            .ok_or_else(|| WalletError::chain(chain.id, "no unlocked account for chain"))?;
        Ok(Connection {
            connector: self.tag(),
            chain_id: account.chain_id.clone(),
            address: account.address.clone(),
            public_key: account.public_key.clone(),
        })
    }
}

/// Ordered list of connectors; the first one that supports a chain wins.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn WalletConnector>>,
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.connectors.iter().map(|c| c.tag()))
            .finish()
    }
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with only [`VaultConnector`].
    pub fn with_vault() -> Self {
        let mut r = Self::new();
        r.register(Arc::new(VaultConnector));
        r
    }

    pub fn register(&mut self, connector: Arc<dyn WalletConnector>) {
        self.connectors.push(connector);
    }

    pub fn resolve(&self, chain: &ChainDescriptor) -> Option<&dyn WalletConnector> {
        self.connectors
            .iter()
            .find(|c| c.supports(chain))
            .map(|c| c.as_ref())
    }

    pub fn connect(
        &self,
        chain: &ChainDescriptor,
        accounts: &[WalletAccount],
    ) -> eyre::Result<Connection> {
        let connector = self
            .resolve(chain)
            .ok_or_else(|| WalletError::chain(chain.id, "no connector supports this chain"))?;
        debug!(chain = chain.id, connector = connector.tag(), "connecting");
        connector.connect(chain, accounts)
    }
}
