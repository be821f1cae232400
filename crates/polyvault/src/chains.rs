//! Static supported-chain set.
//!
//! Paths follow BIP-44 with SLIP-44 coin types. EVM networks share coin type 60,
//! so they resolve to the same key (and address) by design of the ecosystem.

use crate::errors::WalletError;
use serde::Serialize;
use std::collections::BTreeSet;

/// How a chain turns a public key into a displayable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFormat {
    Ethereum,
    Bitcoin,
    SolanaLike,
    Generic,
}

/// Elliptic curve (and HD scheme) a chain's keys live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// BIP-32.
    Secp256k1,
    /// SLIP-0010, hardened steps only.
    Ed25519,
}

impl AddressFormat {
    pub const fn curve(self) -> Curve {
        match self {
            Self::SolanaLike => Curve::Ed25519,
            Self::Ethereum | Self::Bitcoin | Self::Generic => Curve::Secp256k1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    pub derivation_path: &'static str,
    pub address_format: AddressFormat,
}

impl ChainDescriptor {
    pub const fn curve(&self) -> Curve {
        self.address_format.curve()
    }
}

const fn chain(
    id: &'static str,
    name: &'static str,
    symbol: &'static str,
    derivation_path: &'static str,
    address_format: AddressFormat,
) -> ChainDescriptor {
    ChainDescriptor {
        id,
        name,
        symbol,
        derivation_path,
        address_format,
    }
}

const EVM_PATH: &str = "m/44'/60'/0'/0/0";

use AddressFormat::{Bitcoin, Ethereum, Generic, SolanaLike};

pub static SUPPORTED_CHAINS: &[ChainDescriptor] = &[
    // EVM
    chain("ethereum", "Ethereum", "ETH", EVM_PATH, Ethereum),
    chain("bsc", "BNB Smart Chain", "BNB", EVM_PATH, Ethereum),
    chain("polygon", "Polygon", "POL", EVM_PATH, Ethereum),
    chain("arbitrum", "Arbitrum One", "ETH", EVM_PATH, Ethereum),
    chain("optimism", "OP Mainnet", "ETH", EVM_PATH, Ethereum),
    chain("base", "Base", "ETH", EVM_PATH, Ethereum),
    chain("avalanche", "Avalanche C-Chain", "AVAX", EVM_PATH, Ethereum),
    chain("fantom", "Fantom", "FTM", EVM_PATH, Ethereum),
    chain("gnosis", "Gnosis", "xDAI", EVM_PATH, Ethereum),
    chain("celo", "Celo", "CELO", EVM_PATH, Ethereum),
    chain("cronos", "Cronos", "CRO", EVM_PATH, Ethereum),
    chain("moonbeam", "Moonbeam", "GLMR", EVM_PATH, Ethereum),
    chain("linea", "Linea", "ETH", EVM_PATH, Ethereum),
    chain("zksync", "zkSync Era", "ETH", EVM_PATH, Ethereum),
    chain("scroll", "Scroll", "ETH", EVM_PATH, Ethereum),
    chain("mantle", "Mantle", "MNT", EVM_PATH, Ethereum),
    chain("blast", "Blast", "ETH", EVM_PATH, Ethereum),
    chain("ethereum-classic", "Ethereum Classic", "ETC", "m/44'/61'/0'/0/0", Ethereum),
    // UTXO family
    chain("bitcoin", "Bitcoin", "BTC", "m/44'/0'/0'/0/0", Bitcoin),
    chain("litecoin", "Litecoin", "LTC", "m/44'/2'/0'/0/0", Bitcoin),
    chain("dogecoin", "Dogecoin", "DOGE", "m/44'/3'/0'/0/0", Bitcoin),
    chain("dash", "Dash", "DASH", "m/44'/5'/0'/0/0", Bitcoin),
    chain("zcash", "Zcash", "ZEC", "m/44'/133'/0'/0/0", Bitcoin),
    chain("bitcoin-cash", "Bitcoin Cash", "BCH", "m/44'/145'/0'/0/0", Bitcoin),
    // Ed25519 / SVM
    chain("solana", "Solana", "SOL", "m/44'/501'/0'/0'", SolanaLike),
    chain("eclipse", "Eclipse", "ETH", "m/44'/501'/1'/0'", SolanaLike),
    // Everything else
    chain("cosmos", "Cosmos Hub", "ATOM", "m/44'/118'/0'/0/0", Generic),
    chain("osmosis", "Osmosis", "OSMO", "m/44'/118'/1'/0/0", Generic),
    chain("tron", "TRON", "TRX", "m/44'/195'/0'/0/0", Generic),
    chain("ripple", "XRP Ledger", "XRP", "m/44'/144'/0'/0/0", Generic),
    chain("stellar", "Stellar", "XLM", "m/44'/148'/0'/0/0", Generic),
    chain("cardano", "Cardano", "ADA", "m/1852'/1815'/0'/0/0", Generic),
    chain("polkadot", "Polkadot", "DOT", "m/44'/354'/0'/0/0", Generic),
    chain("near", "NEAR", "NEAR", "m/44'/397'/0'/0/0", Generic),
    chain("aptos", "Aptos", "APT", "m/44'/637'/0'/0/0", Generic),
    chain("sui", "Sui", "SUI", "m/44'/784'/0'/0/0", Generic),
    chain("ton", "TON", "TON", "m/44'/607'/0'/0/0", Generic),
    chain("tezos", "Tezos", "XTZ", "m/44'/1729'/0'/0/0", Generic),
    chain("algorand", "Algorand", "ALGO", "m/44'/283'/0'/0/0", Generic),
    chain("hedera", "Hedera", "HBAR", "m/44'/3030'/0'/0/0", Generic),
    chain("filecoin", "Filecoin", "FIL", "m/44'/461'/0'/0/0", Generic),
    chain("kaspa", "Kaspa", "KAS", "m/44'/111111'/0'/0/0", Generic),
    chain("eos", "EOS", "EOS", "m/44'/194'/0'/0/0", Generic),
    chain("vechain", "VeChain", "VET", "m/44'/818'/0'/0/0", Generic),
    chain("icp", "Internet Computer", "ICP", "m/44'/223'/0'/0/0", Generic),
];

/// Lookup over a set of descriptors with unique ids.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainDescriptor>) -> eyre::Result<Self> {
        let mut seen = BTreeSet::new();
        for c in &chains {
            if !seen.insert(c.id) {
                eyre::bail!("duplicate chain id: {}", c.id);
            }
        }
        Ok(Self { chains })
    }

    pub fn builtin() -> Self {
        Self {
            chains: SUPPORTED_CHAINS.to_vec(),
        }
    }

    /// Restrict to `ids` (in registry order). An empty filter keeps every chain.
    pub fn filtered(&self, ids: &[String]) -> Result<Self, WalletError> {
        if ids.is_empty() {
            return Ok(self.clone());
        }
        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(WalletError::UnknownChain(unknown.clone()));
        }
        let chains = self
            .chains
            .iter()
            .filter(|c| ids.iter().any(|id| id == c.id))
            .copied()
            .collect();
        Ok(Self { chains })
    }

    pub fn get(&self, id: &str) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[ChainDescriptor] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::DerivationPath;
    use std::str::FromStr as _;

    #[test]
    fn builtin_ids_are_unique_and_paths_parse() -> eyre::Result<()> {
        let reg = ChainRegistry::new(SUPPORTED_CHAINS.to_vec())?;
        assert!(reg.len() >= 40, "expected 40+ chains, got {}", reg.len());
        for c in reg.all() {
            DerivationPath::from_str(c.derivation_path)
                .map_err(|e| eyre::eyre!("{}: {e}", c.id))?;
        }
        Ok(())
    }

    #[test]
    fn every_format_is_represented() {
        for f in [Ethereum, Bitcoin, SolanaLike, Generic] {
            assert!(
                SUPPORTED_CHAINS.iter().any(|c| c.address_format == f),
                "no chain uses {f:?}"
            );
        }
    }

    #[test]
    fn ed25519_paths_are_fully_hardened() -> eyre::Result<()> {
        for c in SUPPORTED_CHAINS.iter().filter(|c| c.curve() == Curve::Ed25519) {
            let path = DerivationPath::from_str(c.derivation_path)?;
            assert!(
                path.as_ref().iter().all(|n| n.is_hardened()),
                "{} must be hardened-only",
                c.id
            );
        }
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dup = vec![SUPPORTED_CHAINS[0], SUPPORTED_CHAINS[0]];
        assert!(ChainRegistry::new(dup).is_err());
    }

    #[test]
    fn filter_keeps_registry_order_and_rejects_unknown_ids() -> eyre::Result<()> {
        let reg = ChainRegistry::builtin();
        let sub = reg.filtered(&["solana".to_owned(), "ethereum".to_owned()])?;
        let ids: Vec<_> = sub.all().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["ethereum", "solana"]);

        let err = reg.filtered(&["atlantis".to_owned()]).err();
        assert_eq!(err, Some(WalletError::UnknownChain("atlantis".to_owned())));
        assert_eq!(reg.filtered(&[])?.len(), reg.len());
        Ok(())
    }
}
