//! Hierarchical-deterministic key derivation.
//!
//! secp256k1 chains walk BIP-32 from the `"Bitcoin seed"` master key; ed25519
//! chains walk SLIP-0010 from the `"ed25519 seed"` master key and only accept
//! hardened steps.

use crate::{
    address,
    chains::{ChainDescriptor, Curve},
    errors::WalletError,
    mnemonic::Seed,
    wallet::WalletAccount,
};
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::{self, Secp256k1};
use bitcoin::Network;
use hmac::{Hmac, Mac as _};
use sha2::Sha512;
use std::{str::FromStr as _, sync::Arc, time::Duration};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;
const ED25519_MASTER_KEY: &[u8] = b"ed25519 seed";

pub const DEFAULT_PER_CHAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKey {
    Secp256k1(secp256k1::PublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// Compressed SEC1 (33 bytes) or raw ed25519 (32 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Secp256k1(pk) => pk.serialize().to_vec(),
            Self::Ed25519(vk) => vk.to_bytes().to_vec(),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// Terminal keypair of a derivation path. The private half is wiped on drop.
pub struct DerivedKey {
    pub private_key: Zeroizing<[u8; 32]>,
    pub public_key: PublicKey,
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key.to_hex())
            .finish()
    }
}

pub fn derive_account(seed: &Seed, chain: &ChainDescriptor) -> Result<DerivedKey, WalletError> {
    let path = DerivationPath::from_str(chain.derivation_path)
        .map_err(|e| WalletError::chain(chain.id, format!("invalid derivation path: {e}")))?;
    let derived = match chain.curve() {
        Curve::Secp256k1 => derive_secp256k1(seed.as_bytes(), &path),
        Curve::Ed25519 => derive_ed25519(seed.as_bytes(), &path),
    };
    derived.map_err(|reason| WalletError::chain(chain.id, reason))
}

/// Derive, encode, and drop the private key before returning.
pub fn derive_wallet_account(
    seed: &Seed,
    chain: &ChainDescriptor,
) -> Result<WalletAccount, WalletError> {
    let key = derive_account(seed, chain)?;
    let address = address::encode(chain, &key.public_key)?;
    let account = WalletAccount {
        chain_id: chain.id.to_owned(),
        address,
        public_key: key.public_key.to_hex(),
        derivation_path: chain.derivation_path.to_owned(),
    };
    drop(key);
    Ok(account)
}

fn derive_secp256k1(seed: &[u8], path: &DerivationPath) -> Result<DerivedKey, String> {
    let secp = Secp256k1::new();
    let master = Xpriv::new_master(Network::Bitcoin, seed).map_err(|e| format!("master key: {e}"))?;
    let child = master
        .derive_priv(&secp, path)
        .map_err(|e| format!("derive child: {e}"))?;
    let mut sk = child.private_key;
    let public_key = PublicKey::Secp256k1(secp256k1::PublicKey::from_secret_key(&secp, &sk));
    let private_key = Zeroizing::new(sk.secret_bytes());
    sk.non_secure_erase();
    Ok(DerivedKey {
        private_key,
        public_key,
    })
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Zeroizing<[u8; 64]>, String> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| format!("hmac init: {e}"))?;
    mac.update(data);
    let mut out = Zeroizing::new([0_u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Split an HMAC output into (key, chain code).
fn split_halves(i: &Zeroizing<[u8; 64]>) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let (l, r) = i.split_at(32);
    let mut key = Zeroizing::new([0_u8; 32]);
    let mut chain_code = Zeroizing::new([0_u8; 32]);
    key.copy_from_slice(l);
    chain_code.copy_from_slice(r);
    (key, chain_code)
}

fn derive_ed25519(seed: &[u8], path: &DerivationPath) -> Result<DerivedKey, String> {
    let (mut key, mut chain_code) = split_halves(&hmac_sha512(ED25519_MASTER_KEY, seed)?);

    for step in path.as_ref() {
        let ChildNumber::Hardened { index } = *step else {
            return Err(format!("ed25519 requires hardened steps, got {step}"));
        };
        // 0x00 || key || ser32(index | 2^31)
        let mut data = Zeroizing::new([0_u8; 37]);
        let (_, rest) = data.split_at_mut(1);
        let (key_part, index_part) = rest.split_at_mut(32);
        key_part.copy_from_slice(key.as_ref());
        index_part.copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

        (key, chain_code) = split_halves(&hmac_sha512(chain_code.as_ref(), data.as_ref())?);
    }

    let signing = ed25519_dalek::SigningKey::from_bytes(&key);
    Ok(DerivedKey {
        public_key: PublicKey::Ed25519(signing.verifying_key()),
        private_key: key,
    })
}

/// Batch derivation across chains. Failing chains are logged and left out.
#[derive(Debug, Clone)]
pub struct KeyDerivationEngine {
    per_chain_timeout: Duration,
}

impl Default for KeyDerivationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PER_CHAIN_TIMEOUT)
    }
}

impl KeyDerivationEngine {
    pub const fn new(per_chain_timeout: Duration) -> Self {
        Self { per_chain_timeout }
    }

    /// Derive every chain on the blocking pool, in parallel.
    ///
    /// Output keeps the order of `chains`; chains that fail or exceed the
    /// per-chain timeout are absent.
    pub async fn derive_all(
        &self,
        seed: Arc<Seed>,
        chains: &[ChainDescriptor],
    ) -> Vec<WalletAccount> {
        let limit = self.per_chain_timeout;
        let mut set = JoinSet::new();
        for (idx, chain) in chains.iter().copied().enumerate() {
            let seed = Arc::clone(&seed);
            set.spawn(async move {
                let job = tokio::task::spawn_blocking(move || derive_wallet_account(&seed, &chain));
                let outcome = match tokio::time::timeout(limit, job).await {
                    Ok(Ok(res)) => res,
                    Ok(Err(e)) => Err(WalletError::chain(chain.id, format!("worker failed: {e}"))),
                    Err(_) => Err(WalletError::chain(
                        chain.id,
                        format!("timed out after {}ms", limit.as_millis()),
                    )),
                };
                (idx, outcome)
            });
        }
        drop(seed);

        let mut slots: Vec<Option<WalletAccount>> = vec![None; chains.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(account))) => {
                    if let Some(slot) = slots.get_mut(idx) {
                        *slot = Some(account);
                    }
                }
                Ok((_, Err(e))) => warn!(error = %e, "skipping chain"),
                Err(e) => warn!(error = %e, "derivation task aborted"),
            }
        }
        let accounts: Vec<WalletAccount> = slots.into_iter().flatten().collect();
        debug!(
            requested = chains.len(),
            derived = accounts.len(),
            "batch derivation finished"
        );
        accounts
    }

    /// Sequential variant for callers without a runtime. No timeout applies.
    pub fn derive_all_blocking(seed: &Seed, chains: &[ChainDescriptor]) -> Vec<WalletAccount> {
        chains
            .iter()
            .filter_map(|chain| match derive_wallet_account(seed, chain) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!(error = %e, "skipping chain");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{AddressFormat, ChainRegistry, SUPPORTED_CHAINS};
    use eyre::ContextCompat as _;
    use secrecy::SecretString;
    use std::collections::BTreeMap;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn abandon_seed() -> eyre::Result<Seed> {
        Ok(crate::mnemonic::to_seed(&SecretString::new(
            ABANDON.to_owned().into(),
        ))?)
    }

    fn builtin(id: &str) -> eyre::Result<ChainDescriptor> {
        SUPPORTED_CHAINS
            .iter()
            .find(|c| c.id == id)
            .copied()
            .with_context(|| format!("missing chain {id}"))
    }

    const BROKEN: ChainDescriptor = ChainDescriptor {
        id: "broken",
        name: "Broken",
        symbol: "BRK",
        derivation_path: "m/44'/not-a-number'/0'",
        address_format: AddressFormat::Generic,
    };

    const SOFT_ED25519: ChainDescriptor = ChainDescriptor {
        id: "soft-ed25519",
        name: "Soft",
        symbol: "SFT",
        derivation_path: "m/44'/501'/0'/0",
        address_format: AddressFormat::SolanaLike,
    };

    #[test]
    fn zero_seed_ethereum_golden_vector() -> eyre::Result<()> {
        let seed = Seed::from_bytes(&[0_u8; 32]);
        let account = derive_wallet_account(&seed, &builtin("ethereum")?)?;
        assert_eq!(account.address, "0xaca6302ecbde40120cb8a08361d8bd461282bd18");
        assert_eq!(
            account.public_key,
            "032871702a7d03cc20ccd481d04fc5efa509b3a10539ae6a352d7bc8db5b2ace0b"
        );
        Ok(())
    }

    #[test]
    fn ethereum_matches_alloy_mnemonic_signer() -> eyre::Result<()> {
        use alloy::signers::local::{coins_bip39::English, MnemonicBuilder};

        let account = derive_wallet_account(&abandon_seed()?, &builtin("ethereum")?)?;
        let reference = MnemonicBuilder::<English>::default()
            .phrase(ABANDON)
            .index(0)?
            .build()?;
        assert_eq!(
            account.address,
            reference.address().to_checksum(None).to_lowercase()
        );
        assert_eq!(account.address, "0x9858effd232b4033e47d90003d41ec34ecaeda94");
        Ok(())
    }

    #[test]
    fn bip44_bitcoin_public_key_vector() -> eyre::Result<()> {
        let key = derive_account(&abandon_seed()?, &builtin("bitcoin")?)?;
        assert_eq!(
            key.public_key.to_hex(),
            "03aaeb52dd7494c361049de67cc680e83ebcbbbdbeb13637d92cd845f70308af5e"
        );
        Ok(())
    }

    #[test]
    fn slip10_solana_public_key_vector() -> eyre::Result<()> {
        let key = derive_account(&abandon_seed()?, &builtin("solana")?)?;
        assert_eq!(
            key.public_key.to_hex(),
            "f036276246a75b9de3349ed42b15e232f6518fc20f5fcd4f1d64e81f9bd258f7"
        );
        // Same key Solana wallets display as HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk.
        assert_eq!(
            bs58::encode(key.public_key.to_bytes()).into_string(),
            "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk"
        );
        Ok(())
    }

    #[test]
    fn derivation_is_deterministic() -> eyre::Result<()> {
        let seed = abandon_seed()?;
        for chain in SUPPORTED_CHAINS {
            let a = derive_account(&seed, chain)?;
            let b = derive_account(&seed, chain)?;
            assert_eq!(a.public_key, b.public_key, "{}", chain.id);
            assert_eq!(*a.private_key, *b.private_key, "{}", chain.id);
        }
        Ok(())
    }

    #[test]
    fn malformed_path_is_a_chain_error() {
        let seed = Seed::from_bytes(&[1_u8; 32]);
        let err = derive_account(&seed, &BROKEN).err();
        assert!(matches!(
            err,
            Some(WalletError::ChainDerivation { ref chain, .. }) if chain == "broken"
        ));
    }

    #[test]
    fn ed25519_rejects_non_hardened_steps() {
        let seed = Seed::from_bytes(&[1_u8; 32]);
        assert!(derive_account(&seed, &SOFT_ED25519).is_err());
    }

    #[test]
    fn blocking_batch_skips_failures() -> eyre::Result<()> {
        let seed = abandon_seed()?;
        let chains = [builtin("ethereum")?, BROKEN, builtin("solana")?];
        let accounts = KeyDerivationEngine::derive_all_blocking(&seed, &chains);
        let ids: Vec<_> = accounts.iter().map(|a| a.chain_id.as_str()).collect();
        assert_eq!(ids, vec!["ethereum", "solana"]);
        Ok(())
    }

    #[tokio::test]
    async fn parallel_batch_matches_sequential_and_keeps_order() -> eyre::Result<()> {
        let seed = Arc::new(abandon_seed()?);
        let mut chains = SUPPORTED_CHAINS.to_vec();
        chains.insert(3, BROKEN);
        chains.push(SOFT_ED25519);

        let engine = KeyDerivationEngine::default();
        let parallel = engine.derive_all(Arc::clone(&seed), &chains).await;
        let sequential = KeyDerivationEngine::derive_all_blocking(&seed, &chains);

        assert_eq!(parallel.len(), SUPPORTED_CHAINS.len());
        assert_eq!(parallel, sequential);
        Ok(())
    }

    #[tokio::test]
    async fn distinct_paths_yield_distinct_keys() -> eyre::Result<()> {
        let seed = Arc::new(abandon_seed()?);
        let registry = ChainRegistry::builtin();
        let accounts = KeyDerivationEngine::default()
            .derive_all(seed, registry.all())
            .await;
        assert_eq!(accounts.len(), registry.len());

        let mut by_path: BTreeMap<&str, &str> = BTreeMap::new();
        for a in &accounts {
            let prev = by_path.insert(a.derivation_path.as_str(), a.public_key.as_str());
            if let Some(prev) = prev {
                // EVM networks share a path and must agree.
                assert_eq!(prev, a.public_key, "{}", a.derivation_path);
            }
        }
        let mut keys: Vec<_> = by_path.values().collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before, "two distinct paths produced the same key");
        Ok(())
    }
}
