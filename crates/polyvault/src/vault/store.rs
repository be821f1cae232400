use crate::{
    errors::WalletError,
    vault::{cipher::VaultCipher, kv::KvStore},
    wallet::EncryptedWallet,
};
use chrono::{DateTime, Utc};
use eyre::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const WALLETS_KEY: &str = "wallets";
pub const CURRENT_WALLET_KEY: &str = "currentWalletId";
pub const EXPORT_VERSION: &str = "1.0";

/// Plaintext backup of one wallet. Wiped on drop.
#[derive(Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct ExportedWallet {
    pub id: String,
    pub name: String,
    #[zeroize(skip)]
    pub created_at: DateTime<Utc>,
    pub mnemonic: String,
}

impl std::fmt::Debug for ExportedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedWallet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFailure {
    pub id: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub wallets: Vec<ExportedWallet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<ExportFailure>,
    pub exported_at: DateTime<Utc>,
    pub version: &'static str,
}

/// Encrypted wallet list plus the current-wallet selector, on top of a [`KvStore`].
#[derive(Debug)]
pub struct WalletVaultStore<S> {
    kv: S,
}

impl<S: KvStore> WalletVaultStore<S> {
    pub const fn new(kv: S) -> Self {
        Self { kv }
    }

    pub const fn kv(&self) -> &S {
        &self.kv
    }

    /// Missing record reads as an empty list; an unreadable one is an error.
    pub fn list(&self) -> eyre::Result<Vec<EncryptedWallet>> {
        let Some(raw) = self.kv.get(WALLETS_KEY)? else {
            return Ok(vec![]);
        };
        serde_json::from_str(&raw).context("parse wallets")
    }

    pub fn get(&self, id: &str) -> eyre::Result<Option<EncryptedWallet>> {
        Ok(self.list()?.into_iter().find(|w| w.id == id))
    }

    fn write_list(&self, wallets: &[EncryptedWallet]) -> eyre::Result<()> {
        let s = serde_json::to_string_pretty(wallets).context("serialize wallets")?;
        self.kv.set(WALLETS_KEY, &s)
    }

    /// Appends `wallet`. Ids must be unique.
    pub fn save(&self, wallet: &EncryptedWallet) -> eyre::Result<()> {
        let _guard = self.kv.write_guard()?;
        let mut wallets = self.list().map_err(|e| WalletError::storage(&e))?;
        if wallets.iter().any(|w| w.id == wallet.id) {
            eyre::bail!("wallet id already exists: {}", wallet.id);
        }
        wallets.push(wallet.clone());
        self.write_list(&wallets)
            .map_err(|e| WalletError::storage(&e))?;
        info!(wallet_id = %wallet.id, total = wallets.len(), "saved wallet");
        Ok(())
    }

    pub fn set_current(&self, id: &str) -> eyre::Result<()> {
        let _guard = self.kv.write_guard()?;
        if !self.list()?.iter().any(|w| w.id == id) {
            return Err(WalletError::WalletNotFound(id.to_owned()).into());
        }
        let s = serde_json::to_string(id).context("serialize current wallet id")?;
        self.kv
            .set(CURRENT_WALLET_KEY, &s)
            .map_err(|e| WalletError::storage(&e))?;
        Ok(())
    }

    pub fn get_current_id(&self) -> eyre::Result<Option<String>> {
        let Some(raw) = self.kv.get(CURRENT_WALLET_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).context("parse current wallet id")
    }

    /// Removes every wallet and the selector.
    pub fn clear_all(&self) -> eyre::Result<()> {
        let _guard = self.kv.write_guard()?;
        self.kv.delete(WALLETS_KEY)?;
        self.kv.delete(CURRENT_WALLET_KEY)?;
        info!("cleared all wallets");
        Ok(())
    }

    /// Decrypt every wallet with `password`. Wallets that do not open are
    /// reported under `failed` instead of aborting the export.
    pub fn export_all(
        &self,
        cipher: &VaultCipher,
        password: &SecretString,
    ) -> eyre::Result<ExportBundle> {
        let mut bundle = ExportBundle {
            wallets: vec![],
            failed: vec![],
            exported_at: Utc::now(),
            version: EXPORT_VERSION,
        };
        for w in self.list()? {
            match cipher.decrypt(&w.encrypted_mnemonic, password) {
                Ok(phrase) => bundle.wallets.push(ExportedWallet {
                    id: w.id,
                    name: w.name,
                    created_at: w.created_at,
                    mnemonic: phrase.expose_secret().to_owned(),
                }),
                Err(e) => {
                    warn!(wallet_id = %w.id, "wallet excluded from export");
                    bundle.failed.push(ExportFailure {
                        id: w.id,
                        name: w.name,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(bundle)
    }
}
