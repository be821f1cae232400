//! Wallet state machine: `Uninitialized` → `Locked` ⇄ `Unlocked`.

use crate::{
    chains::{ChainDescriptor, ChainRegistry},
    config::PolyvaultConfig,
    derivation::KeyDerivationEngine,
    errors::WalletError,
    mnemonic,
    vault::{ExportBundle, KvStore, VaultCipher, WalletVaultStore},
    wallet::{EncryptedWallet, WalletAccount, WalletState},
};
use eyre::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Uninitialized,
    Locked,
    Unlocked,
}

impl LifecycleStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }

    fn of(state: &WalletState) -> Self {
        if state.is_unlocked {
            Self::Unlocked
        } else if state.wallets.is_empty() {
            Self::Uninitialized
        } else {
            Self::Locked
        }
    }
}

fn invalid(op: &'static str, status: LifecycleStatus) -> eyre::Report {
    WalletError::InvalidState {
        op,
        state: status.as_str(),
    }
    .into()
}

pub struct WalletLifecycle<S> {
    store: WalletVaultStore<S>,
    chains: ChainRegistry,
    engine: KeyDerivationEngine,
    cipher: VaultCipher,
    state: Mutex<WalletState>,
}

impl<S: KvStore> WalletLifecycle<S> {
    /// Load persisted wallets. Always starts locked; unreadable storage
    /// starts `Uninitialized` rather than failing.
    pub fn open(
        store: WalletVaultStore<S>,
        chains: ChainRegistry,
        engine: KeyDerivationEngine,
        cipher: VaultCipher,
    ) -> Self {
        let state = load_state(&store);
        info!(
            wallets = state.wallets.len(),
            chains = chains.len(),
            status = LifecycleStatus::of(&state).as_str(),
            "wallet lifecycle opened"
        );
        Self {
            store,
            chains,
            engine,
            cipher,
            state: Mutex::new(state),
        }
    }

    pub fn from_config(kv: S, cfg: &PolyvaultConfig) -> eyre::Result<Self> {
        Ok(Self::open(
            WalletVaultStore::new(kv),
            cfg.chain_registry()?,
            KeyDerivationEngine::new(cfg.per_chain_timeout()),
            VaultCipher::new(cfg.kdf_params()),
        ))
    }

    pub fn chains(&self) -> &[ChainDescriptor] {
        self.chains.all()
    }

    pub const fn store(&self) -> &WalletVaultStore<S> {
        &self.store
    }

    pub async fn status(&self) -> LifecycleStatus {
        LifecycleStatus::of(&*self.state.lock().await)
    }

    pub async fn state(&self) -> WalletState {
        self.state.lock().await.clone()
    }

    /// Accounts of the current wallet; empty unless unlocked.
    pub async fn accounts(&self) -> Vec<WalletAccount> {
        self.state
            .lock()
            .await
            .current_wallet
            .as_ref()
            .map(|w| w.accounts.clone())
            .unwrap_or_default()
    }

    /// Seal and persist `phrase`. The new wallet starts locked; the first
    /// wallet ever created becomes the current one.
    pub async fn create_wallet(
        &self,
        name: &str,
        phrase: &SecretString,
        password: &SecretString,
    ) -> eyre::Result<EncryptedWallet> {
        let mut st = self.state.lock().await;
        let status = LifecycleStatus::of(&st);
        if status == LifecycleStatus::Unlocked {
            return Err(invalid("create_wallet", status));
        }
        if !mnemonic::validate(phrase.expose_secret()) {
            return Err(WalletError::InvalidMnemonic.into());
        }

        let wallet = EncryptedWallet::new(name.to_owned(), self.cipher.encrypt(phrase, password)?);
        self.store.save(&wallet)?;
        // Persisted from here on, so track it even if the selector write fails.
        st.wallets.push(wallet.clone());
        st.is_initialized = true;
        if st.current_wallet.is_none() {
            self.store.set_current(&wallet.id)?;
            st.current_wallet = Some(wallet.clone());
        }
        info!(wallet_id = %wallet.id, "created wallet");
        Ok(wallet)
    }

    /// Generate a fresh phrase and create a wallet from it. The phrase is
    /// returned once so the caller can show it for backup.
    pub async fn generate_wallet(
        &self,
        name: &str,
        password: &SecretString,
    ) -> eyre::Result<(EncryptedWallet, SecretString)> {
        let phrase = mnemonic::generate(mnemonic::DEFAULT_ENTROPY_BITS)?;
        let wallet = self.create_wallet(name, &phrase, password).await?;
        Ok((wallet, phrase))
    }

    /// Decrypt `wallet_id`, make it current, and derive its accounts.
    pub async fn unlock(
        &self,
        wallet_id: &str,
        password: &SecretString,
    ) -> eyre::Result<Vec<WalletAccount>> {
        let mut st = self.state.lock().await;
        let status = LifecycleStatus::of(&st);
        if status != LifecycleStatus::Locked {
            return Err(invalid("unlock", status));
        }
        let mut wallet = st
            .wallets
            .iter()
            .find(|w| w.id == wallet_id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_owned()))?;

        // Argon2id and PBKDF2 both run off the executor.
        let cipher = self.cipher;
        let sealed = wallet.encrypted_mnemonic.clone();
        let password = SecretString::new(password.expose_secret().into());
        let seed = tokio::task::spawn_blocking(move || {
            let phrase = cipher.decrypt(&sealed, &password)?;
            mnemonic::to_seed(&phrase)
        })
        .await
        .context("unlock worker failed")?
        .inspect_err(|_| warn!(wallet_id, "unlock rejected"))?;
        let seed = Arc::new(seed);

        let accounts = self.engine.derive_all(seed, self.chains.all()).await;
        if accounts.is_empty() && !self.chains.is_empty() {
            return Err(WalletError::chain("*", "no chain could be derived").into());
        }

        self.store.set_current(wallet_id)?;
        wallet.accounts.clone_from(&accounts);
        st.current_wallet = Some(wallet);
        st.is_unlocked = true;
        info!(
            wallet_id,
            accounts = accounts.len(),
            chains = self.chains.len(),
            "wallet unlocked"
        );
        Ok(accounts)
    }

    pub async fn lock(&self) -> eyre::Result<()> {
        let mut st = self.state.lock().await;
        let status = LifecycleStatus::of(&st);
        if status != LifecycleStatus::Unlocked {
            return Err(invalid("lock", status));
        }
        if let Some(w) = st.current_wallet.as_mut() {
            w.accounts.clear();
        }
        st.is_unlocked = false;
        info!("wallet locked");
        Ok(())
    }

    /// Change the current wallet without unlocking it.
    pub async fn select(&self, wallet_id: &str) -> eyre::Result<()> {
        let mut st = self.state.lock().await;
        let status = LifecycleStatus::of(&st);
        if status != LifecycleStatus::Locked {
            return Err(invalid("select", status));
        }
        let wallet = st
            .wallets
            .iter()
            .find(|w| w.id == wallet_id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_owned()))?;
        self.store.set_current(wallet_id)?;
        st.current_wallet = Some(wallet);
        Ok(())
    }

    /// Plaintext backup of every wallet that opens with `password`.
    pub async fn export_all(&self, password: &SecretString) -> eyre::Result<ExportBundle> {
        let st = self.state.lock().await;
        let status = LifecycleStatus::of(&st);
        if status == LifecycleStatus::Uninitialized {
            return Err(invalid("export", status));
        }
        let bundle = self.store.export_all(&self.cipher, password)?;
        warn!(
            exported = bundle.wallets.len(),
            failed = bundle.failed.len(),
            "plaintext wallet export produced"
        );
        Ok(bundle)
    }

    /// Delete every wallet and return to `Uninitialized`.
    pub async fn clear_all(&self) -> eyre::Result<()> {
        let mut st = self.state.lock().await;
        self.store.clear_all()?;
        *st = WalletState::default();
        Ok(())
    }
}

fn load_state<S: KvStore>(store: &WalletVaultStore<S>) -> WalletState {
    let wallets = match store.list() {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "wallet data unreadable; starting uninitialized");
            return WalletState::default();
        }
    };
    let current_id = store.get_current_id().unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "current wallet selector unreadable");
        None
    });
    let current_wallet = current_id
        .and_then(|id| wallets.iter().find(|w| w.id == id))
        .or_else(|| wallets.first())
        .cloned();
    WalletState {
        is_initialized: !wallets.is_empty(),
        is_unlocked: false,
        current_wallet,
        wallets,
    }
}
