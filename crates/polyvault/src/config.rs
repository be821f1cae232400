use crate::{
    chains::ChainRegistry, derivation::DEFAULT_PER_CHAIN_TIMEOUT, errors::WalletError,
    paths::VaultPaths, vault::KdfParams,
};
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Argon2id memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        let p = KdfParams::default();
        Self {
            memory_kib: p.memory_kib,
            iterations: p.iterations,
            parallelism: p.parallelism,
        }
    }
}

impl From<KdfConfig> for KdfParams {
    fn from(c: KdfConfig) -> Self {
        Self {
            memory_kib: c.memory_kib,
            iterations: c.iterations,
            parallelism: c.parallelism,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationConfig {
    /// Budget for one chain during batch derivation. Slower chains are skipped.
    pub per_chain_timeout_ms: u64,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            per_chain_timeout_ms: u64::try_from(DEFAULT_PER_CHAIN_TIMEOUT.as_millis())
                .unwrap_or(10_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainsConfig {
    /// Chain ids to derive on unlock. Empty means every supported chain.
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyvaultConfig {
    pub kdf: KdfConfig,
    pub derivation: DerivationConfig,
    pub chains: ChainsConfig,
}

impl PolyvaultConfig {
    pub fn kdf_params(&self) -> KdfParams {
        self.kdf.into()
    }

    pub const fn per_chain_timeout(&self) -> Duration {
        Duration::from_millis(self.derivation.per_chain_timeout_ms)
    }

    /// Built-in chains narrowed to `chains.enabled`.
    pub fn chain_registry(&self) -> Result<ChainRegistry, WalletError> {
        ChainRegistry::builtin().filtered(&self.chains.enabled)
    }
}

/// Apply `POLYVAULT_*` environment overrides on top of the file values.
fn apply_env_overrides(cfg: &mut PolyvaultConfig) {
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(v) = std::env::var(var) {
            let t = v.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }
    fn positive<T: std::str::FromStr + PartialOrd + Default>(v: &str) -> Option<T> {
        v.parse::<T>().ok().filter(|n| *n > T::default())
    }

    apply_env("POLYVAULT_KDF_MEMORY_KIB", |v| {
        if let Some(n) = positive(v) {
            cfg.kdf.memory_kib = n;
        }
    });
    apply_env("POLYVAULT_KDF_ITERATIONS", |v| {
        if let Some(n) = positive(v) {
            cfg.kdf.iterations = n;
        }
    });
    apply_env("POLYVAULT_KDF_PARALLELISM", |v| {
        if let Some(n) = positive(v) {
            cfg.kdf.parallelism = n;
        }
    });
    apply_env("POLYVAULT_DERIVATION_TIMEOUT_MS", |v| {
        if let Some(n) = positive(v) {
            cfg.derivation.per_chain_timeout_ms = n;
        }
    });
    apply_env("POLYVAULT_CHAINS", |v| {
        cfg.chains.enabled = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
    });
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(paths: &VaultPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load `config.toml`, writing the defaults on first run. Env overrides
    /// apply to the returned value only and are never persisted.
    pub fn load_or_init_default(&self) -> eyre::Result<PolyvaultConfig> {
        let mut cfg = if self.path.exists() {
            let s = fs::read_to_string(&self.path).context("read config.toml")?;
            toml::from_str(&s).context("parse config.toml")?
        } else {
            let cfg = PolyvaultConfig::default();
            self.save(&cfg)?;
            cfg
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &PolyvaultConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_private_atomic(&self.path, s.as_bytes()).context("write config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pin_argon2_cost_and_ten_second_budget() {
        let cfg = PolyvaultConfig::default();
        assert_eq!(cfg.kdf_params(), KdfParams::default());
        assert_eq!(cfg.kdf.memory_kib, 19 * 1024);
        assert_eq!(cfg.per_chain_timeout(), Duration::from_secs(10));
        assert!(cfg.chains.enabled.is_empty());
    }

    #[test]
    fn partial_files_fill_in_defaults() -> eyre::Result<()> {
        let cfg: PolyvaultConfig = toml::from_str(
            r#"
[kdf]
iterations = 4

[chains]
enabled = ["ethereum", "solana"]
"#,
        )?;
        assert_eq!(cfg.kdf.iterations, 4);
        assert_eq!(cfg.kdf.memory_kib, 19 * 1024);
        assert_eq!(cfg.derivation, DerivationConfig::default());
        assert_eq!(cfg.chain_registry()?.len(), 2);
        Ok(())
    }

    #[test]
    fn unknown_enabled_chain_is_reported() {
        let cfg = PolyvaultConfig {
            chains: ChainsConfig {
                enabled: vec!["ethereum".to_owned(), "atlantis".to_owned()],
            },
            ..PolyvaultConfig::default()
        };
        assert_eq!(
            cfg.chain_registry().err(),
            Some(WalletError::UnknownChain("atlantis".to_owned()))
        );
    }

    #[test]
    fn first_load_writes_defaults() -> eyre::Result<()> {
        let tmp = tempfile::tempdir()?;
        let paths = VaultPaths::at(tmp.path().join("config"), tmp.path().join("data"));
        let store = ConfigStore::new(&paths);
        assert!(!store.path().exists());
        store.load_or_init_default()?;
        assert!(store.path().exists());
        let on_disk: PolyvaultConfig = toml::from_str(&fs::read_to_string(store.path())?)?;
        assert_eq!(on_disk, PolyvaultConfig::default());
        Ok(())
    }
}
