//! `polyvault doctor`: a self-report that is safe to paste. Never includes secrets.

use crate::{
    chains::ChainRegistry,
    config::PolyvaultConfig,
    paths::VaultPaths,
    vault::{FileKvStore, KvStore as _, WalletVaultStore},
};
use eyre::Context as _;
use serde_json::json;
use std::{fs, path::Path, path::PathBuf};

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn try_parse_config(path: &Path) -> eyre::Result<PolyvaultConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

struct ConfigReport {
    path: PathBuf,
    exists: bool,
    parse_ok: bool,
    error: Option<String>,
    kdf_memory_kib: Option<u32>,
    per_chain_timeout_ms: Option<u64>,
    chains_enabled: Option<usize>,
    chains_error: Option<String>,
}

struct VaultReport {
    dir: PathBuf,
    readable: bool,
    error: Option<String>,
    wallet_count: usize,
    current_wallet_id: Option<String>,
    write_lock_free: bool,
}

struct DoctorReport {
    version: &'static str,
    paths: VaultPaths,
    chains_supported: usize,
    config: ConfigReport,
    vault: VaultReport,
    env: serde_json::Value,
}

fn collect_config(paths: &VaultPaths) -> ConfigReport {
    let path = paths.config_file();
    let exists = path.exists();
    let parsed = exists.then(|| try_parse_config(&path));
    let (cfg, error) = match parsed {
        Some(Ok(cfg)) => (Some(cfg), None),
        Some(Err(e)) => (None, Some(format!("{e:#}"))),
        None => (None, None),
    };
    let chains = cfg.as_ref().map(PolyvaultConfig::chain_registry);
    ConfigReport {
        path,
        exists,
        parse_ok: cfg.is_some(),
        error,
        kdf_memory_kib: cfg.as_ref().map(|c| c.kdf.memory_kib),
        per_chain_timeout_ms: cfg.as_ref().map(|c| c.derivation.per_chain_timeout_ms),
        chains_enabled: chains
            .as_ref()
            .and_then(|r| r.as_ref().ok())
            .map(ChainRegistry::len),
        chains_error: chains.and_then(|r| r.err()).map(|e| e.to_string()),
    }
}

fn collect_vault(paths: &VaultPaths) -> VaultReport {
    let kv = FileKvStore::new(paths.vault_dir());
    let write_lock_free = kv.write_guard().is_ok();
    let store = WalletVaultStore::new(kv);
    let (readable, error, wallet_count) = match store.list() {
        Ok(w) => (true, None, w.len()),
        Err(e) => (false, Some(format!("{e:#}")), 0),
    };
    VaultReport {
        dir: paths.vault_dir(),
        readable,
        error,
        wallet_count,
        current_wallet_id: store.get_current_id().ok().flatten(),
        write_lock_free,
    }
}

fn collect(paths: &VaultPaths) -> DoctorReport {
    DoctorReport {
        version: env!("CARGO_PKG_VERSION"),
        paths: paths.clone(),
        chains_supported: ChainRegistry::builtin().len(),
        config: collect_config(paths),
        vault: collect_vault(paths),
        env: json!({
          "POLYVAULT_CONFIG_DIR": env_opt("POLYVAULT_CONFIG_DIR"),
          "POLYVAULT_DATA_DIR": env_opt("POLYVAULT_DATA_DIR"),
          "POLYVAULT_CHAINS": env_opt("POLYVAULT_CHAINS"),
          "POLYVAULT_PASSWORD_set": std::env::var("POLYVAULT_PASSWORD").is_ok(),
          "POLYVAULT_MNEMONIC_set": std::env::var("POLYVAULT_MNEMONIC").is_ok(),
        }),
    }
}

fn print_json(out: &mut impl std::io::Write, r: &DoctorReport) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(&json!({
      "ok": true,
      "version": r.version,
      "paths": {
        "config_dir": r.paths.config_dir,
        "data_dir": r.paths.data_dir,
        "log_file": r.paths.log_file,
      },
      "chains_supported": r.chains_supported,
      "config": {
        "path": r.config.path,
        "exists": r.config.exists,
        "parse_ok": r.config.parse_ok,
        "error": r.config.error,
        "kdf_memory_kib": r.config.kdf_memory_kib,
        "per_chain_timeout_ms": r.config.per_chain_timeout_ms,
        "chains_enabled": r.config.chains_enabled,
        "chains_error": r.config.chains_error,
      },
      "vault": {
        "dir": r.vault.dir,
        "readable": r.vault.readable,
        "error": r.vault.error,
        "wallet_count": r.vault.wallet_count,
        "current_wallet_id": r.vault.current_wallet_id,
        "write_lock_free": r.vault.write_lock_free,
      },
      "env": r.env,
    }))
    .context("serialize doctor json")?;
    writeln!(out, "{s}").context("write doctor json")?;
    Ok(())
}

fn print_human(out: &mut impl std::io::Write, r: &DoctorReport) -> eyre::Result<()> {
    writeln!(out, "polyvault doctor (v{})", r.version).context("write header")?;
    writeln!(out).context("write newline")?;

    writeln!(out, "Paths:").context("write paths header")?;
    writeln!(out, "  config_dir: {}", r.paths.config_dir.display()).context("write paths")?;
    writeln!(out, "  data_dir:   {}", r.paths.data_dir.display()).context("write paths")?;
    writeln!(out, "  log_file:   {}", r.paths.log_file.display()).context("write paths")?;
    writeln!(out).context("write newline")?;

    writeln!(out, "Config:").context("write config header")?;
    writeln!(out, "  config.toml: {}", r.config.path.display()).context("write config")?;
    if !r.config.exists {
        writeln!(out, "  status: missing (will be created on first run)")
            .context("write config")?;
    } else if r.config.parse_ok {
        writeln!(
            out,
            "  status: ok (kdf_memory_kib={:?}, per_chain_timeout_ms={:?})",
            r.config.kdf_memory_kib, r.config.per_chain_timeout_ms
        )
        .context("write config")?;
    } else {
        writeln!(out, "  status: parse failed").context("write config")?;
        if let Some(e) = &r.config.error {
            let first = e.lines().next().unwrap_or("parse error");
            writeln!(out, "  error: {first}").context("write config")?;
        }
    }
    match (&r.config.chains_enabled, &r.config.chains_error) {
        (_, Some(e)) => writeln!(out, "  chains: {e}").context("write config")?,
        (Some(n), None) => writeln!(out, "  chains: {n} of {} enabled", r.chains_supported)
            .context("write config")?,
        (None, None) => {}
    }
    writeln!(out).context("write newline")?;

    writeln!(out, "Vault:").context("write vault header")?;
    writeln!(out, "  dir: {}", r.vault.dir.display()).context("write vault")?;
    if r.vault.readable {
        writeln!(out, "  wallet_count: {}", r.vault.wallet_count).context("write vault")?;
    } else {
        let e = r.vault.error.as_deref().unwrap_or("unreadable");
        writeln!(out, "  unreadable: {}", e.lines().next().unwrap_or(e)).context("write vault")?;
    }
    writeln!(out, "  current_wallet_id: {:?}", r.vault.current_wallet_id).context("write vault")?;
    writeln!(out, "  write_lock_free: {}", r.vault.write_lock_free).context("write vault")?;
    writeln!(out).context("write newline")?;

    writeln!(out, "Env (redacted):").context("write env header")?;
    for key in ["POLYVAULT_CONFIG_DIR", "POLYVAULT_DATA_DIR", "POLYVAULT_CHAINS"] {
        writeln!(out, "  {key}: {:?}", r.env.get(key).and_then(|v| v.as_str()))
            .context("write env")?;
    }
    for key in ["POLYVAULT_PASSWORD_set", "POLYVAULT_MNEMONIC_set"] {
        writeln!(
            out,
            "  {key}: {}",
            r.env
                .get(key)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        )
        .context("write env")?;
    }
    Ok(())
}

pub fn run(paths: &VaultPaths, as_json: bool) -> eyre::Result<()> {
    let report = collect(paths);
    let mut out = std::io::stdout().lock();
    if as_json {
        print_json(&mut out, &report)
    } else {
        print_human(&mut out, &report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_dirs_report_empty_vault() -> eyre::Result<()> {
        let tmp = tempfile::tempdir()?;
        let paths = VaultPaths::at(tmp.path().join("c"), tmp.path().join("d"));
        let r = collect(&paths);
        assert!(!r.config.exists);
        assert!(r.vault.readable);
        assert_eq!(r.vault.wallet_count, 0);
        assert!(r.vault.write_lock_free);

        let mut human = Vec::new();
        print_human(&mut human, &r)?;
        let text = String::from_utf8(human)?;
        assert!(text.contains("missing (will be created on first run)"));
        assert!(text.contains("wallet_count: 0"));
        Ok(())
    }

    #[test]
    fn broken_config_is_reported_not_fatal() -> eyre::Result<()> {
        let tmp = tempfile::tempdir()?;
        let paths = VaultPaths::at(tmp.path().join("c"), tmp.path().join("d"));
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(paths.config_file(), "[kdf\nbroken")?;

        let r = collect(&paths);
        assert!(r.config.exists);
        assert!(!r.config.parse_ok);

        let mut out = Vec::new();
        print_json(&mut out, &r)?;
        let v: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(
            v.pointer("/config/parse_ok").and_then(serde_json::Value::as_bool),
            Some(false)
        );
        Ok(())
    }
}
