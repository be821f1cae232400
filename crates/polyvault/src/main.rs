#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::Context as _;
use polyvault::{
    config::{ConfigStore, PolyvaultConfig},
    connector::ConnectorRegistry,
    doctor, fsutil,
    paths::VaultPaths,
    vault::FileKvStore,
    wallet::WalletSummary,
    ErrorReport, WalletError, WalletLifecycle,
};
use secrecy::ExposeSecret as _;
use serde::Serialize;
use serde_json::json;
use std::{io::Write as _, path::PathBuf, process::ExitCode};
use tracing_subscriber::prelude::*;
use zeroize::Zeroizing;

mod cli_output;

const PASSWORD_ENV: &str = "POLYVAULT_PASSWORD";
const MNEMONIC_ENV: &str = "POLYVAULT_MNEMONIC";

#[derive(Parser, Debug)]
#[command(name = "polyvault", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resolved paths (useful for debugging).
    Paths,

    /// Print a quick self-diagnostic report (safe to paste; contains no secrets).
    Doctor {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the chains derived on unlock.
    Chains,

    /// Create a wallet from a new recovery phrase, or import an existing one.
    ///
    /// The password is read from `POLYVAULT_PASSWORD` or prompted for. With
    /// `--import` the phrase is read from `POLYVAULT_MNEMONIC` or prompted for.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = false)]
        import: bool,
    },

    /// List stored wallets (metadata only).
    List,

    /// Make a wallet the current one.
    Select { id: String },

    /// Decrypt a wallet and print its per-chain accounts.
    Unlock {
        id: String,
        /// Resolve a connector for one chain and print its connection instead.
        #[arg(long)]
        chain: Option<String>,
    },

    /// Write every wallet's plaintext recovery phrase to a local file.
    Export {
        #[arg(long)]
        out: PathBuf,
        /// Skip the confirmation prompt (required for non-interactive shells).
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Delete every stored wallet.
    Clear {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

fn init_logging(paths: &VaultPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("polyvault.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn print_json(v: &impl Serialize) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write output")?;
    Ok(())
}

fn open_lifecycle(
    paths: &VaultPaths,
    cfg: &PolyvaultConfig,
) -> eyre::Result<WalletLifecycle<FileKvStore>> {
    WalletLifecycle::from_config(FileKvStore::new(paths.vault_dir()), cfg)
}

async fn run(cmd: Command, paths: &VaultPaths) -> eyre::Result<()> {
    match cmd {
        Command::Paths => print_json(&json!({
          "config_dir": paths.config_dir,
          "data_dir": paths.data_dir,
          "log_file": paths.log_file,
          "vault_dir": paths.vault_dir(),
        })),
        Command::Doctor { json } => doctor::run(paths, json).context("doctor failed"),
        Command::Chains => {
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            print_json(&cfg.chain_registry()?.all())
        }
        Command::Create { name, import } => {
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            let lc = open_lifecycle(paths, &cfg)?;
            let phrase = if import {
                Some(cli_output::read_secret(MNEMONIC_ENV, "Recovery phrase: ")?)
            } else {
                None
            };
            let password = cli_output::read_new_password(PASSWORD_ENV)?;
            let wallet = match phrase {
                Some(p) => lc.create_wallet(&name, &p, &password).await?,
                None => {
                    let (wallet, generated) = lc.generate_wallet(&name, &password).await?;
                    cli_output::print_recovery_phrase(generated.expose_secret());
                    wallet
                }
            };
            cli_output::print_wallet_created(&wallet.name, &wallet.id);
            print_json(&wallet.summary())
        }
        Command::List => {
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            let state = open_lifecycle(paths, &cfg)?.state().await;
            let wallets: Vec<WalletSummary> =
                state.wallets.iter().map(|w| w.summary()).collect();
            print_json(&json!({
              "current": state.current_wallet.as_ref().map(|w| &w.id),
              "wallets": wallets,
            }))
        }
        Command::Select { id } => {
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            open_lifecycle(paths, &cfg)?.select(&id).await?;
            print_json(&json!({ "ok": true, "current": id }))
        }
        Command::Unlock { id, chain } => {
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            let lc = open_lifecycle(paths, &cfg)?;
            let password = cli_output::read_secret(PASSWORD_ENV, "Password: ")?;
            let accounts = lc.unlock(&id, &password).await?;
            let printed = match chain {
                Some(chain_id) => {
                    let descriptor = lc
                        .chains()
                        .iter()
                        .find(|c| c.id == chain_id)
                        .copied()
                        .ok_or(WalletError::UnknownChain(chain_id))?;
                    let conn = ConnectorRegistry::with_vault().connect(&descriptor, &accounts)?;
                    print_json(&conn)
                }
                None => print_json(&json!({ "walletId": id, "accounts": accounts })),
            };
            lc.lock().await?;
            printed
        }
        Command::Export { out, yes } => {
            cli_output::confirm_or_bail(yes, "write plaintext recovery phrases to disk")?;
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            let lc = open_lifecycle(paths, &cfg)?;
            let password = cli_output::read_secret(PASSWORD_ENV, "Password: ")?;
            let bundle = lc.export_all(&password).await?;
            let s = Zeroizing::new(
                serde_json::to_string_pretty(&bundle).context("serialize export")?,
            );
            fsutil::write_private_atomic(&out, s.as_bytes()).context("write export")?;
            cli_output::print_export_written(&out, bundle.wallets.len(), bundle.failed.len());
            print_json(&json!({
              "ok": true,
              "path": out,
              "exported": bundle.wallets.len(),
              "failed": bundle.failed,
            }))
        }
        Command::Clear { yes } => {
            cli_output::confirm_or_bail(yes, "delete every stored wallet")?;
            let cfg = ConfigStore::new(paths).load_or_init_default()?;
            open_lifecycle(paths, &cfg)?.clear_all().await?;
            print_json(&json!({ "ok": true }))
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = VaultPaths::discover()?;
    paths.ensure_private_dirs()?;
    let _log_guard = init_logging(&paths);

    match run(cli.cmd, &paths).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            print_json(&json!({ "ok": false, "error": ErrorReport::from_report(&e) }))?;
            Ok(ExitCode::FAILURE)
        }
    }
}
