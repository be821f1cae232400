//! Human-facing CLI output on stderr, plus interactive prompts.
//!
//! stdout is reserved for JSON.

use secrecy::SecretString;
use std::io::{BufRead as _, IsTerminal as _, Write as _};

fn stderr_write(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    let _flush = stderr.flush();
}

fn stderr_writeln(s: &str) {
    stderr_write(&format!("{s}\n"));
}

pub fn print_wallet_created(name: &str, id: &str) {
    stderr_writeln(&format!(
        "polyvault: created wallet '{name}' ({id}). It is locked; run `polyvault unlock {id}` to derive addresses."
    ));
}

/// Shown exactly once, right after generation.
pub fn print_recovery_phrase(phrase: &str) {
    stderr_writeln(
        "\nRecovery phrase (write it down and keep it offline; it will not be shown again):\n",
    );
    stderr_writeln(&format!("    {phrase}\n"));
}

pub fn print_export_written(path: &std::path::Path, exported: usize, failed: usize) {
    stderr_writeln(&format!(
        "polyvault: wrote {exported} plaintext recovery phrase(s) to {} ({failed} wallet(s) did not open). Treat this file like cash.",
        path.display()
    ));
}

fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// `env_var` wins; otherwise prompt without echo. Non-interactive runs must use the env var.
pub fn read_secret(env_var: &str, prompt: &str) -> eyre::Result<SecretString> {
    if let Ok(v) = std::env::var(env_var) {
        if !v.is_empty() {
            return Ok(SecretString::new(v.into()));
        }
    }
    if !interactive() {
        eyre::bail!("no terminal for prompting; set {env_var}");
    }
    let v = rpassword::prompt_password(prompt).map_err(|e| eyre::eyre!("read secret: {e}"))?;
    Ok(SecretString::new(v.into()))
}

/// Ask for a new password twice.
pub fn read_new_password(env_var: &str) -> eyre::Result<SecretString> {
    use secrecy::ExposeSecret as _;

    if std::env::var(env_var).is_ok_and(|v| !v.is_empty()) {
        return read_secret(env_var, "");
    }
    let first = read_secret(env_var, "New password: ")?;
    let second = read_secret(env_var, "Repeat password: ")?;
    if first.expose_secret() != second.expose_secret() {
        eyre::bail!("passwords do not match");
    }
    if first.expose_secret().is_empty() {
        eyre::bail!("password must not be empty");
    }
    Ok(first)
}

/// Require `--yes` or an interactive "y".
pub fn confirm_or_bail(yes: bool, what: &str) -> eyre::Result<()> {
    if yes {
        return Ok(());
    }
    if !interactive() {
        eyre::bail!("refusing to {what} non-interactively; pass --yes");
    }
    stderr_write(&format!("About to {what}. Continue? [y/N] "));
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| eyre::eyre!("read confirmation: {e}"))?;
    let ans = line.trim().to_ascii_lowercase();
    if ans == "y" || ans == "yes" {
        Ok(())
    } else {
        eyre::bail!("{what} cancelled")
    }
}
