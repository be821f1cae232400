use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured error suitable for printing as CLI JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Classify an arbitrary report. Untyped failures become `internal`.
    pub fn from_report(e: &eyre::Report) -> Self {
        e.downcast_ref::<WalletError>().map_or_else(
            || Self::new("internal", format!("{e:#}")),
            |w| Self::from(w.clone()),
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("invalid recovery phrase")]
    InvalidMnemonic,

    /// Deliberately does not say whether the password or the ciphertext was at fault.
    #[error("wrong password or corrupted wallet")]
    Decryption,

    #[error("derivation failed for chain {chain}: {reason}")]
    ChainDerivation { chain: String, reason: String },

    #[error("could not load/save wallet data: {0}")]
    Storage(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("{op} is not allowed while {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("wallet store busy")]
    StoreBusy,
}

impl WalletError {
    pub(crate) fn chain(chain: &str, reason: impl Into<String>) -> Self {
        Self::ChainDerivation {
            chain: chain.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(e: &eyre::Report) -> Self {
        Self::Storage(format!("{e:#}"))
    }
}

impl From<WalletError> for ErrorReport {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InvalidMnemonic => Self::new("invalid_mnemonic", "invalid recovery phrase"),
            WalletError::Decryption => {
                Self::new("decryption_failed", "wrong password or corrupted wallet")
            }
            WalletError::ChainDerivation { .. } => Self::new("chain_derivation", e.to_string()),
            WalletError::Storage(_) => Self::new("storage", e.to_string()),
            WalletError::WalletNotFound(_) => Self::new("wallet_not_found", e.to_string()),
            WalletError::InvalidState { .. } => Self::new("invalid_state", e.to_string()),
            WalletError::UnknownChain(_) => Self::new("unknown_chain", e.to_string()),
            WalletError::StoreBusy => Self::new("store_busy", "wallet store busy; retry the operation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_survive_eyre_wrapping() {
        let report: eyre::Report = WalletError::Decryption.into();
        let report = report.wrap_err("unlock");
        let out = ErrorReport::from_report(&report);
        assert_eq!(out.code, "decryption_failed");
        assert_eq!(out.message, "wrong password or corrupted wallet");
    }

    #[test]
    fn untyped_errors_are_internal() {
        let report = eyre::eyre!("disk on fire");
        assert_eq!(ErrorReport::from_report(&report).code, "internal");
    }
}
