#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]
//! Multi-chain HD wallet core.
//!
//! One BIP-39 recovery phrase, sealed with a password at rest, unlocks a
//! deterministic account on every supported chain.

pub mod address;
pub mod chains;
pub mod config;
pub mod connector;
pub mod derivation;
pub mod doctor;
pub mod errors;
pub mod fsutil;
pub mod lifecycle;
pub mod mnemonic;
pub mod paths;
pub mod vault;
pub mod wallet;

pub use errors::{ErrorReport, WalletError};
pub use lifecycle::{LifecycleStatus, WalletLifecycle};
