//! Encrypted-at-rest wallet persistence.

pub mod cipher;
pub mod kv;
pub mod store;

pub use cipher::{KdfParams, SealedMnemonic, VaultCipher};
pub use kv::{FileKvStore, KvStore, MemoryKvStore, WriteGuard};
pub use store::{ExportBundle, ExportFailure, ExportedWallet, WalletVaultStore};
