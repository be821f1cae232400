//! Key/value persistence port used by the wallet store.

use crate::{errors::WalletError, fsutil};
use eyre::Context as _;
use fs2::FileExt as _;
use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Held for the duration of a read-modify-write; released on drop.
#[derive(Debug, Default)]
pub struct WriteGuard(Option<File>);

impl WriteGuard {
    pub const fn none() -> Self {
        Self(None)
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            drop(fs2::FileExt::unlock(&f));
        }
    }
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> eyre::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> eyre::Result<()>;
    fn delete(&self, key: &str) -> eyre::Result<()>;

    /// Exclusive write access across processes. In-process stores need none.
    fn write_guard(&self) -> eyre::Result<WriteGuard> {
        Ok(WriteGuard::none())
    }
}

/// One `<key>.json` file per key inside a private directory.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> eyre::Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            eyre::bail!("invalid store key: {key:?}");
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(".vault.lock")
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        fsutil::read_private_string(&self.key_path(key)?)
    }

    fn set(&self, key: &str, value: &str) -> eyre::Result<()> {
        let p = self.key_path(key)?;
        fsutil::write_private_atomic(&p, value.as_bytes())
            .with_context(|| format!("persist {key}"))
    }

    fn delete(&self, key: &str) -> eyre::Result<()> {
        fsutil::remove_if_exists(&self.key_path(key)?)
    }

    /// Fails fast with [`WalletError::StoreBusy`] instead of waiting on another process.
    fn write_guard(&self) -> eyre::Result<WriteGuard> {
        let f = fsutil::open_lock_file(&self.lock_path())?;
        match f.try_lock_exclusive() {
            Ok(()) => Ok(WriteGuard(Some(f))),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(WalletError::StoreBusy.into()),
            Err(e) => Err(eyre::Report::new(e).wrap_err("lock exclusive")),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> eyre::Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| eyre::eyre!("memory store poisoned: {e}"))
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> eyre::Result<()> {
        self.entries()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> eyre::Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}
