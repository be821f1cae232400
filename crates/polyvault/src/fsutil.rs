//! Private-file helpers: 0700 dirs, 0600 files, atomic replace, no symlinks.

use eyre::Context as _;
use rand::Rng as _;
use std::{
    fs::{self, File, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

pub const MODE_DIR_PRIVATE: u32 = 0o700;
pub const MODE_FILE_PRIVATE: u32 = 0o600;

fn is_symlink(p: &Path) -> eyre::Result<bool> {
    let md = fs::symlink_metadata(p).with_context(|| format!("stat {}", p.display()))?;
    Ok(md.file_type().is_symlink())
}

fn refuse_symlink(p: &Path) -> eyre::Result<()> {
    if is_symlink(p)? {
        eyre::bail!("refusing to follow symlink: {}", p.display());
    }
    Ok(())
}

pub fn ensure_private_dir(dir: &Path) -> eyre::Result<()> {
    if dir.exists() {
        refuse_symlink(dir)?;
        if !fs::metadata(dir)
            .with_context(|| format!("stat {}", dir.display()))?
            .is_dir()
        {
            eyre::bail!("expected directory at {}", dir.display());
        }
    } else {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    }

    #[cfg(unix)]
    {
        let mode = fs::metadata(dir)
            .with_context(|| format!("stat {}", dir.display()))?
            .permissions()
            .mode();
        if mode & 0o077 != 0 {
            fs::set_permissions(dir, fs::Permissions::from_mode(MODE_DIR_PRIVATE))
                .with_context(|| format!("chmod {MODE_DIR_PRIVATE:o} {}", dir.display()))?;
        }
    }
    Ok(())
}

fn private_open_options() -> OpenOptions {
    let mut oo = OpenOptions::new();
    #[cfg(unix)]
    {
        oo.mode(MODE_FILE_PRIVATE);
    }
    oo
}

fn temp_sibling(parent: &Path, target: &Path) -> PathBuf {
    let base = target
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let mut suffix = [0_u8; 8];
    rand::rng().fill_bytes(&mut suffix);
    parent.join(format!(".{base}.tmp.{}", hex::encode(suffix)))
}

/// Write `bytes` to a fresh temp file next to `path`, fsync, then rename over `path`.
pub fn write_private_atomic(path: &Path, bytes: &[u8]) -> eyre::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| eyre::eyre!("missing parent for {}", path.display()))?;
    ensure_private_dir(parent)?;
    if path.exists() {
        refuse_symlink(path)?;
    }

    let tmp = temp_sibling(parent, path);
    let mut f = private_open_options()
        .create_new(true)
        .write(true)
        .open(&tmp)
        .with_context(|| format!("open temp {}", tmp.display()))?;
    let written = f
        .write_all(bytes)
        .and_then(|()| f.sync_all())
        .with_context(|| format!("write {}", tmp.display()));
    drop(f);
    if let Err(e) = written {
        drop(fs::remove_file(&tmp));
        return Err(e);
    }

    #[cfg(windows)]
    {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("remove existing {}", path.display()))?;
        }
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
}

/// `Ok(None)` when the file does not exist.
pub fn read_private_string(path: &Path) -> eyre::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    refuse_symlink(path)?;
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(s))
}

/// Missing files are not an error.
pub fn remove_if_exists(path: &Path) -> eyre::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(eyre::Report::new(e).wrap_err(format!("remove {}", path.display()))),
    }
}

/// Open (creating if needed) a 0600 file used only as an advisory lock target.
pub fn open_lock_file(path: &Path) -> eyre::Result<File> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    private_open_options()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("open lock file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_files() -> eyre::Result<()> {
        let tmp = tempfile::tempdir()?;
        let p = tmp.path().join("nested").join("wallets.json");
        write_private_atomic(&p, b"one")?;
        write_private_atomic(&p, b"two")?;
        assert_eq!(read_private_string(&p)?.as_deref(), Some("two"));

        let names: Vec<_> = fs::read_dir(p.parent().ok_or_else(|| eyre::eyre!("parent"))?)?
            .filter_map(Result::ok)
            .map(|e| e.file_name())
            .collect();
        assert_eq!(names.len(), 1);

        #[cfg(unix)]
        {
            let mode = fs::metadata(&p)?.permissions().mode() & 0o777;
            assert_eq!(mode, MODE_FILE_PRIVATE);
        }
        Ok(())
    }

    #[test]
    fn missing_files_read_as_none_and_remove_cleanly() -> eyre::Result<()> {
        let tmp = tempfile::tempdir()?;
        let p = tmp.path().join("absent.json");
        assert!(read_private_string(&p)?.is_none());
        remove_if_exists(&p)?;
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_refused() -> eyre::Result<()> {
        let tmp = tempfile::tempdir()?;
        let real = tmp.path().join("real.json");
        let link = tmp.path().join("link.json");
        fs::write(&real, "{}")?;
        std::os::unix::fs::symlink(&real, &link)?;
        assert!(read_private_string(&link).is_err());
        assert!(write_private_atomic(&link, b"x").is_err());
        Ok(())
    }
}
