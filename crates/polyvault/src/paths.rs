use directories::ProjectDirs;
use eyre::ContextCompat as _;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct VaultPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl VaultPaths {
    pub fn discover() -> eyre::Result<Self> {
        // Test/CI override knobs; both must be set.
        if let (Ok(config_dir), Ok(data_dir)) = (
            std::env::var("POLYVAULT_CONFIG_DIR"),
            std::env::var("POLYVAULT_DATA_DIR"),
        ) {
            return Ok(Self::at(config_dir, data_dir));
        }

        // macOS: ~/Library/Application Support/polyvault
        // Linux: ~/.config/polyvault, ~/.local/share/polyvault
        // Windows: %APPDATA%\polyvault
        let proj =
            ProjectDirs::from("", "", "polyvault").context("failed to resolve project dirs")?;
        Ok(Self::at(proj.config_dir(), proj.data_dir()))
    }

    pub fn at(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_dir: config_dir.into(),
            log_file: data_dir.join("polyvault.log.jsonl"),
            data_dir,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory holding the encrypted wallet records.
    pub fn vault_dir(&self) -> PathBuf {
        self.config_dir.join("vault")
    }

    pub fn ensure_private_dirs(&self) -> eyre::Result<()> {
        crate::fsutil::ensure_private_dir(&self.config_dir)?;
        crate::fsutil::ensure_private_dir(&self.data_dir)?;
        Ok(())
    }
}
