//! CLI configuration management.
//!
//! Reads/writes TOML at `~/.config/incoming/upload.toml` unless another
//! path is given on the command line.

use std::path::{Path, PathBuf};

use incoming_uploader::UploaderConfig;

/// Uploader settings plus the file they were loaded from.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub uploader: UploaderConfig,
    file_path: PathBuf,
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file yields defaults. So does a malformed one, with a
    /// warning, so a broken config never blocks an upload.
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let file_path = match path {
            Some(p) => p,
            None => config_file_path()?,
        };
        let mut config = CliConfig {
            uploader: UploaderConfig::default(),
            file_path: file_path.clone(),
        };

        if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            match toml::from_str::<UploaderConfig>(&content) {
                Ok(uploader) => config.uploader = uploader,
                Err(e) => tracing::warn!(
                    path = %file_path.display(),
                    "failed to parse upload config, using defaults: {e}"
                ),
            }
        }

        Ok(config)
    }

    /// Saves configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(&self.uploader)?;
        std::fs::write(&self.file_path, text)?;
        tracing::debug!(path = %self.file_path.display(), "upload configuration saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

fn config_file_path() -> anyhow::Result<PathBuf> {
    let config_dir = config_base_dir()?;
    Ok(config_dir.join("incoming").join("upload.toml"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return Ok(PathBuf::from(xdg));
            }
        }
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME is not set; pass --config"))?;
        Ok(PathBuf::from(home).join(".config"))
    }
}
