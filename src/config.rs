use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{TransferSettings, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT, MAX_CHUNK_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunk_size: u64,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    pub strict_upload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            accept_invalid_certs: true,
            strict_upload: false,
            download_dir: None,
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bigip-xfer")
        .join("config.toml")
}

impl Config {
    /// Loads the config file, writing the defaults on first use.
    /// An unreadable or invalid file falls back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => {
                let cfg = Config::default();
                let _ = cfg.save_to(path);
                cfg
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }
        let toml = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, toml)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        let chunk_size = match self.chunk_size {
            0 => DEFAULT_CHUNK_SIZE,
            n => n.min(MAX_CHUNK_SIZE),
        };
        let timeout = if self.timeout_secs == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_secs)
        };
        TransferSettings {
            chunk_size,
            timeout,
            accept_invalid_certs: self.accept_invalid_certs,
            strict_upload: self.strict_upload,
        }
    }

    /// Places a relative download target inside `download_dir` when one is set.
    pub fn resolve_output_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        match &self.download_dir {
            Some(dir) if !path.is_absolute() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn print(&self) {
        eprintln!("  Config       : {}", config_path().display());
        eprintln!("  Chunk size   : {} bytes", self.chunk_size);
        eprintln!("  Timeout      : {}s", self.timeout_secs);
        eprintln!("  Invalid certs: {}", if self.accept_invalid_certs { "accepted" } else { "rejected" });
        eprintln!("  Strict upload: {}", if self.strict_upload { "yes" } else { "no" });
        eprintln!("  Download dir : {}",
            self.download_dir.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(not set)".into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_transfer_defaults() {
        let settings = Config::default().transfer_settings();
        assert_eq!(settings.chunk_size, 512 * 1024);
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert!(settings.accept_invalid_certs);
        assert!(!settings.strict_upload);
    }

    #[test]
    fn test_zero_values_fall_back() {
        let cfg = Config { chunk_size: 0, timeout_secs: 0, ..Config::default() };
        let settings = cfg.transfer_settings();
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_oversized_chunk_is_capped() {
        let cfg = Config { chunk_size: 1 << 62, ..Config::default() };
        assert_eq!(cfg.transfer_settings().chunk_size, MAX_CHUNK_SIZE);

        let cfg = Config { chunk_size: 4096, ..Config::default() };
        assert_eq!(cfg.transfer_settings().chunk_size, 4096);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str("strict_upload = true\n").unwrap();
        assert!(cfg.strict_upload);
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(cfg.download_dir.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            chunk_size: 4096,
            download_dir: Some(PathBuf::from("/var/tmp")),
            ..Config::default()
        };
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path);
        assert_eq!(loaded.chunk_size, 4096);
        assert_eq!(loaded.download_dir, Some(PathBuf::from("/var/tmp")));
    }

    #[test]
    fn test_load_missing_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path);
        assert_eq!(cfg.timeout_secs, 10);
        assert!(path.exists());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "chunk_size = \"lots\"").unwrap();
        assert_eq!(Config::load_from(&path).chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_resolve_output_path() {
        let cfg = Config::default();
        assert_eq!(cfg.resolve_output_path("a.ucs"), PathBuf::from("a.ucs"));

        let cfg = Config { download_dir: Some(PathBuf::from("/srv/dl")), ..Config::default() };
        assert_eq!(cfg.resolve_output_path("a.ucs"), PathBuf::from("/srv/dl/a.ucs"));
        assert_eq!(cfg.resolve_output_path("/tmp/a.ucs"), PathBuf::from("/tmp/a.ucs"));
    }
}
