use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Queue-related settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Override for the sqlite queue database path (None = XDG state dir).
    #[serde(default)]
    pub database_path: Option<String>,
    /// Capacity of the command/event mailboxes.
    pub mailbox_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            mailbox_capacity: 64,
        }
    }
}

/// Recognition engine credentials (optional section in config.toml).
///
/// All three fields must be non-empty for Configure to be accepted by the
/// recognition worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub access_secret: String,
}

/// Transport tuning for the HTTP fetch collaborator (optional section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than 1 KiB/s for this many seconds.
    pub low_speed_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_secs: 60,
        }
    }
}

/// Global configuration loaded from `~/.config/dqr/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DqrConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dqr")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DqrConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DqrConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DqrConfig = toml::from_str(&data)?;
    Ok(cfg)
}
