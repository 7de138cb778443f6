use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Model used when neither the CLI nor the config names one.
pub const DEFAULT_MODEL: &str = "htdemucs_ft";

/// Global configuration loaded from `~/.config/karaprep/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KaraprepConfig {
    /// Separation model used when `--model` is not given.
    pub model: String,
    /// Directory for cached model weights; routed to the subordinate as
    /// TORCH_HOME/XDG_CACHE_HOME. None = the subordinate's own default.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Override for the demucs executable (e.g. a bundled runtime).
    #[serde(default)]
    pub demucs_program: Option<String>,
    /// Tokenizer command line: program followed by its arguments.
    #[serde(default)]
    pub tokenizer_command: Option<Vec<String>>,
    /// How many recent diagnostic lines error events carry as details.
    pub recent_lines: usize,
}

impl Default for KaraprepConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            cache_dir: None,
            demucs_program: None,
            tokenizer_command: None,
            recent_lines: 20,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("karaprep")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<KaraprepConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = KaraprepConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: KaraprepConfig = toml::from_str(&data)?;
    Ok(cfg)
}
