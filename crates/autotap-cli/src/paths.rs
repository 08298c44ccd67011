//! Config file resolution.
//!
//! Priority:
//! 1. `--config` flag
//! 2. `AUTOTAP_CONFIG` (explicit override)
//! 3. `XDG_CONFIG_HOME/autotap/config.json`
//! 4. `<platform config dir>/autotap/config.json`
//!
//! Explicit paths (1, 2) must exist. The fallback locations are optional;
//! when missing the built-in defaults are used.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use autotap_core::Config;
use tracing::debug;

/// Where a config file was looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub explicit: bool,
}

/// Resolve the config file location.
pub fn config_source(flag: Option<&Path>) -> Option<ConfigSource> {
    if let Some(path) = flag {
        return Some(ConfigSource {
            path: path.to_path_buf(),
            explicit: true,
        });
    }

    if let Ok(path) = env::var("AUTOTAP_CONFIG") {
        if !path.is_empty() {
            return Some(ConfigSource {
                path: PathBuf::from(path),
                explicit: true,
            });
        }
    }

    if let Ok(dir) = env::var("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return Some(ConfigSource {
                path: PathBuf::from(dir).join("autotap").join("config.json"),
                explicit: false,
            });
        }
    }

    dirs::config_dir().map(|dir| ConfigSource {
        path: dir.join("autotap").join("config.json"),
        explicit: false,
    })
}

/// Load the config, then apply `AUTOTAP_*` environment overrides.
pub fn load_config(flag: Option<&Path>) -> anyhow::Result<Config> {
    let base = match config_source(flag) {
        Some(source) if source.explicit || source.path.is_file() => {
            debug!(path = %source.path.display(), "loading config");
            Config::load(&source.path)
                .with_context(|| format!("failed to load {}", source.path.display()))?
        }
        _ => Config::default(),
    };
    Ok(base.with_env_overrides()?)
}
