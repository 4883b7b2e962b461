//! XDG Base Directory paths for keyfold.
//!
//! | Purpose | XDG Variable | Default | keyfold Path |
//! |---------|--------------|---------|--------------|
//! | Objects | `$XDG_DATA_HOME` | `~/.local/share` | `$XDG_DATA_HOME/keyfold/objects/` |
//! | Metadata | `$XDG_DATA_HOME` | `~/.local/share` | `$XDG_DATA_HOME/keyfold/metadata.db` |
//! | Config | `$XDG_CONFIG_HOME` | `~/.config` | `$XDG_CONFIG_HOME/keyfold/config.toml` |

use std::path::PathBuf;

use directories::BaseDirs;

/// Uses `$XDG_DATA_HOME/keyfold` or falls back to `~/.local/share/keyfold`.
pub fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".local").join("share"))
        .join("keyfold")
}

/// Uses `$XDG_CONFIG_HOME/keyfold` or falls back to `~/.config/keyfold`.
pub fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".config"))
        .join("keyfold")
}

/// Directory the local object backend writes into by default.
pub fn objects_dir() -> PathBuf {
    data_dir().join("objects")
}

pub fn metadata_db() -> PathBuf {
    data_dir().join("metadata.db")
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

fn home_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
