pub mod parse;
pub mod types;

pub use parse::{load_config, ConfigError};
pub use types::Config;

use std::path::{Path, PathBuf};

/// Expands a leading tilde to the user's home directory. The path is
/// returned unchanged if it has no tilde or the home directory is unknown.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path: an explicit path wins (tilde-expanded),
/// then `~/.config/skein/config.yml`, then `/etc/skein/config.yml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/skein/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/skein/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
