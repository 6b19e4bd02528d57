pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_or_default};
pub use schema::{Config, ImapSettings};

use std::path::PathBuf;

/// Returns the canonical config path: `~/.ao3track/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ao3track").join("config.json"))
}
