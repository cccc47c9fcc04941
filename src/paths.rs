//! Centralized path resolution for coinwatch
//!
//! All file and directory paths are resolved through this module so that the
//! binary, the database layer and the tests agree on where data lives.
//!
//! Platform defaults:
//! - **macOS**: `~/Library/Application Support/CoinWatch/`
//! - **Windows**: `%LOCALAPPDATA%\CoinWatch\`
//! - **Linux**: `$XDG_DATA_HOME/CoinWatch/` (fallback `~/.local/share/CoinWatch/`)
//!
//! The `--data-dir <path>` flag overrides the base directory entirely.

use once_cell::sync::Lazy;
use std::path::PathBuf;

use crate::arguments;

const APP_DIR: &str = "CoinWatch";

/// Lazy-initialized base directory (thread-safe)
static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    if let Some(dir) = arguments::get_arg_value("--data-dir") {
        return PathBuf::from(dir);
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    // Last resort: current working directory
    PathBuf::from(".").join(APP_DIR)
}

/// Base directory for all coinwatch data
pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

/// Directory holding the configuration file and databases
pub fn get_data_directory() -> PathBuf {
    get_base_directory().join("data")
}

/// Path of the TOML configuration file
pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

/// Path of the token cache database
pub fn get_tokens_db_path() -> PathBuf {
    get_data_directory().join("tokens.db")
}

/// Create every directory coinwatch needs at startup
pub fn ensure_all_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_data_directory())?;
    Ok(())
}
