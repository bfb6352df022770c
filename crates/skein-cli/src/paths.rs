use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Resolve the store database path based on priority:
/// 1. Explicit --db flag
/// 2. SKEIN_PATH environment variable (with tilde expansion)
/// 3. XDG data directory (recommended default)
/// 4. ~/.skein (fallback for systems without XDG)
pub fn resolve_store_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("SKEIN_PATH") {
        return Ok(expand_tilde(&env_path).join("history.db"));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("skein").join("history.db"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".skein").join("history.db"));
    }

    bail!("Could not determine store path: no HOME directory or XDG data directory found")
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}
