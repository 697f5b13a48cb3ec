//! Path resolution for glrecon
//!
//! # Environment Variables
//!
//! - `GLRECON_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `GLRECON_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/glrecon` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\glrecon`
//!    - macOS/Linux: `~/.local/state/glrecon`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "GLRECON_STATE_DIR";

const APP_DIR: &str = "glrecon";

/// Get the glrecon state directory path
pub fn state_dir() -> Result<PathBuf> {
    state_dir_from(|name| std::env::var(name).ok())
}

fn state_dir_from(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = lookup(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg_state) = lookup("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join(APP_DIR))
}

/// Default state file
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("state.json"))
}

/// Expand ~ and environment variables in a path string.
fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
