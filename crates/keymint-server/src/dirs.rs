use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

/// Platform data directory for keymint, created on first use.
pub fn data_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("", "", "keymint").context("resolve platform data directory")?;
    let dir = proj.data_dir().to_owned();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create data dir {}", dir.display()))?;
    Ok(dir)
}
