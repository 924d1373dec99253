use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Home directory that agent session folders live under
pub fn get_home_dir() -> Result<PathBuf> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home))
}
