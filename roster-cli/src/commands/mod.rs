pub mod daemon;
pub mod reconcile;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};
use roster_core::{settings, Settings};

/// `--config` if given, else `~/.roster/config.yaml`.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => settings::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => settings::load().context("failed to load config ~/.roster/config.yaml"),
    }
}
