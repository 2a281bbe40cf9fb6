//! `roster daemon` — the change-feed daemon in the foreground.

use std::path::Path;

use anyhow::{Context, Result};

use super::load_settings;

pub fn run(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    println!("watching {}", settings.inbox_root().display());
    roster_daemon::start_blocking(settings).context("daemon exited with error")
}
