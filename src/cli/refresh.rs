use anyhow::{bail, Result};

use crate::config::Config;
use crate::refresh::Directory;
use crate::server::FetchResponse;

/// Same flow as `GET /fetch`, without the key check.
pub fn run_refresh(config: &Config) -> Result<()> {
    if !config.has_sheet_url() {
        bail!("Google Sheet URL not configured");
    }

    let directory = Directory::from_config(config.clone())?;
    let load = directory.load(true);

    match FetchResponse::from_load(&load) {
        Some(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        None => bail!("Failed to refresh cache: sheet unavailable and no cache to fall back on"),
    }
}
