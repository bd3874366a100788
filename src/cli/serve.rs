use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Config;
use crate::ratelimit::FixedWindowLimiter;
use crate::refresh::Directory;
use crate::server::{ctrlc_handler, DirectoryServer};

pub fn run_serve(config: &Config, port: Option<u16>) -> Result<()> {
    if !config.has_sheet_url() {
        tracing::warn!("no sheet URL configured; only an existing cache will be served");
    }
    if config.fetch_key.is_empty() {
        tracing::warn!("no fetch key configured; /fetch will reject every request");
    }

    let directory = Directory::from_config(config.clone())?;
    let mut server = DirectoryServer::new(directory, Box::new(FixedWindowLimiter::new()));
    if let Some(port) = port {
        server = server.with_port(port);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    ctrlc_handler(shutdown.clone());

    println!("Serving emergency contacts (Ctrl+C to stop)");
    Arc::new(server).start(shutdown)
}
