use anyhow::Result;

use crate::cache::ContactCache;
use crate::config::Config;
use crate::sheets::url::normalize_sheet_url;

pub fn run_config(config: &Config) -> Result<()> {
    let path = Config::default_path()?;
    let file_state = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("Config file:      {}{}", path.display(), file_state);
    println!();

    let sheet = if config.has_sheet_url() {
        config.sheet_url.as_str()
    } else {
        "(unset)"
    };
    println!("Sheet URL:        {}", sheet);
    if config.has_sheet_url() {
        println!("CSV endpoint:     {}", normalize_sheet_url(&config.sheet_url));
    }
    println!("Fetch key:        {}", config.masked_fetch_key());
    println!("Cache dir:        {}", config.cache_dir.display());
    println!("Port:             {}", config.port);
    println!("Default logo:     {}", config.default_logo);
    println!("Messenger:        {}", config.messenger_default);
    for (name, link) in &config.messenger_links {
        println!("  {:<16}{}", name, link);
    }
    println!("Download TTL:     {}s", config.session_ttl_secs);

    let cache = ContactCache::new(config.cache_dir.clone());
    match cache.load() {
        Some(cached) => println!(
            "Cache:            {} contact(s), hash {}",
            cached.envelope.contact_count,
            cached.envelope.data_hash.chars().take(12).collect::<String>()
        ),
        None => println!("Cache:            (empty)"),
    }
    Ok(())
}
