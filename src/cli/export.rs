use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::Contact;
use crate::refresh::Directory;
use crate::vcard::VcardFile;

pub fn run_export(config: &Config, name: Option<&str>, out: Option<&Path>) -> Result<()> {
    let directory = Directory::from_config(config.clone())?;
    let load = directory.load(false);
    if load.contacts.is_empty() {
        bail!("No contacts available.");
    }

    let (file, count) = match name {
        Some(query) => {
            let contact = find_contact(&load.contacts, query)
                .ok_or_else(|| anyhow!("No contact named '{}'", query))?;
            (VcardFile::for_contact(contact)?, 1)
        }
        None => (VcardFile::for_all(&load.contacts), load.contacts.len()),
    };

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&file.filename));
    std::fs::write(&path, &file.body)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {} contact(s) to {}", count, path.display());
    Ok(())
}

/// Case-insensitive match on name or label; exact matches win over substrings.
fn find_contact<'a>(contacts: &'a [Contact], query: &str) -> Option<&'a Contact> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    let matches = |c: &Contact, exact: bool| {
        [&c.name, &c.label].iter().any(|field| {
            let field = field.to_lowercase();
            if exact {
                field == query
            } else {
                field.contains(&query)
            }
        })
    };

    contacts
        .iter()
        .find(|&c| matches(c, true))
        .or_else(|| contacts.iter().find(|&c| matches(c, false)))
}
