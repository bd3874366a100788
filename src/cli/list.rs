use anyhow::Result;

use crate::config::Config;
use crate::models::{ContactCard, PhoneEntry};
use crate::refresh::{Directory, DirectoryLoad, LoadOrigin};
use crate::server::MSG_EMPTY_DIRECTORY;

pub fn run_list(config: &Config, json: bool) -> Result<()> {
    let directory = Directory::from_config(config.clone())?;
    let load = directory.load(false);

    if json {
        let cards: Vec<ContactCard> = load
            .contacts
            .iter()
            .enumerate()
            .map(|(index, contact)| ContactCard::from_contact(contact, index, config))
            .collect();
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }

    if load.contacts.is_empty() {
        println!("{}", MSG_EMPTY_DIRECTORY);
        return Ok(());
    }

    for (index, contact) in load.contacts.iter().enumerate() {
        let card = ContactCard::from_contact(contact, index, config);
        print!("{}", format_card(&card));
    }
    println!("\n{}", source_line(&load));
    Ok(())
}

/// Label on the first line (starred when priority), one indented line per number.
fn format_card(card: &ContactCard) -> String {
    let marker = if card.priority { "*" } else { " " };
    let mut out = format!("{} {}\n", marker, card.label);
    for number in &card.numbers {
        out.push_str(&format!("    {}\n", format_number(&number.entry)));
    }
    out
}

fn format_number(entry: &PhoneEntry) -> String {
    match &entry.label {
        Some(label) => format!("{} ({})", entry.number, label),
        None => entry.number.clone(),
    }
}

fn source_line(load: &DirectoryLoad) -> String {
    let when = load
        .envelope
        .as_ref()
        .and_then(|e| chrono::DateTime::from_timestamp(e.timestamp, 0))
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let origin = match load.origin {
        LoadOrigin::Fresh => "fetched now",
        LoadOrigin::Cache => "from cache",
        LoadOrigin::Empty => "no data",
    };
    format!("{} contact(s), {}, updated {}", load.contacts.len(), origin, when)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Contact;

    fn card(number: &str, index: usize) -> ContactCard {
        let contact = Contact {
            number: number.to_string(),
            name: "PNP".to_string(),
            logo: String::new(),
            label: "Police".to_string(),
            messenger: None,
        };
        ContactCard::from_contact(&contact, index, &Config::default())
    }

    #[test]
    fn test_format_priority_card() {
        assert_eq!(
            format_card(&card("117,0917 123 4567 | Globe", 0)),
            "* Police\n    117\n    0917 123 4567 (Globe)\n"
        );
    }

    #[test]
    fn test_format_regular_card() {
        assert_eq!(format_card(&card("117", 3)), "  Police\n    117\n");
    }

    #[test]
    fn test_source_line_without_envelope() {
        let load = DirectoryLoad {
            contacts: Vec::new(),
            envelope: None,
            origin: LoadOrigin::Empty,
        };
        assert_eq!(source_line(&load), "0 contact(s), no data, updated unknown");
    }
}
