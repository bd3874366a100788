use serde::{Deserialize, Serialize};

use super::phone::{split_numbers, PhoneEntry};
use crate::config::Config;
use crate::security::is_safe_link;
use crate::session::contact_download_id;
use crate::sheets::logo::resolve_logo;
use crate::sheets::parse::SheetRow;

/// One directory entry. Recreated on every successful fetch, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Comma-joined numbers, each optionally `number | label`.
    pub number: String,
    /// Identifier from the sheet's `name` column.
    pub name: String,
    pub logo: String,
    /// Display name; the name when the sheet leaves it blank.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messenger: Option<String>,
}

impl Contact {
    /// Build a contact from a parsed row. Returns `None` if name or numbers
    /// are empty after cleaning.
    pub fn from_row(row: SheetRow, config: &Config) -> Option<Self> {
        let name = row.name.trim().to_string();
        let number = split_numbers(&row.number).join(",");
        if name.is_empty() || number.is_empty() {
            return None;
        }

        let label = match row.label.trim() {
            "" => name.clone(),
            l => l.to_string(),
        };
        let logo = resolve_logo(&row.logo, &config.default_logo);
        let messenger = config
            .messenger_links
            .get(&name)
            .cloned()
            .or_else(|| Some(config.messenger_default.clone()))
            .filter(|m| !m.is_empty());

        Some(Self {
            number,
            name,
            logo,
            label,
            messenger,
        })
    }

    pub fn numbers(&self) -> Vec<&str> {
        split_numbers(&self.number)
    }

    pub fn phone_entries(&self) -> Vec<PhoneEntry> {
        self.numbers().into_iter().map(PhoneEntry::parse).collect()
    }

    /// Label when set, otherwise the name.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// What a contacts page shows for one entry.
#[derive(Debug, Clone, Serialize)]
pub struct ContactCard {
    pub download_id: String,
    pub name: String,
    pub label: String,
    pub logo: String,
    pub number_display: String,
    pub numbers: Vec<CardNumber>,
    pub has_alternatives: bool,
    pub messenger: String,
    pub priority: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardNumber {
    #[serde(flatten)]
    pub entry: PhoneEntry,
    pub dial_uri: String,
}

impl ContactCard {
    /// The first surviving contact is always the priority card.
    pub fn from_contact(contact: &Contact, index: usize, config: &Config) -> Self {
        let numbers: Vec<CardNumber> = contact
            .phone_entries()
            .into_iter()
            .map(|entry| CardNumber {
                dial_uri: entry.dial_uri(),
                entry,
            })
            .collect();

        let messenger = config
            .messenger_links
            .get(&contact.name)
            .or(contact.messenger.as_ref())
            .filter(|link| is_safe_link(link))
            .cloned()
            .unwrap_or_else(|| config.messenger_default.clone());

        Self {
            download_id: contact_download_id(contact, index),
            name: contact.name.clone(),
            label: contact.display_name().to_string(),
            logo: contact.logo.clone(),
            number_display: contact.number.clone(),
            has_alternatives: numbers.len() > 1,
            numbers,
            messenger,
            priority: index == 0,
        }
    }
}
