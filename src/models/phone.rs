use serde::{Deserialize, Serialize};

use crate::security::{digit_count, percent_encode};

/// vCard TEL type, inferred from the digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    #[default]
    Cell,
    Work,
}

impl PhoneType {
    /// Landlines carry 8-10 digits; hotlines and mobiles fall outside that range.
    pub fn classify(number: &str) -> Self {
        match digit_count(number) {
            8..=10 => Self::Work,
            _ => Self::Cell,
        }
    }

    pub fn as_vcard_str(&self) -> &'static str {
        match self {
            Self::Cell => "CELL",
            Self::Work => "WORK",
        }
    }
}

/// One dialable entry of a contact's number list, written in the sheet as
/// `number` or `number | label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneEntry {
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PhoneEntry {
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.splitn(2, '|').map(str::trim);
        let number = parts.next().unwrap_or_default().to_string();
        let label = parts.next().filter(|l| !l.is_empty()).map(str::to_string);
        Self { number, label }
    }

    pub fn dial_uri(&self) -> String {
        format!("tel:{}", percent_encode(&self.number))
    }
}

/// Split a comma-joined number list, trimming entries and dropping blanks.
pub fn split_numbers(joined: &str) -> Vec<&str> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect()
}
