//! vCard 3.0 export for one contact or the whole directory.

use crate::error::VcardError;
use crate::models::{Contact, PhoneType};
use crate::security::{percent_encode, validate_name, validate_phone_number};

pub const ALL_CONTACTS_FILENAME: &str = "Emergency_Contacts_All.vcf";
pub const CONTENT_TYPE: &str = "text/vcard; charset=utf-8";

const MAX_TEXT_LEN: usize = 500;

/// A rendered download: file name plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcardFile {
    pub filename: String,
    pub body: String,
}

impl VcardFile {
    /// Single stored contact. Fails when neither label nor name is a valid name.
    pub fn for_contact(contact: &Contact) -> Result<Self, VcardError> {
        let name = card_name(contact).ok_or(VcardError::InvalidName)?;
        let numbers: Vec<String> = contact
            .phone_entries()
            .iter()
            .map(|entry| sanitize_text(&entry.number))
            .collect();
        Ok(Self {
            filename: vcard_filename(&name),
            body: render(&name, &numbers),
        })
    }

    /// Single contact from raw request parameters.
    pub fn for_raw(name: &str, number: &str) -> Result<Self, VcardError> {
        let name = validate_name(name).ok_or(VcardError::InvalidName)?;
        if !validate_phone_number(number) {
            return Err(VcardError::InvalidNumber);
        }
        let name = sanitize_text(&name);
        Ok(Self {
            filename: vcard_filename(&name),
            body: render(&name, &[sanitize_text(number)]),
        })
    }

    pub fn for_all(contacts: &[Contact]) -> Self {
        Self {
            filename: ALL_CONTACTS_FILENAME.to_string(),
            body: render_all(contacts),
        }
    }

    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }
}

/// One contact's card, CRLF line endings.
pub fn render_vcard(contact: &Contact) -> Result<String, VcardError> {
    VcardFile::for_contact(contact).map(|file| file.body)
}

/// Every contact in order. A contact whose names both fail validation is
/// still exported under its sanitized raw name.
pub fn render_all(contacts: &[Contact]) -> String {
    contacts
        .iter()
        .map(|contact| {
            let name = card_name(contact).unwrap_or_else(|| sanitize_text(&contact.name));
            let numbers: Vec<String> = contact
                .phone_entries()
                .iter()
                .map(|entry| sanitize_text(&entry.number))
                .collect();
            render(&name, &numbers)
        })
        .collect()
}

/// Label if it validates, else the name.
fn card_name(contact: &Contact) -> Option<String> {
    validate_name(&contact.label)
        .or_else(|| validate_name(&contact.name))
        .map(|name| sanitize_text(&name))
}

fn render(name: &str, numbers: &[String]) -> String {
    let mut card = String::from("BEGIN:VCARD\r\nVERSION:3.0\r\n");
    card.push_str(&format!("FN:{}\r\n", name));
    for number in numbers.iter().filter(|n| !n.is_empty()) {
        let kind = PhoneType::classify(number);
        card.push_str(&format!("TEL;TYPE={}:{}\r\n", kind.as_vcard_str(), number));
    }
    card.push_str("END:VCARD\r\n");
    card
}

/// Collapse line breaks to spaces, drop other control characters, and cap
/// the length at 500 bytes.
pub fn sanitize_text(text: &str) -> String {
    let cleaned: String = text
        .trim()
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .filter(|c| !c.is_ascii_control())
        .collect();

    if cleaned.len() <= MAX_TEXT_LEN {
        return cleaned;
    }
    let mut end = MAX_TEXT_LEN;
    while !cleaned.is_char_boundary(end) {
        end -= 1;
    }
    cleaned[..end].to_string()
}

pub fn vcard_filename(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.vcf", stem)
}

pub fn content_disposition(filename: &str) -> String {
    let quoted = filename.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        quoted,
        percent_encode(filename)
    )
}
