//! Published-sheet pipeline: link normalization, fetch, CSV parsing, logo
//! resolution, and the emergency/office merge.

pub mod fetch;
pub mod logo;
pub mod merge;
pub mod parse;
pub mod url;

use crate::config::Config;
use crate::error::ParseError;
use crate::models::Contact;

pub use fetch::{FetchedSheet, SheetFetcher, SheetSource};
pub use merge::{merge_contacts, MergeRule};

/// Payload text to the final, merged contact list.
pub fn build_contacts(payload: &str, config: &Config) -> Result<Vec<Contact>, ParseError> {
    let contacts: Vec<Contact> = parse::parse_sheet(payload)?
        .into_iter()
        .filter_map(|row| Contact::from_row(row, config))
        .collect();

    if contacts.is_empty() {
        return Err(ParseError::NoContacts);
    }
    Ok(merge_contacts(contacts, &MergeRule::default(), &config.messenger_links))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LOGO;

    #[test]
    fn test_single_row_payload() {
        let config = Config::default();
        let contacts = build_contacts(
            "name,number,logo,label\n\"Alice\",\"123,456\",\"\",\"Alice L\"\n",
            &config,
        )
        .unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].number, "123,456");
        assert_eq!(contacts[0].label, "Alice L");
        assert_eq!(contacts[0].logo, DEFAULT_LOGO);
    }

    #[test]
    fn test_row_without_number_dropped() {
        let config = Config::default();
        let contacts = build_contacts("name,number\nPNP,117\nBFP,\nCIO,8888\n", &config).unwrap();
        assert_eq!(contacts.len(), 2);
    }

    #[test]
    fn test_merge_applied() {
        let config = Config::default();
        let payload = "name,number,logo,label\n\
                       BACOOR EMERGENCY,161,,\n\
                       PNP,117,pnp.png,Police\n\
                       BDDRMO,046-417-0727,,\n";
        let contacts = build_contacts(payload, &config).unwrap();

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].name, "BACOOR EMERGENCY");
        assert_eq!(contacts[0].number, "161,046-417-0727");
        assert_eq!(contacts[1].logo, "images/pnp.png");
    }

    #[test]
    fn test_header_only_has_no_contacts() {
        let config = Config::default();
        let result = build_contacts("name,number\n,\n\n", &config);
        assert!(result.is_err());
    }
}
