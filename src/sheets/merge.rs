//! Folding the disaster-office row into the city emergency row.
//!
//! The sheet lists the city emergency hotline and the disaster risk reduction
//! office separately, but citizens should see one card. When both rows are
//! present, the office's numbers are appended to the emergency row and the
//! office row is removed.

use std::collections::BTreeMap;

use crate::models::{split_numbers, Contact};

/// Names that identify the two rows to combine. Matching is on the
/// upper-cased, trimmed name: exact names first, then substring triggers.
#[derive(Debug, Clone)]
pub struct MergeRule {
    pub emergency_names: Vec<String>,
    pub emergency_triggers: Vec<String>,
    pub office_names: Vec<String>,
    pub office_triggers: Vec<String>,
    /// Messenger-table key that always refers to the office.
    pub office_config_key: String,
}

impl Default for MergeRule {
    fn default() -> Self {
        Self {
            emergency_names: owned(&["BACOOR EMERGENCY", "EMERGENCY"]),
            emergency_triggers: owned(&["BACOOR EMERGENCY"]),
            office_names: owned(&[
                "BACOOR DISASTER RISK REDUCTION AND MANAGEMENT OFFICE",
                "BDDRMO",
            ]),
            office_triggers: owned(&["DISASTER RISK", "BDDRMO"]),
            office_config_key: "BDDRMO".to_string(),
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl MergeRule {
    pub fn is_emergency(&self, name: &str) -> bool {
        matches_any(name, &self.emergency_names, &self.emergency_triggers)
    }

    pub fn is_office(&self, name: &str) -> bool {
        matches_any(name, &self.office_names, &self.office_triggers)
    }
}

fn matches_any(name: &str, exact: &[String], triggers: &[String]) -> bool {
    let upper = name.trim().to_uppercase();
    exact.iter().any(|n| *n == upper) || triggers.iter().any(|t| upper.contains(t.as_str()))
}

/// Combine the emergency and office rows when both exist; otherwise return
/// the list unchanged. Re-running on merged output is a no-op since the office
/// row is gone.
pub fn merge_contacts(
    mut contacts: Vec<Contact>,
    rule: &MergeRule,
    messenger_links: &BTreeMap<String, String>,
) -> Vec<Contact> {
    let Some(emergency_idx) = contacts.iter().position(|c| rule.is_emergency(&c.name)) else {
        return contacts;
    };
    let Some(office_idx) = contacts
        .iter()
        .enumerate()
        .position(|(idx, c)| idx != emergency_idx && rule.is_office(&c.name))
    else {
        return contacts;
    };

    let emergency = &contacts[emergency_idx];
    let office = &contacts[office_idx];

    let mut numbers: Vec<&str> = Vec::new();
    for n in split_numbers(&emergency.number)
        .into_iter()
        .chain(split_numbers(&office.number))
    {
        if !numbers.contains(&n) {
            numbers.push(n);
        }
    }

    let configured = |key: &str| messenger_links.get(key).filter(|l| !l.is_empty()).cloned();
    let non_empty = |m: &Option<String>| m.clone().filter(|l| !l.is_empty());
    let messenger = configured(office.name.as_str())
        .or_else(|| configured(rule.office_config_key.as_str()))
        .or_else(|| configured(emergency.label.as_str()))
        .or_else(|| non_empty(&office.messenger))
        .or_else(|| non_empty(&emergency.messenger));

    let merged = Contact {
        number: numbers.join(","),
        name: emergency.name.clone(),
        logo: emergency.logo.clone(),
        label: emergency.label.clone(),
        messenger,
    };

    tracing::info!(
        emergency = %merged.name,
        office = %office.name,
        numbers = %merged.number,
        "merged disaster office into emergency contact"
    );

    contacts[emergency_idx] = merged;
    contacts.remove(office_idx);
    contacts
}
