//! Input validation and sanitizing shared by the sheet pipeline and the
//! HTTP endpoints.
//!
//! Offending values are rejected one at a time; callers substitute a safe
//! default and keep processing the rest of the batch.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

/// Substrings that disqualify a link wherever they appear (case-insensitive).
pub const DANGEROUS_SCHEMES: &[&str] = &[
    "file://",
    "ftp://",
    "javascript:",
    "data:",
    "vbscript:",
    "\\\\",
];

/// Forwarding headers consulted for the client address, in order.
const CLIENT_IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "client-ip",
    "x-forwarded-for",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

pub const MAX_NAME_LEN: usize = 200;

pub fn contains_dangerous_scheme(s: &str) -> bool {
    let lower = s.to_lowercase();
    DANGEROUS_SCHEMES.iter().any(|d| lower.contains(d))
}

/// True only for absolute http(s) links with no embedded dangerous scheme.
pub fn is_safe_link(link: &str) -> bool {
    if contains_dangerous_scheme(link) {
        return false;
    }
    match url::Url::parse(link) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Digits, spaces, hyphens, parentheses and plus only; 3 to 15 digits.
pub fn validate_phone_number(number: &str) -> bool {
    let number = number.trim();
    if number.is_empty() {
        return false;
    }
    let allowed = number
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '+' | '(' | ')'));
    let digits = digit_count(number);
    allowed && (3..=15).contains(&digits)
}

pub fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Returns the trimmed name when it is 1-200 characters of letters, digits,
/// whitespace and basic punctuation.
pub fn validate_name(name: &str) -> Option<String> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r"^[\p{L}\p{N}\s\-'.()]+$").expect("name pattern is valid")
    });

    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN || !re.is_match(name) {
        return None;
    }
    Some(name.to_string())
}

/// Everything outside the RFC 3986 unreserved set.
const NOT_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode everything except RFC 3986 unreserved characters.
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, NOT_UNRESERVED).to_string()
}

/// Identify the client for rate limiting: first public address found in the
/// forwarding headers, otherwise the socket peer.
pub fn client_identifier(headers: &HashMap<String, String>, peer: SocketAddr) -> String {
    for key in CLIENT_IP_HEADERS {
        let Some(value) = headers.get(*key) else {
            continue;
        };
        let cleaned: String = value
            .chars()
            .filter(|c| c.is_ascii_hexdigit() || matches!(c, ':' | '.' | ',') || c.is_whitespace())
            .collect();

        for candidate in cleaned.split(',') {
            let candidate = candidate.trim();
            let parsed = candidate.parse::<IpAddr>().ok().or_else(|| {
                // IPv4 with a port suffix
                candidate
                    .split_once(':')
                    .and_then(|(host, _)| host.parse::<IpAddr>().ok())
            });
            if let Some(ip) = parsed {
                if is_public_ip(&ip) {
                    return ip.to_string();
                }
            }
        }
    }
    peer.ip().to_string()
}

fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 0
                || v4.octets()[0] >= 240)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

/// Constant-time byte comparison for shared secrets.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
