//! Spreadsheet link validation and CSV-export normalization.

use rand::Rng;
use url::Url;

use crate::security::contains_dangerous_scheme;

pub const SHEETS_HOST: &str = "docs.google.com";
const SHEETS_PATH: &str = "/spreadsheets/";

/// Query parameters that only ever carry a cache-busting marker.
const CACHE_BUST_PARAMS: &[&str] = &["t", "_", "r", "cachebust"];

/// Accept only https links on the spreadsheet host with no dangerous scheme
/// embedded anywhere.
pub fn validate_sheet_url(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() || contains_dangerous_scheme(raw) {
        return false;
    }
    match Url::parse(raw) {
        Ok(u) => {
            u.scheme() == "https"
                && u.host_str() == Some(SHEETS_HOST)
                && u.path().contains(SHEETS_PATH)
        }
        Err(_) => false,
    }
}

/// Rewrite a share or publish link into a CSV URL with a fresh cache-busting
/// marker. Returns an empty string for links that fail validation.
pub fn normalize_sheet_url(raw: &str) -> String {
    let raw = raw.trim();
    if !validate_sheet_url(raw) {
        return String::new();
    }
    let Ok(parsed) = Url::parse(raw) else {
        return String::new();
    };

    let gid = parsed
        .query_pairs()
        .find(|(k, _)| k == "gid")
        .map(|(_, v)| v.into_owned())
        .filter(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_alphanumeric()));

    match document_id(&parsed) {
        DocumentId::Direct(id) => {
            let mut export = format!("https://{}/spreadsheets/d/{}/export?format=csv", SHEETS_HOST, id);
            if let Some(gid) = gid {
                export.push_str("&gid=");
                export.push_str(&gid);
            }
            rewrite_query(&export, &[], &cache_bust_pairs())
        }
        DocumentId::Rejected => String::new(),
        DocumentId::Published => {
            let mut published = parsed;
            let path = published.path().replace("/pubhtml", "/pub");
            published.set_path(&path);

            let mut drop: Vec<&str> = CACHE_BUST_PARAMS.to_vec();
            drop.push("output");
            let mut add = vec![("output", "csv".to_string())];
            add.extend(cache_bust_pairs());
            rewrite_query(published.as_str(), &drop, &add)
        }
    }
}

/// Same URL with its markers replaced by a retry marker, used when the
/// publish endpoint served a stale HTML page.
pub fn retry_url(url: &str) -> String {
    let marker = format!("{}_{}", chrono::Utc::now().timestamp(), random_marker());
    rewrite_query(url, CACHE_BUST_PARAMS, &[("r", marker)])
}

enum DocumentId {
    /// `/spreadsheets/d/<id>` with a usable id.
    Direct(String),
    /// `/spreadsheets/d/<id>` whose id sanitized down to nothing.
    Rejected,
    /// `/spreadsheets/d/e/<token>` publish form, or no `/d/` segment at all.
    Published,
}

fn document_id(url: &Url) -> DocumentId {
    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    let id = segments
        .windows(3)
        .find(|w| w[0] == "spreadsheets" && w[1] == "d")
        .map(|w| w[2]);

    match id {
        None | Some("e") => DocumentId::Published,
        Some(raw) => {
            let id: String = raw
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                .collect();
            if id.is_empty() {
                DocumentId::Rejected
            } else {
                DocumentId::Direct(id)
            }
        }
    }
}

fn cache_bust_pairs() -> Vec<(&'static str, String)> {
    vec![
        ("t", chrono::Utc::now().timestamp().to_string()),
        ("_", random_marker()),
    ]
}

/// `<5 digits>_<8 hex>`
fn random_marker() -> String {
    let mut rng = rand::thread_rng();
    let n: u32 = rng.gen_range(10000..=99999);
    let tail: u32 = rng.gen();
    format!("{}_{:08x}", n, tail)
}

fn rewrite_query(url: &str, drop: &[&str], add: &[(&str, String)]) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return String::new();
    };
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| {
            let key: &str = k;
            !drop.contains(&key)
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .extend_pairs(add.iter().map(|(k, v)| (*k, v.as_str())));
    parsed.to_string()
}
