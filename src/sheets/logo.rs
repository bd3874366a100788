//! Logo cell resolution.
//!
//! A logo cell may hold a plain URL, a Drive share link, an `=IMAGE(...)`
//! formula, or a file name under `images/`. Anything that fails the safety
//! checks falls back to the default logo.

use regex::Regex;
use std::sync::OnceLock;

use crate::security::{contains_dangerous_scheme, is_safe_link};

const DRIVE_THUMBNAIL: &str = "https://drive.google.com/thumbnail?id=";
const LOCAL_IMAGE_DIR: &str = "images/";

pub fn resolve_logo(raw: &str, default_logo: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return default_logo.to_string();
    }

    let target = unwrap_image_formula(raw).unwrap_or_else(|| raw.to_string());

    if let Some(id) = drive_file_id(&target) {
        return format!("{}{}&sz=w1000", DRIVE_THUMBNAIL, id);
    }
    if is_safe_link(&target) {
        return target;
    }
    if is_safe_local_path(&target) {
        return if target.contains('/') {
            target
        } else {
            format!("{}{}", LOCAL_IMAGE_DIR, target)
        };
    }

    tracing::warn!(logo = %target, "rejected logo reference; using default");
    default_logo.to_string()
}

/// First argument of `=IMAGE("url", ...)`.
fn unwrap_image_formula(raw: &str) -> Option<String> {
    static IMAGE_RE: OnceLock<Regex> = OnceLock::new();
    let re = IMAGE_RE.get_or_init(|| {
        Regex::new(r"(?i)^=\s*IMAGE\((.+)\)\s*$").expect("IMAGE pattern is valid")
    });

    let params = re.captures(raw)?.get(1)?.as_str();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(params.as_bytes());
    let record = reader.records().next()?.ok()?;
    let first = record
        .get(0)?
        .trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
    Some(first.to_string())
}

fn drive_file_id(link: &str) -> Option<String> {
    static DRIVE_RES: OnceLock<[Regex; 2]> = OnceLock::new();
    let patterns = DRIVE_RES.get_or_init(|| {
        [
            Regex::new(r"^https?://drive\.google\.com/file/d/([A-Za-z0-9_-]+)")
                .expect("drive file pattern is valid"),
            Regex::new(r"^https?://drive\.google\.com/(?:open|uc|thumbnail)\?.*?\bid=([A-Za-z0-9_-]+)")
                .expect("drive query pattern is valid"),
        ]
    });

    patterns
        .iter()
        .find_map(|re| re.captures(link))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Relative path of plain characters, no traversal, no absolute root.
fn is_safe_local_path(path: &str) -> bool {
    !path.is_empty()
        && !contains_dangerous_scheme(path)
        && !path.starts_with('/')
        && !path.starts_with('\\')
        && !path.split('/').any(|segment| segment == "..")
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | ' ' | '-'))
}
