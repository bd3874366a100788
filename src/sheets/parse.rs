//! CSV payload to ordered contact rows.
//!
//! Tolerates the shapes the publish endpoint actually produces: mixed line
//! endings, blank lines, a UTF-8 BOM on the header, and the occasional
//! payload that arrives as one unbroken line.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::models::split_numbers;

/// Row width used to rebuild rows from a single-line payload.
const FALLBACK_ROW_WIDTH: usize = 5;
const BOM: char = '\u{feff}';

const LOGO_COLUMNS: &[&str] = &["logo url", "logo", "logo file"];

/// One sheet row with the recognized columns, before logo resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
    pub name: String,
    /// Cleaned numbers joined with `,`.
    pub number: String,
    pub logo: String,
    pub label: String,
}

/// Parse a payload into rows, preserving sheet order. Rows without a name or
/// without any non-blank number are dropped.
pub fn parse_sheet(payload: &str) -> Result<Vec<SheetRow>, ParseError> {
    let rows = split_rows(payload)?;
    let Some((header, body)) = rows.split_first() else {
        return Err(ParseError::NoRows);
    };

    let header: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let cell = if idx == 0 {
                cell.trim().trim_start_matches(BOM)
            } else {
                cell.as_str()
            };
            cell.trim().to_lowercase()
        })
        .collect();

    let mut out = Vec::new();
    for row in body {
        if row.len() == 1 && row[0].trim().is_empty() {
            continue;
        }

        let columns: HashMap<&str, &str> = header
            .iter()
            .enumerate()
            .map(|(idx, key)| (key.as_str(), row.get(idx).map_or("", |c| c.trim())))
            .collect();
        let column = |key: &str| columns.get(key).copied().unwrap_or_default();

        let name = column("name");
        let number = split_numbers(column("number")).join(",");
        if name.is_empty() || number.is_empty() {
            tracing::debug!(name, "skipping row without name or number");
            continue;
        }

        let logo = LOGO_COLUMNS
            .iter()
            .map(|&key| column(key))
            .find(|v| !v.is_empty())
            .unwrap_or_default();

        out.push(SheetRow {
            name: name.to_string(),
            number,
            logo: logo.to_string(),
            label: column("label").to_string(),
        });
    }

    Ok(out)
}

fn split_rows(payload: &str) -> Result<Vec<Vec<String>>, ParseError> {
    let rows: Vec<Vec<String>> = payload
        .split(|c: char| c == '\r' || c == '\n')
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect();

    if rows.len() >= 2 {
        return Ok(rows);
    }

    // Whole sheet on one line: rebuild fixed-width rows from the flat cells.
    let flat = flat_cells(payload);
    if flat.len() < FALLBACK_ROW_WIDTH {
        return Err(ParseError::TooFewCells(flat.len()));
    }
    tracing::debug!(cells = flat.len(), "rebuilding rows from single-line payload");
    Ok(flat
        .chunks(FALLBACK_ROW_WIDTH)
        .map(<[String]>::to_vec)
        .collect())
}

fn csv_reader(data: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes())
}

fn parse_line(line: &str) -> Option<Vec<String>> {
    match csv_reader(line).records().next()? {
        Ok(record) => Some(record.iter().map(str::to_string).collect()),
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparsable line");
            None
        }
    }
}

fn flat_cells(payload: &str) -> Vec<String> {
    csv_reader(payload)
        .records()
        .filter_map(Result::ok)
        .flat_map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_row() {
        let rows = parse_sheet("name,number,logo,label\n\"Alice\",\"123,456\",\"\",\"Alice L\"\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alice");
        assert_eq!(rows[0].number, "123,456");
        assert_eq!(rows[0].logo, "");
        assert_eq!(rows[0].label, "Alice L");
    }

    #[test]
    fn test_row_missing_number_dropped() {
        let csv = "name,number\nPNP,117\nBFP,\nCIO,046-481-4100\n";
        let rows = parse_sheet(csv).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["PNP", "CIO"]);
    }

    #[test]
    fn test_numbers_cleaned() {
        let rows = parse_sheet("name,number\nPNP,\" 117 , , 046-417-6366 \"\nBFP,\" , \"\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].number, "117,046-417-6366");
    }

    #[test]
    fn test_mixed_line_endings_and_blank_lines() {
        let csv = "name,number\r\nPNP,117\r\rBFP,160\n\nCIO,8888\n";
        let rows = parse_sheet(csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].name, "CIO");
    }

    #[test]
    fn test_header_case_bom_and_whitespace() {
        let csv = "\u{feff} Name , NUMBER ,Logo URL, Label \nPNP,117,https://example.com/pnp.png,Police\n";
        let rows = parse_sheet(csv).unwrap();
        assert_eq!(rows[0].name, "PNP");
        assert_eq!(rows[0].number, "117");
        assert_eq!(rows[0].logo, "https://example.com/pnp.png");
        assert_eq!(rows[0].label, "Police");
    }

    #[test]
    fn test_logo_aliases() {
        let csv = "name,number,logo file\nPNP,117,pnp.png\n";
        assert_eq!(parse_sheet(csv).unwrap()[0].logo, "pnp.png");

        let csv = "name,number,logo,logo url\nPNP,117,pnp.png,\n";
        assert_eq!(parse_sheet(csv).unwrap()[0].logo, "pnp.png");
    }

    #[test]
    fn test_short_rows_padded() {
        let rows = parse_sheet("name,number,logo,label\nPNP,117\n").unwrap();
        assert_eq!(rows[0].label, "");
        assert_eq!(rows[0].logo, "");
    }

    #[test]
    fn test_single_line_fallback() {
        let payload = "name,number,logo,label,notes,PNP,117,,Police,x,BFP,160,,Fire,y";
        let rows = parse_sheet(payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "PNP");
        assert_eq!(rows[1].label, "Fire");
    }

    #[test]
    fn test_single_line_too_short() {
        assert!(matches!(parse_sheet("name,number"), Err(ParseError::TooFewCells(2))));
        assert!(matches!(parse_sheet(""), Err(ParseError::TooFewCells(0))));
    }

    #[test]
    fn test_preserves_order() {
        let csv = "name,number\nC,3\nA,1\nB,2\n";
        let names: Vec<String> = parse_sheet(csv).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }
}
