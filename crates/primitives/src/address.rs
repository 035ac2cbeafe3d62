use crate::error::{AddressError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell address, optionally sheet-qualified and `$`-anchored.
///
/// Anchoring is cosmetic: two addresses compare equal when sheet, column,
/// and row match, whatever their `$` markers say. Column and row are
/// 1-based (`A1` is column 1, row 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellAddress {
    pub sheet: Option<String>,
    pub column: u32,
    pub row: u32,
    pub column_anchored: bool,
    pub row_anchored: bool,
}

impl CellAddress {
    /// Create an unqualified, unanchored address.
    pub fn new(column: u32, row: u32) -> Self {
        Self {
            sheet: None,
            column,
            row,
            column_anchored: false,
            row_anchored: false,
        }
    }

    /// Create an unanchored address on a named sheet.
    pub fn on_sheet<S: Into<String>>(sheet: S, column: u32, row: u32) -> Self {
        Self {
            sheet: Some(sheet.into()),
            column,
            row,
            column_anchored: false,
            row_anchored: false,
        }
    }

    /// Replace the sheet qualifier.
    #[must_use]
    pub fn with_sheet<S: Into<String>>(mut self, sheet: S) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Bare A1 reference without sheet qualifier or anchors (`"AB12"`).
    ///
    /// This is the normalized form used for workbook lookups and graph keys.
    pub fn reference(&self) -> String {
        let letters = number_to_column(self.column).unwrap_or_default();
        format!("{}{}", letters, self.row)
    }

    /// A1 reference with `$` anchors, still without the sheet qualifier.
    pub fn anchored_reference(&self) -> String {
        let letters = number_to_column(self.column).unwrap_or_default();
        format!(
            "{}{}{}{}",
            if self.column_anchored { "$" } else { "" },
            letters,
            if self.row_anchored { "$" } else { "" },
            self.row
        )
    }
}

impl PartialEq for CellAddress {
    fn eq(&self, other: &Self) -> bool {
        self.sheet == other.sheet && self.column == other.column && self.row == other.row
    }
}

impl Eq for CellAddress {}

impl Hash for CellAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sheet.hash(state);
        self.column.hash(state);
        self.row.hash(state);
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            if sheet.contains(char::is_whitespace) {
                write!(f, "'{sheet}'!")?;
            } else {
                write!(f, "{sheet}!")?;
            }
        }
        write!(f, "{}", self.anchored_reference())
    }
}

/// Convert column letters to a 1-based column number (A=1, Z=26, AA=27).
///
/// Lowercase letters are accepted and upcased; anything else fails.
pub fn column_to_number(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(AddressError::InvalidAddress("empty column".to_string()));
    }
    let mut number: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(AddressError::InvalidAddress(letters.to_string()));
        }
        let value = u32::from(ch.to_ascii_uppercase() as u8 - b'A' + 1);
        number = number * 26 + value;
    }
    Ok(number)
}

/// Convert a 1-based column number to column letters (27 -> "AA").
pub fn number_to_column(mut number: u32) -> Result<String> {
    if number < 1 {
        return Err(AddressError::InvalidAddress(format!("column {number}")));
    }
    let mut letters = Vec::new();
    while number > 0 {
        let remainder = (number - 1) % 26;
        letters.push(b'A' + remainder as u8);
        number = (number - 1) / 26;
    }
    letters.reverse();
    Ok(String::from_utf8(letters).expect("ASCII letters"))
}

fn address_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:((?:'[^']+')|(?:[^'!:]+))!)?(\$?)([A-Za-z]+)(\$?)([0-9]+)$")
            .expect("valid regex")
    })
}

/// Parse a single A1-style token into a [`CellAddress`].
///
/// Accepts an optional `Sheet!` or `'Quoted Sheet'!` qualifier and optional
/// `$` anchors before the column letters and/or row digits.
pub fn parse_address(token: &str) -> Result<CellAddress> {
    let caps = address_regex()
        .captures(token.trim())
        .ok_or_else(|| AddressError::InvalidAddress(token.to_string()))?;

    let sheet = caps
        .get(1)
        .map(|m| m.as_str().trim_matches('\'').to_string());
    let column_anchored = &caps[2] == "$";
    let column = column_to_number(&caps[3])?;
    let row_anchored = &caps[4] == "$";
    let row: u32 = caps[5]
        .parse()
        .map_err(|_| AddressError::InvalidAddress(token.to_string()))?;
    if row < 1 {
        return Err(AddressError::InvalidAddress(token.to_string()));
    }

    Ok(CellAddress {
        sheet,
        column,
        row,
        column_anchored,
        row_anchored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    #[test]
    fn test_column_codec() {
        assert_eq!(column_to_number("A").unwrap(), 1);
        assert_eq!(column_to_number("Z").unwrap(), 26);
        assert_eq!(column_to_number("AA").unwrap(), 27);
        assert_eq!(column_to_number("AB").unwrap(), 28);
        assert_eq!(column_to_number("XFD").unwrap(), crate::MAX_COLUMN);

        assert_eq!(number_to_column(1).unwrap(), "A");
        assert_eq!(number_to_column(26).unwrap(), "Z");
        assert_eq!(number_to_column(27).unwrap(), "AA");
        assert_eq!(number_to_column(702).unwrap(), "ZZ");
        assert_eq!(number_to_column(703).unwrap(), "AAA");
    }

    #[test]
    fn test_column_codec_roundtrip() {
        for n in 1..=2_000 {
            let letters = number_to_column(n).unwrap();
            assert_eq!(column_to_number(&letters).unwrap(), n);
        }
    }

    #[test]
    fn test_column_codec_errors() {
        assert!(column_to_number("").is_err());
        assert!(column_to_number("A1").is_err());
        assert!(column_to_number("$A").is_err());
        assert!(number_to_column(0).is_err());
    }

    #[test]
    fn test_parse_plain_address() {
        let addr = parse_address("AB12").unwrap();
        assert_eq!(addr.sheet, None);
        assert_eq!(addr.column, 28);
        assert_eq!(addr.row, 12);
        assert!(!addr.column_anchored);
        assert!(!addr.row_anchored);
    }

    #[test]
    fn test_parse_anchored_address() {
        let addr = parse_address("$B$2").unwrap();
        assert!(addr.column_anchored);
        assert!(addr.row_anchored);
        assert_eq!((addr.column, addr.row), (2, 2));

        let addr = parse_address("B$2").unwrap();
        assert!(!addr.column_anchored);
        assert!(addr.row_anchored);
    }

    #[test]
    fn test_parse_sheet_qualified() {
        let addr = parse_address("Sheet1!C3").unwrap();
        assert_eq!(addr.sheet.as_deref(), Some("Sheet1"));
        assert_eq!((addr.column, addr.row), (3, 3));

        let addr = parse_address("'My Sheet'!$A$1").unwrap();
        assert_eq!(addr.sheet.as_deref(), Some("My Sheet"));
        assert!(addr.column_anchored && addr.row_anchored);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_address("").is_err());
        assert!(parse_address("A").is_err());
        assert!(parse_address("12").is_err());
        assert!(parse_address("A0").is_err());
        assert!(parse_address("A1:B2").is_err());
        assert!(parse_address("1A").is_err());
    }

    #[test]
    fn test_anchors_cosmetic_for_equality() {
        let plain = parse_address("Sheet1!B2").unwrap();
        let anchored = parse_address("Sheet1!$B$2").unwrap();
        assert_eq!(plain, anchored);

        let hash = |addr: &CellAddress| {
            let mut hasher = DefaultHasher::new();
            addr.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&plain), hash(&anchored));
    }

    #[test]
    fn test_display() {
        assert_eq!(parse_address("Sheet1!$A$1").unwrap().to_string(), "Sheet1!$A$1");
        assert_eq!(parse_address("'My Sheet'!B2").unwrap().to_string(), "'My Sheet'!B2");
        assert_eq!(CellAddress::new(28, 12).to_string(), "AB12");
    }

    #[test]
    fn test_reference_strips_anchors() {
        assert_eq!(parse_address("$AB$12").unwrap().reference(), "AB12");
        assert_eq!(parse_address("$AB$12").unwrap().anchored_reference(), "$AB$12");
    }
}
