//! Page geometry: turn the `PDFSize` / margin settings into inches.

use crate::error::GenerateError;
use once_cell::sync::Lazy;
use regex::Regex;

const PX_PER_INCH: f64 = 96.0;
const CM_PER_INCH: f64 = 2.54;
const MM_PER_INCH: f64 = 25.4;

static LENGTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?|\.\d+)\s*(in|cm|mm|px)?\s*$").expect("valid regex")
});

/// Paper dimensions and vertical margins, all in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
}

impl PageLayout {
    /// Parse a paper token (`A4`, `letter`, …) and two margin lengths.
    pub fn parse(page_size: &str, top_margin: &str, bottom_margin: &str) -> Result<Self, GenerateError> {
        let (paper_width, paper_height) =
            paper_size(page_size).ok_or_else(|| GenerateError::InvalidSetting {
                key: "PDFSize".into(),
                value: page_size.into(),
            })?;
        let margin_top = length_in_inches(top_margin).ok_or_else(|| GenerateError::InvalidSetting {
            key: "TopMargin".into(),
            value: top_margin.into(),
        })?;
        let margin_bottom =
            length_in_inches(bottom_margin).ok_or_else(|| GenerateError::InvalidSetting {
                key: "BottomMargin".into(),
                value: bottom_margin.into(),
            })?;
        if margin_top + margin_bottom >= paper_height {
            return Err(GenerateError::InvalidSetting {
                key: "TopMargin".into(),
                value: format!("{top_margin} + {bottom_margin} leaves no printable area"),
            });
        }
        Ok(Self {
            paper_width,
            paper_height,
            margin_top,
            margin_bottom,
        })
    }
}

/// Portrait width × height in inches for a named paper format.
pub fn paper_size(token: &str) -> Option<(f64, f64)> {
    let size = match token.trim().to_ascii_lowercase().as_str() {
        "letter" => (8.5, 11.0),
        "legal" => (8.5, 14.0),
        "tabloid" => (11.0, 17.0),
        "ledger" => (17.0, 11.0),
        "a0" => (33.1, 46.8),
        "a1" => (23.4, 33.1),
        "a2" => (16.54, 23.4),
        "a3" => (11.7, 16.54),
        "a4" => (8.27, 11.7),
        "a5" => (5.83, 8.27),
        "a6" => (4.13, 5.83),
        _ => return None,
    };
    Some(size)
}

/// Length with an optional unit (`in`, `cm`, `mm`, `px`); bare numbers are px.
pub fn length_in_inches(value: &str) -> Option<f64> {
    let caps = LENGTH_RE.captures(value)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "px".to_string());
    let inches = match unit.as_str() {
        "in" => number,
        "cm" => number / CM_PER_INCH,
        "mm" => number / MM_PER_INCH,
        _ => number / PX_PER_INCH,
    };
    Some(inches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn lengths_convert_to_inches() {
        assert!(close(length_in_inches("0.5in").unwrap(), 0.5));
        assert!(close(length_in_inches("2.54cm").unwrap(), 1.0));
        assert!(close(length_in_inches("25.4 MM").unwrap(), 1.0));
        assert!(close(length_in_inches("96px").unwrap(), 1.0));
        assert!(close(length_in_inches("48").unwrap(), 0.5));
        assert!(close(length_in_inches(".25in").unwrap(), 0.25));
    }

    #[test]
    fn bad_lengths_are_rejected() {
        assert!(length_in_inches("").is_none());
        assert!(length_in_inches("-1in").is_none());
        assert!(length_in_inches("1ft").is_none());
        assert!(length_in_inches("one inch").is_none());
    }

    #[test]
    fn paper_tokens_are_case_insensitive() {
        assert_eq!(paper_size("Letter"), Some((8.5, 11.0)));
        assert_eq!(paper_size("a4"), paper_size("A4"));
        assert!(paper_size("B5").is_none());
    }

    #[test]
    fn parse_reports_the_offending_setting() {
        let err = PageLayout::parse("A4", "1in", "wide").unwrap_err();
        match err {
            GenerateError::InvalidSetting { key, value } => {
                assert_eq!(key, "BottomMargin");
                assert_eq!(value, "wide");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn margins_must_leave_room() {
        assert!(PageLayout::parse("A6", "3in", "3in").is_err());
        let layout = PageLayout::parse("Letter", "1in", "0.5in").unwrap();
        assert!(close(layout.margin_top, 1.0));
        assert!(close(layout.paper_height, 11.0));
    }
}
