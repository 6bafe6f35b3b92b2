//! Paper formats and CSS length units.
//!
//! Shared by request validation (reject unknown names early) and by the
//! engine adapter (convert to the inches the DevTools protocol expects).

use crate::request::Dimension;

/// Pixels per inch in CSS.
const PX_PER_INCH: f64 = 96.0;

/// Known paper formats as `(name, width_in, height_in)`.
const PAPER_FORMATS: &[(&str, f64, f64)] = &[
    ("letter", 8.5, 11.0),
    ("legal", 8.5, 14.0),
    ("tabloid", 11.0, 17.0),
    ("ledger", 17.0, 11.0),
    ("a0", 33.1, 46.8),
    ("a1", 23.4, 33.1),
    ("a2", 16.54, 23.4),
    ("a3", 11.7, 16.54),
    ("a4", 8.27, 11.7),
    ("a5", 5.83, 8.27),
    ("a6", 4.13, 5.83),
];

/// Paper size in inches for a format name (case-insensitive).
pub fn paper_size(format: &str) -> Option<(f64, f64)> {
    let lower = format.to_ascii_lowercase();
    PAPER_FORMATS
        .iter()
        .find(|(name, _, _)| *name == lower)
        .map(|(_, w, h)| (*w, *h))
}

/// Names of every supported paper format, in display case.
pub fn paper_format_names() -> Vec<String> {
    PAPER_FORMATS
        .iter()
        .map(|(name, _, _)| {
            let mut chars = name.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

/// Convert a length to inches.
///
/// Bare numbers (and unitless strings) are pixels. Returns `None` for an
/// unknown unit or an unparseable number.
pub fn to_inches(dimension: &Dimension) -> Option<f64> {
    match dimension {
        Dimension::Number(px) => Some(px / PX_PER_INCH),
        Dimension::Text(text) => parse_length(text),
    }
}

fn parse_length(text: &str) -> Option<f64> {
    let text = text.trim();
    let (number, per_inch) = if text.len() >= 2 && text.is_char_boundary(text.len() - 2) {
        let (head, unit) = text.split_at(text.len() - 2);
        match unit.to_ascii_lowercase().as_str() {
            "px" => (head, PX_PER_INCH),
            "in" => (head, 1.0),
            "cm" => (head, 2.54),
            "mm" => (head, 25.4),
            _ => (text, PX_PER_INCH),
        }
    } else {
        (text, PX_PER_INCH)
    };
    let value: f64 = number.trim().parse().ok()?;
    value.is_finite().then_some(value / per_inch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn letter_is_default_size() {
        assert_eq!(paper_size("Letter"), Some((8.5, 11.0)));
    }

    #[test]
    fn formats_are_case_insensitive() {
        assert_eq!(paper_size("a4"), paper_size("A4"));
        assert!(paper_size("A7").is_none());
    }

    #[test]
    fn names_are_capitalized() {
        let names = paper_format_names();
        assert!(names.contains(&"Letter".to_string()));
        assert!(names.contains(&"A4".to_string()));
    }

    #[test]
    fn numbers_are_pixels() {
        assert!(close(to_inches(&Dimension::Number(96.0)).unwrap(), 1.0));
        assert!(close(to_inches(&Dimension::Text("48".into())).unwrap(), 0.5));
    }

    #[test]
    fn units_convert() {
        assert!(close(to_inches(&Dimension::Text("1in".into())).unwrap(), 1.0));
        assert!(close(to_inches(&Dimension::Text("2.54cm".into())).unwrap(), 1.0));
        assert!(close(to_inches(&Dimension::Text("25.4mm".into())).unwrap(), 1.0));
        assert!(close(to_inches(&Dimension::Text("192px".into())).unwrap(), 2.0));
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(to_inches(&Dimension::Text("3em".into())).is_none());
        assert!(to_inches(&Dimension::Text("wide".into())).is_none());
    }
}
