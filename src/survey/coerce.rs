//! Normalisation of raw table input. Never fails: anything unusable becomes `Empty`.

use crate::models::{CellValue, ReadingField};

/// Parses a number typed with either `.` or `,` as decimal separator.
pub fn parse_nullable_number(raw: &CellValue) -> Option<f64> {
    match raw {
        CellValue::Empty => None,
        CellValue::Number(n) => n.is_finite().then_some(*n),
        CellValue::Text(s) => parse_decimal(s),
    }
}

pub fn parse_nullable_text(raw: &CellValue) -> Option<String> {
    let text = raw.clone().into_text()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Text form of `parse_nullable_number`, shared with the validated entry points
/// (instrument height, scale bounds, drill-point fields).
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub fn coerce(field: ReadingField, raw: &CellValue) -> CellValue {
    if field.is_numeric() {
        parse_nullable_number(raw).into()
    } else {
        parse_nullable_text(raw).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_accept_comma_or_dot() {
        assert_eq!(parse_nullable_number(&"12,5".into()), Some(12.5));
        assert_eq!(parse_nullable_number(&" 12.5 ".into()), Some(12.5));
        assert_eq!(parse_nullable_number(&CellValue::Number(3.0)), Some(3.0));
    }

    #[test]
    fn test_unusable_numbers_become_empty() {
        assert_eq!(parse_nullable_number(&"".into()), None);
        assert_eq!(parse_nullable_number(&"   ".into()), None);
        assert_eq!(parse_nullable_number(&"abc".into()), None);
        assert_eq!(parse_nullable_number(&"inf".into()), None);
        assert_eq!(parse_nullable_number(&"NaN".into()), None);
        assert_eq!(parse_nullable_number(&CellValue::Number(f64::INFINITY)), None);
        assert_eq!(parse_nullable_number(&"1,2,3".into()), None);
    }

    #[test]
    fn test_text_is_trimmed_and_empty_is_null() {
        assert_eq!(parse_nullable_text(&"  V  ".into()).as_deref(), Some("V"));
        assert_eq!(parse_nullable_text(&"   ".into()), None);
        assert_eq!(parse_nullable_text(&CellValue::Number(4.0)).as_deref(), Some("4"));
    }

    #[test]
    fn test_coerce_dispatches_on_field_kind() {
        assert_eq!(
            coerce(ReadingField::Conductivity, &"12,5".into()),
            CellValue::Number(12.5)
        );
        assert_eq!(
            coerce(ReadingField::Range, &" 2 ".into()),
            CellValue::Text("2".into())
        );
        assert_eq!(coerce(ReadingField::GpsHdop, &"n/a".into()), CellValue::Empty);
    }
}
