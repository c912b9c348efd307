//! Cell-level parsing: observation dates and numeric coercion.
//!
//! Everything here is pure and row-local, so a bad cell never affects more
//! than its own row.

use chrono::{NaiveDate, NaiveDateTime};

use super::model::RawValue;

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse an observation date from a raw cell.
///
/// Native date cells are accepted as-is. Text is tried against each format in
/// order; a format without a day directive (`%Y-%m`, `%m/%Y`) resolves to the
/// first day of the month. Numbers are never interpreted as dates.
pub fn parse_date(raw: &RawValue, formats: &[String]) -> Option<NaiveDate> {
    match raw {
        RawValue::Date(d) => Some(*d),
        RawValue::Text(s) => {
            let s = s.trim();
            formats.iter().find_map(|fmt| parse_with_format(s, fmt))
        }
        RawValue::Number(_) | RawValue::Empty => None,
    }
}

/// Specifiers that carry a time of day (and a full date, for `%c` / `%+`).
const TIME_SPECIFIERS: [&str; 4] = ["%H", "%T", "%c", "%+"];

/// Specifiers that set the day, alone or as part of a composite date.
const DAY_SPECIFIERS: [&str; 7] = ["%d", "%e", "%j", "%F", "%D", "%x", "%v"];

fn parse_with_format(s: &str, fmt: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if TIME_SPECIFIERS.iter().any(|spec| fmt.contains(spec)) {
        return NaiveDateTime::parse_from_str(s, fmt).ok().map(|dt| dt.date());
    }
    if DAY_SPECIFIERS.iter().any(|spec| fmt.contains(spec)) {
        return NaiveDate::parse_from_str(s, fmt).ok();
    }
    NaiveDate::parse_from_str(&format!("{s} 01"), &format!("{fmt} %d")).ok()
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// How the text cells of a column are turned into floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericStyle {
    /// Standard `1234.5` notation.
    Plain,
    /// French notation: `1.234,5` or `1 234,5`.
    DecimalComma,
}

/// Parse a float written in standard notation. Non-finite results (`NaN`,
/// `inf`) are treated as unparseable.
pub fn parse_plain(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rewrite a French-formatted number into standard notation: thousands
/// separators (`.`, spaces, no-break spaces) are stripped first, then the
/// decimal comma becomes a decimal point.
pub fn normalize_decimal_comma(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    parse_plain(&normalize_decimal_comma(raw))
}

/// A column is already numeric when every non-empty text cell parses in
/// standard notation. Only columns that are not get the decimal-comma
/// treatment.
pub fn detect_style<'a>(
    cells: impl IntoIterator<Item = &'a RawValue>,
    decimal_comma: bool,
) -> NumericStyle {
    if !decimal_comma {
        return NumericStyle::Plain;
    }
    let already_numeric = cells.into_iter().all(|cell| match cell {
        RawValue::Text(s) => s.trim().is_empty() || parse_plain(s).is_some(),
        _ => true,
    });
    if already_numeric {
        NumericStyle::Plain
    } else {
        NumericStyle::DecimalComma
    }
}

/// Coerce a raw cell to a float. `Err(())` flags a non-empty cell that could
/// not be parsed; it still becomes a missing value.
pub(crate) fn coerce_numeric(raw: &RawValue, style: NumericStyle) -> Result<Option<f64>, ()> {
    match raw {
        RawValue::Empty => Ok(None),
        RawValue::Number(v) if v.is_finite() => Ok(Some(*v)),
        RawValue::Number(_) | RawValue::Date(_) => Err(()),
        RawValue::Text(s) if s.trim().is_empty() => Ok(None),
        RawValue::Text(s) => {
            let parsed = match style {
                NumericStyle::Plain => parse_plain(s),
                NumericStyle::DecimalComma => parse_decimal_comma(s),
            };
            parsed.map(Some).ok_or(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    fn formats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // -- dates --

    #[test]
    fn strict_day_month_year() {
        let f = formats(&["%d/%m/%Y"]);
        assert_eq!(parse_date(&text("31/01/2021"), &f), Some(d(2021, 1, 31)));
        assert_eq!(parse_date(&text(" 01/02/2021 "), &f), Some(d(2021, 2, 1)));
        assert_eq!(parse_date(&text("2021-01-31"), &f), None);
        assert_eq!(parse_date(&text("32/01/2021"), &f), None);
        assert_eq!(parse_date(&text(""), &f), None);
    }

    #[test]
    fn formats_are_tried_in_order() {
        let f = formats(&["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%Y-%m"]);
        assert_eq!(parse_date(&text("2020-05-17"), &f), Some(d(2020, 5, 17)));
        assert_eq!(parse_date(&text("2020-05-17 13:45:00"), &f), Some(d(2020, 5, 17)));
        assert_eq!(parse_date(&text("2020-05"), &f), Some(d(2020, 5, 1)));
        assert_eq!(parse_date(&text("Période"), &f), None);
    }

    #[test]
    fn composite_day_specifiers_are_not_given_a_second_day() {
        let parse = |s: &str, fmt: &str| parse_date(&text(s), &formats(&[fmt]));
        assert_eq!(parse("2021-03-04", "%F"), Some(d(2021, 3, 4)));
        assert_eq!(parse("03/04/21", "%D"), Some(d(2021, 3, 4)));
        assert_eq!(parse("03/04/21", "%x"), Some(d(2021, 3, 4)));
        assert_eq!(parse("14-Mar-2021", "%v"), Some(d(2021, 3, 14)));
        assert_eq!(parse("2021-03-04T10:00:00", "%FT%T"), Some(d(2021, 3, 4)));
    }

    #[test]
    fn month_year_without_day() {
        let f = formats(&["%m/%Y"]);
        assert_eq!(parse_date(&text("11/2019"), &f), Some(d(2019, 11, 1)));
    }

    #[test]
    fn native_dates_pass_and_numbers_do_not() {
        let f = formats(&["%Y-%m-%d"]);
        assert_eq!(parse_date(&RawValue::Date(d(2020, 1, 1)), &f), Some(d(2020, 1, 1)));
        assert_eq!(parse_date(&RawValue::Number(43831.0), &f), None);
        assert_eq!(parse_date(&RawValue::Empty, &f), None);
    }

    // -- decimal comma --

    #[test]
    fn normalize_strips_thousands_then_converts_comma() {
        assert_eq!(normalize_decimal_comma("1.234,5"), "1234.5");
        assert_eq!(normalize_decimal_comma("12.345.678,25"), "12345678.25");
        assert_eq!(normalize_decimal_comma("1 234,5"), "1234.5");
        assert_eq!(normalize_decimal_comma("1\u{a0}234,5"), "1234.5");
        assert_eq!(normalize_decimal_comma("1\u{202f}234"), "1234");
    }

    #[test]
    fn decimal_comma_empty_string() {
        assert_eq!(normalize_decimal_comma(""), "");
        assert_eq!(parse_decimal_comma(""), None);
        assert_eq!(parse_decimal_comma("   "), None);
    }

    #[test]
    fn decimal_comma_already_numeric_text() {
        assert_eq!(parse_decimal_comma("42"), Some(42.0));
        assert_eq!(parse_decimal_comma("0"), Some(0.0));
        // A lone dot is a thousands separator in this notation.
        assert_eq!(parse_decimal_comma("1.234"), Some(1234.0));
    }

    #[test]
    fn decimal_comma_negative_values() {
        assert_eq!(parse_decimal_comma("-1.234,5"), Some(-1234.5));
        assert_eq!(parse_decimal_comma("-0,25"), Some(-0.25));
        assert_eq!(parse_decimal_comma(" -12 "), Some(-12.0));
    }

    #[test]
    fn decimal_comma_trailing_and_leading_separators() {
        assert_eq!(parse_decimal_comma("12,"), Some(12.0));
        assert_eq!(parse_decimal_comma("1.234."), Some(1234.0));
        assert_eq!(parse_decimal_comma(",5"), Some(0.5));
        assert_eq!(parse_decimal_comma("1,2,3"), None);
        assert_eq!(parse_decimal_comma(","), None);
    }

    #[test]
    fn decimal_comma_garbage_and_non_finite() {
        assert_eq!(parse_decimal_comma("n/a"), None);
        assert_eq!(parse_decimal_comma("12abc"), None);
        assert_eq!(parse_decimal_comma("NaN"), None);
        assert_eq!(parse_decimal_comma("inf"), None);
    }

    // -- column style --

    #[test]
    fn numeric_columns_are_left_alone() {
        let cells = vec![text("12.5"), text("3"), RawValue::Empty, RawValue::Number(1.0)];
        assert_eq!(detect_style(&cells, true), NumericStyle::Plain);
        assert_eq!(coerce_numeric(&cells[0], NumericStyle::Plain), Ok(Some(12.5)));
    }

    #[test]
    fn text_columns_get_decimal_comma() {
        let cells = vec![text("1.234,5"), text("12")];
        assert_eq!(detect_style(&cells, true), NumericStyle::DecimalComma);
        assert_eq!(detect_style(&cells, false), NumericStyle::Plain);
        assert_eq!(coerce_numeric(&cells[0], NumericStyle::DecimalComma), Ok(Some(1234.5)));
    }

    #[test]
    fn coercion_flags_only_non_empty_failures() {
        assert_eq!(coerce_numeric(&RawValue::Empty, NumericStyle::Plain), Ok(None));
        assert_eq!(coerce_numeric(&text("  "), NumericStyle::Plain), Ok(None));
        assert_eq!(coerce_numeric(&text("abc"), NumericStyle::Plain), Err(()));
        assert_eq!(coerce_numeric(&RawValue::Number(f64::NAN), NumericStyle::Plain), Err(()));
        assert_eq!(coerce_numeric(&RawValue::Date(d(2020, 1, 1)), NumericStyle::Plain), Err(()));
    }
}
