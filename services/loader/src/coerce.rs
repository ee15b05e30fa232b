//! Loose JSON scalar coercion.
//!
//! Every function here takes the raw value as found in a record (possibly
//! absent) and returns `None` instead of failing: absent, JSON `null`, the
//! empty string and the literal string `"null"` all coerce to `None`.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Case-insensitive tokens read as `true`. Any other string is `false`.
const TRUTHY: &[&str] = &["true", "t", "1", "yes", "sim", "verdadeiro"];

/// Tried in order; the first one that parses wins.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];
const DATE_FORMAT: &str = "%Y-%m-%d";

fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() || s == "null" => None,
        Some(v) => Some(v),
    }
}

pub fn int_or_none(value: Option<&Value>) -> Option<i64> {
    match present(value)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn float_or_none(value: Option<&Value>) -> Option<f64> {
    match present(value)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub fn bool_or_none(value: Option<&Value>) -> Option<bool> {
    match present(value)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let lowered = s.to_lowercase();
            Some(TRUTHY.contains(&lowered.as_str()))
        }
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

pub fn timestamp_or_none(value: Option<&Value>) -> Option<NaiveDateTime> {
    let Value::String(s) = present(value)? else {
        return None;
    };
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Strings pass through untouched (including `""`), numbers and booleans are
/// rendered as text, anything else is `None`.
pub fn text_or_none(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    fn nulls() -> Vec<Option<Value>> {
        vec![None, Some(Value::Null), Some(json!("")), Some(json!("null"))]
    }

    // -------------------------------------------------------------------------
    // NULL MARKERS
    // -------------------------------------------------------------------------

    #[test]
    fn test_null_markers_yield_none_everywhere() {
        for v in nulls() {
            assert_eq!(int_or_none(v.as_ref()), None);
            assert_eq!(float_or_none(v.as_ref()), None);
            assert_eq!(bool_or_none(v.as_ref()), None);
            assert_eq!(timestamp_or_none(v.as_ref()), None);
        }
    }

    // -------------------------------------------------------------------------
    // INTEGER
    // -------------------------------------------------------------------------

    #[test]
    fn test_int_canonical_passes_through() {
        assert_eq!(int_or_none(Some(&json!(7107))), Some(7107));
        assert_eq!(int_or_none(Some(&json!(-3))), Some(-3));
    }

    #[test]
    fn test_int_from_string() {
        assert_eq!(int_or_none(Some(&json!("42"))), Some(42));
        assert_eq!(int_or_none(Some(&json!(" 42 "))), Some(42));
    }

    #[test]
    fn test_int_unparsable_is_none() {
        assert_eq!(int_or_none(Some(&json!("abc"))), None);
        assert_eq!(int_or_none(Some(&json!("4.2"))), None);
        assert_eq!(int_or_none(Some(&json!({"a": 1}))), None);
        assert_eq!(int_or_none(Some(&json!([1]))), None);
    }

    #[test]
    fn test_int_from_float_truncates() {
        assert_eq!(int_or_none(Some(&json!(3.9))), Some(3));
    }

    // -------------------------------------------------------------------------
    // FLOAT
    // -------------------------------------------------------------------------

    #[test]
    fn test_float_coercion() {
        assert_eq!(float_or_none(Some(&json!(1.5))), Some(1.5));
        assert_eq!(float_or_none(Some(&json!(2))), Some(2.0));
        assert_eq!(float_or_none(Some(&json!("-23.31"))), Some(-23.31));
        assert_eq!(float_or_none(Some(&json!("x1"))), None);
    }

    // -------------------------------------------------------------------------
    // BOOLEAN
    // -------------------------------------------------------------------------

    #[test]
    fn test_bool_native_passes_through() {
        assert_eq!(bool_or_none(Some(&json!(true))), Some(true));
        assert_eq!(bool_or_none(Some(&json!(false))), Some(false));
    }

    #[test]
    fn test_bool_truthy_tokens_case_insensitive() {
        for token in ["true", "T", "1", "YES", "Sim", "verdadeiro"] {
            assert_eq!(bool_or_none(Some(&json!(token))), Some(true), "{token}");
        }
    }

    #[test]
    fn test_bool_other_strings_are_false() {
        assert_eq!(bool_or_none(Some(&json!("nao"))), Some(false));
        assert_eq!(bool_or_none(Some(&json!("false"))), Some(false));
    }

    #[test]
    fn test_bool_numbers_and_containers() {
        assert_eq!(bool_or_none(Some(&json!(0))), Some(false));
        assert_eq!(bool_or_none(Some(&json!(2))), Some(true));
        assert_eq!(bool_or_none(Some(&json!({"x": 1}))), None);
    }

    // -------------------------------------------------------------------------
    // TIMESTAMP
    // -------------------------------------------------------------------------

    #[test]
    fn test_timestamp_date_only() {
        let ts = timestamp_or_none(Some(&json!("2021-03-04"))).unwrap();
        assert_eq!(ts.to_string(), "2021-03-04 00:00:00");
    }

    #[test]
    fn test_timestamp_iso_with_and_without_fraction() {
        let a = timestamp_or_none(Some(&json!("2021-03-04T10:11:12.345"))).unwrap();
        assert_eq!(a.nanosecond(), 345_000_000);
        let b = timestamp_or_none(Some(&json!("2021-03-04T10:11:12"))).unwrap();
        assert_eq!(b.to_string(), "2021-03-04 10:11:12");
    }

    #[test]
    fn test_timestamp_space_separated() {
        let ts = timestamp_or_none(Some(&json!("2021-03-04 10:11:12.5"))).unwrap();
        assert_eq!(ts.second(), 12);
        assert!(timestamp_or_none(Some(&json!("2021-03-04 10:11:12"))).is_some());
    }

    #[test]
    fn test_timestamp_unknown_format_is_none() {
        assert_eq!(timestamp_or_none(Some(&json!("04/03/2021"))), None);
        assert_eq!(timestamp_or_none(Some(&json!(20210304))), None);
    }

    // -------------------------------------------------------------------------
    // TEXT
    // -------------------------------------------------------------------------

    #[test]
    fn test_text_coercion() {
        assert_eq!(text_or_none(Some(&json!("Centro"))), Some("Centro".into()));
        assert_eq!(text_or_none(Some(&json!(""))), Some(String::new()));
        assert_eq!(text_or_none(Some(&json!(123))), Some("123".into()));
        assert_eq!(text_or_none(Some(&Value::Null)), None);
        assert_eq!(text_or_none(Some(&json!({"a": 1}))), None);
        assert_eq!(text_or_none(None), None);
    }
}
