//! Locale-aware numeric coercion
//!
//! The site writes numbers the Greek way: `.` groups thousands and `,` marks
//! the decimal point. Anything that does not coerce is `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.]*").unwrap());

/// `"12.345"` → `12345`. Both `.` and `,` are dropped before parsing.
pub fn parse_int(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| !matches!(c, '.' | ',')).collect();
    cleaned.parse().ok()
}

/// `"12.345,67"` → `12345.67`
pub fn parse_float(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace('.', "").replace(',', ".");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First digit run in free text, coerced with [`parse_int`] (`"1.250 €"` → `1250`)
pub fn first_int(text: &str) -> Option<i64> {
    FIRST_NUMBER.find(text).and_then(|m| parse_int(m.as_str()))
}

/// Integer view of a structured-data value; JSON numbers are truncated
#[allow(clippy::cast_possible_truncation)]
pub fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

/// Float view of a structured-data value
pub fn float_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("12.345", Some(12345))]
    #[case("150", Some(150))]
    #[case(" 1.598 ", Some(1598))]
    #[case("1,2", Some(12))]
    #[case("", None)]
    #[case("abc", None)]
    #[case("12 km", None)]
    fn int_coercion(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_int(raw), expected);
    }

    #[rstest]
    #[case("12.345,67", Some(12345.67))]
    #[case("85.000", Some(85000.0))]
    #[case("3,5", Some(3.5))]
    #[case("n/a", None)]
    #[case("", None)]
    fn float_coercion(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_float(raw), expected);
    }

    #[rstest]
    #[case("1.250 €", Some(1250))]
    #[case("Εμφανίσεις 3.412 φορές", Some(3412))]
    #[case("5", Some(5))]
    #[case("χωρίς", None)]
    fn first_run_in_text(#[case] text: &str, #[case] expected: Option<i64>) {
        assert_eq!(first_int(text), expected);
    }

    #[test]
    fn json_values_coerce_by_type() {
        assert_eq!(int_from_value(&json!(1598)), Some(1598));
        assert_eq!(int_from_value(&json!(12.9)), Some(12));
        assert_eq!(int_from_value(&json!("2.000")), Some(2000));
        assert_eq!(int_from_value(&json!(true)), None);
        assert_eq!(float_from_value(&json!(85000)), Some(85000.0));
        assert_eq!(float_from_value(&json!("85.000")), Some(85000.0));
        assert_eq!(float_from_value(&json!({"value": 1})), None);
    }

    proptest! {
        #[test]
        fn grouped_integers_round_trip(n in 0u32..100_000_000) {
            let digits = n.to_string();
            let mut grouped = String::new();
            for (i, c) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    grouped.push('.');
                }
                grouped.push(c);
            }
            prop_assert_eq!(parse_int(&grouped), Some(i64::from(n)));
            prop_assert_eq!(parse_float(&grouped), Some(f64::from(n)));
        }

        #[test]
        fn letters_never_coerce(s in "[a-zA-Zα-ω]{1,12}") {
            prop_assert_eq!(parse_int(&s), None);
        }
    }
}
