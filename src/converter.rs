//! Conversion of query string tokens into typed [`Value`]s.
//!
//! A token is either untyped (`jack`, `30`, `2015-01-01`), in which case the
//! auto converter guesses the best type, or carries an explicit tag
//! (`number:30`, `date:2015-01-01`, `re:^ja.*`) selecting a registered
//! converter. The registry is fixed at construction time and safe to share
//! across threads.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::decoder::{self, DecodeError};
use crate::value::{Number, RegexValue, Value};

/// A failed typed conversion.
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid epoch millisecond timestamp")]
    InvalidEpoch(String),

    #[error("'{0}' is not a valid ISO 8601 date or date-time")]
    InvalidDate(String),

    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A converter function from decoded text to a value.
pub type ConvertFn = Arc<dyn Fn(&str) -> Result<Value, ConvertError> + Send + Sync>;

/// Registry of typed converters plus a default for untyped tokens.
///
/// The default registry maps `number`, `epoch`, `date`, `boolean`, `string`,
/// `re` (case-insensitive regex) and `RE` (case-sensitive regex); untyped
/// tokens go through [`auto_convert`]. The registry is immutable once built.
#[derive(Clone)]
pub struct Converter {
    converters: HashMap<String, ConvertFn>,
    default: ConvertFn,
}

impl Converter {
    /// The default registry with the auto converter as fallback.
    pub fn new() -> Self {
        Converter {
            converters: default_converters(),
            default: Arc::new(auto_convert),
        }
    }

    /// Default registry extended (or overridden) with extra tagged converters.
    pub fn with_converters(extra: HashMap<String, ConvertFn>) -> Self {
        let mut converters = default_converters();
        converters.extend(extra);
        Converter {
            converters,
            default: Arc::new(auto_convert),
        }
    }

    /// Default registry with a custom converter for untyped tokens.
    pub fn with_default_converter(default: ConvertFn) -> Self {
        Converter {
            converters: default_converters(),
            default,
        }
    }

    /// Converts a raw (still percent-encoded) token.
    ///
    /// The part before the first `:` selects a typed converter; literal
    /// colons in values must be percent-encoded. A prefix that names no
    /// registered converter is not an error: the colon may be payload, so
    /// the whole token is decoded and handed to the default converter.
    pub fn convert(&self, token: &str) -> Result<Value, ConvertError> {
        if let Some((tag, rest)) = token.split_once(':') {
            if let Some(converter) = self.converters.get(tag) {
                let decoded = decoder::decode(rest)?;
                return converter(&decoded);
            }
        }
        let decoded = decoder::decode(token)?;
        (self.default)(&decoded)
    }

    /// Converts already-decoded text through the converter for `tag`.
    ///
    /// An unregistered tag falls back to the default converter over the
    /// reassembled `tag:text`, preserving the colon as payload.
    pub fn convert_typed(&self, tag: &str, text: &str) -> Result<Value, ConvertError> {
        match self.converters.get(tag) {
            Some(converter) => converter(text),
            None => (self.default)(&format!("{}:{}", tag, text)),
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Converter::new()
    }
}

fn default_converters() -> HashMap<String, ConvertFn> {
    let mut map: HashMap<String, ConvertFn> = HashMap::new();
    map.insert("number".to_string(), Arc::new(convert_number));
    map.insert("epoch".to_string(), Arc::new(convert_epoch));
    map.insert("date".to_string(), Arc::new(convert_date));
    map.insert("boolean".to_string(), Arc::new(convert_boolean));
    map.insert("string".to_string(), Arc::new(convert_string));
    map.insert("re".to_string(), Arc::new(|text: &str| convert_regex(text, true)));
    map.insert("RE".to_string(), Arc::new(|text: &str| convert_regex(text, false)));
    map
}

// ISO 8601 with at least year-month-day; time, fraction and zone optional
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{4}-(1[0-2]|0[1-9])-(3[01]|0[1-9]|[12][0-9])(T(2[0-3]|[01][0-9])(:[0-5][0-9])?(:[0-5][0-9])?(\.[0-9][0-9]?[0-9]?)?(Z|[+-](?:2[0-3]|[01][0-9])(?::?(?:[0-5][0-9]))?)?)?$",
    )
    .expect("date detection pattern")
});

/// Best-effort conversion for untyped tokens.
///
/// Tries, in order: the fixed literal table (`true`, `false`, `null`,
/// `Infinity`, `-Infinity`), the numeric literal grammar, and ISO 8601
/// date shapes. Anything unrecognized comes back as plain text, so this
/// never fails on its own; only a decode failure upstream can.
pub fn auto_convert(text: &str) -> Result<Value, ConvertError> {
    match text {
        "true" => return Ok(Value::Boolean(true)),
        "false" => return Ok(Value::Boolean(false)),
        "null" => return Ok(Value::Null),
        "Infinity" => return Ok(Value::Number(Number::Float(f64::INFINITY))),
        "-Infinity" => return Ok(Value::Number(Number::Float(f64::NEG_INFINITY))),
        _ => {}
    }

    if let Ok(number) = parse_number(text) {
        return Ok(Value::Number(number));
    }

    if DATE_PATTERN.is_match(text) {
        if let Ok(value) = convert_date(text) {
            return Ok(value);
        }
    }

    Ok(Value::String(text.to_string()))
}

/// Parses the RQL numeric literal grammar.
///
/// `0x`/`0X` prefixes are hexadecimal, a leading zero followed by further
/// digits is octal, anything with a decimal point or exponent is a float,
/// and the rest are decimal integers. Values outside the `i64`/`f64`
/// ranges fall back to an exact decimal.
pub fn parse_number(text: &str) -> Result<Number, ConvertError> {
    let invalid = || ConvertError::InvalidNumber(text.to_string());

    let (negative, magnitude) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if magnitude.is_empty() {
        return Err(invalid());
    }

    if let Some(hex) = magnitude
        .strip_prefix("0x")
        .or_else(|| magnitude.strip_prefix("0X"))
    {
        if let Ok(value) = i64::from_str_radix(hex, 16) {
            return Ok(Number::Integer(if negative { -value } else { value }));
        }
        let wide = i128::from_str_radix(hex, 16).map_err(|_| invalid())?;
        let wide = if negative { -wide } else { wide };
        return Decimal::try_from_i128_with_scale(wide, 0)
            .map(Number::Decimal)
            .map_err(|_| invalid());
    }

    if magnitude.contains(['.', 'e', 'E']) {
        if let Ok(value) = text.parse::<f64>() {
            if value.is_finite() {
                return Ok(Number::Float(value));
            }
        }
        return Decimal::from_scientific(text)
            .or_else(|_| text.parse::<Decimal>())
            .map(Number::Decimal)
            .map_err(|_| invalid());
    }

    if magnitude.len() > 1 && magnitude.starts_with('0') {
        let value = i64::from_str_radix(magnitude, 8).map_err(|_| invalid())?;
        return Ok(Number::Integer(if negative { -value } else { value }));
    }

    if let Ok(value) = text.parse::<i64>() {
        return Ok(Number::Integer(value));
    }
    text.parse::<Decimal>()
        .map(Number::Decimal)
        .map_err(|_| invalid())
}

fn convert_number(text: &str) -> Result<Value, ConvertError> {
    parse_number(text).map(Value::Number)
}

fn convert_epoch(text: &str) -> Result<Value, ConvertError> {
    let millis = text
        .parse::<i64>()
        .map_err(|_| ConvertError::InvalidEpoch(text.to_string()))?;
    DateTime::from_timestamp_millis(millis)
        .map(Value::Instant)
        .ok_or_else(|| ConvertError::InvalidEpoch(text.to_string()))
}

/// Tries zoned date-time, then local date-time, then local date.
fn convert_date(text: &str) -> Result<Value, ConvertError> {
    if let Some(zoned) = parse_zoned(text) {
        return Ok(Value::DateTimeTz(zoned));
    }
    if let Some(local) = parse_local_date_time(text) {
        return Ok(Value::DateTime(local));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|_| ConvertError::InvalidDate(text.to_string()))
}

fn parse_zoned(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%#z"))
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%#z"))
        .ok()
}

fn parse_local_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Case-insensitive `"true"` is true, anything else is false. Lenient on
/// purpose: `boolean:1` and `boolean:yes` are both false.
fn convert_boolean(text: &str) -> Result<Value, ConvertError> {
    Ok(Value::Boolean(text.eq_ignore_ascii_case("true")))
}

fn convert_string(text: &str) -> Result<Value, ConvertError> {
    Ok(Value::String(text.to_string()))
}

fn convert_regex(text: &str, case_insensitive: bool) -> Result<Value, ConvertError> {
    RegexValue::new(text, case_insensitive)
        .map(Value::Regex)
        .map_err(|source| ConvertError::InvalidRegex {
            pattern: text.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};

    use super::*;

    fn convert(token: &str) -> Value {
        Converter::new().convert(token).unwrap()
    }

    fn number(token: &str) -> Number {
        match convert(token) {
            Value::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn literal_table() {
        assert_eq!(convert("true"), Value::Boolean(true));
        assert_eq!(convert("false"), Value::Boolean(false));
        assert_eq!(convert("null"), Value::Null);
        assert_eq!(convert("Infinity"), Value::Number(Number::Float(f64::INFINITY)));
        assert_eq!(
            convert("-Infinity"),
            Value::Number(Number::Float(f64::NEG_INFINITY))
        );
    }

    #[test]
    fn octal_hex_and_decimal() {
        assert_eq!(number("number:030"), Number::Integer(24));
        assert_eq!(number("number:30"), Number::Integer(30));
        assert_eq!(number("number:0x30"), Number::Integer(48));
        assert_eq!(number("number:0.1"), Number::Float(0.1));
        assert_eq!(number("number:-030"), Number::Integer(-24));
        assert_eq!(number("number:1e3"), Number::Float(1000.0));
    }

    #[test]
    fn auto_numbers_use_the_same_grammar() {
        assert_eq!(number("030"), Number::Integer(24));
        assert_eq!(number("0x30"), Number::Integer(48));
        assert_eq!(number("30"), Number::Integer(30));
    }

    #[test]
    fn out_of_range_integers_become_decimals() {
        assert_eq!(
            number("92233720368547758080"),
            Number::Decimal("92233720368547758080".parse().unwrap())
        );
    }

    #[test]
    fn invalid_explicit_numbers_fail() {
        assert!(Converter::new().convert("number:abc").is_err());
        assert!(Converter::new().convert("number:09").is_err());
        assert!(Converter::new().convert("number:").is_err());
    }

    #[test]
    fn invalid_octal_is_not_a_number_for_auto() {
        // "09" has a non-octal digit after the leading zero, so the auto
        // converter leaves it as text instead of failing
        assert_eq!(convert("09"), Value::String("09".to_string()));
    }

    #[test]
    fn auto_date_fallback_chain() {
        assert_eq!(
            convert("2015-01-01"),
            Value::Date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap())
        );
        assert_eq!(
            convert("2015-01-01T00:00:00"),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2015, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            convert("2015-01-01T00:00:00Z"),
            Value::DateTimeTz(utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn explicit_dates_accept_bare_hour_offsets() {
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        let expected = Value::DateTimeTz(plus_ten.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(convert("date:2015-01-01T00:00:00+10"), expected);
        assert_eq!(convert("date:2015-01-01T00:00:00+10:00"), expected);
        assert_eq!(convert("date:2015-01-01T00:00:00.000+10:00"), expected);
    }

    #[test]
    fn unparseable_date_shapes_fall_back_to_text() {
        // matches the date pattern but is not a real calendar date
        assert_eq!(convert("2015-02-30"), Value::String("2015-02-30".to_string()));
    }

    #[test]
    fn epoch_milliseconds() {
        assert_eq!(
            convert("epoch:1420117993131"),
            Value::Instant(DateTime::from_timestamp_millis(1420117993131).unwrap())
        );
        assert!(Converter::new().convert("epoch:notanumber").is_err());
    }

    #[test]
    fn boolean_is_lenient() {
        assert_eq!(convert("boolean:true"), Value::Boolean(true));
        assert_eq!(convert("boolean:TRUE"), Value::Boolean(true));
        assert_eq!(convert("boolean:tRue"), Value::Boolean(true));
        assert_eq!(convert("boolean:false"), Value::Boolean(false));
        assert_eq!(convert("boolean:0"), Value::Boolean(false));
        assert_eq!(convert("boolean:1"), Value::Boolean(false));
        assert_eq!(convert("boolean:yes"), Value::Boolean(false));
    }

    #[test]
    fn string_is_identity() {
        assert_eq!(convert("string:jack"), Value::String("jack".to_string()));
        assert_eq!(convert("string:30"), Value::String("30".to_string()));
        assert_eq!(convert("string:"), Value::String(String::new()));
    }

    #[test]
    fn regex_tags_control_case_sensitivity() {
        let insensitive = convert("re:^.*abc$");
        assert_eq!(
            insensitive,
            Value::Regex(RegexValue::new("^.*abc$", true).unwrap())
        );
        let sensitive = convert("RE:%5e.*abc$");
        assert_eq!(
            sensitive,
            Value::Regex(RegexValue::new("^.*abc$", false).unwrap())
        );
        assert!(Converter::new().convert("re:[unclosed").is_err());
    }

    #[test]
    fn unknown_tag_keeps_the_colon_as_payload() {
        assert_eq!(
            convert("weird:thing"),
            Value::String("weird:thing".to_string())
        );
        assert_eq!(
            Converter::new().convert_typed("weird", "thing").unwrap(),
            Value::String("weird:thing".to_string())
        );
    }

    #[test]
    fn values_are_decoded_before_conversion() {
        assert_eq!(convert("%2B30"), Value::Number(Number::Integer(30)));
        assert_eq!(convert("a%20b"), Value::String("a b".to_string()));
    }
}
