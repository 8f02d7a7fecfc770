use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// A converted RQL value.
///
/// Every literal in a query string is turned into one of these variants by
/// the converter subsystem, either automatically or through an explicit
/// `type:` tag. Values are immutable once constructed and form the leaves
/// of the parsed [`Node`](crate::node::Node) tree.
///
/// # Examples
///
/// ```
/// use rql::Value;
///
/// let null = Value::Null;
/// let boolean = Value::Boolean(true);
/// let text = Value::String("jack".to_string());
/// let list = Value::Array(vec![Value::String("a".into()), Value::String("b".into())]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The `null` literal
    Null,

    /// `true` or `false`
    Boolean(bool),

    /// Any numeric value (integer, float or arbitrary-precision decimal)
    Number(Number),

    /// Plain UTF-8 text
    String(String),

    /// Calendar date without a time (`2015-01-01`)
    Date(NaiveDate),

    /// Local date-time without a zone (`2015-01-01T15:13:54`)
    DateTime(NaiveDateTime),

    /// Date-time with a UTC offset (`2015-01-01T15:13:54+10:00`)
    DateTimeTz(DateTime<FixedOffset>),

    /// A point on the UTC timeline, from `epoch:` millisecond timestamps
    Instant(DateTime<Utc>),

    /// Compiled regular expression from `re:` / `RE:` tags
    Regex(RegexValue),

    /// Ordered sequence of values, from bracketed comma lists
    Array(Vec<Value>),
}

/// A numeric value with the integer/float distinction preserved.
///
/// Integers that fit `i64` stay integers, anything written with a decimal
/// point or exponent becomes a float, and values outside both ranges fall
/// back to an exact [`Decimal`]. Equality and ordering are numeric across
/// variants, so `Integer(30)` equals `Float(30.0)`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
}

impl Number {
    /// Numeric value as an `f64`, possibly losing precision.
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Integer(n) => *n as f64,
            Number::Float(f) => *f,
            Number::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// Non-negative whole value, if this number is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::Integer(n) => u64::try_from(*n).ok(),
            Number::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64 => {
                Some(*f as u64)
            }
            Number::Float(_) => None,
            Number::Decimal(d) if d.is_integer() => d.to_u64(),
            Number::Decimal(_) => None,
        }
    }

    fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Number::Integer(n) => Some(Decimal::from(*n)),
            Number::Float(f) => Decimal::from_f64(*f),
            Number::Decimal(d) => Some(*d),
        }
    }

    fn numeric_cmp(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a.cmp(b),
            (Number::Decimal(a), Number::Decimal(b)) => a.cmp(b),
            (Number::Integer(a), Number::Decimal(b)) => Decimal::from(*a).cmp(b),
            (Number::Decimal(a), Number::Integer(b)) => a.cmp(&Decimal::from(*b)),
            // at least one float; compare exactly when it converts, as f64 otherwise
            (a, b) => match (a.to_decimal(), b.to_decimal()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.to_f64().total_cmp(&b.to_f64()),
            },
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.numeric_cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.numeric_cmp(other))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Float(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Number::Float(n) => write!(f, "{}", n),
            Number::Decimal(d) => write!(f, "{}", d),
        }
    }
}

/// A compiled regular expression value.
///
/// Keeps the source pattern and case flag alongside the compiled regex so
/// that values stay structurally comparable; two regex values are equal when
/// their pattern and case-sensitivity match.
#[derive(Debug, Clone)]
pub struct RegexValue {
    pattern: String,
    case_insensitive: bool,
    regex: Regex,
}

impl RegexValue {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(RegexValue {
            pattern: pattern.to_string(),
            case_insensitive,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.case_insensitive == other.case_insensitive
    }
}

impl Value {
    /// Borrow the text of a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Non-negative whole number, if this value is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// Default ordering over values.
///
/// `Null` sorts before any non-null value, values of the same variant
/// compare naturally, numbers compare numerically across their variants,
/// and anything else falls back to comparing display forms. The comparison
/// is total: it never fails, which keeps predicate and sort evaluation free
/// of per-item errors.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.numeric_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::DateTimeTz(x), Value::DateTimeTz(y)) => x.cmp(y),
        (Value::Instant(x), Value::Instant(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DateTimeTz(d) => f.write_str(&d.to_rfc3339()),
            Value::Instant(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Regex(r) => f.write_str(r.pattern()),
            Value::Array(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}
