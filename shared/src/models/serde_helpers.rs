//! Lenient deserializers for form-shaped payloads
//!
//! Multipart forms and query strings deliver every value as a string while
//! JSON clients send real numbers and booleans. These helpers accept both and
//! treat empty strings as "not provided".

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn loose_to_f64<E: serde::de::Error>(value: Loose) -> Result<Option<f64>, E> {
    match value {
        Loose::Int(v) => Ok(Some(v as f64)),
        Loose::Float(v) => Ok(Some(v)),
        Loose::Str(s) => match non_empty(&s) {
            None => Ok(None),
            Some(t) => t
                .parse()
                .map(Some)
                .map_err(|_| E::custom(format!("expected a number, got '{s}'"))),
        },
        Loose::Bool(_) => Err(E::custom("expected a number, got a boolean")),
    }
}

fn loose_to_i64<E: serde::de::Error>(value: Loose) -> Result<Option<i64>, E> {
    match value {
        Loose::Int(v) => Ok(Some(v)),
        Loose::Float(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
        Loose::Float(v) => Err(E::custom(format!("expected an integer, got {v}"))),
        Loose::Str(s) => match non_empty(&s) {
            None => Ok(None),
            Some(t) => t
                .parse()
                .map(Some)
                .map_err(|_| E::custom(format!("expected an integer, got '{s}'"))),
        },
        Loose::Bool(_) => Err(E::custom("expected an integer, got a boolean")),
    }
}

/// Required number; accepts `12`, `12.5` and `"12.5"`
pub fn f64_from_any<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    loose_to_f64(Loose::deserialize(deserializer)?)?
        .ok_or_else(|| D::Error::custom("expected a number, got an empty string"))
}

/// Optional number; null, missing and `""` are `None`
pub fn option_f64_from_any<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Loose>::deserialize(deserializer)? {
        Some(v) => loose_to_f64(v),
        None => Ok(None),
    }
}

/// Optional integer; null, missing and `""` are `None`
pub fn option_i64_from_any<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Loose>::deserialize(deserializer)? {
        Some(v) => loose_to_i64(v),
        None => Ok(None),
    }
}

/// Checkbox-style boolean: `true`, non-zero numbers, `"true"`, `"1"`, `"on"`, `"yes"`.
/// Everything else (including null) is `false`.
pub fn bool_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Bool(b)) => b,
        Some(Loose::Int(n)) => n != 0,
        Some(Loose::Float(n)) => n != 0.0,
        Some(Loose::Str(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        ),
        None => false,
    })
}

/// Optional `FromStr` value where `""` means "not provided"
pub fn option_from_str<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => match non_empty(&s) {
            Some(t) => t.parse().map(Some).map_err(D::Error::custom),
            None => Ok(None),
        },
        None => Ok(None),
    }
}
