//! Value codec: the single source of truth for how each scalar is written
//! on the wire, in filter segments and in request bodies alike, and how
//! JSON read back from the remote API becomes a `Value` again.

use crate::{
    error::{ErrorOrigin, InternalError},
    model::FieldKind,
    value::Value,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value as JsonValue};
use std::str::FromStr;
use thiserror::Error as ThisError;
use uuid::Uuid;

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    #[error("expected {expected}, found JSON {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    #[error("{value} is out of range for {kind}")]
    OutOfRange { kind: String, value: String },

    #[error("cannot parse '{value}' as {kind}: {reason}")]
    Parse {
        kind: String,
        value: String,
        reason: String,
    },
}

impl From<CodecError> for InternalError {
    fn from(err: CodecError) -> Self {
        Self::decode(ErrorOrigin::Codec, err.to_string())
    }
}

///
/// ENCODING
///

/// Canonical text of a value as it appears after `op.` in a filter.
#[must_use]
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Blob(bytes) => BASE64.encode(bytes),
        Value::Bool(v) => v.to_string(),
        Value::Date(v) => v.format("%Y-%m-%d").to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Float32(v) => format_float(widen(*v)),
        Value::Float64(v) => format_float(*v),
        Value::Int(v) => v.to_string(),
        Value::Json(v) => v.to_string(),
        Value::List(_) => format_list(value),
        Value::Null => "null".to_string(),
        Value::Text(v) => v.clone(),
        Value::Time(v) => v.format("%H:%M:%S%.f").to_string(),
        Value::Timestamp(v) => v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::TimestampLocal(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        Value::Uint(v) => v.to_string(),
        Value::Uuid(v) => v.hyphenated().to_string(),
    }
}

/// Parenthesized, comma-joined list as used by `in` filters.
/// A non-list value renders as a one-item list.
#[must_use]
pub fn format_list(value: &Value) -> String {
    let items = match value {
        Value::List(items) => items.iter().map(format_item).collect::<Vec<_>>(),
        other => vec![format_item(other)],
    };

    format!("({})", items.join(","))
}

/// Value text inside a delimited context (`in` lists, `or` groups).
/// Items that would collide with the delimiters are double-quoted.
#[must_use]
pub fn format_item(value: &Value) -> String {
    let text = format_value(value);
    if !needs_quoting(&text) {
        return text;
    }

    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');

    quoted
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, ',' | '.' | ':' | '(' | ')' | '"' | '\\'))
}

// Widen through the shortest f32 text so 0.1f32 stays 0.1.
fn widen(v: f32) -> f64 {
    v.to_string().parse().unwrap_or_else(|_| f64::from(v))
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        v.to_string()
    }
}

/// JSON form of a value inside a request body.
///
/// Types without a native JSON form use the same canonical string
/// `format_value` produces, so a value reads identically in both places.
#[must_use]
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::Float32(v) => float_to_json(widen(*v)),
        Value::Float64(v) => float_to_json(*v),
        Value::Int(v) => JsonValue::from(*v),
        Value::Json(v) => v.clone(),
        Value::List(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Null => JsonValue::Null,
        Value::Text(v) => JsonValue::String(v.clone()),
        Value::Uint(v) => JsonValue::from(*v),
        Value::Blob(_)
        | Value::Date(_)
        | Value::Decimal(_)
        | Value::Time(_)
        | Value::Timestamp(_)
        | Value::TimestampLocal(_)
        | Value::Uuid(_) => JsonValue::String(format_value(value)),
    }
}

fn float_to_json(v: f64) -> JsonValue {
    Number::from_f64(v).map_or_else(|| JsonValue::String(format_float(v)), JsonValue::Number)
}

///
/// DECODING
///

/// Decode one JSON value by the declared field kind.
/// JSON `null` decodes to `Value::Null` for every kind.
pub fn from_json(json: &JsonValue, kind: &FieldKind) -> Result<Value, CodecError> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        FieldKind::Blob => {
            let text = expect_str(json, kind)?;
            BASE64
                .decode(text)
                .map(Value::Blob)
                .map_err(|err| parse_error(kind, text, err))
        }
        FieldKind::Bool => json
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(kind, json)),
        FieldKind::Date => parse_text::<NaiveDate>(json, kind).map(Value::Date),
        FieldKind::Decimal => decode_decimal(json, kind).map(Value::Decimal),
        FieldKind::Float32 => {
            #[allow(clippy::cast_possible_truncation)]
            let narrowed = decode_float(json, kind)? as f32;
            Ok(Value::Float32(narrowed))
        }
        FieldKind::Float64 => decode_float(json, kind).map(Value::Float64),
        FieldKind::Int16 => decode_int(json, kind, i64::from(i16::MIN), i64::from(i16::MAX)),
        FieldKind::Int32 => decode_int(json, kind, i64::from(i32::MIN), i64::from(i32::MAX)),
        FieldKind::Int64 => decode_int(json, kind, i64::MIN, i64::MAX),
        FieldKind::Json | FieldKind::Other(_) => Ok(Value::Json(json.clone())),
        FieldKind::Text => expect_str(json, kind).map(|s| Value::Text(s.to_string())),
        FieldKind::Time => parse_text::<NaiveTime>(json, kind).map(Value::Time),
        FieldKind::Timestamp => decode_timestamp(json, kind).map(Value::Timestamp),
        FieldKind::TimestampLocal => {
            parse_text::<NaiveDateTime>(json, kind).map(Value::TimestampLocal)
        }
        FieldKind::Uuid => {
            let text = expect_str(json, kind)?;
            Uuid::parse_str(text)
                .map(Value::Uuid)
                .map_err(|err| parse_error(kind, text, err))
        }
        FieldKind::List(inner) => {
            let JsonValue::Array(items) = json else {
                return Err(mismatch(kind, json));
            };
            items
                .iter()
                .map(|item| from_json(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
    }
}

fn decode_int(json: &JsonValue, kind: &FieldKind, min: i64, max: i64) -> Result<Value, CodecError> {
    let JsonValue::Number(number) = json else {
        return Err(mismatch(kind, json));
    };
    let Some(v) = number.as_i64() else {
        return Err(CodecError::OutOfRange {
            kind: kind.label().to_string(),
            value: number.to_string(),
        });
    };
    if v < min || v > max {
        return Err(CodecError::OutOfRange {
            kind: kind.label().to_string(),
            value: v.to_string(),
        });
    }

    Ok(Value::Int(v))
}

fn decode_float(json: &JsonValue, kind: &FieldKind) -> Result<f64, CodecError> {
    match json {
        JsonValue::Number(number) => number.as_f64().ok_or_else(|| mismatch(kind, json)),
        JsonValue::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => text
                .parse::<f64>()
                .map_err(|err| parse_error(kind, text, err)),
        },
        _ => Err(mismatch(kind, json)),
    }
}

fn decode_decimal(json: &JsonValue, kind: &FieldKind) -> Result<Decimal, CodecError> {
    let text = match json {
        JsonValue::Number(number) => number.to_string(),
        JsonValue::String(text) => text.clone(),
        _ => return Err(mismatch(kind, json)),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|err| parse_error(kind, &text, err))
}

fn decode_timestamp(json: &JsonValue, kind: &FieldKind) -> Result<DateTime<Utc>, CodecError> {
    let text = expect_str(json, kind)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    // offset-less timestamps are taken to be UTC
    text.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|err| parse_error(kind, text, err))
}

fn parse_text<T>(json: &JsonValue, kind: &FieldKind) -> Result<T, CodecError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = expect_str(json, kind)?;
    text.parse::<T>().map_err(|err| parse_error(kind, text, err))
}

fn expect_str<'a>(json: &'a JsonValue, kind: &FieldKind) -> Result<&'a str, CodecError> {
    json.as_str().ok_or_else(|| mismatch(kind, json))
}

fn mismatch(kind: &FieldKind, json: &JsonValue) -> CodecError {
    CodecError::TypeMismatch {
        expected: kind.label().to_string(),
        found: json_type(json),
    }
}

fn parse_error(kind: &FieldKind, text: &str, err: impl std::fmt::Display) -> CodecError {
    CodecError::Parse {
        kind: kind.label().to_string(),
        value: text.to_string(),
        reason: err.to_string(),
    }
}

const fn json_type(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
