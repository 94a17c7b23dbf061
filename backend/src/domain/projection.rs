//! Projections of operation inputs for log records and span attributes.
//!
//! Inputs are projected through `serde` rather than inspected field by field:
//! logs get a JSON object when the input serialises to one, spans get a flat
//! list of `label.field` attributes with optional size caps.

use std::fmt::Debug;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Number, Value};

use super::ports::SpanAttribute;

/// Most fields of one object, or elements of one array, kept when
/// truncating.
pub const MAX_ATTRIBUTE_FIELDS: usize = 20;

/// Longest byte string kept when truncating.
pub const MAX_BYTES_ATTRIBUTE_LEN: usize = 100;

/// Longest text value kept when truncating.
pub const MAX_TEXT_ATTRIBUTE_LEN: usize = 500;

const TRUNCATED_SUFFIX: &str = " ...truncated";

/// Key under which [`ByteString`] serialises its text.
const BYTES_KEY: &str = "$bytes";

/// Raw bytes projected as text.
///
/// Plain byte vectors serialise as integer arrays and are flattened element
/// by element; wrap a field in `ByteString` to have it rendered as lossy
/// UTF-8 and cut at [`MAX_BYTES_ATTRIBUTE_LEN`] bytes instead.
///
/// # Examples
/// ```
/// use disbursement::domain::ports::AttributeValue;
/// use disbursement::domain::projection::{ByteString, flatten_attributes};
///
/// let attributes = flatten_attributes("body", &ByteString(b"ok".to_vec()), true);
/// assert_eq!(attributes[0].value, AttributeValue::String("ok".to_owned()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteString(pub Vec<u8>);

impl Serialize for ByteString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(BYTES_KEY, &String::from_utf8_lossy(&self.0))?;
        map.end()
    }
}

/// JSON object projection of `value` for log records.
///
/// Values that do not serialise to an object fall back to their `Debug`
/// rendering. Whole-number floats are written as integers.
///
/// # Examples
/// ```
/// use disbursement::domain::projection::log_projection;
/// use serde_json::json;
///
/// #[derive(Debug, serde::Serialize)]
/// struct Pay { amount: f64 }
///
/// assert_eq!(log_projection(&Pay { amount: 1.5 }), json!({ "amount": 1.5 }));
/// assert_eq!(log_projection(&Pay { amount: 100.0 }).to_string(), r#"{"amount":100}"#);
/// assert_eq!(log_projection(&7_u8), json!("7"));
/// ```
pub fn log_projection<T>(value: &T) -> Value
where
    T: Serialize + Debug + ?Sized,
{
    match serde_json::to_value(value) {
        Ok(object @ Value::Object(_)) => integral_floats(object),
        _ => Value::String(format!("{value:?}")),
    }
}

fn integral_floats(value: Value) -> Value {
    match value {
        Value::Number(number) => Value::Number(as_integer(&number).unwrap_or(number)),
        Value::Array(items) => Value::Array(items.into_iter().map(integral_floats).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, item)| (key, integral_floats(item)))
                .collect(),
        ),
        other => other,
    }
}

fn as_integer(number: &Number) -> Option<Number> {
    if !number.is_f64() {
        return None;
    }
    let float = number.as_f64()?;
    if !float.is_finite() || float.fract() != 0.0 {
        return None;
    }
    // Display drops the fractional part of whole numbers; out-of-range
    // values fail to parse and stay floats.
    float.to_string().parse::<i64>().ok().map(Number::from)
}

/// Flatten `value` into span attributes keyed under `label`.
///
/// Keys are lower-cased. Null becomes the text `"null"`. With `truncate`
/// set, objects and arrays keep at most [`MAX_ATTRIBUTE_FIELDS`] entries
/// followed by a marker attribute, text is cut at
/// [`MAX_TEXT_ATTRIBUTE_LEN`] bytes, and [`ByteString`] values are cut at
/// [`MAX_BYTES_ATTRIBUTE_LEN`] bytes.
pub fn flatten_attributes<T>(label: &str, value: &T, truncate: bool) -> Vec<SpanAttribute>
where
    T: Serialize + ?Sized,
{
    let mut out = Vec::new();
    match serde_json::to_value(value) {
        Ok(projected) => flatten_into(&mut out, &label.to_lowercase(), &projected, truncate),
        Err(err) => out.push(SpanAttribute::string(
            label.to_lowercase(),
            format!("unserialisable value: {err}"),
        )),
    }
    out
}

fn flatten_into(out: &mut Vec<SpanAttribute>, label: &str, value: &Value, truncate: bool) {
    match value {
        Value::Null => out.push(SpanAttribute::string(label, "null")),
        Value::Bool(flag) => out.push(SpanAttribute::bool(label, *flag)),
        Value::Number(number) => out.push(match number.as_i64() {
            Some(int) => SpanAttribute::int(label, int),
            None => SpanAttribute::float(label, number.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(text) => out.push(SpanAttribute::string(
            label,
            cap(text, MAX_TEXT_ATTRIBUTE_LEN, truncate),
        )),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                if truncate && index == MAX_ATTRIBUTE_FIELDS {
                    out.push(SpanAttribute::string(
                        format!("{label}.{index}"),
                        format!("...array with total length {} truncated", items.len()),
                    ));
                    return;
                }
                flatten_into(out, &format!("{label}.{index}"), item, truncate);
            }
        }
        Value::Object(fields) => {
            if let Some(text) = byte_string_text(fields) {
                out.push(SpanAttribute::string(
                    label,
                    cap(text, MAX_BYTES_ATTRIBUTE_LEN, truncate),
                ));
                return;
            }
            for (index, (key, item)) in fields.iter().enumerate() {
                if truncate && index == MAX_ATTRIBUTE_FIELDS {
                    out.push(SpanAttribute::string(
                        format!("{label}.{index}"),
                        format!(" ...struct with total field {} truncated", fields.len()),
                    ));
                    return;
                }
                let key = format!("{label}.{key}").to_lowercase();
                flatten_into(out, &key, item, truncate);
            }
        }
    }
}

fn byte_string_text(fields: &serde_json::Map<String, Value>) -> Option<&str> {
    if fields.len() != 1 {
        return None;
    }
    fields.get(BYTES_KEY).and_then(Value::as_str)
}

fn cap(text: &str, max: usize, truncate: bool) -> String {
    if !truncate || text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATED_SUFFIX}", text.get(..end).unwrap_or_default())
}
