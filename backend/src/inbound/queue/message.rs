//! Message shape, JSON envelope and header propagation.

use serde::{Deserialize, Serialize};

use crate::domain::{Context, PROPAGATED_KEYS};

/// A message as read from the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partitioning key.
    pub key: Option<Vec<u8>>,
    /// Raw payload.
    pub value: Vec<u8>,
    /// Headers in arrival order; keys may repeat.
    pub headers: Vec<(String, Vec<u8>)>,
}

impl QueueMessage {
    /// Message on `topic` carrying `value`.
    pub fn new(topic: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Values of every header named `key`.
    pub fn header_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |(name, _)| name == key)
            .map(|(_, value)| value.as_slice())
    }
}

/// JSON envelope wrapping every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Message identifier.
    #[serde(default)]
    pub id: String,
    /// Event type, serialised as `type`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Event subtype.
    #[serde(default)]
    pub subtype: String,
    /// Payload.
    pub data: T,
}

/// Context for processing `message`: `base` plus the propagated header
/// values. Headers that repeat or are not UTF-8 are ignored.
pub fn context_from_headers(base: &Context, message: &QueueMessage) -> Context {
    PROPAGATED_KEYS.iter().fold(base.clone(), |ctx, key| {
        let mut values = message.header_values(key);
        match (values.next(), values.next()) {
            (Some(value), None) => match std::str::from_utf8(value) {
                Ok(text) if !text.is_empty() => ctx.with_value(*key, text),
                _ => ctx,
            },
            _ => ctx,
        }
    })
}

/// Append the propagated context values to outgoing `headers`.
pub fn inject_headers(ctx: &Context, headers: &mut Vec<(String, Vec<u8>)>) {
    for key in PROPAGATED_KEYS {
        let value = ctx.get_string(key);
        if !value.is_empty() {
            headers.push((key.to_owned(), value.as_bytes().to_vec()));
        }
    }
}
