//! Staged parser for server error bodies.
//!
//! Accepted shapes, tried in order:
//!
//! 1. Empty body (or JSON `null`).
//! 2. A JSON string whose contents are themselves a JSON object; unwrapped once.
//! 3. An object with a nested `error` object. Nested fields win; missing ones fall back to the
//!    enclosing object.
//! 4. An object carrying the fields at top level. A string `error` doubles as the code.
//! 5. Anything else is opaque text.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Error body after staged parsing.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorEnvelope {
	/// Fields found under a nested `error` object.
	Nested(ErrorFields),
	/// Fields found at the top level.
	TopLevel(ErrorFields),
	/// Non-JSON or non-object payload.
	Opaque(String),
	/// No payload.
	Empty,
}
impl ErrorEnvelope {
	/// Parses a raw response body.
	pub fn parse_bytes(bytes: &[u8]) -> Self {
		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Self::Empty;
		}

		match serde_json::from_slice::<Value>(bytes) {
			Ok(value) => Self::parse_value(value),
			Err(_) => Self::Opaque(String::from_utf8_lossy(bytes).trim().to_owned()),
		}
	}

	/// Parses an already-decoded JSON value.
	pub fn parse_value(value: Value) -> Self {
		match value {
			Value::Null => Self::Empty,
			Value::Object(map) => Self::from_object(&map),
			Value::String(text) => match serde_json::from_str::<Value>(&text) {
				Ok(Value::Object(map)) => Self::from_object(&map),
				_ if text.trim().is_empty() => Self::Empty,
				_ => Self::Opaque(text),
			},
			other => Self::Opaque(other.to_string()),
		}
	}

	/// Structured fields, when the body had any.
	pub fn fields(&self) -> Option<&ErrorFields> {
		match self {
			Self::Nested(fields) | Self::TopLevel(fields) => Some(fields),
			Self::Opaque(_) | Self::Empty => None,
		}
	}

	fn from_object(map: &Map<String, Value>) -> Self {
		let outer = ErrorFields::from_map(map);

		match map.get("error") {
			Some(Value::Object(inner)) => Self::Nested(ErrorFields::from_map(inner).or(outer)),
			_ => Self::TopLevel(outer),
		}
	}
}

/// Machine-readable fields of an error body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorFields {
	/// Machine code.
	pub code: Option<String>,
	/// Server-provided message.
	pub message: Option<String>,
	/// Server-assigned correlation identifier.
	pub request_id: Option<String>,
	/// Advised wait in seconds.
	pub retry_after_seconds: Option<u64>,
	/// Structured details.
	pub details: Option<Value>,
}
impl ErrorFields {
	fn from_map(map: &Map<String, Value>) -> Self {
		let code = text_field(map, &["code"]).or_else(|| match map.get("error") {
			Some(Value::String(code)) if !code.trim().is_empty() => Some(code.clone()),
			_ => None,
		});

		Self {
			code,
			message: text_field(map, &["message"]),
			request_id: text_field(map, &["requestId", "request_id"]),
			retry_after_seconds: ["retryAfterSeconds", "retry_after_seconds", "retryAfter"]
				.iter()
				.find_map(|key| map.get(*key).and_then(seconds_value)),
			details: map.get("details").filter(|value| !value.is_null()).cloned(),
		}
	}

	/// Fills missing fields from `fallback`.
	pub fn or(self, fallback: Self) -> Self {
		Self {
			code: self.code.or(fallback.code),
			message: self.message.or(fallback.message),
			request_id: self.request_id.or(fallback.request_id),
			retry_after_seconds: self.retry_after_seconds.or(fallback.retry_after_seconds),
			details: self.details.or(fallback.details),
		}
	}
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| match map.get(*key)? {
		Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	})
}

fn seconds_value(value: &Value) -> Option<u64> {
	let seconds = match value {
		Value::Number(number) => number.as_f64()?,
		Value::String(text) => f64::from_str(text.trim()).ok()?,
		_ => return None,
	};

	if !seconds.is_finite() {
		return None;
	}

	Some(seconds.max(0.).ceil() as u64)
}
