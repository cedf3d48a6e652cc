//! Failure normalization: every raw outcome becomes exactly one [`AppError`].
//!
//! [`RawFailure`] enumerates what can go wrong before normalization (an HTTP error response, a
//! transport failure, an offline short-circuit, a local error, or something unclassifiable).
//! [`ErrorNormalizer::normalize`] is total over it. Loosely-typed payloads coming from outside
//! the crate enter through [`RawFailure::from_value`], which applies the same ordered stages.

pub mod catalog;
pub mod envelope;

pub use envelope::{ErrorEnvelope, ErrorFields};

// std
use std::io;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	http::{AlwaysOnline, Connectivity, ResponseMetadata},
};

/// Outcome of a failed request before normalization.
#[derive(Debug)]
pub enum RawFailure {
	/// A response arrived with an error status.
	Http {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: Vec<u8>,
		/// Headers-derived metadata.
		meta: ResponseMetadata,
	},
	/// No response arrived.
	Transport {
		/// Underlying transport failure.
		error: TransportError,
		/// Correlation identifier that was sent, if any.
		request_id: Option<String>,
	},
	/// The request was never sent because the environment reported no connectivity.
	Offline,
	/// A local failure raised while preparing or handling the request.
	Client {
		/// Failure description, surfaced verbatim.
		message: String,
	},
	/// Anything that matches no other shape.
	Unknown,
}
impl RawFailure {
	/// Classifies a loosely-typed failure payload.
	///
	/// Stages: an object with a numeric `status` is an HTTP failure whose body is its `data` or
	/// `body` field (or the object itself); an object with an `error` field and no status is a
	/// transport failure; an object with a string `message` is a client failure; everything
	/// else, including `null`, is unknown.
	pub fn from_value(value: Value) -> Self {
		let Value::Object(map) = value else {
			return Self::Unknown;
		};

		if let Some(status) =
			map.get("status").and_then(Value::as_u64).and_then(|status| u16::try_from(status).ok())
		{
			let body = match map.get("data").or_else(|| map.get("body")) {
				Some(Value::Null) | None => serde_json::to_vec(&map),
				Some(body) => serde_json::to_vec(body),
			}
			.unwrap_or_default();
			let request_id = map.get("requestId").and_then(Value::as_str).map(str::to_owned);

			return Self::Http {
				status,
				body,
				meta: ResponseMetadata { status: Some(status), retry_after: None, request_id },
			};
		}
		if let Some(error) = map.get("error") {
			let reason = match error {
				Value::String(reason) => reason.clone(),
				other => other.to_string(),
			};

			return Self::Transport {
				error: TransportError::network(io::Error::other(reason)),
				request_id: None,
			};
		}
		if let Some(Value::String(message)) = map.get("message") {
			return Self::Client { message: message.clone() };
		}

		Self::Unknown
	}

	/// HTTP status carried by the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } => Some(*status),
			_ => None,
		}
	}
}
impl From<TransportError> for RawFailure {
	fn from(error: TransportError) -> Self {
		Self::Transport { error, request_id: None }
	}
}
impl From<ConfigError> for RawFailure {
	fn from(error: ConfigError) -> Self {
		Self::Client { message: error.to_string() }
	}
}

/// Coarse classification for programmatic handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
	/// Session missing, expired, or rejected; the application should sign out.
	Auth,
	/// Authenticated but not permitted.
	Authorization,
	/// Input rejected.
	Validation,
	/// Throttled.
	RateLimit,
	/// No connectivity or no response.
	Network,
	/// Server-side failure.
	Server,
	/// Local failure or unclassified 4xx.
	Client,
	/// Nothing else matched.
	Unknown,
}

/// Converts raw failures into [`AppError`] values.
#[derive(Clone)]
pub struct ErrorNormalizer {
	connectivity: Arc<dyn Connectivity>,
}
impl ErrorNormalizer {
	/// Creates a normalizer that consults `connectivity` for transport failures.
	pub fn new(connectivity: Arc<dyn Connectivity>) -> Self {
		Self { connectivity }
	}

	/// Normalizes any raw failure. Never panics.
	pub fn normalize(&self, raw: RawFailure) -> AppError {
		match raw {
			RawFailure::Http { status, body, meta } => normalize_http(status, &body, &meta),
			RawFailure::Transport { error, request_id } => {
				let code = if self.connectivity.is_online() {
					catalog::NETWORK_ERROR
				} else {
					catalog::CLIENT_OFFLINE
				};
				let mut app_error = AppError::new(code, catalog_message(code))
					.with_details(serde_json::json!({ "reason": error.to_string() }));

				app_error.request_id = request_id;

				app_error
			},
			RawFailure::Offline =>
				AppError::new(catalog::CLIENT_OFFLINE, catalog_message(catalog::CLIENT_OFFLINE)),
			RawFailure::Client { message } => AppError::new(catalog::CLIENT_ERROR, message),
			RawFailure::Unknown =>
				AppError::new(catalog::UNKNOWN_ERROR, catalog::GENERIC_UNKNOWN_MESSAGE),
		}
	}

	/// Normalizes a loosely-typed payload via [`RawFailure::from_value`].
	pub fn normalize_value(&self, value: Value) -> AppError {
		self.normalize(RawFailure::from_value(value))
	}
}
impl Default for ErrorNormalizer {
	fn default() -> Self {
		Self::new(Arc::new(AlwaysOnline))
	}
}
impl Debug for ErrorNormalizer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ErrorNormalizer").field("online", &self.connectivity.is_online()).finish()
	}
}

impl AppError {
	/// 401 or any `AUTH_*` code.
	pub fn is_auth_error(&self) -> bool {
		self.status == Some(401) || self.code.starts_with("AUTH_")
	}

	/// 403 or any `AUTHZ_*` code.
	pub fn is_authz_error(&self) -> bool {
		self.status == Some(403) || self.code.starts_with("AUTHZ_")
	}

	/// 429 or any rate-limit code.
	pub fn is_rate_limit_error(&self) -> bool {
		self.status == Some(429) || catalog::is_rate_limit_code(&self.code)
	}

	/// The caller's tenant has been disabled.
	pub fn is_tenant_disabled_error(&self) -> bool {
		self.code == catalog::TENANT_DISABLED
	}

	/// Connectivity failures, throttling, and gateway/server failures.
	pub fn is_retriable(&self) -> bool {
		matches!(self.code.as_str(), catalog::NETWORK_ERROR | catalog::CLIENT_OFFLINE)
			|| matches!(self.status, Some(429 | 500 | 502 | 503 | 504))
	}

	/// Coarse classification of the failure.
	pub fn category(&self) -> ErrorCategory {
		let code = self.code.as_str();

		if self.is_auth_error() {
			ErrorCategory::Auth
		} else if self.is_authz_error() || self.is_tenant_disabled_error() {
			ErrorCategory::Authorization
		} else if self.is_rate_limit_error() {
			ErrorCategory::RateLimit
		} else if code.starts_with("VALIDATION_") || matches!(self.status, Some(400 | 422)) {
			ErrorCategory::Validation
		} else if matches!(code, catalog::NETWORK_ERROR | catalog::CLIENT_OFFLINE) {
			ErrorCategory::Network
		} else if code == catalog::SERVER_ERROR || self.status.is_some_and(|s| s >= 500) {
			ErrorCategory::Server
		} else if code == catalog::CLIENT_ERROR || self.status.is_some_and(|s| s >= 400) {
			ErrorCategory::Client
		} else {
			ErrorCategory::Unknown
		}
	}
}

fn normalize_http(status: u16, body: &[u8], meta: &ResponseMetadata) -> AppError {
	let envelope = ErrorEnvelope::parse_bytes(body);
	let fields = envelope.fields().cloned().unwrap_or_default();
	let code = fields.code.unwrap_or_else(|| format!("HTTP_{status}"));
	let request_id = fields.request_id.or_else(|| meta.request_id.clone());
	let retry_after_seconds = fields.retry_after_seconds.or_else(|| meta.retry_after_seconds());
	let mut message = catalog::message_for(&code)
		.map(str::to_owned)
		.or(fields.message)
		.unwrap_or_else(|| catalog::GENERIC_SERVER_MESSAGE.to_owned());

	if catalog::is_rate_limit_code(&code)
		&& let Some(seconds) = retry_after_seconds
	{
		message = format!("{message} Please try again in {}.", catalog::format_wait(seconds));
	}
	if let Some(request_id) = &request_id {
		message = format!("{message} (Ref: {request_id})");
	}

	AppError {
		code,
		message,
		status: Some(status),
		request_id,
		retry_after_seconds,
		details: fields.details,
	}
}

fn catalog_message(code: &str) -> &'static str {
	catalog::message_for(code).unwrap_or(catalog::GENERIC_UNKNOWN_MESSAGE)
}
