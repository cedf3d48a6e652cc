//! Error types shared across the dispatcher, transports, and configuration layers.
//!
//! [`AppError`] is the only failure shape callers of [`Dispatcher::execute`](crate::Dispatcher)
//! ever observe. The remaining enums describe crate-internal failures (configuration,
//! transport) that the normalizer folds into an [`AppError`] before they leave the crate.

// self
use crate::{
	_prelude::*,
	normalize::{ErrorNormalizer, RawFailure},
	store::StoreError,
};

/// Crate-wide result type alias returning [`AppError`] by default.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Normalized, immutable failure handed back to every caller.
///
/// Produced exactly once per terminal failure by the normalizer. `code` is a stable machine
/// identifier (server-provided or synthesized, e.g. `HTTP_503`), `message` is ready for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ThisError)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct AppError {
	/// Machine-readable error code.
	pub code: String,
	/// Human-readable message, including retry hints and support references.
	pub message: String,
	/// HTTP status code, when a response was received.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<u16>,
	/// Correlation identifier users can quote to support.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
	/// Server-advised wait before retrying, in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub retry_after_seconds: Option<u64>,
	/// Structured payload supplied by the server (field errors, causes, etc.).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}
impl AppError {
	/// Creates an error with only a code and message.
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			status: None,
			request_id: None,
			retry_after_seconds: None,
			details: None,
		}
	}

	/// Attaches an HTTP status code.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Attaches a correlation identifier.
	pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = Some(request_id.into());

		self
	}

	/// Attaches a retry-after hint in seconds.
	pub fn with_retry_after_seconds(mut self, seconds: u64) -> Self {
		self.retry_after_seconds = Some(seconds);

		self
	}

	/// Attaches structured details.
	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);

		self
	}
}
impl From<ConfigError> for AppError {
	fn from(e: ConfigError) -> Self {
		ErrorNormalizer::default().normalize(RawFailure::from(e))
	}
}
impl From<StoreError> for AppError {
	fn from(e: StoreError) -> Self {
		ErrorNormalizer::default().normalize(RawFailure::Client { message: e.to_string() })
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL or request target cannot be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than HTTP(S).
	#[error("Base URL must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Scheme that was supplied.
		scheme: String,
	},
	/// Header name is not a valid HTTP token.
	#[error("Header name `{name}` is invalid.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
		/// Underlying validation failure.
		#[source]
		source: http::header::InvalidHeaderName,
	},
	/// Header value contains characters HTTP does not allow.
	#[error("Value for header `{name}` is invalid.")]
	InvalidHeaderValue {
		/// Header the value was destined for.
		name: String,
		/// Underlying validation failure.
		#[source]
		source: http::header::InvalidHeaderValue,
	},
	/// Request could not be assembled.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// JSON body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[from] serde_json::Error),
	/// Refresh endpoint path is empty.
	#[error("Refresh endpoint path must not be empty.")]
	EmptyRefreshPath,
	/// API version header value is empty.
	#[error("API version must not be empty.")]
	EmptyApiVersion,
	/// No transport was supplied and the default one is compiled out.
	#[error("An HTTP transport must be supplied when the `reqwest` feature is disabled.")]
	MissingTransport,
	/// Retry policy values are inconsistent.
	#[error("Retry policy is invalid: {reason}.")]
	InvalidRetryPolicy {
		/// Which constraint failed.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures raised before any HTTP response arrived.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Connection could not be established (DNS, TCP, TLS).
	#[error("Connection to the API could not be established.")]
	Connect {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Request did not complete in time.
	#[error("Request to the API timed out.")]
	Timeout {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Any other network failure reported by the HTTP client.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a connection failure.
	pub fn connect(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connect { source: Box::new(src) }
	}

	/// Wraps a timeout.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}

	/// Wraps a generic network failure.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` for failures worth retrying on idempotent requests.
	pub fn is_retriable(&self) -> bool {
		matches!(self, Self::Connect { .. } | Self::Timeout { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			Self::timeout(e)
		} else if e.is_connect() {
			Self::connect(e)
		} else {
			Self::network(e)
		}
	}
}
