//! Transport primitives for outbound API calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. The dispatcher hands it a
//! fully-built [`HttpRequest`] (headers attached, body serialized) and expects either a complete
//! [`HttpResponse`] of any status or a [`TransportError`] when no response arrived. Status
//! interpretation, retries, and metadata extraction stay on the crate side, so custom
//! transports only move bytes.

pub mod connectivity;

pub use connectivity::*;

// crates.io
use ::http::{HeaderMap, header::RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Request type accepted by [`HttpTransport`].
pub type HttpRequest = ::http::Request<Vec<u8>>;
/// Response type produced by [`HttpTransport`].
pub type HttpResponse = ::http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Correlation header attached to every attempt and echoed by the API.
pub const X_REQUEST_ID: &str = "x-request-id";
/// API contract version header.
pub const API_VERSION: &str = "api-version";
/// Step-up token header for sensitive operations.
pub const X_STEP_UP_TOKEN: &str = "x-step-up-token";

/// Moves one request over the wire.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// executor and the refresh coordinator, and the returned future must be `Send` so dispatcher
/// futures can hop executors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the response, whatever its status.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Metadata captured from a response for downstream error mapping.
///
/// Additional fields may be added in future releases, so downstream code should construct
/// values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Response `X-Request-ID`, falling back to the identifier that was sent.
	pub request_id: Option<String>,
}
impl ResponseMetadata {
	/// Extracts metadata from `response`.
	pub fn from_response(response: &HttpResponse, sent_request_id: Option<&str>) -> Self {
		let headers = response.headers();
		let request_id = headers
			.get(X_REQUEST_ID)
			.and_then(|value| value.to_str().ok())
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.or(sent_request_id)
			.map(str::to_owned);

		Self {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(headers),
			request_id,
		}
	}

	/// Retry-After hint in whole seconds.
	pub fn retry_after_seconds(&self) -> Option<u64> {
		self.retry_after.map(|delay| u64::try_from(delay.whole_seconds()).unwrap_or(0))
	}
}

/// Parses a `Retry-After` header relative to the current clock.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	parse_retry_after_at(headers, OffsetDateTime::now_utc())
}

/// Parses a `Retry-After` header as delta-seconds or an HTTP date.
///
/// Dates become `ceil(date - now)` seconds, floored at zero.
pub fn parse_retry_after_at(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let millis = (moment - now).whole_milliseconds();
	let secs = if millis <= 0 { 0 } else { (millis + 999) / 1_000 };

	Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
}

/// Thin wrapper around [`reqwest::Client`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub reqwest::Client);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest client.
	pub fn with_client(client: reqwest::Client) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<reqwest::Client> for ReqwestTransport {
	fn as_ref(&self) -> &reqwest::Client {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl std::ops::Deref for ReqwestTransport {
	type Target = reqwest::Client;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.version_mut() = version;
			*converted.headers_mut() = headers;

			Ok::<_, TransportError>(converted)
		})
	}
}
