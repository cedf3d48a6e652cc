//! Per-request execution: header attachment plus bounded, idempotency-aware retries.
//!
//! [`RequestExecutor`] runs one logical request. Before every attempt it consults the
//! connectivity probe, re-reads the access credential from the [`TokenStore`], and mints a fresh
//! correlation identifier. Transient failures of `GET`/`HEAD` requests are retried with
//! exponential backoff plus jitter, or exactly the server's `Retry-After` when one is given.
//! Terminal outcomes are returned as [`RawFailure`] so the dispatcher can decide between
//! refreshing and normalizing.

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::{
	HeaderName, HeaderValue, Uri,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use rand::Rng;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{
		API_VERSION, Connectivity, HttpRequest, HttpTransport, ResponseMetadata, X_REQUEST_ID,
	},
	normalize::RawFailure,
	obs::{self, Operation, Outcome},
	request::{self, ApiResponse, RequestDescriptor},
	store::TokenStore,
};

/// Backoff and retry budgets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Extra attempts allowed on the initial pass.
	pub max_retries: u32,
	/// Extra attempts allowed when replaying after a refresh.
	pub replay_retries: u32,
	/// First backoff step in milliseconds.
	pub base_delay_ms: u64,
	/// Upper bound for the exponential step in milliseconds.
	pub max_delay_ms: u64,
	/// Upper bound of the uniform jitter added to each step, in milliseconds.
	pub jitter_ms: u64,
	/// Statuses treated as transient.
	pub retriable_statuses: Vec<u16>,
}
impl RetryPolicy {
	/// Default extra attempts on the initial pass.
	pub const DEFAULT_MAX_RETRIES: u32 = 2;
	/// Default base delay.
	pub const DEFAULT_BASE_DELAY_MS: u64 = 300;
	/// Default delay cap.
	pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
	/// Default jitter bound.
	pub const DEFAULT_JITTER_MS: u64 = 100;

	/// Policy that never retries.
	pub fn disabled() -> Self {
		Self { max_retries: 0, replay_retries: 0, ..Default::default() }
	}

	/// Returns `true` when `status` is in the transient set.
	pub fn is_retriable_status(&self, status: u16) -> bool {
		self.retriable_statuses.contains(&status)
	}

	/// Delay before retry number `attempt` (zero-based).
	///
	/// A server hint is honored exactly. Otherwise the delay is
	/// `min(base * 2^attempt, max) + U[0, jitter]`.
	pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> StdDuration {
		if let Some(hint) = retry_after {
			return StdDuration::try_from(hint).unwrap_or(StdDuration::ZERO);
		}

		let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
		let step = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
		let jitter =
			if self.jitter_ms == 0 { 0 } else { rand::rng().random_range(0..=self.jitter_ms) };

		StdDuration::from_millis(step.saturating_add(jitter))
	}

	/// Rejects inconsistent values.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.base_delay_ms > self.max_delay_ms {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "base delay must not exceed the maximum delay",
			});
		}
		if self.retriable_statuses.iter().any(|status| *status < 400) {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "retriable statuses must be error statuses",
			});
		}

		Ok(())
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: Self::DEFAULT_MAX_RETRIES,
			replay_retries: 0,
			base_delay_ms: Self::DEFAULT_BASE_DELAY_MS,
			max_delay_ms: Self::DEFAULT_MAX_DELAY_MS,
			jitter_ms: Self::DEFAULT_JITTER_MS,
			retriable_statuses: vec![429, 500, 502, 503, 504],
		}
	}
}

/// Runs single logical requests against the transport.
pub struct RequestExecutor {
	transport: Arc<dyn HttpTransport>,
	store: Arc<TokenStore>,
	connectivity: Arc<dyn Connectivity>,
	base_url: Url,
	api_version: String,
	policy: RetryPolicy,
}
impl RequestExecutor {
	/// Creates an executor.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		store: Arc<TokenStore>,
		connectivity: Arc<dyn Connectivity>,
		base_url: Url,
		api_version: impl Into<String>,
		policy: RetryPolicy,
	) -> Self {
		Self { transport, store, connectivity, base_url, api_version: api_version.into(), policy }
	}

	/// Retry policy in effect.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Initial pass with the full retry budget.
	pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse, RawFailure> {
		self.run(descriptor, self.policy.max_retries).await
	}

	/// Replay after a refresh: the first attempt goes out immediately, with the replay budget.
	pub async fn replay(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse, RawFailure> {
		self.run(descriptor, self.policy.replay_retries).await
	}

	/// Sends once with no retries, regardless of method.
	pub async fn send_once(
		&self,
		descriptor: &RequestDescriptor,
	) -> Result<ApiResponse, RawFailure> {
		self.run(descriptor, 0).await
	}

	async fn run(
		&self,
		descriptor: &RequestDescriptor,
		retries: u32,
	) -> Result<ApiResponse, RawFailure> {
		let retries = if descriptor.is_idempotent() { retries } else { 0 };
		let mut attempt = 0;

		loop {
			if !self.connectivity.is_online() {
				return Err(RawFailure::Offline);
			}

			let request_id = request::generate_request_id();
			let request = self.build_request(descriptor, &request_id)?;

			let (delay, cause) = match self.transport.send(request).await {
				Ok(response) => {
					let status = response.status().as_u16();

					obs::record_attempt(Some(status));

					if status < 400 {
						return Ok(ApiResponse::from_http(response, &request_id));
					}

					let meta = ResponseMetadata::from_response(&response, Some(&request_id));

					if attempt >= retries || !self.policy.is_retriable_status(status) {
						return Err(RawFailure::Http { status, body: response.into_body(), meta });
					}

					(self.policy.backoff_delay(attempt, meta.retry_after), format!("HTTP_{status}"))
				},
				Err(error) => {
					obs::record_attempt(None);

					if attempt >= retries || !error.is_retriable() {
						return Err(RawFailure::Transport { error, request_id: Some(request_id) });
					}

					(self.policy.backoff_delay(attempt, None), error.to_string())
				},
			};

			obs::record_outcome(Operation::Dispatch, Outcome::Retry);
			obs::record_retry_delay(delay);
			obs::trace_retry(attempt + 1, delay, &cause);
			tokio::time::sleep(delay).await;

			attempt += 1;
		}
	}

	fn build_request(
		&self,
		descriptor: &RequestDescriptor,
		request_id: &str,
	) -> Result<HttpRequest, ConfigError> {
		let url = descriptor.resolve_url(&self.base_url)?;
		let body = descriptor.payload();
		let mut request = HttpRequest::new(body.map(|body| body.bytes.clone()).unwrap_or_default());

		*request.method_mut() = descriptor.method().clone();
		*request.uri_mut() = Uri::try_from(url.as_str()).map_err(::http::Error::from)?;

		let headers = request.headers_mut();

		headers.insert(X_REQUEST_ID, header_value(X_REQUEST_ID, request_id)?);
		headers.insert(API_VERSION, header_value(API_VERSION, &self.api_version)?);

		if let Some(body) = body {
			headers.insert(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), &body.content_type)?);
		}
		if !descriptor.is_anonymous()
			&& let Some(access) = self.store.access()
		{
			let mut value = header_value(AUTHORIZATION.as_str(), &request::bearer_value(&access))?;

			value.set_sensitive(true);
			headers.insert(AUTHORIZATION, value);
		}

		for (name, value) in descriptor.headers() {
			let header = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
				ConfigError::InvalidHeaderName { name: name.to_owned(), source }
			})?;

			headers.insert(header, header_value(name, value)?);
		}

		Ok(request)
	}
}
impl Debug for RequestExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("base_url", &self.base_url.as_str())
			.field("api_version", &self.api_version)
			.field("policy", &self.policy)
			.finish()
	}
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value)
		.map_err(|source| ConfigError::InvalidHeaderValue { name: name.to_owned(), source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_after_is_honored_exactly() {
		let policy = RetryPolicy::default();

		assert_eq!(
			policy.backoff_delay(0, Some(Duration::seconds(7))),
			StdDuration::from_secs(7)
		);
		assert_eq!(policy.backoff_delay(5, Some(Duration::ZERO)), StdDuration::ZERO);
	}

	#[test]
	fn exponential_backoff_with_jitter_and_cap() {
		let policy = RetryPolicy::default();

		for _ in 0..32 {
			let first = policy.backoff_delay(0, None);
			let second = policy.backoff_delay(1, None);
			let capped = policy.backoff_delay(20, None);

			assert!((300..=400).contains(&first.as_millis()), "Unexpected delay: {first:?}");
			assert!((600..=700).contains(&second.as_millis()), "Unexpected delay: {second:?}");
			assert!(
				(30_000..=30_100).contains(&capped.as_millis()),
				"Unexpected delay: {capped:?}"
			);
		}
	}

	#[test]
	fn zero_jitter_is_deterministic() {
		let policy = RetryPolicy { jitter_ms: 0, ..Default::default() };

		assert_eq!(policy.backoff_delay(2, None), StdDuration::from_millis(1_200));
		assert_eq!(policy.backoff_delay(u32::MAX, None), StdDuration::from_millis(30_000));
	}

	#[test]
	fn default_retriable_statuses() {
		let policy = RetryPolicy::default();

		for status in [429, 500, 502, 503, 504] {
			assert!(policy.is_retriable_status(status));
		}
		for status in [400, 401, 403, 404, 501] {
			assert!(!policy.is_retriable_status(status));
		}
	}

	#[test]
	fn validation_rejects_inverted_delays_and_success_statuses() {
		let inverted = RetryPolicy { base_delay_ms: 10, max_delay_ms: 5, ..Default::default() };
		let success = RetryPolicy { retriable_statuses: vec![200], ..Default::default() };

		assert!(RetryPolicy::default().validate().is_ok());
		assert!(RetryPolicy::disabled().validate().is_ok());
		assert!(matches!(inverted.validate(), Err(ConfigError::InvalidRetryPolicy { .. })));
		assert!(matches!(success.validate(), Err(ConfigError::InvalidRetryPolicy { .. })));
	}

	#[test]
	fn policy_deserializes_with_defaults() {
		let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries":5}"#)
			.expect("Partial policy should deserialize.");

		assert_eq!(policy.max_retries, 5);
		assert_eq!(policy.base_delay_ms, RetryPolicy::DEFAULT_BASE_DELAY_MS);
		assert_eq!(policy.retriable_statuses, RetryPolicy::default().retriable_statuses);
	}
}
