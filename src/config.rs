//! Client configuration.
//!
//! [`ClientConfig`] can be deserialized from any serde format (missing fields take their
//! defaults) or assembled through [`ClientConfigBuilder`]. Either way, call
//! [`ClientConfig::validate`] (the builder does so for you) before handing it to the dispatcher.

// self
use crate::{
	_prelude::*, auth::DEFAULT_EXPIRY_BUFFER, error::ConfigError, refresh::DEFAULT_REFRESH_PATH,
	retry::RetryPolicy,
};

/// API contract version sent with every request unless configured otherwise.
pub const DEFAULT_API_VERSION: &str = "1";

/// Settings shared by every request issued through one dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL that relative request paths are appended to.
	pub base_url: Url,
	/// Value of the `API-Version` header.
	#[serde(default = "default_api_version")]
	pub api_version: String,
	/// Path of the refresh endpoint.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Seconds before expiry at which an access credential is treated as expired.
	#[serde(default = "default_expiry_buffer_secs")]
	pub expiry_buffer_secs: u64,
	/// Retry budgets and backoff.
	#[serde(default)]
	pub retry: RetryPolicy,
}
impl ClientConfig {
	/// Creates a configuration with defaults for everything but the base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			api_version: default_api_version(),
			refresh_path: default_refresh_path(),
			expiry_buffer_secs: default_expiry_buffer_secs(),
			retry: RetryPolicy::default(),
		}
	}

	/// Starts a builder from a base URL string.
	pub fn builder(base_url: impl AsRef<str>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Expiry buffer as a duration.
	pub fn expiry_buffer(&self) -> Duration {
		Duration::seconds(i64::try_from(self.expiry_buffer_secs).unwrap_or(i64::MAX))
	}

	/// Checks invariants the dispatcher relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match self.base_url.scheme() {
			"http" | "https" => {},
			scheme => return Err(ConfigError::UnsupportedScheme { scheme: scheme.to_owned() }),
		}

		if self.api_version.trim().is_empty() {
			return Err(ConfigError::EmptyApiVersion);
		}
		if self.refresh_path.trim().is_empty() {
			return Err(ConfigError::EmptyRefreshPath);
		}

		self.retry.validate()
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: String,
	api_version: Option<String>,
	refresh_path: Option<String>,
	expiry_buffer_secs: Option<u64>,
	retry: Option<RetryPolicy>,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with the base URL.
	pub fn new(base_url: impl AsRef<str>) -> Self {
		Self {
			base_url: base_url.as_ref().to_owned(),
			api_version: None,
			refresh_path: None,
			expiry_buffer_secs: None,
			retry: None,
		}
	}

	/// Overrides the `API-Version` header value.
	pub fn api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = Some(version.into());

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = Some(path.into());

		self
	}

	/// Overrides the expiry buffer (defaults to 30 seconds).
	pub fn expiry_buffer_secs(mut self, secs: u64) -> Self {
		self.expiry_buffer_secs = Some(secs);

		self
	}

	/// Overrides the retry policy.
	pub fn retry(mut self, policy: RetryPolicy) -> Self {
		self.retry = Some(policy);

		self
	}

	/// Parses the base URL and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = Url::parse(&self.base_url)
			.map_err(|source| ConfigError::InvalidUrl { url: self.base_url.clone(), source })?;
		let mut config = ClientConfig::new(base_url);

		if let Some(version) = self.api_version {
			config.api_version = version;
		}
		if let Some(path) = self.refresh_path {
			config.refresh_path = path;
		}
		if let Some(secs) = self.expiry_buffer_secs {
			config.expiry_buffer_secs = secs;
		}
		if let Some(policy) = self.retry {
			config.retry = policy;
		}

		config.validate()?;

		Ok(config)
	}
}

fn default_api_version() -> String {
	DEFAULT_API_VERSION.into()
}

fn default_refresh_path() -> String {
	DEFAULT_REFRESH_PATH.into()
}

fn default_expiry_buffer_secs() -> u64 {
	u64::try_from(DEFAULT_EXPIRY_BUFFER.whole_seconds()).unwrap_or(0)
}
