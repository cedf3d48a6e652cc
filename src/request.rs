//! Request descriptors, correlation identifiers, and successful responses.

// crates.io
use ::http::{HeaderMap, Method};
use rand::Rng;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AccessCredential,
	error::ConfigError,
	http::{HttpResponse, ResponseMetadata, X_STEP_UP_TOKEN},
	normalize::{ErrorNormalizer, RawFailure},
};

const REQUEST_ID_SUFFIX_LEN: usize = 8;

/// Immutable description of one logical API call.
///
/// A descriptor may be sent several times (retries, the replay after a refresh), so it only
/// carries caller intent. Credentials and correlation headers are attached per attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
	method: Method,
	target: String,
	body: Option<RequestBody>,
	headers: Vec<(String, String)>,
	anonymous: bool,
}
impl RequestDescriptor {
	/// Creates a descriptor for `target`, either a path relative to the base URL or an absolute
	/// URL.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self { method, target: target.into(), body: None, headers: Vec::new(), anonymous: false }
	}

	/// `GET` descriptor.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::GET, target)
	}

	/// `HEAD` descriptor.
	pub fn head(target: impl Into<String>) -> Self {
		Self::new(Method::HEAD, target)
	}

	/// `POST` descriptor.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::POST, target)
	}

	/// `PUT` descriptor.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::PUT, target)
	}

	/// `PATCH` descriptor.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::PATCH, target)
	}

	/// `DELETE` descriptor.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::DELETE, target)
	}

	/// Serializes `body` as the JSON payload.
	pub fn json<T>(self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body)?;

		Ok(self.body(bytes, "application/json"))
	}

	/// Attaches a raw payload with its content type.
	pub fn body(mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
		self.body = Some(RequestBody { bytes: bytes.into(), content_type: content_type.into() });

		self
	}

	/// Adds a caller header. Names and values are validated when the request is sent.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Attaches the step-up token required by sensitive operations.
	pub fn step_up_token(self, token: impl Into<String>) -> Self {
		self.header(X_STEP_UP_TOKEN, token)
	}

	/// Marks the call as one that must never carry a bearer credential (login, refresh).
	pub fn anonymous(mut self) -> Self {
		self.anonymous = true;

		self
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path or absolute URL as supplied.
	pub fn target(&self) -> &str {
		&self.target
	}

	/// Payload, if any.
	pub fn payload(&self) -> Option<&RequestBody> {
		self.body.as_ref()
	}

	/// Caller headers in insertion order.
	pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
		self.headers.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}

	/// Returns `true` when no bearer credential may be attached.
	pub fn is_anonymous(&self) -> bool {
		self.anonymous
	}

	/// Only `GET` and `HEAD` are safe to re-send automatically.
	pub fn is_idempotent(&self) -> bool {
		matches!(self.method, Method::GET | Method::HEAD)
	}

	/// Resolves the target against `base`.
	///
	/// Absolute `http(s)` targets pass through. Relative targets are appended to the base so a
	/// base path prefix such as `/v1` is preserved.
	pub fn resolve_url(&self, base: &Url) -> Result<Url, ConfigError> {
		if let Ok(url) = Url::parse(&self.target)
			&& matches!(url.scheme(), "http" | "https")
		{
			return Ok(url);
		}

		let joined = format!(
			"{}/{}",
			base.as_str().trim_end_matches('/'),
			self.target.trim_start_matches('/')
		);

		Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { url: joined, source })
	}
}

/// Serialized request payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestBody {
	/// Encoded bytes.
	pub bytes: Vec<u8>,
	/// `Content-Type` header value.
	pub content_type: String,
}

/// Successful (status below 400) response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body.
	pub body: Vec<u8>,
	/// Response `X-Request-ID`, falling back to the identifier that was sent.
	pub request_id: Option<String>,
}
impl ApiResponse {
	pub(crate) fn from_http(response: HttpResponse, sent_request_id: &str) -> Self {
		let request_id =
			ResponseMetadata::from_response(&response, Some(sent_request_id)).request_id;
		let (parts, body) = response.into_parts();

		Self { status: parts.status.as_u16(), headers: parts.headers, body, request_id }
	}

	/// Decodes the body as JSON.
	///
	/// Decoding failures become a `CLIENT_ERROR` naming the offending path.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			let message =
				format!("Response body could not be decoded at `{}`: {}.", e.path(), e.inner());

			ErrorNormalizer::default().normalize(RawFailure::Client { message })
		})
	}

	/// Body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Generates a correlation identifier: `<millis base36>-<8 random base36 chars>`.
pub fn generate_request_id() -> String {
	let millis = u128::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
		.unwrap_or_default();
	let mut rng = rand::rng();
	let mut id = to_base36(millis);

	id.push('-');

	for _ in 0..REQUEST_ID_SUFFIX_LEN {
		let digit = rng.random_range(0..36_u32);

		id.push(char::from_digit(digit, 36).unwrap_or('0'));
	}

	id
}

pub(crate) fn bearer_value(access: &AccessCredential) -> String {
	format!("Bearer {}", access.expose())
}

fn to_base36(mut value: u128) -> String {
	if value == 0 {
		return "0".into();
	}

	let mut digits = Vec::new();

	while value > 0 {
		let digit = (value % 36) as u32;

		digits.push(char::from_digit(digit, 36).unwrap_or('0'));
		value /= 36;
	}

	digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_get_and_head_are_idempotent() {
		assert!(RequestDescriptor::get("/users").is_idempotent());
		assert!(RequestDescriptor::head("/users").is_idempotent());
		assert!(!RequestDescriptor::post("/users").is_idempotent());
		assert!(!RequestDescriptor::put("/users/1").is_idempotent());
		assert!(!RequestDescriptor::patch("/users/1").is_idempotent());
		assert!(!RequestDescriptor::delete("/users/1").is_idempotent());
	}

	#[test]
	fn resolve_url_keeps_base_prefix_and_passes_absolute_targets() {
		let base = Url::parse("https://api.example.com/v1/").expect("Base URL should parse.");

		assert_eq!(
			RequestDescriptor::get("/users")
				.resolve_url(&base)
				.expect("Path should resolve.")
				.as_str(),
			"https://api.example.com/v1/users"
		);
		assert_eq!(
			RequestDescriptor::get("users?page=2")
				.resolve_url(&base)
				.expect("Path should resolve.")
				.as_str(),
			"https://api.example.com/v1/users?page=2"
		);
		assert_eq!(
			RequestDescriptor::get("https://files.example.com/a.png")
				.resolve_url(&base)
				.expect("Absolute URL should pass through.")
				.as_str(),
			"https://files.example.com/a.png"
		);
	}

	#[test]
	fn json_body_sets_content_type() {
		let descriptor = RequestDescriptor::post("/invitations")
			.json(&serde_json::json!({ "email": "a@example.com" }))
			.expect("JSON body should serialize.")
			.step_up_token("step-1")
			.anonymous();
		let body = descriptor.payload().expect("Body should be present.");

		assert_eq!(body.content_type, "application/json");
		assert_eq!(body.bytes, br#"{"email":"a@example.com"}"#);
		assert_eq!(descriptor.headers().collect::<Vec<_>>(), vec![(X_STEP_UP_TOKEN, "step-1")]);
		assert!(descriptor.is_anonymous());
	}

	#[test]
	fn request_ids_have_expected_shape_and_differ() {
		let first = generate_request_id();
		let second = generate_request_id();
		let (millis, suffix) = first.split_once('-').expect("Request id should contain a dash.");

		assert!(!millis.is_empty());
		assert!(millis.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
		assert_eq!(suffix.len(), REQUEST_ID_SUFFIX_LEN);
		assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
		assert_ne!(first, second);
	}

	#[test]
	fn base36_encoding() {
		assert_eq!(to_base36(0), "0");
		assert_eq!(to_base36(35), "z");
		assert_eq!(to_base36(36), "10");
	}

	#[test]
	fn json_decode_failure_names_path() {
		#[derive(Debug, Deserialize)]
		struct User {
			#[allow(dead_code)]
			id: u64,
		}

		let response = ApiResponse {
			status: 200,
			headers: HeaderMap::new(),
			body: br#"{"id":"nope"}"#.to_vec(),
			request_id: None,
		};
		let err = response.json::<User>().expect_err("Mismatched body should fail to decode.");

		assert_eq!(err.code, "CLIENT_ERROR");
		assert!(err.message.contains("`id`"), "Unexpected message: {}", err.message);
	}
}
