//! Access and refresh credentials with redacted formatting.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::claims};

const FINGERPRINT_LEN: usize = 12;

/// Short-lived bearer credential; never persisted.
///
/// The `exp` claim is decoded once at construction. Tokens whose expiry cannot be read are
/// still usable for requests but always count as expired, so the dispatcher refreshes them
/// before use.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
	secret: String,
	expires_at: Option<OffsetDateTime>,
}
impl AccessCredential {
	/// Wraps a bearer token and decodes its expiry claim.
	pub fn new(value: impl Into<String>) -> Self {
		let secret = value.into();
		let expires_at = claims::decode_expiry(&secret).ok();

		Self { secret, expires_at }
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.secret
	}

	/// Expiry decoded from the token, if readable.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Checks expiry against the current clock.
	pub fn is_expired(&self, buffer: Duration) -> bool {
		self.is_expired_at(buffer, OffsetDateTime::now_utc())
	}

	/// Checks expiry against `now`, failing closed when no expiry is known.
	pub fn is_expired_at(&self, buffer: Duration, now: OffsetDateTime) -> bool {
		match self.expires_at {
			Some(expires_at) => claims::expiry_within(expires_at, buffer, now),
			None => true,
		}
	}

	/// Stable, non-reversible identifier safe to log.
	pub fn fingerprint(&self) -> String {
		fingerprint(&self.secret)
	}
}
impl Debug for AccessCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessCredential")
			.field("token", &"<redacted>")
			.field("fingerprint", &self.fingerprint())
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
impl Display for AccessCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Longer-lived credential exchanged for a new session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshCredential(String);
impl RefreshCredential {
	/// Wraps a refresh token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Stable, non-reversible identifier safe to log.
	pub fn fingerprint(&self) -> String {
		fingerprint(&self.0)
	}
}
impl Debug for RefreshCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("RefreshCredential").field(&"<redacted>").finish()
	}
}
impl Display for RefreshCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

fn fingerprint(secret: &str) -> String {
	let digest = Sha256::digest(secret.as_bytes());
	let mut encoded = STANDARD_NO_PAD.encode(digest);

	encoded.truncate(FINGERPRINT_LEN);

	encoded
}
