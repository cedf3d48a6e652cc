//! Unverified JWT claim inspection.
//!
//! Only the payload segment is decoded; signatures are never checked. The result is a
//! client-side heuristic for deciding when to refresh, so every decoding problem is reported
//! as "expired" by [`is_expired`].

// crates.io
use base64::{
	Engine,
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::_prelude::*;

/// Margin subtracted from the `exp` claim before a token counts as live.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::seconds(30);

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reasons a token's expiry claim could not be read.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClaimsError {
	/// Token does not have the `header.payload.signature` layout.
	#[error("Token is not a three-segment JWT.")]
	Malformed,
	/// Payload segment is not base64url.
	#[error("Token payload is not valid base64url.")]
	Encoding,
	/// Payload does not decode to a JSON object.
	#[error("Token payload is not a JSON object.")]
	Payload,
	/// Payload has no numeric `exp` claim.
	#[error("Token payload has no numeric exp claim.")]
	MissingExpiry,
	/// `exp` cannot be represented as a timestamp.
	#[error("Token exp claim is out of range.")]
	ExpiryOutOfRange,
}

/// Decodes the `exp` claim of a JWT without verifying it.
pub fn decode_expiry(token: &str) -> Result<OffsetDateTime, ClaimsError> {
	let mut segments = token.split('.');
	let (Some(_header), Some(payload), Some(_signature), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		return Err(ClaimsError::Malformed);
	};

	if payload.is_empty() {
		return Err(ClaimsError::Malformed);
	}

	let bytes = PAYLOAD_ENGINE.decode(payload).map_err(|_| ClaimsError::Encoding)?;
	let claims: serde_json::Map<String, serde_json::Value> =
		serde_json::from_slice(&bytes).map_err(|_| ClaimsError::Payload)?;
	let exp = claims
		.get("exp")
		.and_then(serde_json::Value::as_f64)
		.ok_or(ClaimsError::MissingExpiry)?;

	if !exp.is_finite() {
		return Err(ClaimsError::ExpiryOutOfRange);
	}

	OffsetDateTime::from_unix_timestamp(exp.floor() as i64)
		.map_err(|_| ClaimsError::ExpiryOutOfRange)
}

/// Returns `true` unless the token's `exp` lies strictly beyond `now + buffer`.
///
/// Malformed tokens and tokens without `exp` are reported as expired.
pub fn is_expired(token: &str, buffer: Duration) -> bool {
	is_expired_at(token, buffer, OffsetDateTime::now_utc())
}

/// [`is_expired`] evaluated against an explicit instant.
pub fn is_expired_at(token: &str, buffer: Duration, now: OffsetDateTime) -> bool {
	match decode_expiry(token) {
		Ok(expires_at) => expiry_within(expires_at, buffer, now),
		Err(_) => true,
	}
}

pub(crate) fn expiry_within(
	expires_at: OffsetDateTime,
	buffer: Duration,
	now: OffsetDateTime,
) -> bool {
	let buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

	expires_at <= now + buffer
}

#[cfg(test)]
pub(crate) fn forge_token(claims: serde_json::Value) -> String {
	use base64::engine::general_purpose::URL_SAFE_NO_PAD;

	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn token_expiring_in(offset: Duration) -> String {
		let exp = (OffsetDateTime::now_utc() + offset).unix_timestamp();

		forge_token(serde_json::json!({ "sub": "user-1", "exp": exp }))
	}

	#[test]
	fn past_expiry_is_expired_with_default_buffer() {
		let token = token_expiring_in(Duration::seconds(-60));

		assert!(is_expired(&token, DEFAULT_EXPIRY_BUFFER));
	}

	#[test]
	fn expiry_inside_buffer_counts_as_expired() {
		let token = token_expiring_in(Duration::seconds(10));

		assert!(is_expired(&token, DEFAULT_EXPIRY_BUFFER));
		assert!(!is_expired(&token, Duration::ZERO));
	}

	#[test]
	fn expiry_beyond_buffer_is_live() {
		let token = token_expiring_in(Duration::minutes(15));

		assert!(!is_expired(&token, DEFAULT_EXPIRY_BUFFER));
	}

	#[test]
	fn missing_or_malformed_claims_fail_closed() {
		let no_exp = forge_token(serde_json::json!({ "sub": "user-1" }));
		let string_exp = forge_token(serde_json::json!({ "exp": "tomorrow" }));

		assert!(is_expired(&no_exp, DEFAULT_EXPIRY_BUFFER));
		assert!(is_expired(&string_exp, DEFAULT_EXPIRY_BUFFER));
		assert!(is_expired("not-a-jwt", DEFAULT_EXPIRY_BUFFER));
		assert!(is_expired("a.%%%.c", DEFAULT_EXPIRY_BUFFER));
		assert!(is_expired("", DEFAULT_EXPIRY_BUFFER));
		assert_eq!(decode_expiry("a.b"), Err(ClaimsError::Malformed));
		assert_eq!(decode_expiry(&no_exp), Err(ClaimsError::MissingExpiry));
	}

	#[test]
	fn padded_payloads_and_fractional_exp_decode() {
		use base64::engine::general_purpose::URL_SAFE;

		let payload = URL_SAFE.encode(br#"{"exp":1700000000.75}"#);
		let token = format!("h.{payload}.s");
		let expires_at = decode_expiry(&token).expect("Padded payload should decode.");

		assert_eq!(expires_at.unix_timestamp(), 1_700_000_000);
	}

	#[test]
	fn negative_buffer_is_treated_as_zero() {
		let now = OffsetDateTime::now_utc();
		let expires_at = now + Duration::seconds(5);

		assert!(!expiry_within(expires_at, Duration::seconds(-30), now));
	}
}
