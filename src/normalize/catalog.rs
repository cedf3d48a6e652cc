//! Stable error codes and their user-facing messages.

/// Access credential expired.
pub const AUTH_TOKEN_EXPIRED: &str = "AUTH_TOKEN_EXPIRED";
/// Access credential rejected.
pub const AUTH_TOKEN_INVALID: &str = "AUTH_TOKEN_INVALID";
/// Refresh credential rejected or missing; the session is gone.
pub const AUTH_REFRESH_FAILED: &str = "AUTH_REFRESH_FAILED";
/// Login credentials rejected.
pub const AUTH_INVALID_CREDENTIALS: &str = "AUTH_INVALID_CREDENTIALS";
/// Caller lacks permission.
pub const AUTHZ_FORBIDDEN: &str = "AUTHZ_FORBIDDEN";
/// Caller lacks a required role.
pub const AUTHZ_ROLE_REQUIRED: &str = "AUTHZ_ROLE_REQUIRED";
/// Request payload failed validation.
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
/// Caller exceeded a rate limit.
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
/// Caller's tenant has been disabled.
pub const TENANT_DISABLED: &str = "TENANT_DISABLED";
/// Server failed without a specific code.
pub const SERVER_ERROR: &str = "SERVER_ERROR";
/// Device has no connectivity.
pub const CLIENT_OFFLINE: &str = "CLIENT_OFFLINE";
/// Connectivity failure before any response arrived.
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
/// Local failure raised while preparing or handling a request.
pub const CLIENT_ERROR: &str = "CLIENT_ERROR";
/// Input that matched no other classification.
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Fallback when neither the table nor the server supplies a message.
pub const GENERIC_SERVER_MESSAGE: &str = "Something went wrong on our side. Please try again.";
/// Message for [`UNKNOWN_ERROR`].
pub const GENERIC_UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// Returns the curated message for a known code.
pub fn message_for(code: &str) -> Option<&'static str> {
	let message = match code {
		AUTH_TOKEN_EXPIRED => "Your session has expired. Please sign in again.",
		AUTH_TOKEN_INVALID | AUTH_REFRESH_FAILED | "HTTP_401" =>
			"Your session is no longer valid. Please sign in again.",
		AUTH_INVALID_CREDENTIALS => "The email or password you entered is incorrect.",
		AUTHZ_FORBIDDEN | "HTTP_403" => "You do not have permission to perform this action.",
		AUTHZ_ROLE_REQUIRED => "Your role does not allow this action.",
		VALIDATION_FAILED | "HTTP_422" => "Some of the information provided is invalid.",
		RATE_LIMIT_EXCEEDED | "HTTP_429" => "Too many requests.",
		TENANT_DISABLED => "This organization has been disabled. Contact your administrator.",
		"HTTP_400" => "The request could not be processed.",
		"HTTP_404" => "The requested resource was not found.",
		"HTTP_409" => "The request conflicts with the current state of the resource.",
		SERVER_ERROR | "HTTP_500" => GENERIC_SERVER_MESSAGE,
		"HTTP_502" | "HTTP_504" => "The server is temporarily unreachable. Please try again.",
		"HTTP_503" => "The service is temporarily unavailable. Please try again shortly.",
		CLIENT_OFFLINE => "You appear to be offline. Check your connection and try again.",
		NETWORK_ERROR => "Unable to reach the server. Check your connection and try again.",
		UNKNOWN_ERROR => GENERIC_UNKNOWN_MESSAGE,
		_ => return None,
	};

	Some(message)
}

/// Returns `true` for rate-limit codes.
pub fn is_rate_limit_code(code: &str) -> bool {
	code == "HTTP_429" || code.starts_with("RATE_LIMIT")
}

/// Formats a wait as `45s`, `1m 30s`, `2m`, or `1h 5m`.
pub fn format_wait(seconds: u64) -> String {
	let hours = seconds / 3_600;
	let minutes = seconds % 3_600 / 60;
	let secs = seconds % 60;

	match (hours, minutes, secs) {
		(0, 0, s) => format!("{s}s"),
		(0, m, 0) => format!("{m}m"),
		(0, m, s) => format!("{m}m {s}s"),
		(h, 0, _) => format!("{h}h"),
		(h, m, _) => format!("{h}h {m}m"),
	}
}
