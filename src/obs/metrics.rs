// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{Operation, Outcome};

/// Increments `api_session_operation_total{operation, outcome}` (when enabled).
pub fn record_outcome(operation: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"api_session_operation_total",
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}

/// Increments `api_session_attempt_total{class}` for one network attempt.
///
/// `status` is `None` when the transport failed before a response arrived.
pub fn record_attempt(status: Option<u16>) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("api_session_attempt_total", "class" => status_class(status))
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = status;
	}
}

/// Records the backoff before a retry in `api_session_retry_delay_seconds`.
pub fn record_retry_delay(delay: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("api_session_retry_delay_seconds").record(delay.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = delay;
	}
}

/// Low-cardinality label for an attempt result.
pub fn status_class(status: Option<u16>) -> &'static str {
	match status {
		None => "transport",
		Some(100..=199) => "1xx",
		Some(200..=299) => "2xx",
		Some(300..=399) => "3xx",
		Some(400..=499) => "4xx",
		Some(500..=599) => "5xx",
		Some(_) => "other",
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_class_buckets_by_hundreds() {
		assert_eq!(status_class(None), "transport");
		assert_eq!(status_class(Some(204)), "2xx");
		assert_eq!(status_class(Some(401)), "4xx");
		assert_eq!(status_class(Some(503)), "5xx");
		assert_eq!(status_class(Some(999)), "other");
	}

	#[test]
	fn recorders_are_safe_without_recorder() {
		record_outcome(Operation::Dispatch, Outcome::Retry);
		record_attempt(Some(503));
		record_retry_delay(StdDuration::from_millis(300));
	}
}
