//! Optional observability helpers for the dispatcher.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit `api_session.dispatch`, `api_session.refresh`, and
//!   `api_session.session` spans (see [`ClientSpan`]), plus debug/warn events for retries and
//!   session changes.
//! - Enable `metrics` to publish `api_session_operation_total{operation, outcome}`,
//!   `api_session_attempt_total{class}`, and the `api_session_retry_delay_seconds` histogram.
//!
//! Without the features every helper compiles to a no-op.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// One logical request through [`Dispatcher::execute`](crate::Dispatcher::execute).
	Dispatch,
	/// Session refresh.
	Refresh,
	/// Session establishment, restore, or logout.
	Session,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Dispatch => "dispatch",
			Operation::Refresh => "refresh",
			Operation::Session => "session",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Transient failure followed by another attempt.
	Retry,
	/// Joined an operation another caller already completed.
	Coalesced,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::Retry => "retry",
			Outcome::Coalesced => "coalesced",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
