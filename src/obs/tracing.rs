// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, obs::Outcome, request::RequestDescriptor};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type Instrumented<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type Instrumented<F> = F;

/// Span around one dispatcher stage.
///
/// - `api_session.dispatch`: `method`, `target`, `anonymous`, `outcome`.
/// - `api_session.refresh`: `epoch` (the session epoch that triggered it), `outcome`.
/// - `api_session.session`: `action` (`establish`, `logout`, `restore`).
#[derive(Clone, Debug)]
pub struct ClientSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl ClientSpan {
	/// Span for one logical request.
	pub fn dispatch(descriptor: &RequestDescriptor) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"api_session.dispatch",
				method = %descriptor.method(),
				target = descriptor.target(),
				anonymous = descriptor.is_anonymous(),
				outcome = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = descriptor;

			Self {}
		}
	}

	/// Span for a refresh triggered at `observed_epoch`.
	pub fn refresh(observed_epoch: u64) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"api_session.refresh",
				epoch = observed_epoch,
				outcome = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = observed_epoch;

			Self {}
		}
	}

	/// Span for a login, logout, or bootstrap restore.
	pub fn session(action: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("api_session.session", action) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = action;

			Self {}
		}
	}

	/// Fills the `outcome` field once the stage settles.
	pub fn record_outcome(&self, outcome: Outcome) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = outcome;
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> ClientSpanGuard {
		#[cfg(feature = "tracing")]
		{
			ClientSpanGuard { _guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			ClientSpanGuard {}
		}
	}

	/// Instruments a future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Guard returned by [`ClientSpan::entered`].
pub struct ClientSpanGuard {
	#[cfg(feature = "tracing")]
	_guard: tracing::span::EnteredSpan,
}
impl Debug for ClientSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ClientSpanGuard(..)")
	}
}

/// Debug event for a scheduled retry.
pub(crate) fn trace_retry(attempt: u32, delay: StdDuration, cause: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, cause, "Retrying request.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, delay, cause);
	}
}

/// Debug event for a session change, tagged with the credential fingerprint.
pub(crate) fn trace_session(event: &'static str, fingerprint: Option<&str>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(event, fingerprint, "Session changed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (event, fingerprint);
	}
}

/// Warning for a failure that does not reach the caller.
pub(crate) fn trace_warning(stage: &'static str, detail: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(stage, detail = %detail, "Operation degraded.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, detail);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spans_and_events_are_safe_without_subscriber() {
		let span = ClientSpan::dispatch(&RequestDescriptor::get("/users"));

		span.record_outcome(Outcome::Success);

		let _guard = ClientSpan::session("logout").entered();

		trace_retry(1, StdDuration::from_millis(300), "HTTP_503");
		trace_session("cleared", None);
		trace_warning("test", &"detail");
	}

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = ClientSpan::refresh(7);
		let value = span.instrument(async { 42 }).await;

		span.record_outcome(Outcome::Coalesced);

		assert_eq!(value, 42);
	}
}
