//! Single-flight session refresh.
//!
//! [`AuthRefreshCoordinator`] exchanges the stored refresh credential for a new session. The
//! exchange runs on a task the coordinator owns and its outcome is published through a shared
//! cell, so every trigger (the one that started it included) only waits on that cell. Dropping a
//! waiting request never aborts the exchange and never lets a second caller resend the same
//! refresh credential. A trigger whose observed session epoch is already stale reuses the current
//! session without calling the network. Any failure ends the session and notifies observers.
//!
//! Refreshes are spawned with [`tokio::spawn`] and therefore need a Tokio runtime.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use async_lock::OnceCell;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, RefreshCredential},
	events::{ClearReason, SessionEvents},
	normalize::{ErrorNormalizer, RawFailure, catalog},
	obs::{self, ClientSpan, Operation, Outcome},
	request::RequestDescriptor,
	retry::RequestExecutor,
	store::{StoreError, TokenStore},
};

/// Path of the refresh endpoint unless configured otherwise.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

type RefreshOutcome = Result<AccessCredential, AppError>;
type InFlight = Arc<OnceCell<RefreshOutcome>>;

/// Refresh lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshState {
	/// No refresh in progress.
	#[default]
	Idle,
	/// A refresh call is in flight.
	Refreshing,
	/// The last refresh failed and the session was cleared.
	Failed,
}

enum Trigger {
	Started(InFlight),
	Joined(InFlight),
	Stale,
	MissingCredential,
}

/// Owns the in-flight refresh and installs its result.
pub struct AuthRefreshCoordinator {
	executor: Arc<RequestExecutor>,
	store: Arc<TokenStore>,
	events: Arc<SessionEvents>,
	normalizer: ErrorNormalizer,
	refresh_path: String,
	in_flight: Mutex<Option<InFlight>>,
	state: Mutex<RefreshState>,
	metrics: Arc<RefreshMetrics>,
}
impl AuthRefreshCoordinator {
	/// Creates a coordinator that posts to `refresh_path` through `executor`.
	pub fn new(
		executor: Arc<RequestExecutor>,
		store: Arc<TokenStore>,
		events: Arc<SessionEvents>,
		normalizer: ErrorNormalizer,
		refresh_path: impl Into<String>,
	) -> Self {
		Self {
			executor,
			store,
			events,
			normalizer,
			refresh_path: refresh_path.into(),
			in_flight: Mutex::new(None),
			state: Mutex::new(RefreshState::Idle),
			metrics: Default::default(),
		}
	}

	/// Current lifecycle state.
	pub fn state(&self) -> RefreshState {
		*self.state.lock()
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Refresh endpoint path.
	pub fn refresh_path(&self) -> &str {
		&self.refresh_path
	}

	/// Refreshes the session observed at `observed_epoch`.
	///
	/// Returns the access credential to use next. While an exchange is in flight every caller
	/// waits for its outcome. When the session already moved past `observed_epoch`, no network
	/// call is made: the current credential is returned, or `AUTH_REFRESH_FAILED` if the session
	/// was ended.
	pub async fn refresh(self: &Arc<Self>, observed_epoch: u64) -> Result<AccessCredential> {
		const OPERATION: Operation = Operation::Refresh;

		let span = ClientSpan::refresh(observed_epoch);

		obs::record_outcome(OPERATION, Outcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.refresh_single_flight(observed_epoch, &span)).await;
		let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };

		span.record_outcome(outcome);
		obs::record_outcome(OPERATION, outcome);

		result
	}

	/// Refreshes the session as it is right now.
	pub async fn refresh_now(self: &Arc<Self>) -> Result<AccessCredential> {
		self.refresh(self.store.epoch()).await
	}

	/// Clears both credentials and notifies observers, even when persistence fails.
	pub(crate) fn end_session(&self, reason: ClearReason) -> Result<(), StoreError> {
		let result = self.store.clear_session();

		obs::trace_session(reason.as_str(), None);
		self.events.notify_cleared(reason);

		result
	}

	async fn refresh_single_flight(
		self: &Arc<Self>,
		observed_epoch: u64,
		span: &ClientSpan,
	) -> Result<AccessCredential> {
		let in_flight = match self.trigger(observed_epoch, span) {
			Trigger::Started(in_flight) => in_flight,
			Trigger::Joined(in_flight) => {
				self.record_coalesced();

				in_flight
			},
			Trigger::Stale => {
				self.record_coalesced();

				return self.store.access().ok_or_else(|| refresh_failed(None));
			},
			Trigger::MissingCredential =>
				return Err(self.fail(ClearReason::MissingRefreshCredential, None)),
		};

		in_flight.wait().await.clone()
	}

	// Decides under the slot lock so at most one exchange is ever in flight.
	fn trigger(self: &Arc<Self>, observed_epoch: u64, span: &ClientSpan) -> Trigger {
		let mut slot = self.in_flight.lock();

		if let Some(in_flight) = slot.as_ref() {
			return Trigger::Joined(in_flight.clone());
		}
		if self.store.epoch() != observed_epoch {
			return Trigger::Stale;
		}

		*self.state.lock() = RefreshState::Refreshing;

		let Some(refresh) = self.store.refresh() else {
			return Trigger::MissingCredential;
		};
		let in_flight = Arc::new(OnceCell::new());
		let published = in_flight.clone();
		let this = self.clone();

		self.metrics.record_network_call();
		*slot = Some(in_flight.clone());

		tokio::spawn(span.instrument(async move {
			let outcome = this.rotate(observed_epoch, refresh).await;

			this.in_flight.lock().take();

			let _ = published.set(outcome).await;
		}));

		Trigger::Started(in_flight)
	}

	async fn rotate(&self, observed_epoch: u64, refresh: RefreshCredential) -> RefreshOutcome {
		let pair = match self.exchange(&refresh).await {
			Ok(pair) => pair,
			Err(cause) => return Err(self.fail(ClearReason::RefreshFailed, Some(cause))),
		};
		let access = AccessCredential::new(pair.access_token);
		let refresh = pair.refresh_token.map(RefreshCredential::new).unwrap_or(refresh);

		match self.store.compare_and_set_session(observed_epoch, access.clone(), refresh) {
			Ok(true) => {},
			// The session changed while the call was in flight (e.g. logout); it wins.
			Ok(false) => {
				*self.state.lock() = RefreshState::Idle;

				return self.store.access().ok_or_else(|| refresh_failed(None));
			},
			Err(e) => return Err(self.fail(ClearReason::RefreshFailed, Some(e.into()))),
		}

		*self.state.lock() = RefreshState::Idle;

		self.metrics.record_success();
		obs::trace_session("refreshed", Some(&access.fingerprint()));
		self.events.notify_updated(&access);

		Ok(access)
	}

	async fn exchange(&self, refresh: &RefreshCredential) -> Result<TokenPair> {
		let descriptor = RequestDescriptor::post(self.refresh_path.as_str())
			.json(&RefreshRequest { refresh_token: refresh.expose() })?
			.anonymous();
		let response = self
			.executor
			.send_once(&descriptor)
			.await
			.map_err(|raw| self.normalizer.normalize(raw))?;

		parse_token_pair(&response.body)
			.map_err(|message| self.normalizer.normalize(RawFailure::Client { message }))
	}

	fn record_coalesced(&self) {
		self.metrics.record_coalesced();
		obs::record_outcome(Operation::Refresh, Outcome::Coalesced);
	}

	fn fail(&self, reason: ClearReason, cause: Option<AppError>) -> AppError {
		*self.state.lock() = RefreshState::Failed;

		self.metrics.record_failure();

		if let Some(cause) = &cause {
			obs::trace_warning("refresh", cause);
		}

		if let Err(e) = self.end_session(reason) {
			obs::trace_warning("clear_session", &e);
		}

		refresh_failed(cause)
	}
}
impl Debug for AuthRefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthRefreshCoordinator")
			.field("refresh_path", &self.refresh_path)
			.field("state", &self.state())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
	refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

fn parse_token_pair(body: &[u8]) -> Result<TokenPair, String> {
	let value = serde_json::from_slice::<Value>(body)
		.map_err(|e| format!("Refresh response is not valid JSON: {e}."))?;
	let payload = match value {
		Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) =>
			map.remove("data").unwrap_or_default(),
		other => other,
	};
	let pair: TokenPair = serde_path_to_error::deserialize(payload).map_err(|e| {
		format!("Refresh response is invalid at `{}`: {}.", e.path(), e.inner())
	})?;

	if pair.access_token.trim().is_empty() {
		return Err("Refresh response carried an empty access token.".into());
	}

	Ok(pair)
}

fn refresh_failed(cause: Option<AppError>) -> AppError {
	let message = catalog::message_for(catalog::AUTH_REFRESH_FAILED)
		.unwrap_or(catalog::GENERIC_UNKNOWN_MESSAGE);
	let mut error = AppError::new(catalog::AUTH_REFRESH_FAILED, message).with_status(401);

	if let Some(cause) = cause {
		if let Some(request_id) = cause.request_id {
			error.message = format!("{} (Ref: {request_id})", error.message);
			error.request_id = Some(request_id);
		}

		error.details = Some(serde_json::json!({ "cause": cause.code }));
	}

	error
}
