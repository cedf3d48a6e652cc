//! Composition root: the single entry point for outbound API calls.
//!
//! [`Dispatcher::execute`] runs the whole request lifecycle:
//!
//! 1. Proactive refresh when the stored access credential is about to expire.
//! 2. Execution with per-attempt headers and idempotency-aware retries.
//! 3. On HTTP 401 for a request that carried a session, one single-flight refresh followed by
//!    exactly one replay of the same descriptor.
//! 4. Normalization of any terminal failure into an [`AppError`].
//!
//! Session establishment (login), logout, and bootstrap restore live here too so every session
//! mutation flows through the same store, coordinator, and observers.

// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, RefreshCredential},
	config::ClientConfig,
	error::ConfigError,
	events::{ClearReason, SessionEvents, SessionObserver},
	http::{AlwaysOnline, Connectivity, HttpTransport},
	normalize::ErrorNormalizer,
	obs::{self, ClientSpan, Operation, Outcome},
	refresh::{AuthRefreshCoordinator, RefreshMetrics, RefreshState},
	request::{ApiResponse, RequestDescriptor},
	retry::RequestExecutor,
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Session-aware request dispatcher.
///
/// Cloning is cheap; clones share the store, the refresh gate, and the observer registry.
#[derive(Clone)]
pub struct Dispatcher {
	config: Arc<ClientConfig>,
	store: Arc<TokenStore>,
	events: Arc<SessionEvents>,
	executor: Arc<RequestExecutor>,
	coordinator: Arc<AuthRefreshCoordinator>,
	normalizer: ErrorNormalizer,
}
impl Dispatcher {
	/// Creates a dispatcher over the default reqwest transport and an in-memory store.
	#[cfg(feature = "reqwest")]
	pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
		Self::builder(config).build()
	}

	/// Starts a builder for custom transports, stores, probes, or observers.
	pub fn builder(config: ClientConfig) -> DispatcherBuilder {
		DispatcherBuilder::new(config)
	}

	/// Executes one logical request.
	///
	/// Resolves with the response for any status below 400; every other outcome becomes exactly
	/// one [`AppError`].
	pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse> {
		const OPERATION: Operation = Operation::Dispatch;

		let span = ClientSpan::dispatch(descriptor);

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span.instrument(self.dispatch(descriptor)).await;
		let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };

		span.record_outcome(outcome);
		obs::record_outcome(OPERATION, outcome);

		result
	}

	/// Installs the credential pair returned by a login call and notifies observers.
	pub fn establish_session(
		&self,
		access: AccessCredential,
		refresh: RefreshCredential,
	) -> Result<()> {
		let _span = ClientSpan::session("establish").entered();

		self.store.set_session(access.clone(), refresh)?;
		obs::record_outcome(Operation::Session, Outcome::Success);
		obs::trace_session("established", Some(&access.fingerprint()));
		self.events.notify_updated(&access);

		Ok(())
	}

	/// Drops both credentials and notifies observers.
	///
	/// Memory is always cleared; a failure to remove the persisted refresh credential is still
	/// reported.
	pub fn logout(&self) -> Result<()> {
		let _span = ClientSpan::session("logout").entered();

		self.coordinator.end_session(ClearReason::Logout).map_err(AppError::from)
	}

	/// Bootstrap hook: refreshes silently when only a refresh credential survived a reload.
	///
	/// Returns the access credential in effect afterwards, if any.
	pub async fn restore_session(&self) -> Result<Option<AccessCredential>> {
		let snapshot = self.store.snapshot();

		if snapshot.access.is_some() || !snapshot.has_refresh {
			return Ok(snapshot.access);
		}

		let span = ClientSpan::session("restore");

		span.instrument(self.coordinator.refresh(snapshot.epoch)).await.map(Some)
	}

	/// Credential store.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.store
	}

	/// Observer registry.
	pub fn events(&self) -> &Arc<SessionEvents> {
		&self.events
	}

	/// Refresh lifecycle state.
	pub fn refresh_state(&self) -> RefreshState {
		self.coordinator.state()
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	/// Configuration in effect.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Normalizer used for terminal failures, for callers classifying their own errors.
	pub fn normalizer(&self) -> &ErrorNormalizer {
		&self.normalizer
	}

	async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse> {
		if !descriptor.is_anonymous() {
			self.refresh_if_expiring().await;
		}

		let snapshot = self.store.snapshot();
		let failure = match self.executor.execute(descriptor).await {
			Ok(response) => return Ok(response),
			Err(failure) => failure,
		};

		if failure.status() != Some(401) || descriptor.is_anonymous() || !snapshot.has_credentials()
		{
			return Err(self.normalizer.normalize(failure));
		}

		self.coordinator.refresh(snapshot.epoch).await?;

		match self.executor.replay(descriptor).await {
			Ok(response) => Ok(response),
			Err(failure) => {
				let rejected = failure.status() == Some(401);
				let error = self.normalizer.normalize(failure);

				if rejected
					&& let Err(e) = self.coordinator.end_session(ClearReason::ReplayRejected)
				{
					obs::trace_warning("clear_session", &e);
				}

				Err(error)
			},
		}
	}

	// A failed proactive refresh has already cleared the session; the request still goes out
	// and fails on its own terms.
	async fn refresh_if_expiring(&self) {
		let snapshot = self.store.snapshot();
		let expiring = snapshot
			.access
			.as_ref()
			.is_some_and(|access| access.is_expired(self.config.expiry_buffer()));

		if expiring && let Err(e) = self.coordinator.refresh(snapshot.epoch).await {
			obs::trace_warning("proactive_refresh", &e);
		}
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("base_url", &self.config.base_url.as_str())
			.field("store", &self.store)
			.field("refresh_state", &self.coordinator.state())
			.field("observers", &self.events.len())
			.finish()
	}
}

/// Builder for [`Dispatcher`] values.
pub struct DispatcherBuilder {
	config: ClientConfig,
	transport: Option<Arc<dyn HttpTransport>>,
	store: Option<Arc<TokenStore>>,
	connectivity: Option<Arc<dyn Connectivity>>,
	observers: Vec<Arc<dyn SessionObserver>>,
}
impl DispatcherBuilder {
	/// Creates a builder around `config`.
	pub fn new(config: ClientConfig) -> Self {
		Self { config, transport: None, store: None, connectivity: None, observers: Vec::new() }
	}

	/// Uses `transport` instead of the default reqwest one.
	pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Uses an existing store, e.g. one opened over
	/// [`FileRefreshStorage`](crate::store::FileRefreshStorage).
	pub fn store(mut self, store: Arc<TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Uses a connectivity probe instead of assuming the host is always online.
	pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
		self.connectivity = Some(connectivity);

		self
	}

	/// Registers a session observer up front.
	pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
		self.observers.push(observer);

		self
	}

	/// Validates the configuration and wires the components together.
	pub fn build(self) -> Result<Dispatcher, ConfigError> {
		self.config.validate()?;

		let transport = match self.transport {
			Some(transport) => transport,
			None => default_transport()?,
		};
		let store = self.store.unwrap_or_default();
		let connectivity = self.connectivity.unwrap_or_else(|| Arc::new(AlwaysOnline));
		let normalizer = ErrorNormalizer::new(connectivity.clone());
		let events = Arc::new(SessionEvents::default());

		for observer in self.observers {
			events.subscribe(observer);
		}

		let executor = Arc::new(RequestExecutor::new(
			transport,
			store.clone(),
			connectivity,
			self.config.base_url.clone(),
			self.config.api_version.clone(),
			self.config.retry.clone(),
		));
		let coordinator = Arc::new(AuthRefreshCoordinator::new(
			executor.clone(),
			store.clone(),
			events.clone(),
			normalizer.clone(),
			self.config.refresh_path.clone(),
		));

		Ok(Dispatcher {
			config: Arc::new(self.config),
			store,
			events,
			executor,
			coordinator,
			normalizer,
		})
	}
}
impl Debug for DispatcherBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DispatcherBuilder")
			.field("config", &self.config)
			.field("transport_set", &self.transport.is_some())
			.field("store_set", &self.store.is_some())
			.field("connectivity_set", &self.connectivity.is_some())
			.field("observers", &self.observers.len())
			.finish()
	}
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn HttpTransport>, ConfigError> {
	Ok(Arc::new(ReqwestTransport::with_client(reqwest::Client::builder().build()?)))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn HttpTransport>, ConfigError> {
	Err(ConfigError::MissingTransport)
}
