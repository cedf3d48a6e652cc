//! Session credential storage.
//!
//! [`TokenStore`] keeps the access credential in memory for the lifetime of the process and
//! writes the refresh credential through a [`RefreshStorage`] backend so it survives a soft
//! reload. Login, refresh, and logout go through [`TokenStore::set_session`] and
//! [`TokenStore::clear_session`], which swap both credentials under one lock so readers never
//! observe a half-installed session.

pub mod file;
pub mod memory;

pub use file::FileRefreshStorage;
pub use memory::MemoryRefreshStorage;

// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, RefreshCredential},
};

/// Persistence backend for the refresh credential.
pub trait RefreshStorage
where
	Self: Send + Sync,
{
	/// Loads the persisted refresh credential, if any.
	fn load(&self) -> Result<Option<RefreshCredential>, StoreError>;

	/// Replaces the persisted refresh credential; `None` removes it.
	fn persist(&self, credential: Option<&RefreshCredential>) -> Result<(), StoreError>;
}

/// Error type produced by [`RefreshStorage`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Point-in-time view of the session used by the dispatcher.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
	/// Access credential at the time of the snapshot.
	pub access: Option<AccessCredential>,
	/// Whether a refresh credential was present.
	pub has_refresh: bool,
	/// Session epoch at the time of the snapshot.
	pub epoch: u64,
}
impl SessionSnapshot {
	/// Returns `true` when either credential was present.
	pub fn has_credentials(&self) -> bool {
		self.access.is_some() || self.has_refresh
	}
}

#[derive(Debug, Default)]
struct Session {
	access: Option<AccessCredential>,
	refresh: Option<RefreshCredential>,
	epoch: u64,
}
impl Session {
	fn bump(&mut self) {
		self.epoch = self.epoch.wrapping_add(1);
	}
}

/// Owner of the access/refresh credential pair.
pub struct TokenStore {
	session: RwLock<Session>,
	storage: Arc<dyn RefreshStorage>,
}
impl TokenStore {
	/// Opens a store over `storage`, restoring any persisted refresh credential.
	pub fn new(storage: Arc<dyn RefreshStorage>) -> Result<Self, StoreError> {
		let refresh = storage.load()?;

		Ok(Self { session: RwLock::new(Session { access: None, refresh, epoch: 0 }), storage })
	}

	/// Creates an empty store backed by [`MemoryRefreshStorage`].
	pub fn in_memory() -> Self {
		Self { session: Default::default(), storage: Arc::new(MemoryRefreshStorage::default()) }
	}

	/// Current access credential.
	pub fn access(&self) -> Option<AccessCredential> {
		self.session.read().access.clone()
	}

	/// Current refresh credential.
	pub fn refresh(&self) -> Option<RefreshCredential> {
		self.session.read().refresh.clone()
	}

	/// Replaces only the access credential.
	pub fn set_access(&self, access: Option<AccessCredential>) {
		let mut session = self.session.write();

		session.access = access;
		session.bump();
	}

	/// Replaces only the refresh credential, persisting it first.
	pub fn set_refresh(&self, refresh: Option<RefreshCredential>) -> Result<(), StoreError> {
		let mut session = self.session.write();

		self.storage.persist(refresh.as_ref())?;

		session.refresh = refresh;
		session.bump();

		Ok(())
	}

	/// Installs a new credential pair atomically.
	///
	/// The refresh credential is persisted before either value is published; on persistence
	/// failure the previous session stays in place.
	pub fn set_session(
		&self,
		access: AccessCredential,
		refresh: RefreshCredential,
	) -> Result<(), StoreError> {
		let mut session = self.session.write();

		self.storage.persist(Some(&refresh))?;

		session.access = Some(access);
		session.refresh = Some(refresh);
		session.bump();

		Ok(())
	}

	/// Installs a new credential pair only if the session is still at `expected_epoch`.
	///
	/// Returns `Ok(false)` without touching storage when another mutation won the race.
	pub fn compare_and_set_session(
		&self,
		expected_epoch: u64,
		access: AccessCredential,
		refresh: RefreshCredential,
	) -> Result<bool, StoreError> {
		let mut session = self.session.write();

		if session.epoch != expected_epoch {
			return Ok(false);
		}

		self.storage.persist(Some(&refresh))?;

		session.access = Some(access);
		session.refresh = Some(refresh);
		session.bump();

		Ok(true)
	}

	/// Drops both credentials atomically.
	///
	/// Memory is always cleared; a persistence failure is still reported.
	pub fn clear_session(&self) -> Result<(), StoreError> {
		let mut session = self.session.write();

		session.access = None;
		session.refresh = None;
		session.bump();

		self.storage.persist(None)
	}

	/// Returns `true` when an access credential is present.
	pub fn has_access(&self) -> bool {
		self.session.read().access.is_some()
	}

	/// Returns `true` when a refresh credential is present.
	pub fn has_refresh(&self) -> bool {
		self.session.read().refresh.is_some()
	}

	/// Returns `true` when an access credential exists and expires within `buffer`.
	///
	/// An absent access credential is not "expired"; there is nothing to refresh proactively.
	pub fn is_access_expired(&self, buffer: Duration) -> bool {
		self.session.read().access.as_ref().is_some_and(|access| access.is_expired(buffer))
	}

	/// Counter bumped by every credential mutation.
	pub fn epoch(&self) -> u64 {
		self.session.read().epoch
	}

	/// Reads access, refresh presence, and epoch under one lock.
	pub fn snapshot(&self) -> SessionSnapshot {
		let session = self.session.read();

		SessionSnapshot {
			access: session.access.clone(),
			has_refresh: session.refresh.is_some(),
			epoch: session.epoch,
		}
	}
}
impl Default for TokenStore {
	fn default() -> Self {
		Self::in_memory()
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let session = self.session.read();

		f.debug_struct("TokenStore")
			.field("access", &session.access)
			.field("refresh", &session.refresh)
			.field("epoch", &session.epoch)
			.finish()
	}
}
