//! In-process [`RefreshStorage`] for tests and short-lived clients.

// self
use crate::{
	_prelude::*,
	auth::RefreshCredential,
	store::{RefreshStorage, StoreError},
};

/// Shared in-memory slot. Clones observe the same slot, so a new [`TokenStore`] opened over a
/// clone behaves like a soft reload.
///
/// [`TokenStore`]: crate::store::TokenStore
#[derive(Clone, Debug, Default)]
pub struct MemoryRefreshStorage(Arc<Mutex<Option<RefreshCredential>>>);
impl MemoryRefreshStorage {
	/// Returns the stored credential without going through a
	/// [`TokenStore`](crate::store::TokenStore).
	pub fn peek(&self) -> Option<RefreshCredential> {
		self.0.lock().clone()
	}
}
impl RefreshStorage for MemoryRefreshStorage {
	fn load(&self) -> Result<Option<RefreshCredential>, StoreError> {
		Ok(self.peek())
	}

	fn persist(&self, credential: Option<&RefreshCredential>) -> Result<(), StoreError> {
		*self.0.lock() = credential.cloned();

		Ok(())
	}
}
