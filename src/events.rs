//! Session change notifications.
//!
//! The client layer never reaches into application state. It reports credential changes to
//! registered [`SessionObserver`]s and leaves the reaction (navigation, cache resets, sign-out
//! screens) to them.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, auth::AccessCredential};

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearReason {
	/// Explicit sign-out.
	Logout,
	/// A refresh was needed but no refresh credential was stored.
	MissingRefreshCredential,
	/// The refresh endpoint rejected the refresh credential or failed.
	RefreshFailed,
	/// The request replayed after a successful refresh was rejected again.
	ReplayRejected,
}
impl ClearReason {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			ClearReason::Logout => "logout",
			ClearReason::MissingRefreshCredential => "missing_refresh_credential",
			ClearReason::RefreshFailed => "refresh_failed",
			ClearReason::ReplayRejected => "replay_rejected",
		}
	}
}
impl Display for ClearReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Receives session change notifications.
///
/// Callbacks run synchronously on the task that changed the session and must not block.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// A new access credential is in place.
	fn on_credentials_updated(&self, _access: &AccessCredential) {}

	/// Both credentials were dropped.
	fn on_credentials_cleared(&self, _reason: ClearReason) {}
}

/// Handle returned by [`SessionEvents::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registry of session observers.
#[derive(Default)]
pub struct SessionEvents {
	observers: RwLock<Vec<(ObserverId, Arc<dyn SessionObserver>)>>,
	next_id: AtomicU64,
}
impl SessionEvents {
	/// Registers `observer`.
	pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) -> ObserverId {
		let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.observers.write().push((id, observer));

		id
	}

	/// Removes a previously registered observer. Returns `false` if it was unknown.
	pub fn unsubscribe(&self, id: ObserverId) -> bool {
		let mut observers = self.observers.write();
		let before = observers.len();

		observers.retain(|(existing, _)| *existing != id);

		observers.len() != before
	}

	/// Number of registered observers.
	pub fn len(&self) -> usize {
		self.observers.read().len()
	}

	/// Returns `true` when nobody is listening.
	pub fn is_empty(&self) -> bool {
		self.observers.read().is_empty()
	}

	pub(crate) fn notify_updated(&self, access: &AccessCredential) {
		for observer in self.current() {
			observer.on_credentials_updated(access);
		}
	}

	pub(crate) fn notify_cleared(&self, reason: ClearReason) {
		for observer in self.current() {
			observer.on_credentials_cleared(reason);
		}
	}

	// Observers are called outside the lock so they may subscribe or unsubscribe.
	fn current(&self) -> Vec<Arc<dyn SessionObserver>> {
		self.observers.read().iter().map(|(_, observer)| observer.clone()).collect()
	}
}
impl Debug for SessionEvents {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionEvents").field("observers", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Default)]
	struct Recorder(Mutex<Vec<String>>);
	impl SessionObserver for Recorder {
		fn on_credentials_updated(&self, access: &AccessCredential) {
			self.0.lock().push(format!("updated:{}", access.expose()));
		}

		fn on_credentials_cleared(&self, reason: ClearReason) {
			self.0.lock().push(format!("cleared:{reason}"));
		}
	}

	struct Silent;
	impl SessionObserver for Silent {}

	#[test]
	fn observers_receive_events_in_order() {
		let events = SessionEvents::default();
		let recorder = Arc::new(Recorder::default());

		events.subscribe(recorder.clone());
		events.subscribe(Arc::new(Silent));
		events.notify_updated(&AccessCredential::new("a-1"));
		events.notify_cleared(ClearReason::RefreshFailed);

		assert_eq!(*recorder.0.lock(), vec!["updated:a-1", "cleared:refresh_failed"]);
	}

	#[test]
	fn unsubscribe_stops_delivery() {
		let events = SessionEvents::default();
		let recorder = Arc::new(Recorder::default());
		let id = events.subscribe(recorder.clone());

		assert!(events.unsubscribe(id));
		assert!(!events.unsubscribe(id));
		assert!(events.is_empty());

		events.notify_cleared(ClearReason::Logout);

		assert!(recorder.0.lock().is_empty());
	}
}
