//! Connectivity probes consulted before any network attempt.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::_prelude::*;

/// Reports whether the host environment believes it is online.
pub trait Connectivity
where
	Self: Send + Sync,
{
	/// Returns `false` when requests should short-circuit as offline.
	fn is_online(&self) -> bool;
}

/// Probe for environments without connectivity signals.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnline;
impl Connectivity for AlwaysOnline {
	fn is_online(&self) -> bool {
		true
	}
}

/// Shared flag the host flips from its own network-change events.
#[derive(Clone, Debug)]
pub struct ConnectivityFlag(Arc<AtomicBool>);
impl ConnectivityFlag {
	/// Creates a flag with the given initial state.
	pub fn new(online: bool) -> Self {
		Self(Arc::new(AtomicBool::new(online)))
	}

	/// Updates the state; clones observe the change.
	pub fn set_online(&self, online: bool) {
		self.0.store(online, Ordering::Release);
	}
}
impl Default for ConnectivityFlag {
	fn default() -> Self {
		Self::new(true)
	}
}
impl Connectivity for ConnectivityFlag {
	fn is_online(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}
