//! Resilient, session-aware API client layer: one entry point that attaches credentials and
//! correlation metadata, retries idempotent requests with backoff, refreshes expired sessions
//! exactly once per need, and normalizes every failure into a single [`AppError`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod http;
pub mod normalize;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod retry;
pub mod store;

#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports for integration tests.

	pub use crate::_prelude::*;

	/// Builds a reqwest transport that accepts the self-signed certificates `httpmock` serves.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport() -> crate::http::ReqwestTransport {
		let client = reqwest::Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		crate::http::ReqwestTransport::with_client(client)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{AppError, Result};
}

pub use ::http::Method;
pub use config::ClientConfig;
pub use dispatch::Dispatcher;
pub use error::AppError;
pub use request::{ApiResponse, RequestDescriptor};
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
