//! Credential models and client-side expiry inspection.

pub mod claims;
pub mod credential;

pub use claims::*;
pub use credential::*;
