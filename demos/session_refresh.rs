//! Demonstrates a dispatcher recovering from a rejected session: the first call is answered with
//! 401, the stored refresh credential is exchanged once, and the call is replayed with the new
//! access credential.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use api_session::{
	ClientConfig, Dispatcher, RequestDescriptor,
	auth::{AccessCredential, RefreshCredential},
	http::ReqwestTransport,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let revoked = unsigned_jwt("ada", Duration::hours(1));
	let rotated = unsigned_jwt("ada", Duration::hours(2));
	let rejected_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/profile")
				.header("authorization", format!("Bearer {revoked}"));
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":{"code":"AUTH_TOKEN_EXPIRED","requestId":"demo-401"}}"#);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/auth/refresh")
				.json_body(serde_json::json!({ "refreshToken": "demo-refresh-1" }));
			then.status(200).header("content-type", "application/json").json_body(
				serde_json::json!({
					"data": { "accessToken": rotated, "refreshToken": "demo-refresh-2" }
				}),
			);
		})
		.await;
	let accepted_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/profile")
				.header("authorization", format!("Bearer {rotated}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"name":"Ada Lovelace"}"#);
		})
		.await;
	let transport = ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let dispatcher = Dispatcher::builder(ClientConfig::builder(server.url("/v1")).build()?)
		.transport(Arc::new(transport))
		.build()?;

	dispatcher.establish_session(
		AccessCredential::new(revoked.clone()),
		RefreshCredential::new("demo-refresh-1"),
	)?;

	let profile = dispatcher.execute(&RequestDescriptor::get("/profile")).await?;

	println!("Profile after refresh: {}.", profile.text());
	println!("Refresh network calls: {}.", dispatcher.refresh_metrics().network_calls());

	rejected_mock.assert_async().await;
	refresh_mock.assert_async().await;
	accepted_mock.assert_async().await;

	Ok(())
}

// Unsigned token whose payload only carries `sub` and `exp`; the client never verifies it.
fn unsigned_jwt(subject: &str, expires_in: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + expires_in).unix_timestamp();
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
	let payload =
		URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": subject, "exp": exp }).to_string());

	format!("{header}.{payload}.")
}
