mod support;

// std
use std::time::Instant;
// self
use api_session::{
	Dispatcher, RequestDescriptor,
	_preludet::*,
	http::ConnectivityFlag,
	normalize::{ErrorCategory, catalog},
};
use support::*;

#[tokio::test]
async fn single_unavailable_response_costs_exactly_one_retry() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |request| match request.call {
		0 => Reply::status(503),
		_ => Reply::json(200, serde_json::json!({ "items": [] })),
	});
	let dispatcher = dispatcher(transport.clone(), &log);
	let response = dispatcher
		.execute(&RequestDescriptor::get("/users"))
		.await
		.expect("Second attempt should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(transport.calls("/users"), 2);
	assert_eq!(*log.lock(), vec!["send GET /users", "send GET /users"]);
}

#[tokio::test]
async fn get_retries_transient_statuses_until_success() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |request| match request.call {
		0 => Reply::status(503),
		1 => Reply::status(502),
		_ => Reply::json(200, serde_json::json!({ "items": [] })),
	});
	let dispatcher = dispatcher(transport.clone(), &log);
	let response = dispatcher
		.execute(&RequestDescriptor::get("/users"))
		.await
		.expect("Third attempt should succeed.");
	let requests = transport.requests();
	let ids =
		requests.iter().filter_map(|request| request.header("x-request-id")).collect::<Vec<_>>();

	assert_eq!(response.status, 200);
	assert_eq!(transport.calls("/users"), 3);
	assert_eq!(ids.len(), 3);
	assert!(ids[0] != ids[1] && ids[1] != ids[2] && ids[0] != ids[2]);
	assert!(requests.iter().all(|request| request.header("api-version") == Some("1")));
	assert_eq!(response.request_id.as_deref(), Some(ids[2]));
}

#[tokio::test]
async fn retries_stop_at_budget_and_surface_last_failure() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::status(503));
	let dispatcher = dispatcher(transport.clone(), &log);
	let err = dispatcher
		.execute(&RequestDescriptor::get("/users"))
		.await
		.expect_err("Persistent 503 should fail.");

	assert_eq!(transport.calls("/users"), 3);
	assert_eq!(err.code, "HTTP_503");
	assert_eq!(err.status, Some(503));
	assert!(err.is_retriable());
	assert_eq!(err.category(), ErrorCategory::Server);
}

#[tokio::test]
async fn non_idempotent_methods_are_never_retried() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::status(503));
	let dispatcher = dispatcher(transport.clone(), &log);

	for descriptor in [
		RequestDescriptor::post("/users"),
		RequestDescriptor::put("/users"),
		RequestDescriptor::patch("/users"),
		RequestDescriptor::delete("/users"),
	] {
		let err = dispatcher.execute(&descriptor).await.expect_err("503 should fail.");

		assert_eq!(err.code, "HTTP_503");
	}

	assert_eq!(transport.calls("/users"), 4);
}

#[tokio::test]
async fn non_retriable_statuses_fail_immediately() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::status(404));
	let dispatcher = dispatcher(transport.clone(), &log);
	let err = dispatcher
		.execute(&RequestDescriptor::get("/users/9"))
		.await
		.expect_err("404 should fail.");

	assert_eq!(transport.calls("/users/9"), 1);
	assert_eq!(err.code, "HTTP_404");
	assert_eq!(err.message.split(" (Ref: ").next(), Some("The requested resource was not found."));
	assert!(!err.is_retriable());
}

#[tokio::test]
async fn retry_after_header_sets_the_delay() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |request| match request.call {
		0 => Reply::status(429).header("retry-after", "1"),
		_ => Reply::status(204),
	});
	let dispatcher = dispatcher(transport.clone(), &log);
	let started = Instant::now();
	let response = dispatcher
		.execute(&RequestDescriptor::get("/reports"))
		.await
		.expect("Retry after throttling should succeed.");

	assert_eq!(response.status, 204);
	assert_eq!(transport.calls("/reports"), 2);
	assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn connect_failures_are_retried_for_get() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |request| match request.call {
		0 | 1 => Reply::connect_failure(),
		_ => Reply::status(200),
	});
	let dispatcher = dispatcher(transport.clone(), &log);

	dispatcher
		.execute(&RequestDescriptor::head("/health"))
		.await
		.expect("Third attempt should succeed.");

	assert_eq!(transport.calls("/health"), 3);
}

#[tokio::test]
async fn exhausted_connect_failures_become_network_errors() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::connect_failure());
	let dispatcher = dispatcher(transport.clone(), &log);
	let err = dispatcher
		.execute(&RequestDescriptor::get("/health"))
		.await
		.expect_err("Unreachable server should fail.");

	assert_eq!(transport.calls("/health"), 3);
	assert_eq!(err.code, catalog::NETWORK_ERROR);
	assert_eq!(err.status, None);
	assert!(err.request_id.is_some());
	assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn offline_short_circuits_without_network_calls() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::status(200));
	let flag = ConnectivityFlag::new(false);
	let dispatcher = Dispatcher::builder(config())
		.transport(transport.clone())
		.connectivity(Arc::new(flag.clone()))
		.build()
		.expect("Dispatcher should build.");
	let err = dispatcher
		.execute(&RequestDescriptor::get("/users"))
		.await
		.expect_err("Offline request should fail.");

	assert_eq!(err.code, catalog::CLIENT_OFFLINE);
	assert!(transport.requests().is_empty());

	flag.set_online(true);

	dispatcher
		.execute(&RequestDescriptor::get("/users"))
		.await
		.expect("Online request should succeed.");

	assert_eq!(transport.calls("/users"), 1);
}

#[tokio::test]
async fn rate_limit_failure_carries_wait_hint_and_reference() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| {
		Reply::json(
			429,
			serde_json::json!({ "error": { "code": "RATE_LIMIT_EXCEEDED", "retryAfterSeconds": 90 } }),
		)
		.header("x-request-id", "srv-429")
	});
	let dispatcher = dispatcher(transport.clone(), &log);
	let err = dispatcher
		.execute(&RequestDescriptor::post("/invitations"))
		.await
		.expect_err("Throttled request should fail.");

	assert_eq!(err.code, "RATE_LIMIT_EXCEEDED");
	assert_eq!(err.retry_after_seconds, Some(90));
	assert_eq!(err.request_id.as_deref(), Some("srv-429"));
	assert_eq!(err.message, "Too many requests. Please try again in 1m 30s. (Ref: srv-429)");
	assert!(err.is_rate_limit_error());
}

#[tokio::test]
async fn headers_follow_descriptor_and_session() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::status(200));
	let dispatcher = dispatcher(transport.clone(), &log);

	login(&dispatcher, "a-1", "r-1");

	dispatcher
		.execute(
			&RequestDescriptor::delete("/users/7")
				.step_up_token("step-9")
				.header("X-Tenant", "acme"),
		)
		.await
		.expect("Authenticated request should succeed.");
	dispatcher
		.execute(
			&RequestDescriptor::post("/auth/login")
				.json(&serde_json::json!({ "email": "a@example.com" }))
				.expect("Login body should serialize.")
				.anonymous(),
		)
		.await
		.expect("Anonymous request should succeed.");

	let authenticated = &transport.requests_to("/users/7")[0];
	let anonymous = &transport.requests_to("/auth/login")[0];

	assert_eq!(authenticated.bearer().map(token_tag), Some("a-1"));
	assert_eq!(authenticated.header("x-step-up-token"), Some("step-9"));
	assert_eq!(authenticated.header("x-tenant"), Some("acme"));
	assert_eq!(anonymous.header("authorization"), None);
	assert_eq!(anonymous.header("content-type"), Some("application/json"));
	assert_eq!(anonymous.json(), serde_json::json!({ "email": "a@example.com" }));
}

#[tokio::test]
async fn invalid_caller_header_becomes_client_error() {
	let log = event_log();
	let transport = ScriptedTransport::new(&log, |_| Reply::status(200));
	let dispatcher = dispatcher(transport.clone(), &log);
	let err = dispatcher
		.execute(&RequestDescriptor::get("/users").header("X-Note", "line\nbreak"))
		.await
		.expect_err("Invalid header value should fail locally.");

	assert_eq!(err.code, catalog::CLIENT_ERROR);
	assert!(transport.requests().is_empty());
}
