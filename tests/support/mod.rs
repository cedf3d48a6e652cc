#![allow(dead_code)]

// std
use std::{io, time::Duration as StdDuration};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use http::{HeaderMap, HeaderValue, StatusCode};
// self
use api_session::{
	Dispatcher,
	_preludet::*,
	auth::{AccessCredential, RefreshCredential},
	config::ClientConfig,
	error::TransportError,
	events::{ClearReason, SessionObserver},
	http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	retry::RetryPolicy,
};

pub const BASE_URL: &str = "https://api.example.test/v1";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Ordered record of sends and session events shared by the transport and the observer.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
	Arc::new(Mutex::new(Vec::new()))
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: String,
	pub path: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
	/// Zero-based index of this call among calls to the same path.
	pub call: usize,
}
impl RecordedRequest {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn bearer(&self) -> Option<&str> {
		self.header("authorization").and_then(|value| value.strip_prefix("Bearer "))
	}

	pub fn json(&self) -> serde_json::Value {
		serde_json::from_slice(&self.body).expect("Recorded body should be JSON.")
	}
}

pub enum Reply {
	Respond {
		status: u16,
		headers: Vec<(&'static str, String)>,
		body: Vec<u8>,
		delay: Option<StdDuration>,
	},
	Fail(TransportError),
}
impl Reply {
	pub fn status(status: u16) -> Self {
		Self::Respond { status, headers: Vec::new(), body: Vec::new(), delay: None }
	}

	pub fn json(status: u16, body: serde_json::Value) -> Self {
		Self::Respond {
			status,
			headers: vec![("content-type", "application/json".into())],
			body: body.to_string().into_bytes(),
			delay: None,
		}
	}

	pub fn connect_failure() -> Self {
		Self::Fail(TransportError::connect(io::Error::other("connection refused")))
	}

	pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
		if let Self::Respond { headers, .. } = &mut self {
			headers.push((name, value.into()));
		}

		self
	}

	pub fn delayed(mut self, by: StdDuration) -> Self {
		if let Self::Respond { delay, .. } = &mut self {
			*delay = Some(by);
		}

		self
	}
}

type Handler = dyn Fn(&RecordedRequest) -> Reply + Send + Sync;

/// In-process transport whose replies are scripted per request.
pub struct ScriptedTransport {
	handler: Box<Handler>,
	requests: Mutex<Vec<RecordedRequest>>,
	counts: Mutex<HashMap<String, usize>>,
	log: EventLog,
}
impl ScriptedTransport {
	pub fn new<F>(log: &EventLog, handler: F) -> Arc<Self>
	where
		F: 'static + Fn(&RecordedRequest) -> Reply + Send + Sync,
	{
		Arc::new(Self {
			handler: Box::new(handler),
			requests: Mutex::new(Vec::new()),
			counts: Mutex::new(HashMap::new()),
			log: log.clone(),
		})
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.requests.lock().clone()
	}

	pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
		self.requests.lock().iter().filter(|request| request.path == path).cloned().collect()
	}

	pub fn calls(&self, path: &str) -> usize {
		self.counts.lock().get(path).copied().unwrap_or(0)
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let path = request.uri().path().trim_start_matches("/v1").to_owned();
		let call = {
			let mut counts = self.counts.lock();
			let count = counts.entry(path.clone()).or_default();
			let call = *count;

			*count += 1;

			call
		};
		let recorded = RecordedRequest {
			method: request.method().to_string(),
			path,
			headers: request.headers().clone(),
			body: request.body().clone(),
			call,
		};

		self.log.lock().push(format!("send {} {}", recorded.method, recorded.path));
		self.requests.lock().push(recorded.clone());

		let reply = (self.handler)(&recorded);

		Box::pin(async move {
			match reply {
				Reply::Fail(error) => Err(error),
				Reply::Respond { status, headers, body, delay } => {
					if let Some(delay) = delay {
						tokio::time::sleep(delay).await;
					}

					let mut response = HttpResponse::new(body);

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					for (name, value) in headers {
						response.headers_mut().insert(
							name,
							HeaderValue::from_str(&value).expect("Scripted header should be valid."),
						);
					}

					Ok(response)
				},
			}
		})
	}
}

/// Observer that appends session events to the shared log.
pub struct RecordingObserver(pub EventLog);
impl SessionObserver for RecordingObserver {
	fn on_credentials_updated(&self, access: &AccessCredential) {
		self.0.lock().push(format!("updated {}", token_tag(access.expose())));
	}

	fn on_credentials_cleared(&self, reason: ClearReason) {
		self.0.lock().push(format!("cleared {reason}"));
	}
}

/// Unsigned JWT tagged with `tag` that expires `expires_in` from now.
pub fn jwt(tag: &str, expires_in: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + expires_in).unix_timestamp();
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": tag, "exp": exp }).to_string());

	format!("{header}.{payload}.{tag}")
}

/// Tag a token minted by [`jwt`] carries.
pub fn token_tag(token: &str) -> &str {
	token.rsplit('.').next().unwrap_or(token)
}

/// Retry policy with the default budgets and millisecond-scale delays.
pub fn fast_retry() -> RetryPolicy {
	RetryPolicy { base_delay_ms: 1, max_delay_ms: 5, jitter_ms: 0, ..Default::default() }
}

pub fn config() -> ClientConfig {
	ClientConfig::builder(BASE_URL)
		.retry(fast_retry())
		.build()
		.expect("Test configuration should build.")
}

pub fn dispatcher(transport: Arc<ScriptedTransport>, log: &EventLog) -> Dispatcher {
	Dispatcher::builder(config())
		.transport(transport)
		.observer(Arc::new(RecordingObserver(log.clone())))
		.build()
		.expect("Dispatcher should build.")
}

/// Logs in with a fresh access token tagged `access` and a refresh token `refresh`.
pub fn login(dispatcher: &Dispatcher, access: &str, refresh: &str) {
	dispatcher
		.establish_session(
			AccessCredential::new(jwt(access, Duration::hours(1))),
			RefreshCredential::new(refresh),
		)
		.expect("Establishing the session should succeed.");
}

pub fn refresh_reply(access: &str, refresh: Option<&str>) -> Reply {
	let token = jwt(access, Duration::hours(1));
	let data = match refresh {
		Some(refresh) => serde_json::json!({ "accessToken": token, "refreshToken": refresh }),
		None => serde_json::json!({ "accessToken": token }),
	};

	Reply::json(200, serde_json::json!({ "data": data }))
}
