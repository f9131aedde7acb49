//! Bounded retry with a fixed delay around single API calls.
//!
//! Every attempt that ends in a transport failure, a status of 400 or above, or an
//! undecodable body is retried after [`RetryPolicy::delay`] until the method's attempt cap
//! is spent; the caller then receives [`Error::RequestExhausted`] carrying the last failure.
//! The delay is a `tokio` timer, so dropping the returned future cancels a pending retry.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{ApiHttpClient, ApiMethod, ApiRequest, ApiResponse},
	obs::{self, FlowKind},
};

/// Attempt caps and the fixed delay between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Attempts permitted for `GET` requests.
	pub read_attempts: u32,
	/// Attempts permitted for `POST`/`PUT` requests.
	pub write_attempts: u32,
	/// Pause between consecutive attempts; non-zero values need a Tokio runtime.
	pub delay: StdDuration,
}
impl RetryPolicy {
	const DEFAULT_DELAY: StdDuration = StdDuration::from_secs(1);
	const DEFAULT_READ_ATTEMPTS: u32 = 10;
	const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

	/// Overrides the read cap; values below one are raised to one.
	pub fn with_read_attempts(mut self, attempts: u32) -> Self {
		self.read_attempts = attempts.max(1);

		self
	}

	/// Overrides the write cap; values below one are raised to one.
	pub fn with_write_attempts(mut self, attempts: u32) -> Self {
		self.write_attempts = attempts.max(1);

		self
	}

	/// Overrides the delay between attempts.
	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = delay;

		self
	}

	/// Attempt cap applied to `method`.
	pub fn max_attempts(&self, method: ApiMethod) -> u32 {
		let cap = if method.is_write() { self.write_attempts } else { self.read_attempts };

		cap.max(1)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			read_attempts: Self::DEFAULT_READ_ATTEMPTS,
			write_attempts: Self::DEFAULT_WRITE_ATTEMPTS,
			delay: Self::DEFAULT_DELAY,
		}
	}
}

/// Retry wrapper around an [`ApiHttpClient`].
///
/// A non-zero [`RetryPolicy::delay`] waits on a `tokio` timer, so [`Requester::send`] must
/// be polled inside a Tokio runtime with the time driver enabled. A zero delay never
/// touches the timer and runs under any executor.
pub struct Requester<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Transport used for every attempt.
	pub http_client: Arc<C>,
	/// Attempt caps and delay.
	pub policy: RetryPolicy,
}
impl<C> Requester<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a requester with the provided transport and policy.
	pub fn new(http_client: impl Into<Arc<C>>, policy: RetryPolicy) -> Self {
		Self { http_client: http_client.into(), policy }
	}

	/// Issues `method` against `target` and returns the parsed JSON body.
	///
	/// Empty bodies parse to [`Value::Null`].
	pub async fn call(
		&self,
		method: ApiMethod,
		target: Url,
		credential: Option<&TokenSecret>,
		query: &[(&str, String)],
		body: Option<Value>,
	) -> Result<Value> {
		let mut request = ApiRequest::new(method, target);

		if let Some(token) = credential {
			request = request.bearer(token.clone());
		}
		for (key, value) in query {
			request = request.query(*key, value);
		}
		if let Some(body) = body {
			request = request.json(body);
		}

		self.send(&request).await
	}

	/// Issues a prepared request with retries.
	pub async fn send(&self, request: &ApiRequest) -> Result<Value> {
		obs::observe(FlowKind::Request, "send", async move {
			let max_attempts = self.policy.max_attempts(request.method);
			let mut attempt = 1;

			loop {
				let error = match self.attempt(request).await {
					Ok(value) => return Ok(value),
					Err(e) => e,
				};

				if attempt >= max_attempts {
					obs::retries_exhausted(request.method, &request.url, attempt);

					return Err(Error::RequestExhausted { attempts: attempt, last: Box::new(error) });
				}

				obs::retry_scheduled(request.method, &request.url, attempt, max_attempts, &error);

				if !self.policy.delay.is_zero() {
					tokio::time::sleep(self.policy.delay).await;
				}

				attempt += 1;
			}
		})
		.await
	}

	async fn attempt(&self, request: &ApiRequest) -> Result<Value> {
		let response = self.http_client.execute(request).await?;

		parse_response(response)
	}
}
impl<C> Clone for Requester<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self { http_client: self.http_client.clone(), policy: self.policy }
	}
}
impl<C> Debug for Requester<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Requester").field("policy", &self.policy).finish()
	}
}

fn parse_response(response: ApiResponse) -> Result<Value> {
	if response.is_failure() {
		return Err(Error::HttpError { status: response.status });
	}
	if response.body.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

	Ok(serde_path_to_error::deserialize(&mut deserializer)?)
}

/// Decodes a parsed response into a typed payload, reporting the failing JSON path.
pub fn decode<T>(value: Value) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	Ok(serde_path_to_error::deserialize(value)?)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::TransportError, http::ApiFuture};

	/// Replays a fixed script of responses, one per attempt.
	struct ScriptedClient {
		script: Mutex<Vec<Result<ApiResponse, TransportError>>>,
		requests: Mutex<Vec<ApiRequest>>,
	}
	impl ScriptedClient {
		fn new(mut script: Vec<Result<ApiResponse, TransportError>>) -> Self {
			script.reverse();

			Self { script: Mutex::new(script), requests: Mutex::new(Vec::new()) }
		}

		fn calls(&self) -> u32 {
			self.requests.lock().len() as u32
		}
	}
	impl ApiHttpClient for ScriptedClient {
		fn execute<'a>(&'a self, request: &'a ApiRequest) -> ApiFuture<'a> {
			self.requests.lock().push(request.clone());

			let next = self.script.lock().pop().unwrap_or_else(|| Ok(status(500)));

			Box::pin(async move { next })
		}
	}

	fn status(code: u16) -> ApiResponse {
		ApiResponse { status: code, body: Vec::new() }
	}

	fn ok(body: &str) -> ApiResponse {
		ApiResponse { status: 200, body: body.as_bytes().to_vec() }
	}

	fn url() -> Url {
		Url::parse("https://api.example.com/v1/me").expect("Fixture URL should parse.")
	}

	fn fast_policy() -> RetryPolicy {
		RetryPolicy::default().with_delay(StdDuration::ZERO)
	}

	#[tokio::test]
	async fn retries_until_success() {
		let client = Arc::new(ScriptedClient::new(vec![
			Ok(status(502)),
			Err(TransportError::Io(std::io::Error::other("reset"))),
			Ok(ok("{\"id\":\"listener\"}")),
		]));
		let requester = Requester::<ScriptedClient>::new(client.clone(), fast_policy());
		let value = requester
			.call(ApiMethod::Get, url(), None, &[], None)
			.await
			.expect("Third attempt should succeed.");

		assert_eq!(value["id"], "listener");
		assert_eq!(client.calls(), 3);
	}

	#[tokio::test]
	async fn call_forwards_credential_query_and_body() {
		let client = Arc::new(ScriptedClient::new(vec![Ok(ok("{\"snapshot_id\":\"s1\"}"))]));
		let requester = Requester::<ScriptedClient>::new(client.clone(), fast_policy());
		let token = TokenSecret::new("access-retry");

		requester
			.call(
				ApiMethod::Post,
				url(),
				Some(&token),
				&[("position", "0".to_owned())],
				Some(serde_json::json!({ "uris": ["spotify:track:t1"] })),
			)
			.await
			.expect("Write should succeed on the first attempt.");

		let requests = client.requests.lock().clone();

		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].method, ApiMethod::Post);
		assert_eq!(requests[0].bearer.as_ref().map(TokenSecret::expose), Some("access-retry"));
		assert_eq!(requests[0].query, vec![("position".to_owned(), "0".to_owned())]);
		assert_eq!(requests[0].body, Some(serde_json::json!({ "uris": ["spotify:track:t1"] })));
	}

	#[tokio::test]
	async fn read_cap_surfaces_request_exhausted() {
		let client = Arc::new(ScriptedClient::new(Vec::new()));
		let requester = Requester::<ScriptedClient>::new(client.clone(), fast_policy());
		let err = requester
			.call(ApiMethod::Get, url(), None, &[], None)
			.await
			.expect_err("A permanently failing endpoint should exhaust retries.");

		assert!(matches!(
			err,
			Error::RequestExhausted { attempts: 10, ref last } if matches!(**last, Error::HttpError { status: 500 })
		));
		assert_eq!(client.calls(), 10);
	}

	#[tokio::test]
	async fn write_cap_is_configurable() {
		let client = Arc::new(ScriptedClient::new(Vec::new()));
		let requester = Requester::<ScriptedClient>::new(client.clone(), fast_policy().with_write_attempts(2));
		let err = requester
			.call(ApiMethod::Post, url(), None, &[], Some(serde_json::json!({ "uris": [] })))
			.await
			.expect_err("Writes should stop at their own cap.");

		assert!(matches!(err, Error::RequestExhausted { attempts: 2, .. }));
		assert_eq!(client.calls(), 2);
	}

	#[tokio::test]
	async fn malformed_body_counts_as_failed_attempt() {
		let client = Arc::new(ScriptedClient::new(vec![Ok(ok("{not json")), Ok(ok("{}"))]));
		let requester = Requester::<ScriptedClient>::new(client.clone(), fast_policy());
		let value = requester
			.call(ApiMethod::Get, url(), None, &[], None)
			.await
			.expect("Second attempt should parse.");

		assert_eq!(value, serde_json::json!({}));
		assert_eq!(client.calls(), 2);
	}

	#[tokio::test]
	async fn delay_separates_attempts() {
		let client = Arc::new(ScriptedClient::new(vec![Ok(status(503)), Ok(ok("{}"))]));
		let requester = Requester::<ScriptedClient>::new(
			client.clone(),
			RetryPolicy::default().with_delay(StdDuration::from_millis(20)),
		);
		let started = std::time::Instant::now();

		requester
			.call(ApiMethod::Get, url(), None, &[], None)
			.await
			.expect("Second attempt should succeed.");

		assert!(started.elapsed() >= StdDuration::from_millis(20));
		assert_eq!(client.calls(), 2);
	}

	#[test]
	fn caps_never_drop_below_one() {
		let policy = RetryPolicy::default().with_read_attempts(0).with_write_attempts(0);

		assert_eq!(policy.max_attempts(ApiMethod::Get), 1);
		assert_eq!(policy.max_attempts(ApiMethod::Put), 1);
		assert_eq!(RetryPolicy::default().max_attempts(ApiMethod::Get), 10);
		assert_eq!(RetryPolicy::default().max_attempts(ApiMethod::Post), 3);
		assert_eq!(RetryPolicy::default().delay, StdDuration::from_secs(1));
	}

	#[test]
	fn empty_body_parses_to_null() {
		assert_eq!(parse_response(status(204)).expect("Empty 204 should parse."), Value::Null);
		assert!(matches!(parse_response(status(404)), Err(Error::HttpError { status: 404 })));
	}
}
