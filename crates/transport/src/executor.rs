//! Unified request executor: auth header, content negotiation, bounded
//! retry with backoff, and session-expiry handling for every non-streaming call.

use crate::context::TransportContext;
use crate::request::{RequestOptions, merge_headers};
use crate::response::{decode_body, error_message, unwrap_envelope};
use crate::retry::{Attempt, Decision, RetryPolicy, classify};
use memochat_types::{NETWORK_FAILED_MESSAGE, Result, TransportError};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Result of one network attempt, before the retry decision.
enum AttemptResult {
    Response {
        status: u16,
        /// Decoded body; `Err` holds a `MalformedResponse`.
        body: Result<Value>,
    },
    Network(TransportError),
}

impl AttemptResult {
    fn summary(&self) -> Attempt {
        match self {
            Self::Response { status, .. } => Attempt::Status(*status),
            Self::Network(_) => Attempt::Network,
        }
    }
}

/// Dispatches JSON API calls with the retry policy.
#[derive(Clone)]
pub struct RequestExecutor {
    ctx: Arc<TransportContext>,
    policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl RequestExecutor {
    /// Creates an executor with the default policy (3 attempts, 1 s apart).
    #[must_use]
    pub fn new(ctx: Arc<TransportContext>) -> Self {
        Self {
            ctx,
            policy: RetryPolicy::default(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Per-attempt timeout. A timed-out attempt counts as a network failure.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[must_use]
    pub fn context(&self) -> &Arc<TransportContext> {
        &self.ctx
    }

    /// Executes a call with the full retry budget of the policy.
    ///
    /// # Errors
    ///
    /// See [`RequestExecutor::execute_with_budget`].
    pub async fn execute(&self, endpoint: &str, options: RequestOptions) -> Result<Value> {
        self.execute_with_budget(endpoint, options, self.policy.retries())
            .await
    }

    /// Executes a call and deserializes the unwrapped payload into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`RequestExecutor::execute`] returns, plus
    /// [`TransportError::MalformedResponse`] if the payload has the wrong shape.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let payload = self.execute(endpoint, options).await?;
        serde_json::from_value(payload).map_err(|e| {
            TransportError::MalformedResponse(format!("unexpected payload for {endpoint}: {e}"))
        })
    }

    /// Executes a call allowing at most `retries_remaining` retries.
    ///
    /// # Errors
    ///
    /// - [`TransportError::AuthExpired`] on any 401 (credential cleared, redirect fired)
    /// - [`TransportError::MalformedResponse`] if a body is not JSON, on any status
    /// - [`TransportError::ServerError`] once server errors exhaust the budget
    /// - [`TransportError::RequestFailed`] for other non-success statuses
    /// - [`TransportError::NetworkError`] once transport failures exhaust the budget
    /// - [`TransportError::Request`] if the request cannot be built
    pub async fn execute_with_budget(
        &self,
        endpoint: &str,
        options: RequestOptions,
        mut retries_remaining: u32,
    ) -> Result<Value> {
        let url = self.ctx.url(endpoint);
        let mut retry = 0;

        loop {
            let attempt = match self.attempt(&url, &options).await? {
                // An undecodable body is terminal whatever the status.
                AttemptResult::Response {
                    status,
                    body: Err(e),
                } => {
                    tracing::warn!(
                        method = %options.method,
                        %url,
                        status,
                        error = %e,
                        "malformed response"
                    );
                    return Err(e);
                }
                attempt => attempt,
            };

            match (classify(attempt.summary(), retries_remaining), attempt) {
                (Decision::ExpireSession, _) => {
                    tracing::info!(method = %options.method, %url, "request rejected with 401");
                    return Err(self.ctx.expire_session());
                }
                (Decision::Succeed, AttemptResult::Response { body, .. }) => {
                    return body.map(unwrap_envelope);
                }
                (Decision::Retry, attempt) => {
                    retry += 1;
                    let delay = self.policy.backoff.delay(retry);
                    match &attempt {
                        AttemptResult::Response { status, .. } => tracing::warn!(
                            method = %options.method,
                            %url,
                            status,
                            retries_remaining,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "server error, retrying"
                        ),
                        AttemptResult::Network(e) => tracing::warn!(
                            method = %options.method,
                            %url,
                            error = %e,
                            retries_remaining,
                            "network failure, retrying"
                        ),
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    retries_remaining -= 1;
                }
                (_, attempt) => return Err(Self::failure(attempt)),
            }
        }
    }

    fn failure(attempt: AttemptResult) -> TransportError {
        match attempt {
            AttemptResult::Response { status, body } => {
                let message = error_message(body.as_ref().ok(), status);
                if status >= 500 {
                    TransportError::ServerError { status, message }
                } else {
                    TransportError::RequestFailed { status, message }
                }
            }
            AttemptResult::Network(e) => {
                tracing::error!(error = %e, "network failure, retries exhausted");
                TransportError::NetworkError(NETWORK_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Performs a single attempt. Only request-building errors propagate
    /// through `Err`; everything else is reported as an [`AttemptResult`].
    async fn attempt(&self, url: &str, options: &RequestOptions) -> Result<AttemptResult> {
        let credential = self.ctx.credential();
        let headers = merge_headers(&options.headers, credential.as_deref())?;

        let mut builder = self
            .ctx
            .http()
            .request(options.method.clone(), url)
            .headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(method = %options.method, %url, "sending request");
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_builder() => return Err(e.into()),
            Err(e) => return Ok(AttemptResult::Network(e.into())),
        };

        let status = resp.status().as_u16();
        if status == 401 {
            // Nothing in the body can change the outcome.
            return Ok(AttemptResult::Response {
                status,
                body: Ok(Value::Null),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(AttemptResult::Network(e.into())),
        };
        tracing::debug!(%url, status, len = bytes.len(), "received response");

        Ok(AttemptResult::Response {
            status,
            body: decode_body(content_type.as_deref(), &bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memochat_auth::{LoginRedirect, TokenStore};
    use memochat_store::InMemoryStorage;
    use crate::retry::{Backoff, DEFAULT_DELAY};
    use memochat_types::{CREDENTIAL_KEY, Credential, KeyValueStorage as _};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        storage: Arc<InMemoryStorage>,
        tokens: Arc<TokenStore>,
        redirect: Arc<LoginRedirect>,
        executor: RequestExecutor,
    }

    fn harness(server: &MockServer, max_attempts: u32) -> Harness {
        harness_with_policy(
            server,
            RetryPolicy::fixed(max_attempts, Duration::from_millis(10)),
        )
    }

    fn harness_with_policy(server: &MockServer, policy: RetryPolicy) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let tokens = Arc::new(TokenStore::load(storage.clone()).unwrap());
        let redirect = Arc::new(LoginRedirect::default());
        let ctx = Arc::new(TransportContext::new(
            reqwest::Client::new(),
            format!("{}/api", server.uri()),
            Arc::clone(&tokens),
            redirect.clone(),
        ));
        let executor = RequestExecutor::new(ctx).with_policy(policy);
        Harness {
            storage,
            tokens,
            redirect,
            executor,
        }
    }

    #[tokio::test]
    async fn test_unwraps_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"x": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let payload = h
            .executor
            .execute("/auth/me", RequestOptions::get())
            .await
            .unwrap();
        assert_eq!(payload, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_returns_raw_body_without_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"x": 1})))
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let payload = h.executor.execute("/x", RequestOptions::get()).await.unwrap();
        assert_eq!(payload, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_sends_bearer_and_json_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/conversations"))
            .and(header("authorization", "Bearer tok-123"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"title": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        h.tokens.set(Some(Credential::new("tok-123"))).unwrap();
        let payload = h
            .executor
            .execute("/conversations", RequestOptions::post(json!({"title": "hello"})))
            .await
            .unwrap();
        assert_eq!(payload["id"], 1);
    }

    #[tokio::test]
    async fn test_no_authorization_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let h = harness(&server, 1);
        h.executor.execute("/x", RequestOptions::get()).await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_forwards_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 1);
        h.executor
            .execute(
                "/conversations",
                RequestOptions::get()
                    .with_query("page", Some(2))
                    .with_query("limit", Some(20)),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_401_clears_credential_and_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"data": {"secret": true}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        h.tokens.set(Some(Credential::new("stale"))).unwrap();
        let err = h
            .executor
            .execute("/auth/me", RequestOptions::get())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::AuthExpired));
        assert!(h.tokens.get().is_none());
        assert!(h.storage.get(CREDENTIAL_KEY).unwrap().is_none());
        assert_eq!(h.redirect.redirect_count(), 1);
    }

    #[tokio::test]
    async fn test_401_with_unparsable_body_is_still_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::AuthExpired));
    }

    #[tokio::test]
    async fn test_401_after_server_error_stops_retrying() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(401)
                }
            })
            .mount(&server)
            .await;

        let h = harness(&server, 5);
        let err = h
            .executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::AuthExpired));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if calls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"data": "ok"}))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let payload = h.executor.execute("/x", RequestOptions::get()).await.unwrap();
        assert_eq!(payload, json!("ok"));
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"message": "database locked"})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        match err {
            TransportError::ServerError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database locked");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_explicit_budget_counts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute_with_budget("/x", RequestOptions::get(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ServerError { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_server_error_with_html_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(502)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>Bad Gateway</html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        match err {
            TransportError::MalformedResponse(msg) => {
                assert_eq!(msg, "non-JSON response: <html>Bad Gateway</html>");
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_with_html_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>Not Found</html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, TransportError::MalformedResponse(msg) if msg.contains("<html>Not Found</html>")),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_default_policy_waits_fixed_delay_before_retry() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"data": "ok"}))
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let h = harness_with_policy(&server, RetryPolicy::default());
        let started = std::time::Instant::now();
        let payload = h.executor.execute("/x", RequestOptions::get()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(payload, json!("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(elapsed >= DEFAULT_DELAY, "retried after {elapsed:?}");
        assert!(elapsed < DEFAULT_DELAY * 2, "retried after {elapsed:?}");
    }

    #[tokio::test]
    async fn test_linear_backoff_grows_between_retries() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if calls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"data": [1]}))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Linear(Duration::from_millis(100)),
        };
        let h = harness_with_policy(&server, policy);
        let started = std::time::Instant::now();
        let payload = h.executor.execute("/x", RequestOptions::get()).await.unwrap();

        assert_eq!(payload, json!([1]));
        // 100 ms before the first retry, 200 ms before the second.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "message": "conversation not found",
                "error_code": "NOT_FOUND"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute("/conversations/9", RequestOptions::put(json!({"title": "t"})))
            .await
            .unwrap_err();
        match err {
            TransportError::RequestFailed { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "conversation not found");
            }
            other => panic!("expected request failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<!DOCTYPE html><p>maintenance</p>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        match err {
            TransportError::MalformedResponse(msg) => {
                assert!(msg.starts_with("non-JSON response: <!DOCTYPE html>"));
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_failure_exhausts_budget() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let tokens = Arc::new(TokenStore::load(Arc::new(InMemoryStorage::new())).unwrap());
        let ctx = Arc::new(TransportContext::new(
            reqwest::Client::new(),
            format!("http://{addr}/api"),
            tokens,
            Arc::new(LoginRedirect::default()),
        ));
        let executor = RequestExecutor::new(ctx)
            .with_policy(RetryPolicy::fixed(2, Duration::from_millis(5)));

        let err = executor
            .execute("/x", RequestOptions::get())
            .await
            .unwrap_err();
        match err {
            TransportError::NetworkError(msg) => assert_eq!(msg, "network connection failed"),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_json_typed() {
        #[derive(serde::Deserialize)]
        struct Deleted {
            deleted_count: u32,
        }

        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"deleted_count": 2}})),
            )
            .mount(&server)
            .await;

        let h = harness(&server, 1);
        let out: Deleted = h
            .executor
            .execute_json(
                "/conversations/batch",
                RequestOptions::delete().with_body(json!({"conversation_ids": [1, 2]})),
            )
            .await
            .unwrap();
        assert_eq!(out.deleted_count, 2);
    }

    #[tokio::test]
    async fn test_execute_json_wrong_shape() {
        #[derive(Debug, serde::Deserialize)]
        struct Deleted {
            #[allow(dead_code)]
            deleted_count: u32,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2]})))
            .mount(&server)
            .await;

        let h = harness(&server, 1);
        let err = h
            .executor
            .execute_json::<Deleted>("/x", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MalformedResponse(_)));
    }
}
