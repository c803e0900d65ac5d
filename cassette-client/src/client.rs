//! AG-UI run client

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cassette_protocol::{decode_stream, AguiEvent, EventKind, Frame};
use futures::stream::Stream;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::bus::{DiagnosticHandler, EventBus, EventHandler, SubscriptionId};
use crate::diagnostic::Diagnostic;
use crate::error::ClientError;
use crate::state::{RunState, TextMessage, ToolCall};

/// Environment variable holding the endpoint URL
pub const ENDPOINT_ENV: &str = "AGUI_ENDPOINT";

/// Environment variable holding an optional bearer token
pub const AUTH_TOKEN_ENV: &str = "AGUI_AUTH_TOKEN";

/// Default time allowed to establish a connection
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// `code` of the `RUN_ERROR` synthesized when the client itself fails a run
pub const CLIENT_ERROR_CODE: &str = "CLIENT_ERROR";

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// No run has been started
    #[default]
    Idle,
    Running,
    /// The stream delivered `RUN_FINISHED` or ended cleanly
    Finished,
    /// The backend sent `RUN_ERROR` or the client failed the run
    Errored,
    /// [`AguiClient::cancel`] was called or the stream went idle
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Errored | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Errored => "errored",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

struct ClientInner {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    idle_timeout: Option<Duration>,
    run: RwLock<RunState>,
    status: RwLock<RunStatus>,
    bus: EventBus,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Streaming AG-UI client
///
/// Each call to [`run`](Self::run) POSTs a request, then folds the streamed
/// events into a [`RunState`] and hands every event to the registered
/// handlers before reading the next one. The state of the last run stays
/// available until the next run starts.
///
/// Cloning is cheap and clones share the same run state and subscribers, so
/// a clone can be moved into a handler to query or cancel the run.
///
/// One client drives one run at a time. Starting a second run while the
/// first is still streaming is not guarded against and interleaves both
/// streams into the same state.
///
/// # Example
/// ```no_run
/// use cassette_client::{AguiClient, AguiEvent, EventKind};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), cassette_client::ClientError> {
/// let client = AguiClient::new("http://localhost:8000/agent")?;
///
/// client.subscribe(EventKind::TextMessageContent, |event: &AguiEvent| {
///     if let AguiEvent::TextMessageContent { delta, .. } = event {
///         print!("{}", delta);
///     }
/// });
///
/// let state = client.run(&json!({"prompt": "Write a CLI todo app"})).await?;
/// println!("\nfinal state: {}", state);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AguiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for AguiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AguiClient")
            .field("endpoint", &self.inner.endpoint)
            .field("idle_timeout", &self.inner.idle_timeout)
            .field("status", &self.status())
            .field("bus", &self.inner.bus)
            .finish()
    }
}

impl AguiClient {
    /// Create a client for an endpoint with default settings
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().endpoint(endpoint).build()
    }

    /// Create a client from `AGUI_ENDPOINT` and the optional `AGUI_AUTH_TOKEN`
    pub fn from_env() -> Result<Self, ClientError> {
        AguiClientBuilder::from_env()?.build()
    }

    /// Create a builder for more advanced configuration
    pub fn builder() -> AguiClientBuilder {
        AguiClientBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Call `handler` for every event of one kind
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl EventHandler + 'static,
    ) -> SubscriptionId {
        self.inner.bus.subscribe(kind, handler)
    }

    /// Call `handler` for every event
    pub fn subscribe_all(&self, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.inner.bus.subscribe_all(handler)
    }

    /// Call `handler` for `CUSTOM` events with the given name
    pub fn subscribe_custom(
        &self,
        name: impl Into<String>,
        handler: impl EventHandler + 'static,
    ) -> SubscriptionId {
        self.inner.bus.subscribe_custom(name, handler)
    }

    /// Call `handler` for each [`Diagnostic`] raised while streaming
    pub fn on_diagnostic(&self, handler: impl DiagnosticHandler + 'static) -> SubscriptionId {
        self.inner.bus.on_diagnostic(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// Remove every handler, diagnostics included
    pub fn unsubscribe_all(&self) {
        self.inner.bus.unsubscribe_all()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current shared state document
    pub fn state(&self) -> Value {
        self.inner.run.read().state().clone()
    }

    pub fn message(&self, id: &str) -> Option<TextMessage> {
        self.inner.run.read().message(id).cloned()
    }

    /// All messages of the current run, in the order they were started
    pub fn messages(&self) -> Vec<TextMessage> {
        self.inner.run.read().messages().cloned().collect()
    }

    pub fn tool_call(&self, id: &str) -> Option<ToolCall> {
        self.inner.run.read().tool_call(id).cloned()
    }

    /// All tool calls of the current run, in the order they were started
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.inner.run.read().tool_calls().cloned().collect()
    }

    pub fn current_step(&self) -> Option<String> {
        self.inner.run.read().current_step().map(str::to_string)
    }

    pub fn is_running(&self) -> bool {
        self.inner.run.read().is_running()
    }

    pub fn status(&self) -> RunStatus {
        *self.inner.status.read()
    }

    /// Copy of the whole run view
    pub fn snapshot(&self) -> RunState {
        self.inner.run.read().clone()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Cancel the in-flight run
    ///
    /// The pending [`run`](Self::run) resolves `Ok` with the state gathered
    /// so far. Returns false when no run is in flight.
    pub fn cancel(&self) -> bool {
        match self.inner.cancel.lock().as_ref() {
            Some(token) => {
                log::info!("Cancelling run against {}", self.inner.endpoint);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Start a run and stream it to completion
    ///
    /// Returns the final state document. See [`run_with_headers`](Self::run_with_headers).
    pub async fn run(&self, body: &Value) -> Result<Value, ClientError> {
        self.run_with_headers(body, HashMap::new()).await
    }

    /// Start a run with extra request headers and stream it to completion
    ///
    /// The previous run's state is discarded first. Failures to connect and
    /// non-success responses return an error before any event is delivered.
    /// Failures after the stream has started (a broken connection, a delta
    /// that cannot be applied) deliver a `RUN_ERROR` with code
    /// `CLIENT_ERROR` and then return the error. A `RUN_ERROR` sent by the
    /// backend is delivered like any other event and does not make this
    /// return an error.
    pub async fn run_with_headers(
        &self,
        body: &Value,
        headers: HashMap<String, String>,
    ) -> Result<Value, ClientError> {
        let extra_headers = header_map(&headers)?;

        let token = CancellationToken::new();
        *self.inner.cancel.lock() = Some(token.clone());
        self.inner.run.write().begin();
        self.set_status(RunStatus::Running);

        let result = self.drive(body, extra_headers, &token).await;

        self.inner.cancel.lock().take();
        result
    }

    async fn drive(
        &self,
        body: &Value,
        extra_headers: HeaderMap,
        token: &CancellationToken,
    ) -> Result<Value, ClientError> {
        log::info!("Starting run: POST {}", self.inner.endpoint);

        let request = self
            .inner
            .http
            .post(&self.inner.endpoint)
            .header(ACCEPT, "text/event-stream")
            .headers(self.inner.headers.clone())
            .headers(extra_headers)
            .json(body);

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(self.finish(RunStatus::Cancelled)),
            response = request.send() => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => return Err(self.fail_before_stream(ClientError::from_reqwest_error(e))),
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(self.finish(RunStatus::Cancelled)),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(self.fail_before_stream(ClientError::Http {
                status: status.as_u16(),
                body,
            }));
        }

        let frames = decode_stream(response.bytes_stream());
        futures::pin_mut!(frames);

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(self.finish(RunStatus::Cancelled)),
                next = next_frame(&mut frames, self.inner.idle_timeout) => next,
            };

            match next {
                None => {
                    log::warn!(
                        "No data from {} within idle timeout, cancelling run",
                        self.inner.endpoint
                    );
                    return Ok(self.finish(RunStatus::Cancelled));
                }
                Some(None) => break,
                Some(Some(Err(e))) => {
                    return Err(self.fail_mid_stream(ClientError::Stream(e.to_string())));
                }
                Some(Some(Ok(Frame::Malformed(err)))) => {
                    self.inner.bus.report(&Diagnostic::MalformedFrame {
                        payload: err.payload.clone(),
                        error: err.source.to_string(),
                    });
                }
                Some(Some(Ok(Frame::Event(event)))) => {
                    if let Err(err) = self.process(&event) {
                        return Err(self.fail_mid_stream(err));
                    }
                }
            }
        }

        let final_status = match self.status() {
            RunStatus::Running => RunStatus::Finished,
            other => other,
        };
        Ok(self.finish(final_status))
    }

    /// Fold one event, then deliver it
    fn process(&self, event: &AguiEvent) -> Result<(), ClientError> {
        log::trace!("Received {}", event.kind());

        let diagnostics = self.inner.run.write().apply(event)?;
        self.track_status(event);

        for diagnostic in &diagnostics {
            self.inner.bus.report(diagnostic);
        }
        self.inner.bus.dispatch(event);
        Ok(())
    }

    fn track_status(&self, event: &AguiEvent) {
        match event {
            AguiEvent::RunStarted { run_id, .. } => {
                log::debug!("Run {} started", run_id);
                self.set_status(RunStatus::Running);
            }
            AguiEvent::RunFinished { .. } => {
                log::info!("Run finished");
                self.set_status(RunStatus::Finished);
            }
            AguiEvent::RunError { message, code } => {
                log::warn!("Run error ({}): {}", code.as_deref().unwrap_or("-"), message);
                self.set_status(RunStatus::Errored);
            }
            _ => {}
        }
    }

    fn set_status(&self, status: RunStatus) {
        *self.inner.status.write() = status;
    }

    fn finish(&self, status: RunStatus) -> Value {
        self.set_status(status);
        let mut run = self.inner.run.write();
        run.stop();
        log::debug!("Run ended: {}", status);
        run.state().clone()
    }

    fn fail_before_stream(&self, err: ClientError) -> ClientError {
        log::error!("Run request failed: {}", err);
        self.finish(RunStatus::Errored);
        err
    }

    /// Deliver a synthesized `RUN_ERROR` for a failure after streaming began
    fn fail_mid_stream(&self, err: ClientError) -> ClientError {
        log::error!("Run failed mid-stream: {}", err);

        let event = AguiEvent::run_error(err.to_string(), Some(CLIENT_ERROR_CODE.to_string()));
        self.finish(RunStatus::Errored);
        self.inner.bus.dispatch(&event);
        err
    }
}

/// Await the next frame. The outer `None` means the idle timeout expired.
async fn next_frame<S>(frames: &mut S, idle_timeout: Option<Duration>) -> Option<Option<S::Item>>
where
    S: Stream + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, frames.next()).await.ok(),
        None => Some(frames.next().await),
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ClientError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let (name, value) = header_pair(name, value)?;
        map.insert(name, value);
    }
    Ok(map)
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ClientError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ClientError::Configuration(format!("Invalid header name '{}': {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| ClientError::Configuration(format!("Invalid value for header '{}': {}", name, e)))?;
    Ok((header_name, header_value))
}

/// Builder for [`AguiClient`]
///
/// Create with [`AguiClient::builder()`]. The endpoint is required.
///
/// No overall request timeout is set by default because a run's stream may
/// legitimately stay open for minutes. Use [`idle_timeout`](Self::idle_timeout)
/// to give up on a stream that stops sending data.
#[derive(Debug, Default)]
pub struct AguiClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    headers: Vec<(String, String)>,
    bearer_token: Option<String>,
}

impl AguiClientBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Start from `AGUI_ENDPOINT` and the optional `AGUI_AUTH_TOKEN`
    pub fn from_env() -> Result<Self, ClientError> {
        let endpoint = std::env::var(ENDPOINT_ENV).map_err(|_| {
            ClientError::Configuration(format!("{} environment variable not set", ENDPOINT_ENV))
        })?;

        let mut builder = Self::new().endpoint(endpoint);
        if let Ok(token) = std::env::var(AUTH_TOKEN_ENV) {
            if !token.is_empty() {
                builder = builder.bearer_auth(token);
            }
        }
        Ok(builder)
    }

    /// Set the URL runs are POSTed to
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Limit the total duration of each request, stream included
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Limit the time allowed to connect (default: 30 seconds)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Cancel a run when no data arrives for this long
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Add a header sent with every run
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send `Authorization: Bearer <token>` with every run
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AguiClient, ClientError> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| ClientError::Configuration("Endpoint is required".to_string()))?;
        reqwest::Url::parse(&endpoint).map_err(|e| {
            ClientError::Configuration(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let (name, value) = header_pair(name, value)?;
            headers.append(name, value);
        }
        if let Some(token) = &self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                ClientError::Configuration(format!("Invalid bearer token: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT));
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build().map_err(|e| {
            ClientError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(AguiClient {
            inner: Arc::new(ClientInner {
                http,
                endpoint,
                headers,
                idle_timeout: self.idle_timeout,
                run: RwLock::new(RunState::new()),
                status: RwLock::new(RunStatus::Idle),
                bus: EventBus::new(),
                cancel: Mutex::new(None),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_endpoint() {
        let err = AguiClient::builder().build().unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_builder_rejects_bad_endpoint() {
        let err = AguiClient::new("not a url").unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint"));
    }

    #[test]
    fn test_builder_rejects_bad_header() {
        let err = AguiClient::builder()
            .endpoint("http://localhost:8000/agent")
            .header("bad header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_builder_sets_default_headers() {
        let client = AguiClient::builder()
            .endpoint("http://localhost:8000/agent")
            .header("x-session", "abc")
            .bearer_auth("secret")
            .idle_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(client.endpoint(), "http://localhost:8000/agent");
        assert_eq!(client.inner.headers["x-session"], "abc");
        assert_eq!(client.inner.headers[AUTHORIZATION], "Bearer secret");
        assert!(client.inner.headers[AUTHORIZATION].is_sensitive());
        assert_eq!(client.inner.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_debug_hides_headers() {
        let client = AguiClient::builder()
            .endpoint("http://localhost:8000/agent")
            .bearer_auth("secret")
            .build()
            .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("localhost:8000"));
    }

    #[test]
    fn test_new_client_is_idle() {
        let client = AguiClient::new("http://localhost:8000/agent").unwrap();
        assert_eq!(client.status(), RunStatus::Idle);
        assert!(!client.is_running());
        assert_eq!(client.state(), serde_json::json!({}));
        assert!(client.messages().is_empty());
        assert!(!client.cancel());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(ENDPOINT_ENV, "http://127.0.0.1:9/run");
        std::env::set_var(AUTH_TOKEN_ENV, "tok");
        let client = AguiClient::from_env().unwrap();
        std::env::remove_var(ENDPOINT_ENV);
        std::env::remove_var(AUTH_TOKEN_ENV);

        assert_eq!(client.endpoint(), "http://127.0.0.1:9/run");
        assert_eq!(client.inner.headers[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_header_map_rejects_invalid_value() {
        let mut headers = HashMap::new();
        headers.insert("x-ok".to_string(), "line\nbreak".to_string());
        assert!(header_map(&headers).is_err());
    }

    #[test]
    fn test_next_frame_without_idle_timeout() {
        let mut frames = futures::stream::iter(vec![1, 2]);
        assert_eq!(tokio_test::block_on(next_frame(&mut frames, None)), Some(Some(1)));
        assert_eq!(tokio_test::block_on(next_frame(&mut frames, None)), Some(Some(2)));
        assert_eq!(tokio_test::block_on(next_frame(&mut frames, None)), Some(None));
    }

    #[tokio::test]
    async fn test_next_frame_idle_timeout_expires() {
        let mut frames = futures::stream::pending::<u8>();
        let next = next_frame(&mut frames, Some(Duration::from_millis(10))).await;
        assert_eq!(next, None);

        let mut ready = futures::stream::iter(vec![7u8]);
        let next = next_frame(&mut ready, Some(Duration::from_secs(5))).await;
        assert_eq!(next, Some(Some(7)));
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Idle.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Finished.is_terminal());
        assert!(RunStatus::Errored.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert_eq!(RunStatus::Cancelled.to_string(), "cancelled");
    }
}
