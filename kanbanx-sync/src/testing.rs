//! Scripted fakes for the token, transport and Drive seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kanbanx_core::types::AppState;

use crate::auth::{AuthError, TokenProvider};
use crate::drive::{Access, DriveApi, HttpRequest, HttpResponse, RemoteError, RequestOptions, Transport};

/// Hands out `token-1`, `token-2`, ... and records every request.
#[derive(Default)]
pub struct FakeTokens {
    issued: AtomicUsize,
    deny: AtomicBool,
    requests: Mutex<Vec<bool>>,
    invalidated: Mutex<Vec<String>>,
    cleared: AtomicBool,
}

impl FakeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// The `interactive` flag of each `get_token` call.
    pub fn requests(&self) -> Vec<bool> {
        self.requests.lock().unwrap().clone()
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }

    pub fn was_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn get_token(&self, interactive: bool) -> Result<String, AuthError> {
        self.requests.lock().unwrap().push(interactive);
        if self.deny.load(Ordering::SeqCst) {
            return Err(AuthError::ConsentRequired);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{}", n))
    }

    async fn invalidate(&self, token: &str) {
        self.invalidated.lock().unwrap().push(token.to_string());
    }

    async fn clear_all(&self) {
        self.cleared.store(true, Ordering::SeqCst);
    }
}

/// Replies from a queue; an exhausted queue answers 500.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<HttpResponse>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn with(replies: Vec<HttpResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    pub fn status(status: u16) -> HttpResponse {
        HttpResponse { status, body: Vec::new() }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        self.sent.lock().unwrap().push(request);
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FakeTransport::status(500)))
    }
}

/// In-memory Drive with switchable failure modes.
#[derive(Default)]
pub struct FakeDrive {
    pub files: Mutex<HashMap<String, AppState>>,
    /// Raw body served for reads instead of the stored state.
    pub read_override: Mutex<Option<HttpResponse>>,
    /// Status returned by every call that talks to the server.
    pub fail_status: Mutex<Option<u16>>,
    pub unavailable: AtomicBool,
    next_id: AtomicUsize,
    calls: Mutex<Vec<(&'static str, RequestOptions)>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, state: AppState) {
        self.files.lock().unwrap().insert(id.to_string(), state);
    }

    pub fn file(&self, id: &str) -> Option<AppState> {
        self.files.lock().unwrap().get(id).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(&'static str, RequestOptions)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, opts: RequestOptions) -> Option<u16> {
        self.calls.lock().unwrap().push((op, opts));
        *self.fail_status.lock().unwrap()
    }

    fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn find_existing_file(&self, opts: RequestOptions) -> Result<Access<Option<String>>, RemoteError> {
        let failure = self.record("find", opts);
        if self.is_unavailable() {
            return Ok(Access::Unavailable);
        }
        if let Some(status) = failure {
            return Err(RemoteError::Status { operation: "query", status });
        }
        let mut ids: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(Access::Granted(ids.into_iter().next()))
    }

    async fn create_file(&self, state: &AppState, opts: RequestOptions) -> Result<Access<String>, RemoteError> {
        let failure = self.record("create", opts);
        if self.is_unavailable() {
            return Ok(Access::Unavailable);
        }
        if let Some(status) = failure {
            return Err(RemoteError::Status { operation: "create", status });
        }
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.insert(&id, state.clone());
        Ok(Access::Granted(id))
    }

    async fn update_file(
        &self,
        file_id: &str,
        state: &AppState,
        opts: RequestOptions,
    ) -> Result<Access<HttpResponse>, RemoteError> {
        let failure = self.record("update", opts);
        if self.is_unavailable() {
            return Ok(Access::Unavailable);
        }
        if let Some(status) = failure {
            return Ok(Access::Granted(FakeTransport::status(status)));
        }
        let mut files = self.files.lock().unwrap();
        match files.get_mut(file_id) {
            Some(existing) => {
                *existing = state.clone();
                Ok(Access::Granted(FakeTransport::status(200)))
            }
            None => Ok(Access::Granted(FakeTransport::status(404))),
        }
    }

    async fn read_file(&self, file_id: &str, opts: RequestOptions) -> Result<Access<HttpResponse>, RemoteError> {
        let failure = self.record("read", opts);
        if self.is_unavailable() {
            return Ok(Access::Unavailable);
        }
        if let Some(status) = failure {
            return Ok(Access::Granted(FakeTransport::status(status)));
        }
        if let Some(reply) = self.read_override.lock().unwrap().clone() {
            return Ok(Access::Granted(reply));
        }
        match self.file(file_id) {
            Some(state) => Ok(Access::Granted(FakeTransport::ok(serde_json::to_value(&state).unwrap()))),
            None => Ok(Access::Granted(FakeTransport::status(404))),
        }
    }
}
