//! Scripted backend used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use queek_client::{ClientConfig, ClientError, ClientResult, HttpRequest, HttpResponse, HttpSend};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BASE_URL: &str = "https://api.example.com/api/v1";
pub const REFRESH_PATH: &str = "/client/auth/token/refresh";

type Handler = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

/// Fake backend: records every request and answers through a handler.
pub struct FakeBackend {
    handler: Box<Handler>,
    refresh_delay: Option<Duration>,
    /// Path whose calls fail before any response is produced.
    unreachable_path: Option<String>,
    requests: Mutex<Vec<HttpRequest>>,
    refresh_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self::build(handler, None, None)
    }

    /// Like [`FakeBackend::new`], but refresh calls take `delay` to answer.
    pub fn with_refresh_delay<F>(delay: Duration, handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self::build(handler, Some(delay), None)
    }

    /// Like [`FakeBackend::new`], but calls to `path` fail with a network error.
    pub fn with_unreachable_path<F>(path: &str, handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self::build(handler, None, Some(path.to_string()))
    }

    fn build<F>(
        handler: F,
        refresh_delay: Option<Duration>,
        unreachable_path: Option<String>,
    ) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            refresh_delay,
            unreachable_path,
            requests: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| path_of(r) == path)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpSend for FakeBackend {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        self.requests.lock().push(request.clone());

        if path_of(&request) == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.refresh_delay {
                tokio::time::sleep(delay).await;
            }
        }

        if self.unreachable_path.as_deref() == Some(path_of(&request)) {
            return Err(ClientError::network(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        Ok((self.handler)(&request))
    }
}

/// Request path relative to [`BASE_URL`].
pub fn path_of(request: &HttpRequest) -> &str {
    request
        .url
        .strip_prefix(BASE_URL)
        .unwrap_or(&request.url)
}

pub fn bearer(request: &HttpRequest) -> Option<&str> {
    request
        .header("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub fn token_data(access: &str, refresh: &str) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access,
        "expires_in": 3600,
        "expires_at": "2026-02-28T10:00:00Z",
        "refresh_token": refresh,
        "refresh_expires_in": 86400,
        "refresh_expires_at": "2026-03-01T10:00:00Z",
        "platform": "client_web",
        "user": {
            "id": "user-1",
            "first_name": "Ada",
            "last_name": "Obi",
            "name": "Ada Obi",
            "email": "ada@example.com",
            "phone": "+2348012345678",
            "avatar": null,
            "status": "active"
        }
    })
}

pub fn success(data: Value) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({ "status": "success", "message": "OK", "data": data }),
    )
}

/// A response with an arbitrary content type and raw body.
pub fn raw(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
    let mut response = HttpResponse::json(status, &Value::Null);
    response.headers.clear();
    if let Some(content_type) = content_type {
        if let Ok(value) = reqwest::header::HeaderValue::from_str(content_type) {
            response.headers.insert(reqwest::header::CONTENT_TYPE, value);
        }
    }
    response.body = body.as_bytes().to_vec();
    response
}

pub fn failure(status: u16, code: &str, message: &str) -> HttpResponse {
    HttpResponse::json(
        status,
        &json!({ "status": "failed", "error_code": code, "message": message }),
    )
}

pub fn external_config(http: Arc<FakeBackend>) -> ClientConfig {
    ClientConfig::new(BASE_URL)
        .with_client_key("public-key-abc")
        .with_vendor_slug("vendor-one")
        .with_http(http)
}
