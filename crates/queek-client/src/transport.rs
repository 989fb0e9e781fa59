//! HTTP transport: URL building, standard headers and error normalization.
//!
//! The actual network call sits behind [`HttpSend`] so hosts can supply their
//! own client (or a scripted one in tests). [`ReqwestSender`] is the default.

use crate::config::PLATFORM_HEADER_VALUE;
use crate::error::{ApiError, ClientError, ClientResult, ErrorCode};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const X_PLATFORM: HeaderName = HeaderName::from_static("x-platform");
const X_CLIENT_KEY: HeaderName = HeaderName::from_static("x-client-key");
const X_VENDOR_SLUG: HeaderName = HeaderName::from_static("x-vendor-slug");
const APPLICATION_JSON: &str = "application/json";

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON, if any.
    pub fn json_body(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

/// Raw response as seen by the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with a JSON body and matching content type.
    pub fn json(status: u16, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers,
            body: body.to_string().into_bytes(),
        }
    }
}

/// The network call used by the client.
#[async_trait]
pub trait HttpSend: Send + Sync {
    /// Perform the request. Any HTTP status is a successful send; only
    /// failures to obtain a response are errors.
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse>;
}

/// Default sender backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(timeout: Option<Duration>) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// One call as issued by the session coordinator.
pub(crate) struct TransportCall<'a> {
    pub method: Method,
    pub path: &'a str,
    pub body: Option<&'a Value>,
    pub headers: &'a HeaderMap,
    pub access_token: Option<&'a str>,
}

/// Applies the backend's header contract and normalizes responses.
#[derive(Clone)]
pub(crate) struct Transport {
    base_url: String,
    client_key: Option<String>,
    vendor_slug: Option<String>,
    http: Arc<dyn HttpSend>,
}

impl Transport {
    pub fn new(
        base_url: &str,
        client_key: Option<String>,
        vendor_slug: Option<String>,
        http: Arc<dyn HttpSend>,
    ) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client_key: client_key.filter(|k| !k.is_empty()),
            vendor_slug: vendor_slug.filter(|s| !s.is_empty()),
            http,
        }
    }

    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Perform a call. Returns the parsed JSON payload of a 2xx response
    /// (`None` when the body is not JSON), or an [`ApiError`] otherwise.
    pub async fn send(&self, call: TransportCall<'_>) -> ClientResult<Option<Value>> {
        let url = self.build_url(call.path);
        let headers = self.build_headers(&call)?;
        let body = match call.body {
            Some(value) => Some(
                serde_json::to_vec(value).map_err(|e| ClientError::Encode(Arc::new(e)))?,
            ),
            None => None,
        };

        debug!(method = %call.method, url = %url, authorized = call.access_token.is_some(), "Sending request");

        let response = self
            .http
            .send(HttpRequest {
                method: call.method,
                url,
                headers,
                body,
            })
            .await?;

        let payload = parse_json(&response);

        if !response.status.is_success() {
            let error = to_api_error(response.status.as_u16(), payload);
            debug!(status = error.status, code = %error.code, "Request failed");
            return Err(error.into());
        }

        Ok(payload)
    }

    fn build_headers(&self, call: &TransportCall<'_>) -> ClientResult<HeaderMap> {
        let mut headers = call.headers.clone();

        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(X_PLATFORM, HeaderValue::from_static(PLATFORM_HEADER_VALUE));
        if let Some(key) = &self.client_key {
            headers.insert(X_CLIENT_KEY, header_value("X-Client-Key", key)?);
        }
        if let Some(slug) = &self.vendor_slug {
            headers.insert(X_VENDOR_SLUG, header_value("X-Vendor-Slug", slug)?);
        }
        if call.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        if let Some(token) = call.access_token.filter(|t| !t.is_empty()) {
            let mut value = header_value("Authorization", &format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("vendor_slug", &self.vendor_slug)
            .finish_non_exhaustive()
    }
}

fn header_value(name: &str, value: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ClientError::Config(format!("{name} contains characters not allowed in a header")))
}

/// JSON payload of a response, or `None` for non-JSON or malformed bodies.
fn parse_json(response: &HttpResponse) -> Option<Value> {
    let is_json = response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(APPLICATION_JSON));

    if !is_json {
        return None;
    }

    serde_json::from_slice(&response.body).ok()
}

fn to_api_error(status: u16, payload: Option<Value>) -> ApiError {
    let field = |name: &str| {
        payload
            .as_ref()
            .and_then(|p| p.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let code = field("error_code")
        .or_else(|| field("error"))
        .map(|c| ErrorCode::from(c.as_str()))
        .unwrap_or(ErrorCode::UnknownError);
    let message = field("message").unwrap_or_else(|| "Request failed".to_string());

    let details = match payload.as_ref().and_then(|p| p.get("data")) {
        Some(data) if !data.is_null() => Some(data.clone()),
        _ => payload.filter(|p| !p.is_null()),
    };

    ApiError {
        message,
        code,
        status,
        details,
    }
}
