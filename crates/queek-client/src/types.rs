//! Request and response contracts of the Queek client API.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Success envelope wrapping every 2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Delivery channel for the one-time passcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    #[default]
    Sms,
    Whatsapp,
}

/// Account as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Token pair and account returned by verify-OTP, register and refresh.
///
/// Only the two tokens are required. Every other field falls back to its
/// default when missing or malformed, so an issued token pair is never
/// dropped over a cosmetic field.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(default, deserialize_with = "lenient")]
    pub token_type: String,
    pub access_token: String,
    /// Access token lifetime in seconds.
    #[serde(default, deserialize_with = "lenient")]
    pub expires_in: i64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: String,
    /// Refresh token lifetime in seconds.
    #[serde(default, deserialize_with = "lenient")]
    pub refresh_expires_in: i64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub refresh_expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub platform: String,
    #[serde(default, deserialize_with = "lenient")]
    pub user: ClientUser,
}

/// Decode `T`, or fall back to its default when the value has another shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC) and unix seconds.
/// Anything else decodes as `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::String(raw) => parse_timestamp(raw.trim()),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    };
    Ok(parsed)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token_type", &self.token_type)
            .field("access_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &"[redacted]")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("platform", &self.platform)
            .field("user", &self.user)
            .finish()
    }
}

/// Challenge metadata returned after an OTP was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Always `verify_otp` today.
    pub next_action: String,
    pub phone: String,
    pub user_exists: bool,
    /// Seconds until the code expires.
    pub expires_in: i64,
    /// Seconds until another code may be requested.
    pub resend_in: i64,
    /// Only populated by non-production backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: ClientUser,
}

/// Input for [`crate::SessionCoordinator::request_otp`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOtpPayload {
    pub phone: String,
    pub country_code: Option<String>,
    pub channel: OtpChannel,
}

impl RequestOtpPayload {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            country_code: None,
            channel: OtpChannel::default(),
        }
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    pub fn with_channel(mut self, channel: OtpChannel) -> Self {
        self.channel = channel;
        self
    }
}

/// Input for [`crate::SessionCoordinator::verify_otp`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOtpPayload {
    pub phone: String,
    pub country_code: Option<String>,
    pub otp_code: String,
    /// Falls back to the configured platform.
    pub platform: Option<String>,
}

impl VerifyOtpPayload {
    pub fn new(phone: impl Into<String>, otp_code: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            country_code: None,
            otp_code: otp_code.into(),
            platform: None,
        }
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}

/// Input for [`crate::SessionCoordinator::register`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegisterPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub country_code: Option<String>,
    pub otp_code: String,
    pub username: Option<String>,
    /// Falls back to the configured platform.
    pub platform: Option<String>,
}

/// Per-call options shared by the verb helpers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers. The client's standard headers take precedence.
    pub headers: HeaderMap,
    /// `Some(false)` disables refresh-and-retry on 401 for this call.
    pub retry_on_unauthorized: Option<bool>,
}

impl RequestOptions {
    pub fn without_retry() -> Self {
        Self {
            retry_on_unauthorized: Some(false),
            ..Self::default()
        }
    }
}

/// A logical request routed through the session coordinator.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Path relative to the base URL.
    pub path: String,
    pub method: Method,
    /// JSON body; `None` sends no body at all.
    pub body: Option<Value>,
    pub options: RequestOptions,
}

impl RequestConfig {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn retry_allowed(&self) -> bool {
        self.options.retry_on_unauthorized != Some(false)
    }
}
