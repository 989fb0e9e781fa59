//! Client SDK for the Queek API.
//!
//! This crate provides:
//! - Phone/OTP login, registration, logout and current-user lookup
//! - Transparent access-token attachment on every request
//! - Single-flight token refresh with one retry when a call returns 401
//! - Generic GET/POST/PUT/DELETE passthrough sharing the same session
//!
//! ```rust,ignore
//! let client = QueekClient::new(
//!     ClientConfig::new("https://api.queek.com.ng/api/v1").with_client_key("qck_..."),
//! )?;
//!
//! client.auth().request_otp(RequestOtpPayload::new("+14155552671")).await?;
//! client.auth().verify_otp(VerifyOtpPayload::new("+14155552671", "1234")).await?;
//! let info: ApiEnvelope<serde_json::Value> = client.get("/client/store/info", Default::default()).await?;
//! ```

mod auth;
mod client;
mod config;
mod error;
mod session;
mod session_fsm;
mod transport;
mod types;

pub use client::QueekClient;
pub use config::{
    ClientConfig, ClientMode, DEFAULT_AUTH_PREFIX, DEFAULT_PLATFORM, PLATFORM_HEADER_VALUE,
};
pub use error::{ApiError, ClientError, ClientResult, ErrorCode};
pub use session::{AuthStateCallback, SessionCoordinator};
pub use session_fsm::{session_machine, AuthState};
pub use transport::{HttpRequest, HttpResponse, HttpSend, ReqwestSender};
pub use types::{
    ApiEnvelope, AuthSession, ClientUser, MeResponse, OtpChallenge, OtpChannel, RegisterPayload,
    RequestConfig, RequestOptions, RequestOtpPayload, VerifyOtpPayload,
};

pub use queek_storage::{FileStorage, MemoryStorage, StorageError, StorageKeys, TokenStorage};
