//! Phone/OTP authentication operations.

use crate::error::{ClientError, ClientResult};
use crate::session::SessionCoordinator;
use crate::types::{
    AuthSession, MeResponse, OtpChallenge, OtpChannel, RegisterPayload, RequestConfig,
    RequestOtpPayload, VerifyOtpPayload,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Serialize)]
struct RequestOtpBody<'a> {
    phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    country_code: Option<&'a str>,
    channel: OtpChannel,
}

#[derive(Serialize)]
struct VerifyOtpBody<'a> {
    phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    country_code: Option<&'a str>,
    otp_code: &'a str,
    platform: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    first_name: &'a str,
    last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    phone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    country_code: Option<&'a str>,
    otp_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    platform: &'a str,
}

fn to_body<T: Serialize>(body: &T) -> ClientResult<Value> {
    serde_json::to_value(body).map_err(|e| ClientError::Encode(Arc::new(e)))
}

impl SessionCoordinator {
    /// Ask the backend to send a one-time passcode to `payload.phone`.
    pub async fn request_otp(&self, payload: RequestOtpPayload) -> ClientResult<OtpChallenge> {
        let body = to_body(&RequestOtpBody {
            phone: &payload.phone,
            country_code: payload.country_code.as_deref(),
            channel: payload.channel,
        })?;

        let envelope = self
            .request::<OtpChallenge>(RequestConfig::post(self.endpoint("/phone/request-otp"), body))
            .await?;

        info!(
            user_exists = envelope.data.user_exists,
            resend_in = envelope.data.resend_in,
            "OTP requested"
        );
        Ok(envelope.data)
    }

    /// Exchange a passcode for a session. The returned tokens are stored.
    pub async fn verify_otp(&self, payload: VerifyOtpPayload) -> ClientResult<AuthSession> {
        let body = to_body(&VerifyOtpBody {
            phone: &payload.phone,
            country_code: payload.country_code.as_deref(),
            otp_code: &payload.otp_code,
            platform: payload.platform.as_deref().unwrap_or(self.platform()),
        })?;

        let envelope = self
            .request::<AuthSession>(RequestConfig::post(self.endpoint("/phone/verify-otp"), body))
            .await?;

        self.sign_in(&envelope.data);
        info!(user_id = %envelope.data.user.id, "Signed in with OTP");
        Ok(envelope.data)
    }

    /// Create an account. The returned tokens are stored.
    pub async fn register(&self, payload: RegisterPayload) -> ClientResult<AuthSession> {
        let body = to_body(&RegisterBody {
            first_name: &payload.first_name,
            last_name: &payload.last_name,
            email: payload.email.as_deref(),
            phone: &payload.phone,
            country_code: payload.country_code.as_deref(),
            otp_code: &payload.otp_code,
            username: payload.username.as_deref(),
            platform: payload.platform.as_deref().unwrap_or(self.platform()),
        })?;

        let envelope = self
            .request::<AuthSession>(RequestConfig::post(self.endpoint("/register"), body))
            .await?;

        self.sign_in(&envelope.data);
        info!(user_id = %envelope.data.user.id, "Registered new account");
        Ok(envelope.data)
    }

    /// The currently authenticated account.
    pub async fn me(&self) -> ClientResult<MeResponse> {
        let envelope = self
            .request::<MeResponse>(RequestConfig::get(self.endpoint("/me")))
            .await?;
        Ok(envelope.data)
    }

    /// Revoke the session server-side and clear it locally.
    ///
    /// The local session is cleared even when the server call fails.
    pub async fn logout(&self) {
        let body = match self.refresh_token() {
            Some(refresh_token) => json!({ "refresh_token": refresh_token }),
            None => json!({}),
        };

        let config = RequestConfig::post(self.endpoint("/logout"), body);
        if let Err(e) = self.request_with_auto_refresh(&config).await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        self.sign_out();
        info!("Logged out");
    }
}
