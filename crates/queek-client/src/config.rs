//! Client configuration.

use crate::transport::HttpSend;
use crate::{ClientError, ClientResult};
use queek_storage::{StorageKeys, TokenStorage};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Path prefix of the client auth endpoints.
pub const DEFAULT_AUTH_PREFIX: &str = "/client/auth";

/// Platform reported in login, register and refresh bodies.
pub const DEFAULT_PLATFORM: &str = "client_web";

/// Value of the `X-Platform` header sent on every request.
pub const PLATFORM_HEADER_VALUE: &str = "storefront";

/// How the client is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientMode {
    /// Third-party integration. A client key is mandatory.
    #[default]
    ExternalSdk,
    /// Queek-hosted storefront, identified by vendor slug only.
    HostedStorefront,
}

impl ClientMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "external_sdk" => Some(ClientMode::ExternalSdk),
            "hosted_storefront" => Some(ClientMode::HostedStorefront),
            _ => None,
        }
    }
}

/// Immutable per-client settings, consumed by [`crate::QueekClient::new`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API base root, e.g. `https://api.queek.com.ng/api/v1`.
    pub base_url: String,
    /// Public client key sent as `X-Client-Key`.
    pub client_key: Option<String>,
    /// Vendor slug sent as `X-Vendor-Slug`.
    pub vendor_slug: Option<String>,
    pub mode: ClientMode,
    /// Platform reported to the auth endpoints.
    pub platform: String,
    /// Prefix of the auth endpoints.
    pub auth_prefix: String,
    pub access_token_storage_key: String,
    pub refresh_token_storage_key: String,
    /// Backend for the access token slot. In-memory when unset.
    pub access_token_storage: Option<Arc<dyn TokenStorage>>,
    /// Backend for the refresh token slot. In-memory when unset.
    pub refresh_token_storage: Option<Arc<dyn TokenStorage>>,
    /// Custom network call. A reqwest sender is built when unset.
    pub http: Option<Arc<dyn HttpSend>>,
    /// Per-request timeout for the default sender.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_key: None,
            vendor_slug: None,
            mode: ClientMode::default(),
            platform: DEFAULT_PLATFORM.to_string(),
            auth_prefix: DEFAULT_AUTH_PREFIX.to_string(),
            access_token_storage_key: StorageKeys::ACCESS_TOKEN.to_string(),
            refresh_token_storage_key: StorageKeys::REFRESH_TOKEN.to_string(),
            access_token_storage: None,
            refresh_token_storage: None,
            http: None,
            timeout: None,
        }
    }

    /// Build a config from `QUEEK_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Reads `QUEEK_BASE_URL` (required), `QUEEK_CLIENT_KEY`,
    /// `QUEEK_VENDOR_SLUG`, `QUEEK_PLATFORM` and `QUEEK_MODE`.
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).and_then(non_empty);

        let base_url = var("QUEEK_BASE_URL")
            .ok_or_else(|| ClientError::Config("QUEEK_BASE_URL is not set".to_string()))?;

        let mut config = Self::new(base_url);
        config.client_key = var("QUEEK_CLIENT_KEY");
        config.vendor_slug = var("QUEEK_VENDOR_SLUG");
        if let Some(platform) = var("QUEEK_PLATFORM") {
            config.platform = platform;
        }
        if let Some(raw) = var("QUEEK_MODE") {
            config.mode = ClientMode::parse(&raw).ok_or_else(|| {
                ClientError::Config(format!(
                    "QUEEK_MODE must be external_sdk or hosted_storefront, got {raw}"
                ))
            })?;
        }

        Ok(config)
    }

    pub fn with_client_key(mut self, client_key: impl Into<String>) -> Self {
        self.client_key = Some(client_key.into());
        self
    }

    pub fn with_vendor_slug(mut self, vendor_slug: impl Into<String>) -> Self {
        self.vendor_slug = Some(vendor_slug.into());
        self
    }

    pub fn with_mode(mut self, mode: ClientMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_auth_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.auth_prefix = prefix.into();
        self
    }

    /// Use one backend for both token slots.
    pub fn with_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.access_token_storage = Some(storage.clone());
        self.refresh_token_storage = Some(storage);
        self
    }

    pub fn with_access_token_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.access_token_storage = Some(storage);
        self
    }

    pub fn with_refresh_token_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.refresh_token_storage = Some(storage);
        self
    }

    pub fn with_storage_keys(
        mut self,
        access_key: impl Into<String>,
        refresh_key: impl Into<String>,
    ) -> Self {
        self.access_token_storage_key = access_key.into();
        self.refresh_token_storage_key = refresh_key.into();
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpSend>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check the settings that must hold before any request is made.
    pub fn validate(&self) -> ClientResult<()> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| {
            ClientError::Config(format!("Invalid base URL {:?}: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "Base URL must use http or https, got {}",
                url.scheme()
            )));
        }

        let has_key = self
            .client_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if self.mode == ClientMode::ExternalSdk && !has_key {
            return Err(ClientError::Config(
                "A client key is required when mode is external_sdk".to_string(),
            ));
        }

        if self.access_token_storage_key.is_empty() || self.refresh_token_storage_key.is_empty() {
            return Err(ClientError::Config(
                "Token storage keys must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_key", &self.client_key.as_ref().map(|_| "[set]"))
            .field("vendor_slug", &self.vendor_slug)
            .field("mode", &self.mode)
            .field("platform", &self.platform)
            .field("auth_prefix", &self.auth_prefix)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://api.example.com/api/v1");
        assert_eq!(config.mode, ClientMode::ExternalSdk);
        assert_eq!(config.platform, DEFAULT_PLATFORM);
        assert_eq!(config.auth_prefix, DEFAULT_AUTH_PREFIX);
        assert_eq!(config.access_token_storage_key, "queek_client_access_token");
        assert_eq!(config.refresh_token_storage_key, "queek_client_refresh_token");
    }

    #[test]
    fn test_external_sdk_requires_client_key() {
        let err = ClientConfig::new("https://api.example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(ref msg) if msg.contains("client key")));

        ClientConfig::new("https://api.example.com")
            .with_client_key("public-key-abc")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_hosted_storefront_without_client_key() {
        ClientConfig::new("https://api.example.com")
            .with_mode(ClientMode::HostedStorefront)
            .with_vendor_slug("vendor-hosted")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig::new("not a url").with_client_key("k");
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));

        let config = ClientConfig::new("ftp://api.example.com").with_client_key("k");
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("QUEEK_BASE_URL", "https://api.example.com/api/v1"),
            ("QUEEK_VENDOR_SLUG", "vendor-one"),
            ("QUEEK_MODE", "hosted_storefront"),
            ("QUEEK_CLIENT_KEY", "  "),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com/api/v1");
        assert_eq!(config.vendor_slug.as_deref(), Some("vendor-one"));
        assert_eq!(config.mode, ClientMode::HostedStorefront);
        assert!(config.client_key.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_lookup_requires_base_url() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_from_lookup_rejects_unknown_mode() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("QUEEK_BASE_URL", "https://api.example.com"),
            ("QUEEK_MODE", "kiosk"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ClientError::Config(ref msg) if msg.contains("kiosk")));
    }

    #[test]
    fn test_debug_hides_client_key() {
        let config = ClientConfig::new("https://api.example.com").with_client_key("secret-key");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-key"));
    }
}
