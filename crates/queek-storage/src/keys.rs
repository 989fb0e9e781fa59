//! Storage key constants.

/// Default storage keys used by the session coordinator
pub struct StorageKeys;

impl StorageKeys {
    /// Access token slot
    pub const ACCESS_TOKEN: &'static str = "queek_client_access_token";

    /// Refresh token slot
    pub const REFRESH_TOKEN: &'static str = "queek_client_refresh_token";
}
