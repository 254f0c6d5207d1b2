//! Who is acting and with which OSM token.

use crate::error::CoreError;

pub mod user;

pub use user::SessionAuth;

pub trait AuthProvider: Send + Sync {
    /// Current OSM access token, if the user is signed in.
    fn token(&self) -> Option<String>;

    /// Demo sessions never talk to OSM.
    fn is_demo_mode(&self) -> bool;

    /// Name stamped into sign-in/out columns.
    fn user_display_name(&self) -> String;
}

/// Token for a remote call. `Ok(None)` means demo mode: skip the remote.
pub fn ensure_token(auth: &dyn AuthProvider) -> Result<Option<String>, CoreError> {
    if auth.is_demo_mode() {
        return Ok(None);
    }
    match auth.token() {
        Some(token) if !token.trim().is_empty() => Ok(Some(token)),
        _ => Err(CoreError::auth_expired()),
    }
}

/// Token for a read. Reads without a token fall back to the cache instead
/// of failing, and demo sessions always read from the cache.
pub fn read_token(auth: &dyn AuthProvider) -> Option<String> {
    if auth.is_demo_mode() {
        return None;
    }
    auth.token().filter(|t| !t.trim().is_empty())
}
