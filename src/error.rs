use thiserror::Error;

/// Failures surfaced by the coordination core.
///
/// Every variant's message is what the notification sink shows, so the
/// strings are written for the person holding the phone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    RemoteRejection(String),


    #[error("{0}")]
    StructureMissing(String),
}

pub const AUTH_EXPIRED_MESSAGE: &str =
    "Authentication expired. Please sign in again to make changes.";
pub const OFFLINE_MESSAGE: &str =
    "You are currently offline. Changes require an internet connection.";
pub const REFRESH_APP_MESSAGE: &str =
    "Viking Event data is missing for this section. Please refresh the app.";

impl CoreError {
    pub fn auth_expired() -> Self {
        CoreError::Auth(AUTH_EXPIRED_MESSAGE.to_string())
    }

    pub fn offline() -> Self {
        CoreError::Network(OFFLINE_MESSAGE.to_string())
    }

    pub fn structure_missing(detail: impl Into<String>) -> Self {
        CoreError::StructureMissing(format!("{} ({})", REFRESH_APP_MESSAGE, detail.into()))
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Rewrites the message, keeping the kind.
    pub fn map_message(self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            CoreError::Validation(m) => CoreError::Validation(f(&m)),
            CoreError::Auth(m) => CoreError::Auth(f(&m)),
            CoreError::Network(m) => CoreError::Network(f(&m)),
            CoreError::RemoteRejection(m) => CoreError::RemoteRejection(f(&m)),
            CoreError::StructureMissing(m) => CoreError::StructureMissing(f(&m)),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
            {
                return CoreError::auth_expired();
            }
            return CoreError::RemoteRejection(format!("OSM gateway returned {}", status));
        }
        if err.is_decode() {
            return CoreError::RemoteRejection(format!("Unexpected response from OSM: {}", err));
        }
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return CoreError::offline();
        }
        CoreError::Network(err.to_string())
    }
}
