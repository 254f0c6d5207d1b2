use std::sync::{PoisonError, RwLock};

use super::AuthProvider;

/// Auth state for one signed-in leader. The token can be replaced or lost
/// while the session runs (expiry, sign-out in another tab).
#[derive(Debug)]
pub struct SessionAuth {
    token: RwLock<Option<String>>,
    demo_mode: bool,
    display_name: String,
}

impl SessionAuth {
    pub fn new(token: Option<String>, display_name: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token),
            demo_mode: false,
            display_name: display_name.into(),
        }
    }

    pub fn demo(display_name: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(None),
            demo_mode: true,
            display_name: display_name.into(),
        }
    }

    /// Reads `OSM_ACCESS_TOKEN` and `VIKING_USER_NAME`.
    pub fn from_env(demo_mode: bool) -> Self {
        let display_name =
            std::env::var("VIKING_USER_NAME").unwrap_or_else(|_| "Unknown Leader".into());
        if demo_mode {
            return Self::demo(display_name);
        }
        Self::new(std::env::var("OSM_ACCESS_TOKEN").ok(), display_name)
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl AuthProvider for SessionAuth {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    fn user_display_name(&self) -> String {
        self.display_name.clone()
    }
}
