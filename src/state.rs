use std::sync::Arc;

use crate::auth::{AuthProvider, SessionAuth};
use crate::config::{Config, Timings};
use crate::mutation::pending::PendingMoves;
use crate::network::{HttpNetworkProbe, NetworkProbe};
use crate::notify::{Notifier, TracingNotifier};
use crate::osm::{OsmClient, OsmGateway};
use crate::storage::{FileBackend, Store, StoreError};

/// Collaborators and session-wide state shared by every view.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub gateway: Arc<dyn OsmGateway>,
    pub auth: Arc<dyn AuthProvider>,
    pub network: Arc<dyn NetworkProbe>,
    pub notifier: Arc<dyn Notifier>,
    pub timings: Timings,
    pub pending: PendingMoves,
}

impl AppState {
    pub fn new(
        store: Store,
        gateway: Arc<dyn OsmGateway>,
        auth: Arc<dyn AuthProvider>,
        network: Arc<dyn NetworkProbe>,
        notifier: Arc<dyn Notifier>,
        timings: Timings,
    ) -> Self {
        Self {
            store,
            gateway,
            auth,
            network,
            notifier,
            timings,
            pending: PendingMoves::default(),
        }
    }

    /// File-backed store, HTTP gateway, env-provided auth and log toasts.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store = Store::new(FileBackend::open(&config.store_dir)?);
        Ok(Self::new(
            store,
            Arc::new(OsmClient::new(&config.gateway_url)),
            Arc::new(SessionAuth::from_env(config.demo_mode)),
            Arc::new(HttpNetworkProbe::new(&config.gateway_url)),
            Arc::new(TracingNotifier),
            config.timings,
        ))
    }
}
