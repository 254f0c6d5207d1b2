use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Answers "are we online?" so a rejected change can say why.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn check_network_status(&self) -> bool;
}

/// Probes the gateway's health endpoint with a short timeout.
#[derive(Debug, Clone)]
pub struct HttpNetworkProbe {
    client: reqwest::Client,
    health_url: String,
}

impl HttpNetworkProbe {
    pub fn new(gateway_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            health_url: format!("{}/health", gateway_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl NetworkProbe for HttpNetworkProbe {
    async fn check_network_status(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(category = "api", error = %e, "Network probe failed");
                false
            }
        }
    }
}

/// Fixed answer, for embedders that track connectivity themselves.
#[derive(Debug, Clone, Copy)]
pub struct StaticNetworkProbe(pub bool);

#[async_trait]
impl NetworkProbe for StaticNetworkProbe {
    async fn check_network_status(&self) -> bool {
        self.0
    }
}
