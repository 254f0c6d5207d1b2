use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Delays the core waits on. Empirically tuned, so they stay adjustable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// How long a pending move outlives the remote acknowledgement.
    pub pending_settle: Duration,
    /// Clears a stale dragging member when no mutation followed the drop.
    pub drag_safety: Duration,
    /// Gap between per-member writes while deleting a group.
    pub delete_pacing: Duration,
    /// Delay before the background refresh that follows a rename or delete.
    pub refresh_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            pending_settle: Duration::from_millis(500),
            drag_safety: Duration::from_millis(3000),
            delete_pacing: Duration::from_millis(100),
            refresh_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: String,
    pub store_dir: PathBuf,
    pub rust_log: String,
    pub demo_mode: bool,
    pub timings: Timings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env is fine; the variables may come from the environment.
        dotenvy::dotenv().ok();

        let gateway_url = env::var("OSM_GATEWAY_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        let store_dir = env::var("VIKING_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".viking-store"));
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "debug".into());
        let demo_mode = env::var("VIKING_DEMO_MODE")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let defaults = Timings::default();
        let timings = Timings {
            pending_settle: millis_var("VIKING_PENDING_SETTLE_MS", defaults.pending_settle)?,
            drag_safety: millis_var("VIKING_DRAG_SAFETY_MS", defaults.drag_safety)?,
            delete_pacing: millis_var("VIKING_DELETE_PACING_MS", defaults.delete_pacing)?,
            refresh_delay: millis_var("VIKING_REFRESH_DELAY_MS", defaults.refresh_delay)?,
        };

        Ok(Self {
            gateway_url,
            store_dir,
            rust_log,
            demo_mode,
            timings,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn millis_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let ms = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{name} must be a number of milliseconds"))?;
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(default),
    }
}
