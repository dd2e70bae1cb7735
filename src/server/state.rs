use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cluster::PollerConfig;
use crate::config::Settings;

/// Shared application state. The settings snapshot and token are read-only
/// after startup; concurrent requests share nothing else.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub token: Arc<String>,
    pub poller: Arc<PollerConfig>,
    processed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(settings: Settings, token: String) -> Self {
        Self {
            settings: Arc::new(settings),
            token: Arc::new(token),
            poller: Arc::new(PollerConfig::default()),
            processed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Override the poll timing, mainly for tests.
    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = Arc::new(poller);
        self
    }

    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
