use std::sync::Arc;

use crate::captcha::ChallengeVerifier;
use crate::config::Config;
use crate::ledger::FjallStore;
use crate::mailer::Mailer;
use crate::observability::Metrics;

/// Shared per-process resources, opened once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<FjallStore>,
    pub verifier: Arc<dyn ChallengeVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: FjallStore,
        verifier: Arc<dyn ChallengeVerifier>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            verifier,
            mailer,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
