use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info};

use super::{
    services::{get_quote, health, submit_contact, submit_quote, subscribe_newsletter},
    state::AppState,
};
use crate::captcha::{ChallengeVerifier, HcaptchaVerifier};
use crate::config::Config;
use crate::ledger::FjallStore;
use crate::mailer;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All intake and operator routes over the given state
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.api.max_body_bytes.as_usize();

    Router::new()
        .route("/api/quote", post(submit_quote))
        .route("/contact", post(submit_contact))
        .route("/newsletter", post(subscribe_newsletter))
        .route("/operators/quotes/{id}", get(get_quote))
        .route("/operators/health", get(health))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Automatically decompress gzip request bodies
                .layer(RequestDecompressionLayer::new())
                // axum's 2MB default would cut off attachments well below the ceiling
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

/// Wire up configuration, storage, verifier and mailer, then serve
pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let address = address.unwrap_or(config.server.bind_addr);

    info!(path = %config.server.fjall_path.display(), "Opening Fjall store");
    let store = FjallStore::open(&config.server.fjall_path)
        .map_err(|e| format!("Failed to open Fjall store: {e}"))?;

    let verifier: Arc<dyn ChallengeVerifier> = Arc::new(
        HcaptchaVerifier::from_config(&config.captcha)
            .map_err(|e| format!("Failed to initialize captcha verifier: {e}"))?,
    );
    let mailer = mailer::from_config(&config.mail)
        .map_err(|e| format!("Failed to initialize mailer: {e}"))?;

    let state = AppState::new(config, store, verifier, mailer);
    let store = Arc::clone(&state.store);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Quotebox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Flushing ledger before exit");
    if let Err(e) = store.persist() {
        error!(error = %e, "Failed to flush ledger");
        return Err(e.into());
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
