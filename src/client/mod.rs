//! Headless quote-form client
//!
//! Holds form state, validates it, obtains a challenge token and uploads the
//! submission to `POST /api/quote`:
//!
//! - [`form`]: form state and the field validator
//! - [`challenge`]: token acquisition around the verification widget
//! - [`timeout`]: focus-aware countdown used while a challenge is open
//! - [`transport`]: multipart upload with progress and cancellation
//! - [`status`]: submission status and notice text
//! - [`coordinator`]: one end-to-end submission attempt

pub mod challenge;
pub mod coordinator;
pub mod form;
pub mod status;
pub mod timeout;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::humanize::ByteSize;

pub use challenge::{
    ChallengeAcquirer, ChallengeError, ChallengeSettings, ChallengeState, ChallengeWidget,
    StaticTokenWidget, WidgetCallbacks, WidgetError,
};
pub use coordinator::{StatusView, SubmissionCoordinator, SubmitError};
pub use form::{Field, FormState, ValidationErrors, validate};
pub use status::{Notice, NoticeKind, SubmissionStatus};
pub use timeout::WindowFocus;
pub use transport::{HttpTransport, QuoteTransport, TransportError};

/// Largest attachment the form will send
pub const MAX_UPLOAD_BYTES: ByteSize = ByteSize::mebibytes(20);

impl From<&ClientConfig> for ChallengeSettings {
    fn from(config: &ClientConfig) -> Self {
        ChallengeSettings::builder()
            .ready_wait(Duration::from_millis(config.ready_wait_ms))
            .ready_poll(Duration::from_millis(config.ready_poll_ms))
            .execute_timeout(Duration::from_secs(config.execute_timeout_secs))
            .build()
    }
}

/// Coordinator wired to the configured endpoint with a fixed-token widget
///
/// The returned [`WindowFocus`] must be kept alive for as long as the
/// coordinator is used.
pub fn headless(
    config: &ClientConfig,
    token: impl Into<String>,
) -> Result<(SubmissionCoordinator, WindowFocus), TransportError> {
    let focus = WindowFocus::new();
    let acquirer = ChallengeAcquirer::new(
        Arc::new(StaticTokenWidget::new(token)),
        ChallengeSettings::from(config),
        focus.subscribe(),
    );
    let transport = HttpTransport::from_config(config)?;

    let coordinator = SubmissionCoordinator::builder()
        .acquirer(Arc::new(acquirer))
        .transport(Arc::new(transport))
        .request_timeout(config.request_timeout())
        .build();

    Ok((coordinator, focus))
}
