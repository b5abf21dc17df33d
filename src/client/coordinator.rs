use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::challenge::{ChallengeAcquirer, ChallengeError};
use super::form::{Field, FormState, ValidationErrors};
use super::status::{Notice, SubmissionStatus, percent, uploading_message};
use super::transport::{ProgressFn, QuoteTransport, TransportError, Upload};
use crate::api::models::{Attachment, SubmissionResponse};
use crate::humanize::ByteSize;

use super::MAX_UPLOAD_BYTES;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("form has errors: {0}")]
    Validation(ValidationErrors),

    #[error("attachment is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("submission canceled")]
    Canceled,

    #[error("network error: {0}")]
    Network(String),

    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },

    #[error("a submission is already in progress")]
    AlreadySubmitting,
}

impl From<TransportError> for SubmitError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Canceled => SubmitError::Canceled,
            TransportError::TimedOut => SubmitError::Network("upload timed out".to_string()),
            TransportError::Network(message) => SubmitError::Network(message),
            TransportError::Server { status, message } => SubmitError::Server { status, message },
        }
    }
}

impl SubmitError {
    /// Text for the form's notice line
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(_) => "Please fix the highlighted fields.".to_string(),
            SubmitError::FileTooLarge { limit, .. } => {
                format!("File is too large (max {}).", ByteSize(*limit).to_human_readable())
            }
            SubmitError::Challenge(ChallengeError::InitializationTimeout) => {
                "Verification is still loading. Please try again in a moment.".to_string()
            }
            SubmitError::Challenge(ChallengeError::TimedOut) => {
                "Verification timed out. Please try again.".to_string()
            }
            SubmitError::Challenge(_) => "Verification failed. Please try again.".to_string(),
            SubmitError::Canceled => "Submission canceled.".to_string(),
            SubmitError::Network(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            SubmitError::Server { message, .. } => message.clone(),
            SubmitError::AlreadySubmitting => "Your request is already being sent.".to_string(),
        }
    }
}

/// Status and notice, published together so a reader never sees them disagree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusView {
    pub status: SubmissionStatus,
    pub notice: Option<Notice>,
}

#[derive(Debug, Default)]
enum InFlight {
    #[default]
    Idle,
    Acquiring(CancellationToken),
    Uploading(CancellationToken),
}

/// 1-second notice ticker, aborted when dropped
struct UploadTicker {
    handle: JoinHandle<()>,
}

impl UploadTicker {
    fn start(view: Arc<watch::Sender<StatusView>>, progress: Arc<AtomicU8>) -> Self {
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(Duration::from_secs(1));
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let elapsed = started.elapsed();
                let percent = progress.load(Ordering::Relaxed);
                view.send_if_modified(|view| {
                    if !matches!(view.status, SubmissionStatus::Uploading { .. }) {
                        return false;
                    }
                    view.status = SubmissionStatus::Uploading {
                        percent,
                        elapsed_secs: elapsed.as_secs(),
                    };
                    view.notice = Some(Notice::progress(uploading_message(elapsed, percent)));
                    true
                });
            }
        });
        Self { handle }
    }
}

impl Drop for UploadTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Releases the submission slot on every exit path, including a dropped future
struct SubmitGuard<'a> {
    coordinator: &'a SubmissionCoordinator,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        let coordinator = self.coordinator;
        *coordinator.lock_in_flight() = InFlight::Idle;
        coordinator.view.send_if_modified(|view| {
            if !view.status.is_busy() {
                return false;
            }
            view.status = SubmissionStatus::Idle;
            view.notice = None;
            true
        });
        coordinator.submitting.store(false, Ordering::Release);
    }
}

/// Drives one quote form from validation to the server's answer
pub struct SubmissionCoordinator {
    form: Mutex<FormState>,
    acquirer: Arc<ChallengeAcquirer>,
    transport: Arc<dyn QuoteTransport>,
    max_upload_bytes: u64,
    request_timeout: Duration,
    submitting: AtomicBool,
    in_flight: Mutex<InFlight>,
    view: Arc<watch::Sender<StatusView>>,
}

#[bon::bon]
impl SubmissionCoordinator {
    #[builder]
    pub fn new(
        acquirer: Arc<ChallengeAcquirer>,
        transport: Arc<dyn QuoteTransport>,
        #[builder(default = MAX_UPLOAD_BYTES.as_u64())] max_upload_bytes: u64,
        #[builder(default = Duration::from_secs(120))] request_timeout: Duration,
    ) -> Self {
        let (view, _) = watch::channel(StatusView::default());
        Self {
            form: Mutex::new(FormState::new()),
            acquirer,
            transport,
            max_upload_bytes,
            request_timeout,
            submitting: AtomicBool::new(false),
            in_flight: Mutex::new(InFlight::Idle),
            view: Arc::new(view),
        }
    }
}

impl SubmissionCoordinator {
    fn lock_form(&self) -> MutexGuard<'_, FormState> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        self.lock_form().set_field(field, value);
    }

    pub fn set_attachment(&self, attachment: Option<Attachment>) {
        self.lock_form().set_attachment(attachment);
    }

    pub fn form_state(&self) -> FormState {
        self.lock_form().clone()
    }

    pub fn view(&self) -> StatusView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.view.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    fn publish(&self, status: SubmissionStatus, notice: Option<Notice>) {
        self.view.send_replace(StatusView { status, notice });
    }

    fn fail(&self, err: SubmitError) -> SubmitError {
        warn!(error = %err, "Submission failed");
        self.publish(
            SubmissionStatus::Error {
                message: err.user_message(),
            },
            Some(Notice::error(err.user_message())),
        );
        err
    }

    fn canceled(&self) -> SubmitError {
        info!("Submission canceled, form kept");
        self.publish(SubmissionStatus::Idle, None);
        SubmitError::Canceled
    }

    async fn acquire_token(&self) -> Result<String, ChallengeError> {
        if let Some(token) = self.acquirer.take_cached_token() {
            debug!("Using token delivered after an earlier attempt");
            return Ok(token);
        }
        self.acquirer.wait_until_ready().await?;
        self.acquirer.execute().await
    }

    /// One end-to-end submission attempt
    ///
    /// Validation and size problems never touch the network. On success the
    /// form is reset; on any failure or cancel its contents are kept.
    pub async fn submit(&self) -> Result<SubmissionResponse, SubmitError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::AlreadySubmitting);
        }
        let _guard = SubmitGuard { coordinator: self };

        let (form, attachment) = {
            let mut state = self.lock_form();
            let errors = state.validate();
            if !errors.is_empty() {
                let errors = errors.clone();
                drop(state);
                return Err(self.fail(SubmitError::Validation(errors)));
            }
            (state.form.clone(), state.attachment.clone())
        };

        let size = attachment.as_ref().map_or(0, Attachment::size);
        if size > self.max_upload_bytes {
            return Err(self.fail(SubmitError::FileTooLarge {
                size,
                limit: self.max_upload_bytes,
            }));
        }

        // cancel() must find the handle as soon as Verifying is observable
        let acquiring = CancellationToken::new();
        *self.lock_in_flight() = InFlight::Acquiring(acquiring.clone());
        self.publish(SubmissionStatus::Verifying, None);

        let token = tokio::select! {
            _ = acquiring.cancelled() => Err(ChallengeError::Canceled),
            result = self.acquire_token() => result,
        };
        let token = match token {
            Ok(token) => token,
            Err(ChallengeError::Canceled) => return Err(self.canceled()),
            Err(e) => return Err(self.fail(e.into())),
        };

        let uploading = CancellationToken::new();
        {
            let mut in_flight = self.lock_in_flight();
            if acquiring.is_cancelled() {
                drop(in_flight);
                return Err(self.canceled());
            }
            *in_flight = InFlight::Uploading(uploading.clone());
        }

        let sent_percent = Arc::new(AtomicU8::new(0));
        let progress: ProgressFn = {
            let sent_percent = Arc::clone(&sent_percent);
            Arc::new(move |sent, total| sent_percent.store(percent(sent, total), Ordering::Relaxed))
        };

        self.publish(
            SubmissionStatus::Uploading {
                percent: 0,
                elapsed_secs: 0,
            },
            Some(Notice::progress(uploading_message(Duration::ZERO, 0))),
        );
        let ticker = UploadTicker::start(Arc::clone(&self.view), sent_percent);

        info!(
            has_attachment = attachment.is_some(),
            "Uploading quote request"
        );
        let upload = Upload {
            form,
            token,
            attachment,
        };
        let sent = tokio::time::timeout(
            self.request_timeout,
            self.transport.send(upload, progress, uploading),
        )
        .await;
        drop(ticker);

        match sent {
            Ok(Ok(response)) => {
                self.lock_form().reset();
                self.acquirer.reset();
                info!(id = ?response.id, "Quote request accepted");
                self.publish(
                    SubmissionStatus::Success {
                        id: response.id.clone(),
                    },
                    Some(Notice::success()),
                );
                Ok(response)
            }
            Ok(Err(TransportError::Canceled)) => Err(self.canceled()),
            Ok(Err(e)) => Err(self.fail(e.into())),
            Err(_) => Err(self.fail(TransportError::TimedOut.into())),
        }
    }

    /// Abort the upload if one is running, otherwise the token wait
    pub fn cancel(&self) {
        match &*self.lock_in_flight() {
            InFlight::Uploading(token) => {
                debug!("Canceling upload");
                token.cancel();
            }
            InFlight::Acquiring(token) => {
                debug!("Canceling verification");
                self.acquirer.cancel();
                token.cancel();
            }
            InFlight::Idle => {}
        }
    }

    /// Clear an error or success notice
    pub fn dismiss_notice(&self) {
        self.view.send_if_modified(|view| {
            let dismissible = view.notice.as_ref().is_some_and(Notice::is_dismissible);
            if !dismissible {
                return false;
            }
            view.notice = None;
            view.status = SubmissionStatus::Idle;
            true
        });
    }

    /// Form teardown: stop anything in flight and discard the contents
    pub fn close(&self) {
        self.cancel();
        self.lock_form().reset();
        self.publish(SubmissionStatus::Idle, None);
    }
}
