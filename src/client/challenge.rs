//! Challenge-token acquisition around an embedded verification widget
//!
//! The widget reports back through fire-once callbacks outside the caller's
//! control flow. [`ChallengeAcquirer`] turns that into one awaitable
//! operation: a single-slot resolver is installed before the widget is
//! triggered and taken atomically by whichever of verified / errored /
//! cancel / timeout settles first. A callback that finds the slot empty can
//! never resolve a later, unrelated execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::timeout::with_focus_timeout;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("verification widget did not become ready")]
    InitializationTimeout,

    #[error("a verification is already in progress")]
    AlreadyExecuting,

    #[error("verification could not be started: {0}")]
    ExecutionFailed(String),

    #[error("verification timed out")]
    TimedOut,

    #[error("verification canceled")]
    Canceled,

    #[error("verification widget error: {0}")]
    Widget(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Uninitialized,
    Ready,
    Executing,
    Resolved,
    Rejected,
    TimedOut,
    Canceled,
}

/// Trigger failure reported synchronously by a widget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WidgetError(pub String);

/// The embedded verification widget
///
/// `execute` only starts a challenge; the outcome arrives later through the
/// [`WidgetCallbacks`] handed over in `bind`.
pub trait ChallengeWidget: Send + Sync {
    fn is_ready(&self) -> bool;
    fn execute(&self) -> Result<(), WidgetError>;
    fn reset(&self);
    fn remount(&self);
    fn bind(&self, callbacks: WidgetCallbacks);
}

type Settlement = Result<String, ChallengeError>;
type Delivery = Result<Settlement, oneshot::error::RecvError>;

#[derive(Debug)]
struct Shared {
    slot: Mutex<Option<oneshot::Sender<Settlement>>>,
    cached_token: Mutex<Option<String>>,
    errored: AtomicBool,
    state: watch::Sender<ChallengeState>,
}

impl Shared {
    fn take_slot(&self) -> Option<oneshot::Sender<Settlement>> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    fn install_slot(&self, tx: oneshot::Sender<Settlement>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tx);
        }
    }

    fn settle(&self, outcome: Settlement) -> Result<(), Settlement> {
        match self.take_slot() {
            Some(tx) => tx.send(outcome),
            None => Err(outcome),
        }
    }

    fn set_state(&self, state: ChallengeState) {
        self.state.send_replace(state);
    }
}

/// Callback handle given to the widget
#[derive(Debug, Clone)]
pub struct WidgetCallbacks {
    shared: Arc<Shared>,
}

impl WidgetCallbacks {
    /// A token arrived; resolves the pending execution if there is one
    pub fn verified(&self, token: impl Into<String>) {
        if let Err(Ok(token)) = self.shared.settle(Ok(token.into())) {
            debug!("Token arrived with no pending execution, caching it");
            if let Ok(mut cached) = self.shared.cached_token.lock() {
                *cached = Some(token);
            }
        }
    }

    /// Widget failure; the widget stays unusable until re-mounted
    pub fn errored(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "Verification widget reported an error");
        self.shared.errored.store(true, Ordering::Release);
        let _ = self.shared.settle(Err(ChallengeError::Widget(message)));
    }

    pub fn expired(&self) {
        debug!("Cached verification token expired");
        if let Ok(mut cached) = self.shared.cached_token.lock() {
            cached.take();
        }
    }
}

#[derive(Debug, Clone, bon::Builder)]
pub struct ChallengeSettings {
    #[builder(default = Duration::from_secs(5))]
    pub ready_wait: Duration,
    #[builder(default = Duration::from_millis(100))]
    pub ready_poll: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub execute_timeout: Duration,
    /// Extra trigger attempts after the first failure
    #[builder(default = 3)]
    pub trigger_retries: u32,
    #[builder(default = Duration::from_millis(250))]
    pub retry_backoff: Duration,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Clears the in-flight flag and any dangling resolver however `execute` ends
struct ExecutionGuard<'a> {
    executing: &'a AtomicBool,
    shared: &'a Shared,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.shared.take_slot();
        self.executing.store(false, Ordering::Release);
    }
}

pub struct ChallengeAcquirer {
    widget: Arc<dyn ChallengeWidget>,
    shared: Arc<Shared>,
    executing: AtomicBool,
    settings: ChallengeSettings,
    focus: watch::Receiver<bool>,
}

impl ChallengeAcquirer {
    pub fn new(
        widget: Arc<dyn ChallengeWidget>,
        settings: ChallengeSettings,
        focus: watch::Receiver<bool>,
    ) -> Self {
        let (state, _) = watch::channel(ChallengeState::Uninitialized);
        let shared = Arc::new(Shared {
            slot: Mutex::new(None),
            cached_token: Mutex::new(None),
            errored: AtomicBool::new(false),
            state,
        });

        widget.bind(WidgetCallbacks {
            shared: Arc::clone(&shared),
        });

        Self {
            widget,
            shared,
            executing: AtomicBool::new(false),
            settings,
            focus,
        }
    }

    pub fn state(&self) -> ChallengeState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChallengeState> {
        self.shared.state.subscribe()
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    fn is_ready(&self) -> bool {
        self.widget.is_ready() && !self.shared.errored.load(Ordering::Acquire)
    }

    async fn poll_ready(&self) -> bool {
        let deadline = Instant::now() + self.settings.ready_wait;
        loop {
            if self.is_ready() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.settings.ready_poll.min(deadline - now)).await;
        }
    }

    /// Wait for the widget, re-mounting it once if the first wait runs out
    pub async fn wait_until_ready(&self) -> Result<(), ChallengeError> {
        if !self.poll_ready().await {
            warn!(
                waited_ms = self.settings.ready_wait.as_millis() as u64,
                "Verification widget not ready, remounting"
            );
            self.shared.errored.store(false, Ordering::Release);
            self.widget.remount();

            if !self.poll_ready().await {
                return Err(ChallengeError::InitializationTimeout);
            }
        }

        if self.state() == ChallengeState::Uninitialized {
            self.shared.set_state(ChallengeState::Ready);
        }
        Ok(())
    }

    /// Trigger the widget, retrying failed triggers after a fixed backoff
    ///
    /// Returns early with the settlement when the execution is settled during
    /// a backoff (canceled, widget error or token), so a canceled challenge is
    /// never re-opened.
    async fn trigger(
        &self,
        rx: &mut oneshot::Receiver<Settlement>,
    ) -> Result<Option<Delivery>, ChallengeError> {
        let mut attempt = 0;
        loop {
            match self.widget.execute() {
                Ok(()) => return Ok(None),
                Err(e) if attempt < self.settings.trigger_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Widget trigger failed, retrying");
                    tokio::select! {
                        settled = &mut *rx => {
                            debug!(attempt, "Execution settled during trigger backoff");
                            return Ok(Some(settled));
                        }
                        _ = sleep(self.settings.retry_backoff) => {}
                    }
                }
                Err(e) => return Err(ChallengeError::ExecutionFailed(e.0)),
            }
        }
    }

    /// Trigger the widget and wait for its token
    ///
    /// The timeout only counts down while the window is focused. Dropping the
    /// returned future releases the in-flight slot.
    pub async fn execute(&self) -> Result<String, ChallengeError> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChallengeError::AlreadyExecuting);
        }
        let _guard = ExecutionGuard {
            executing: &self.executing,
            shared: &self.shared,
        };

        let (tx, mut rx) = oneshot::channel();
        self.shared.install_slot(tx);
        self.shared.set_state(ChallengeState::Executing);

        let outcome = match self.trigger(&mut rx).await {
            Ok(None) => {
                with_focus_timeout(self.settings.execute_timeout, self.focus.clone(), &mut rx).await
            }
            Ok(Some(settled)) => Ok(settled),
            Err(e) => {
                self.shared.take_slot();
                self.shared.set_state(ChallengeState::Rejected);
                return Err(e);
            }
        };

        match outcome {
            Ok(Ok(Ok(token))) => {
                info!("Verification token received");
                self.shared.set_state(ChallengeState::Resolved);
                Ok(token)
            }
            Ok(Ok(Err(ChallengeError::Canceled))) | Ok(Err(_)) => {
                self.shared.set_state(ChallengeState::Canceled);
                Err(ChallengeError::Canceled)
            }
            Ok(Ok(Err(e))) => {
                self.shared.set_state(ChallengeState::Rejected);
                Err(e)
            }
            Err(timeout) => {
                warn!(budget_secs = timeout.0.as_secs(), "Verification timed out");
                self.shared.take_slot();
                self.widget.reset();
                self.shared.set_state(ChallengeState::TimedOut);
                Err(ChallengeError::TimedOut)
            }
        }
    }

    /// Reject a pending execution with `Canceled`; no-op when idle
    pub fn cancel(&self) {
        if let Some(tx) = self.shared.take_slot() {
            info!("Canceling pending verification");
            let _ = tx.send(Err(ChallengeError::Canceled));
            self.widget.reset();
        }
    }

    /// Fresh widget state for the next submission
    pub fn reset(&self) {
        self.cancel();
        self.widget.reset();
        if let Ok(mut cached) = self.shared.cached_token.lock() {
            cached.take();
        }
        let next = if self.is_ready() {
            ChallengeState::Ready
        } else {
            ChallengeState::Uninitialized
        };
        self.shared.set_state(next);
    }

    /// A token that arrived while nothing was waiting for it
    pub fn take_cached_token(&self) -> Option<String> {
        self.shared.cached_token.lock().ok().and_then(|mut cached| cached.take())
    }
}

/// Widget that answers every trigger with a fixed token
///
/// hCaptcha publishes test site keys whose tokens always verify; this widget
/// stands in for the browser widget in headless use.
#[derive(Debug, Default)]
pub struct StaticTokenWidget {
    token: String,
    callbacks: Mutex<Option<WidgetCallbacks>>,
}

impl StaticTokenWidget {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            callbacks: Mutex::new(None),
        }
    }
}

impl ChallengeWidget for StaticTokenWidget {
    fn is_ready(&self) -> bool {
        self.callbacks.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    fn execute(&self) -> Result<(), WidgetError> {
        let callbacks = self
            .callbacks
            .lock()
            .map_err(|_| WidgetError("widget state poisoned".to_string()))?
            .clone()
            .ok_or_else(|| WidgetError("widget is not mounted".to_string()))?;
        callbacks.verified(self.token.clone());
        Ok(())
    }

    fn reset(&self) {}

    fn remount(&self) {}

    fn bind(&self, callbacks: WidgetCallbacks) {
        if let Ok(mut slot) = self.callbacks.lock() {
            *slot = Some(callbacks);
        }
    }
}
