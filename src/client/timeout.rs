//! Timeouts that only count down while the window has input focus
//!
//! An interactive challenge opens off-page UI, which takes focus away from
//! the form. The countdown keeps the remaining budget while unfocused and
//! resumes from it when focus returns.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no result within {0:?} of focused time")]
pub struct FocusTimeout(pub Duration);

/// Window focus signal shared by everything that pauses on blur
#[derive(Debug, Clone)]
pub struct WindowFocus {
    tx: watch::Sender<bool>,
}

impl Default for WindowFocus {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowFocus {
    /// Starts focused
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    pub fn set_focused(&self, focused: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != focused;
            *current = focused;
            changed
        });
    }

    pub fn is_focused(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Sleep for `budget` of focused time
///
/// Once the focus sender is gone the signal is frozen, and the rest of the
/// budget runs down as plain wall-clock time.
pub async fn focused_sleep(budget: Duration, mut focus: watch::Receiver<bool>) {
    let mut remaining = budget;
    let mut live = true;

    loop {
        if remaining.is_zero() {
            return;
        }

        if !live {
            sleep(remaining).await;
            return;
        }

        if !*focus.borrow_and_update() {
            if focus.changed().await.is_err() {
                live = false;
            }
            continue;
        }

        let started = Instant::now();
        tokio::select! {
            _ = sleep(remaining) => return,
            changed = focus.changed() => {
                remaining = remaining.saturating_sub(started.elapsed());
                if changed.is_err() {
                    live = false;
                }
            }
        }
    }
}

/// Run `fut`, giving up after `budget` of focused time
pub async fn with_focus_timeout<F>(
    budget: Duration,
    focus: watch::Receiver<bool>,
    fut: F,
) -> Result<F::Output, FocusTimeout>
where
    F: Future,
{
    tokio::select! {
        output = fut => Ok(output),
        _ = focused_sleep(budget, focus) => Err(FocusTimeout(budget)),
    }
}
