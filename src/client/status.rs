use std::time::Duration;

pub const SUCCESS_NOTICE: &str = "Thanks — we received your request!";

const STILL_UPLOADING_AFTER: Duration = Duration::from_secs(6);
const UNUSUALLY_LONG_AFTER: Duration = Duration::from_secs(15);

/// Where the form is in its submission lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    /// Waiting for the verification token
    Verifying,
    Uploading {
        percent: u8,
        elapsed_secs: u64,
    },
    Success {
        id: Option<String>,
    },
    Error {
        message: String,
    },
}

impl SubmissionStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Verifying | Self::Uploading { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Progress,
    Success,
    Error,
}

/// The single user-facing status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn progress(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Progress,
            text: text.into(),
        }
    }

    pub fn success() -> Self {
        Self {
            kind: NoticeKind::Success,
            text: SUCCESS_NOTICE.to_string(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    pub fn is_dismissible(&self) -> bool {
        self.kind != NoticeKind::Progress
    }
}

/// Upload notice text, escalating with elapsed time
pub fn uploading_message(elapsed: Duration, percent: u8) -> String {
    if elapsed < STILL_UPLOADING_AFTER {
        format!("Uploading… {percent}%")
    } else if elapsed <= UNUSUALLY_LONG_AFTER {
        format!("Still uploading… {percent}%")
    } else {
        format!("This is taking unusually long… {percent}%")
    }
}

pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total).saturating_mul(100) / total) as u8
}
