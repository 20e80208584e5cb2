//! Per-post download bookkeeping.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::Post;

/// Outcome of processing one saved post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Not yet tried
    #[default]
    Pending,
    /// Media written to disk
    Saved,
    /// Transport or filesystem failure during the download
    ExceptionRaised,
    /// No strategy handles this post
    NotDone,
    /// A strategy ran and detected a host-specific failure
    ErrorReported,
}

impl StatusCode {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusCode::Pending)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::Pending => write!(f, "pending"),
            StatusCode::Saved => write!(f, "saved"),
            StatusCode::ExceptionRaised => write!(f, "exception"),
            StatusCode::NotDone => write!(f, "not-done"),
            StatusCode::ErrorReported => write!(f, "error"),
        }
    }
}

/// A post being processed by a batch, with its computed name and outcome.
#[derive(Debug, Clone)]
pub struct SavedItem {
    pub post: Post,
    pub save_dir: PathBuf,
    pub base_name: String,
    status: StatusCode,
    saved_path: Option<PathBuf>,
    error_message: Option<String>,
}

impl SavedItem {
    pub fn new(post: Post, save_dir: impl Into<PathBuf>, base_name: String) -> Self {
        Self {
            post,
            save_dir: save_dir.into(),
            base_name,
            status: StatusCode::Pending,
            saved_path: None,
            error_message: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn saved_path(&self) -> Option<&Path> {
        self.saved_path.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_saved(&self) -> bool {
        self.status == StatusCode::Saved
    }

    /// `save_dir/base_name`, without an extension.
    pub fn base_path(&self) -> PathBuf {
        self.save_dir.join(&self.base_name)
    }

    pub fn media_url(&self) -> &str {
        self.post.media_url()
    }

    pub fn set_saved(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        self.transition(StatusCode::Saved, Some(path), None)
    }

    pub fn set_exception(&mut self, message: impl Into<String>) -> bool {
        self.transition(StatusCode::ExceptionRaised, None, Some(message.into()))
    }

    pub fn set_notdone(&mut self, message: impl Into<String>) -> bool {
        self.transition(StatusCode::NotDone, None, Some(message.into()))
    }

    pub fn set_error(&mut self, message: impl Into<String>) -> bool {
        self.transition(StatusCode::ErrorReported, None, Some(message.into()))
    }

    /// Statuses are terminal: once an item leaves `Pending` further
    /// transitions are rejected.
    fn transition(
        &mut self,
        status: StatusCode,
        saved_path: Option<PathBuf>,
        error_message: Option<String>,
    ) -> bool {
        if self.status.is_terminal() {
            warn!(
                "Ignoring {} for '{}': already {}",
                status, self.post.title, self.status
            );
            return false;
        }
        self.status = status;
        self.saved_path = saved_path;
        self.error_message = error_message;
        true
    }
}
