use async_trait::async_trait;
use thiserror::Error;

use crate::domain::issue::{CreatedIssue, EpicCatalog, IssueRequest};

/// Any non-success outcome from the tracker. Callers do not branch on the
/// variant; it only feeds diagnostics.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Transport(String),
    #[error("tracker responded with status {status}: {detail}")]
    UnexpectedStatus { status: u16, detail: String },
    #[error("tracker response could not be decoded: {0}")]
    Decode(String),
    #[error("tracker client could not be configured: {0}")]
    Setup(String),
}

/// Remote issue tracker. Each call is exactly one outbound request; nothing
/// is retried or deduplicated.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn list_epics(&self) -> Result<EpicCatalog, TrackerError>;
    async fn create_issue(&self, request: &IssueRequest) -> Result<CreatedIssue, TrackerError>;
}
