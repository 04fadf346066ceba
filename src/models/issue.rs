use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{Attachment, VoteValue};

/// Stored in `summary` when the summarizer fails, so the UI can tell a failed
/// summary apart from a pending one.
pub const SUMMARY_UNAVAILABLE: &str = "AI summary unavailable.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    Open,
    Reported,
    Spam,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueStatus::Open => write!(f, "open"),
            IssueStatus::Reported => write!(f, "reported"),
            IssueStatus::Spam => write!(f, "spam"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub attachment: Option<Attachment>,
    pub upvotes: u32,
    pub downvotes: u32,
    pub status: IssueStatus,
    #[serde(default)]
    pub opinions: Vec<String>,
    pub summary: Option<String>,
    /// Bumped every time a summary is requested; results carrying an older
    /// revision are discarded.
    #[serde(default)]
    pub summary_revision: u64,
    pub created_at: DateTime<Utc>,
}

impl Issue {
    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }

    pub fn summary_failed(&self) -> bool {
        self.summary.as_deref() == Some(SUMMARY_UNAVAILABLE)
    }
}

/// Input to `Ledger::submit_issue`, already stripped of transport concerns.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub attachment: Option<Attachment>,
}

/// Everything the summarizer needs, plus the revision that produced it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryTicket {
    pub issue_id: Uuid,
    pub revision: u64,
    pub title: String,
    pub description: String,
    pub opinions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(String),
    Failed,
}

impl SummaryOutcome {
    pub fn into_text(self) -> String {
        match self {
            SummaryOutcome::Generated(text) => text,
            SummaryOutcome::Failed => SUMMARY_UNAVAILABLE.to_string(),
        }
    }
}

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

// Create issue request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateIssueRequest {
    #[validate(length(max = 300), custom(function = "validate_not_blank"))]
    pub title: String,
    #[validate(length(max = 5000), custom(function = "validate_not_blank"))]
    pub description: String,
    #[validate(length(max = 300))]
    pub location: Option<String>,
    /// `data:image/...;base64,...` URL
    pub attachment: Option<String>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct AddOpinionRequest {
    #[validate(length(max = 2000), custom(function = "validate_not_blank"))]
    pub text: String,
}

// Issue response with the caller's own vote
#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub attachment_url: Option<String>,
    pub upvotes: u32,
    pub downvotes: u32,
    pub score: i64,
    pub status: IssueStatus,
    pub opinions: Vec<String>,
    pub summary: Option<String>,
    pub summary_failed: bool,
    pub created_at: DateTime<Utc>,
    pub user_vote: Option<VoteValue>,
}

impl IssueResponse {
    pub fn new(issue: Issue, user_vote: Option<VoteValue>) -> Self {
        Self {
            score: issue.score(),
            summary_failed: issue.summary_failed(),
            attachment_url: issue.attachment.as_ref().map(Attachment::to_data_url),
            id: issue.id,
            title: issue.title,
            description: issue.description,
            location: issue.location,
            upvotes: issue.upvotes,
            downvotes: issue.downvotes,
            status: issue.status,
            opinions: issue.opinions,
            summary: issue.summary,
            created_at: issue.created_at,
            user_vote,
        }
    }
}

// Sorting options for the feed
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSort {
    #[default]
    Newest,
    Oldest,
}
