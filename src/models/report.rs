use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Issue;

/// Per-issue export payload handed to whatever renders the authority document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssueDocument {
    pub issue_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub opinions: Vec<String>,
    pub summary: Option<String>,
    pub upvotes: u32,
    pub downvotes: u32,
    pub created_at: DateTime<Utc>,
}

impl From<&Issue> for IssueDocument {
    fn from(issue: &Issue) -> Self {
        Self {
            issue_id: issue.id,
            title: issue.title.clone(),
            description: issue.description.clone(),
            location: issue.location.clone(),
            opinions: issue.opinions.clone(),
            // A failure marker is not worth forwarding to the authorities
            summary: issue.summary.clone().filter(|_| !issue.summary_failed()),
            upvotes: issue.upvotes,
            downvotes: issue.downvotes,
            created_at: issue.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorityReport {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub entries: Vec<IssueDocument>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    NotEnoughSupport { message: String },
    Ready(AuthorityReport),
}
