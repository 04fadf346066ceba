use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::IssueStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// A voter's current preference on one issue. `None` is a value, not a
/// missing record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Upvote,
    Downvote,
    #[default]
    None,
}

impl VoteValue {
    pub fn direction(self) -> Option<VoteDirection> {
        match self {
            VoteValue::Upvote => Some(VoteDirection::Up),
            VoteValue::Downvote => Some(VoteDirection::Down),
            VoteValue::None => None,
        }
    }
}

impl From<VoteDirection> for VoteValue {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => VoteValue::Upvote,
            VoteDirection::Down => VoteValue::Downvote,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRecord {
    pub issue_id: Uuid,
    pub voter_id: Uuid,
    pub value: VoteValue,
    pub updated_at: DateTime<Utc>,
}

// Vote request
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

// Result of a vote, returned to the caller
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VoteOutcome {
    pub issue_id: Uuid,
    pub user_vote: VoteValue,
    pub upvotes: u32,
    pub downvotes: u32,
    pub status: IssueStatus,
    pub previous_status: IssueStatus,
}

impl VoteOutcome {
    pub fn status_changed(&self) -> bool {
        self.status != self.previous_status
    }
}
