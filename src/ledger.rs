//! The issue ledger: owns every issue and vote record, applies votes and
//! derives each issue's status from its counters.
//!
//! The ledger is synchronous and performs no I/O. Callers persist it through
//! [`Ledger::snapshot`] and rebuild it with [`Ledger::from_snapshot`].

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::LedgerConfig,
    error::{AppError, Result},
    models::{
        Issue, IssueStatus, NewIssue, SummaryOutcome, SummaryTicket, VoteDirection, VoteOutcome,
        VoteRecord, VoteValue,
    },
};

/// Full serializable ledger state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
}

impl LedgerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.votes.is_empty()
    }
}

/// Upvote threshold is checked first, so an issue meeting both thresholds is
/// `Reported`, never `Spam`.
pub fn status_for(config: &LedgerConfig, upvotes: u32, downvotes: u32) -> IssueStatus {
    if upvotes >= config.upvote_threshold {
        IssueStatus::Reported
    } else if downvotes >= config.downvote_threshold {
        IssueStatus::Spam
    } else {
        IssueStatus::Open
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    config: LedgerConfig,
    issues: Vec<Issue>,
    index: HashMap<Uuid, usize>,
    votes: BTreeMap<(Uuid, Uuid), VoteRecord>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            issues: Vec::new(),
            index: HashMap::new(),
            votes: BTreeMap::new(),
        }
    }

    /// Rebuild a ledger from persisted state.
    ///
    /// Persisted data is not trusted: duplicate issues and votes for unknown
    /// issues are dropped, counters are recounted from the vote records and
    /// every status is derived again under the current thresholds.
    pub fn from_snapshot(config: LedgerConfig, snapshot: LedgerSnapshot) -> Self {
        let mut ledger = Self::new(config);

        for issue in snapshot.issues {
            if ledger.index.contains_key(&issue.id) {
                tracing::warn!("Dropping duplicate issue {} from snapshot", issue.id);
                continue;
            }
            ledger.index.insert(issue.id, ledger.issues.len());
            ledger.issues.push(issue);
        }

        for record in snapshot.votes {
            if !ledger.index.contains_key(&record.issue_id) {
                tracing::warn!(
                    "Dropping vote by {} for unknown issue {}",
                    record.voter_id,
                    record.issue_id
                );
                continue;
            }
            ledger
                .votes
                .insert((record.issue_id, record.voter_id), record);
        }

        let mut tallies: HashMap<Uuid, (u32, u32)> = HashMap::new();
        for record in ledger.votes.values() {
            let tally = tallies.entry(record.issue_id).or_default();
            match record.value {
                VoteValue::Upvote => tally.0 += 1,
                VoteValue::Downvote => tally.1 += 1,
                VoteValue::None => {}
            }
        }

        for issue in &mut ledger.issues {
            let (upvotes, downvotes) = tallies.get(&issue.id).copied().unwrap_or_default();
            if (issue.upvotes, issue.downvotes) != (upvotes, downvotes) {
                tracing::warn!(
                    "Issue {} counters {}/{} disagree with vote records {}/{}, recounting",
                    issue.id,
                    issue.upvotes,
                    issue.downvotes,
                    upvotes,
                    downvotes
                );
                issue.upvotes = upvotes;
                issue.downvotes = downvotes;
            }
            issue.status = status_for(&config, issue.upvotes, issue.downvotes);
        }

        ledger
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            issues: self.issues.clone(),
            votes: self.votes.values().cloned().collect(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Issues in submission order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn get_issue(&self, issue_id: Uuid) -> Option<&Issue> {
        self.index.get(&issue_id).map(|&idx| &self.issues[idx])
    }

    pub fn vote_of(&self, issue_id: Uuid, voter_id: Uuid) -> VoteValue {
        self.votes
            .get(&(issue_id, voter_id))
            .map(|record| record.value)
            .unwrap_or_default()
    }

    pub fn submit_issue(&mut self, new_issue: NewIssue) -> Result<Uuid> {
        let title = new_issue.title.trim();
        let description = new_issue.description.trim();

        if title.is_empty() {
            return Err(AppError::Validation("title: must not be blank".to_string()));
        }
        if description.is_empty() {
            return Err(AppError::Validation(
                "description: must not be blank".to_string(),
            ));
        }

        let issue = Issue {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            location: new_issue
                .location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            attachment: new_issue.attachment,
            upvotes: 0,
            downvotes: 0,
            status: IssueStatus::Open,
            opinions: Vec::new(),
            summary: None,
            summary_revision: 0,
            created_at: Utc::now(),
        };

        let id = issue.id;
        self.index.insert(id, self.issues.len());
        self.issues.push(issue);

        tracing::debug!("Issue {} submitted", id);
        Ok(id)
    }

    /// Cast, switch or withdraw a vote. Repeating the voter's current
    /// direction withdraws it; a voter never contributes more than one vote.
    pub fn cast_vote(
        &mut self,
        issue_id: Uuid,
        voter_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let idx = self.position(issue_id)?;
        let previous = self.vote_of(issue_id, voter_id);
        let config = self.config;

        let issue = &mut self.issues[idx];
        let previous_status = issue.status;

        let current = if previous == VoteValue::from(direction) {
            withdraw(issue, direction);
            VoteValue::None
        } else {
            if let Some(previous_direction) = previous.direction() {
                withdraw(issue, previous_direction);
            }
            match direction {
                VoteDirection::Up => issue.upvotes = issue.upvotes.saturating_add(1),
                VoteDirection::Down => issue.downvotes = issue.downvotes.saturating_add(1),
            }
            direction.into()
        };

        issue.status = status_for(&config, issue.upvotes, issue.downvotes);

        let outcome = VoteOutcome {
            issue_id,
            user_vote: current,
            upvotes: issue.upvotes,
            downvotes: issue.downvotes,
            status: issue.status,
            previous_status,
        };

        self.votes.insert(
            (issue_id, voter_id),
            VoteRecord {
                issue_id,
                voter_id,
                value: current,
                updated_at: Utc::now(),
            },
        );

        tracing::debug!(
            "Voter {} on issue {}: {:?} -> {:?} ({} up / {} down)",
            voter_id,
            issue_id,
            previous,
            current,
            outcome.upvotes,
            outcome.downvotes
        );
        if outcome.status_changed() {
            tracing::info!(
                "Issue {} moved from {} to {}",
                issue_id,
                previous_status,
                outcome.status
            );
        }

        Ok(outcome)
    }

    pub fn add_opinion(&mut self, issue_id: Uuid, text: &str) -> Result<&Issue> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("text: must not be blank".to_string()));
        }

        let idx = self.position(issue_id)?;
        let issue = &mut self.issues[idx];

        if self.config.allow_opinions_when_open_only && issue.status != IssueStatus::Open {
            return Err(AppError::Conflict(format!(
                "Opinions are closed for {} issues",
                issue.status
            )));
        }

        issue.opinions.push(text.to_string());
        Ok(issue)
    }

    /// Overwrite the summary unconditionally. Last writer wins.
    pub fn apply_summary(&mut self, issue_id: Uuid, text: &str) -> Result<()> {
        let idx = self.position(issue_id)?;
        self.issues[idx].summary = Some(text.to_string());
        Ok(())
    }

    /// Start a summarization request for the issue's current content.
    pub fn begin_summary(&mut self, issue_id: Uuid) -> Result<SummaryTicket> {
        let idx = self.position(issue_id)?;
        let issue = &mut self.issues[idx];
        issue.summary_revision += 1;

        Ok(SummaryTicket {
            issue_id,
            revision: issue.summary_revision,
            title: issue.title.clone(),
            description: issue.description.clone(),
            opinions: issue.opinions.clone(),
        })
    }

    /// Apply a summarization result unless a newer request has been started
    /// since. Returns whether the summary was written.
    pub fn apply_summary_ticket(
        &mut self,
        ticket: &SummaryTicket,
        outcome: SummaryOutcome,
    ) -> Result<bool> {
        let idx = self.position(ticket.issue_id)?;
        let issue = &mut self.issues[idx];

        if ticket.revision < issue.summary_revision {
            tracing::debug!(
                "Discarding stale summary for issue {} (revision {} < {})",
                ticket.issue_id,
                ticket.revision,
                issue.summary_revision
            );
            return Ok(false);
        }

        issue.summary = Some(outcome.into_text());
        Ok(true)
    }

    /// Reported issues in submission order.
    pub fn list_reportable(&self) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.status == IssueStatus::Reported)
            .collect()
    }

    fn position(&self, issue_id: Uuid) -> Result<usize> {
        self.index
            .get(&issue_id)
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", issue_id)))
    }
}

fn withdraw(issue: &mut Issue, direction: VoteDirection) {
    match direction {
        VoteDirection::Up => issue.upvotes = issue.upvotes.saturating_sub(1),
        VoteDirection::Down => issue.downvotes = issue.downvotes.saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::new(5, 3).unwrap())
    }

    fn submit(ledger: &mut Ledger, title: &str) -> Uuid {
        ledger
            .submit_issue(NewIssue {
                title: title.to_string(),
                description: format!("{} description", title),
                ..Default::default()
            })
            .unwrap()
    }

    fn votes(
        ledger: &mut Ledger,
        issue_id: Uuid,
        direction: VoteDirection,
        count: usize,
    ) -> Vec<Uuid> {
        (0..count)
            .map(|_| {
                let voter = Uuid::new_v4();
                ledger.cast_vote(issue_id, voter, direction).unwrap();
                voter
            })
            .collect()
    }

    #[test]
    fn submit_creates_open_issue() {
        let mut ledger = ledger();
        let id = ledger
            .submit_issue(NewIssue {
                title: "  Broken streetlight ".to_string(),
                description: "Dark corner on Elm St".to_string(),
                location: Some("   ".to_string()),
                attachment: None,
            })
            .unwrap();

        let issue = ledger.get_issue(id).unwrap();
        assert_eq!(issue.title, "Broken streetlight");
        assert_eq!(issue.status, IssueStatus::Open);
        assert_eq!((issue.upvotes, issue.downvotes), (0, 0));
        assert!(issue.opinions.is_empty());
        assert!(issue.summary.is_none());
        assert!(issue.location.is_none());
    }

    #[test]
    fn blank_input_is_rejected_without_side_effects() {
        let mut ledger = ledger();
        for (title, description) in [
            ("", "desc"),
            ("  ", "desc"),
            ("title", ""),
            ("title", "\n\t"),
        ] {
            let err = ledger
                .submit_issue(NewIssue {
                    title: title.to_string(),
                    description: description.to_string(),
                    ..Default::default()
                })
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(ledger.issues().is_empty());
    }

    #[test]
    fn same_direction_twice_toggles_off() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Pothole");
        let voter = Uuid::new_v4();

        ledger.cast_vote(id, voter, VoteDirection::Up).unwrap();
        let outcome = ledger.cast_vote(id, voter, VoteDirection::Up).unwrap();

        assert_eq!(outcome.upvotes, 0);
        assert_eq!(outcome.user_vote, VoteValue::None);
        assert_eq!(ledger.vote_of(id, voter), VoteValue::None);

        ledger.cast_vote(id, voter, VoteDirection::Down).unwrap();
        let outcome = ledger.cast_vote(id, voter, VoteDirection::Down).unwrap();
        assert_eq!(outcome.downvotes, 0);
    }

    #[test]
    fn switching_never_double_counts() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Graffiti");
        let voter = Uuid::new_v4();

        ledger.cast_vote(id, voter, VoteDirection::Up).unwrap();
        let outcome = ledger.cast_vote(id, voter, VoteDirection::Down).unwrap();

        assert_eq!((outcome.upvotes, outcome.downvotes), (0, 1));
        assert_eq!(ledger.vote_of(id, voter), VoteValue::Downvote);
    }

    #[test]
    fn counters_never_go_negative() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Flooding");
        let voter = Uuid::new_v4();

        // Simulate counters drifting below the vote records
        ledger.cast_vote(id, voter, VoteDirection::Up).unwrap();
        ledger.issues[0].upvotes = 0;
        let outcome = ledger.cast_vote(id, voter, VoteDirection::Up).unwrap();
        assert_eq!(outcome.upvotes, 0);

        for _ in 0..5 {
            ledger.cast_vote(id, voter, VoteDirection::Down).unwrap();
        }
        let issue = ledger.get_issue(id).unwrap();
        assert_eq!((issue.upvotes, issue.downvotes), (0, 1));
    }

    #[test]
    fn upvote_threshold_takes_precedence() {
        let config = LedgerConfig::new(5, 3).unwrap();
        assert_eq!(status_for(&config, 5, 3), IssueStatus::Reported);
        assert_eq!(status_for(&config, 4, 3), IssueStatus::Spam);
        assert_eq!(status_for(&config, 4, 2), IssueStatus::Open);

        let mut ledger = ledger();
        let id = submit(&mut ledger, "Both thresholds");
        votes(&mut ledger, id, VoteDirection::Down, 3);
        assert_eq!(ledger.get_issue(id).unwrap().status, IssueStatus::Spam);
        votes(&mut ledger, id, VoteDirection::Up, 5);
        assert_eq!(ledger.get_issue(id).unwrap().status, IssueStatus::Reported);
    }

    #[test]
    fn status_reverts_when_support_is_withdrawn() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Broken bench");
        let voters = votes(&mut ledger, id, VoteDirection::Up, 5);
        assert_eq!(ledger.get_issue(id).unwrap().status, IssueStatus::Reported);

        let mut last = None;
        for voter in voters {
            last = Some(ledger.cast_vote(id, voter, VoteDirection::Up).unwrap());
        }

        let last = last.unwrap();
        assert_eq!(last.upvotes, 0);
        assert_eq!(last.status, IssueStatus::Open);
        assert_eq!(ledger.get_issue(id).unwrap().status, IssueStatus::Open);
    }

    #[test]
    fn status_change_is_reported_in_outcome() {
        let mut ledger = Ledger::new(LedgerConfig::new(3, 2).unwrap());
        let id = submit(&mut ledger, "Loose cable");
        votes(&mut ledger, id, VoteDirection::Down, 1);
        let outcome = ledger
            .cast_vote(id, Uuid::new_v4(), VoteDirection::Down)
            .unwrap();

        assert!(outcome.status_changed());
        assert_eq!(outcome.previous_status, IssueStatus::Open);
        assert_eq!(outcome.status, IssueStatus::Spam);
    }

    #[test]
    fn reportable_keeps_submission_order() {
        let mut ledger = ledger();
        let a = submit(&mut ledger, "A");
        let b = submit(&mut ledger, "B");
        let c = submit(&mut ledger, "C");

        votes(&mut ledger, a, VoteDirection::Up, 3);
        votes(&mut ledger, b, VoteDirection::Up, 5);
        // More support on C than B must not reorder the listing
        votes(&mut ledger, c, VoteDirection::Up, 6);
        votes(&mut ledger, c, VoteDirection::Down, 4);

        let reportable: Vec<Uuid> = ledger.list_reportable().iter().map(|i| i.id).collect();
        assert_eq!(reportable, vec![b, c]);
        assert_eq!(ledger.get_issue(a).unwrap().status, IssueStatus::Open);
    }

    #[test]
    fn vote_on_unknown_issue_is_not_found() {
        let mut ledger = ledger();
        let err = ledger
            .cast_vote(Uuid::new_v4(), Uuid::new_v4(), VoteDirection::Up)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn opinions_append_without_touching_votes() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Noise");
        votes(&mut ledger, id, VoteDirection::Up, 2);

        ledger.add_opinion(id, " Every night after 11pm ").unwrap();
        let issue = ledger.add_opinion(id, "Same here").unwrap();

        assert_eq!(issue.opinions, vec!["Every night after 11pm", "Same here"]);
        assert_eq!(issue.upvotes, 2);
        assert_eq!(issue.status, IssueStatus::Open);

        assert!(matches!(
            ledger.add_opinion(id, "   ").unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            ledger.add_opinion(Uuid::new_v4(), "hello").unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn opinions_close_once_escalated_when_configured() {
        let config = LedgerConfig::new(3, 2)
            .unwrap()
            .with_opinions_when_open_only(true);
        let mut ledger = Ledger::new(config);
        let id = submit(&mut ledger, "Open window");

        ledger.add_opinion(id, "still open").unwrap();
        votes(&mut ledger, id, VoteDirection::Up, 3);

        let err = ledger.add_opinion(id, "too late").unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(ledger.get_issue(id).unwrap().opinions.len(), 1);
    }

    #[test]
    fn summary_write_back_ignores_vote_state() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Trash");
        votes(&mut ledger, id, VoteDirection::Up, 5);
        votes(&mut ledger, id, VoteDirection::Down, 1);

        ledger.apply_summary(id, "Overflowing bins near the park").unwrap();

        let issue = ledger.get_issue(id).unwrap();
        assert_eq!(
            issue.summary.as_deref(),
            Some("Overflowing bins near the park")
        );
        assert_eq!((issue.upvotes, issue.downvotes), (5, 1));
        assert_eq!(issue.status, IssueStatus::Reported);
    }

    #[test]
    fn stale_summary_results_are_discarded() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Blocked drain");

        let first = ledger.begin_summary(id).unwrap();
        ledger.add_opinion(id, "Smells too").unwrap();
        let second = ledger.begin_summary(id).unwrap();
        assert_eq!(second.opinions, vec!["Smells too"]);

        assert!(
            ledger
                .apply_summary_ticket(&second, SummaryOutcome::Generated("new".to_string()))
                .unwrap()
        );
        assert!(
            !ledger
                .apply_summary_ticket(&first, SummaryOutcome::Generated("old".to_string()))
                .unwrap()
        );
        assert_eq!(ledger.get_issue(id).unwrap().summary.as_deref(), Some("new"));
    }

    #[test]
    fn failed_summary_stores_marker() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "Fallen tree");
        let ticket = ledger.begin_summary(id).unwrap();

        ledger
            .apply_summary_ticket(&ticket, SummaryOutcome::Failed)
            .unwrap();

        let issue = ledger.get_issue(id).unwrap();
        assert!(issue.summary_failed());
        assert_eq!(issue.status, IssueStatus::Open);
    }

    #[test]
    fn snapshot_round_trip_is_identical() {
        let mut ledger = ledger();
        let a = submit(&mut ledger, "A");
        let b = submit(&mut ledger, "B");
        let voters = votes(&mut ledger, a, VoteDirection::Up, 5);
        ledger.cast_vote(a, voters[0], VoteDirection::Up).unwrap();
        votes(&mut ledger, b, VoteDirection::Down, 2);
        ledger.add_opinion(b, "fake report").unwrap();
        ledger.apply_summary(a, "summary").unwrap();

        let snapshot = ledger.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        let reloaded = Ledger::from_snapshot(*ledger.config(), parsed);

        assert_eq!(reloaded.snapshot(), snapshot);
        assert_eq!(reloaded.vote_of(a, voters[0]), VoteValue::None);
        assert_eq!(reloaded.vote_of(a, voters[1]), VoteValue::Upvote);
    }

    #[test]
    fn reload_repairs_inconsistent_state() {
        let mut ledger = ledger();
        let id = submit(&mut ledger, "A");
        votes(&mut ledger, id, VoteDirection::Up, 2);

        let mut snapshot = ledger.snapshot();
        snapshot.issues[0].upvotes = 9;
        snapshot.issues[0].status = IssueStatus::Spam;
        snapshot.issues.push(snapshot.issues[0].clone());
        snapshot.votes.push(VoteRecord {
            issue_id: Uuid::new_v4(),
            voter_id: Uuid::new_v4(),
            value: VoteValue::Upvote,
            updated_at: Utc::now(),
        });

        let reloaded = Ledger::from_snapshot(*ledger.config(), snapshot);
        let issue = reloaded.get_issue(id).unwrap();

        assert_eq!(reloaded.issues().len(), 1);
        assert_eq!(reloaded.snapshot().votes.len(), 2);
        assert_eq!(issue.upvotes, 2);
        assert_eq!(issue.status, IssueStatus::Open);
    }
}
