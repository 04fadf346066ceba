use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::{
    config::LedgerConfig,
    error::{AppError, Result},
    ledger::Ledger,
    models::{
        Issue, IssueDocument, IssueResponse, IssueSort, IssueStatus, NewIssue, ReportOutcome,
        SummaryOutcome, SummaryTicket, VoteDirection, VoteOutcome,
    },
    services::{report_service, summary_service::SummaryService},
    store::LedgerStore,
};

/// Change notifications for anything rendering the ledger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    IssueSubmitted {
        issue_id: Uuid,
    },
    VoteCast {
        issue_id: Uuid,
        upvotes: u32,
        downvotes: u32,
        status: IssueStatus,
    },
    StatusChanged {
        issue_id: Uuid,
        from: IssueStatus,
        to: IssueStatus,
    },
    OpinionAdded {
        issue_id: Uuid,
        opinion_count: usize,
    },
    SummaryUpdated {
        issue_id: Uuid,
        failed: bool,
    },
}

/// Owns the single ledger instance. Every mutation is persisted before it
/// becomes visible; a failed save leaves the previous state in place.
#[derive(Clone)]
pub struct IssueService {
    ledger: Arc<Mutex<Ledger>>,
    store: LedgerStore,
    events: broadcast::Sender<LedgerEvent>,
    summarizer: Option<Arc<SummaryService>>,
}

impl IssueService {
    pub async fn load(
        config: LedgerConfig,
        store: LedgerStore,
        summarizer: Option<Arc<SummaryService>>,
    ) -> Self {
        let snapshot = store.load().await;
        let ledger = Ledger::from_snapshot(config, snapshot);
        tracing::info!("Ledger loaded with {} issues", ledger.issues().len());

        if summarizer.is_none() {
            tracing::debug!("Summarizer not configured, summaries stay pending");
        }

        let (events, _) = broadcast::channel(100);

        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            store,
            events,
            summarizer,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub async fn submit_issue(&self, new_issue: NewIssue) -> Result<Issue> {
        let wants_summary = self.summarizer.is_some();

        let (issue, ticket) = self
            .mutate(move |ledger| {
                let id = ledger.submit_issue(new_issue)?;
                let ticket = if wants_summary {
                    Some(ledger.begin_summary(id)?)
                } else {
                    None
                };
                Ok((fetch(ledger, id)?, ticket))
            })
            .await?;

        tracing::info!("Issue {} submitted: {}", issue.id, issue.title);
        self.publish(LedgerEvent::IssueSubmitted { issue_id: issue.id });

        if let Some(ticket) = ticket {
            self.spawn_summary(ticket);
        }

        Ok(issue)
    }

    pub async fn cast_vote(
        &self,
        issue_id: Uuid,
        voter_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let outcome = self
            .mutate(move |ledger| ledger.cast_vote(issue_id, voter_id, direction))
            .await?;

        self.publish(LedgerEvent::VoteCast {
            issue_id,
            upvotes: outcome.upvotes,
            downvotes: outcome.downvotes,
            status: outcome.status,
        });
        if outcome.status_changed() {
            self.publish(LedgerEvent::StatusChanged {
                issue_id,
                from: outcome.previous_status,
                to: outcome.status,
            });
        }

        Ok(outcome)
    }

    pub async fn add_opinion(&self, issue_id: Uuid, text: String) -> Result<Issue> {
        let wants_summary = self.summarizer.is_some();

        let (issue, ticket) = self
            .mutate(move |ledger| {
                ledger.add_opinion(issue_id, &text)?;
                let ticket = if wants_summary {
                    Some(ledger.begin_summary(issue_id)?)
                } else {
                    None
                };
                Ok((fetch(ledger, issue_id)?, ticket))
            })
            .await?;

        self.publish(LedgerEvent::OpinionAdded {
            issue_id,
            opinion_count: issue.opinions.len(),
        });

        if let Some(ticket) = ticket {
            self.spawn_summary(ticket);
        }

        Ok(issue)
    }

    pub async fn apply_summary(&self, issue_id: Uuid, text: String) -> Result<()> {
        self.mutate(move |ledger| ledger.apply_summary(issue_id, &text))
            .await?;
        self.publish_summary(issue_id).await;
        Ok(())
    }

    /// Write back a summarizer result, dropping it if a newer request exists.
    pub async fn apply_summary_result(
        &self,
        ticket: SummaryTicket,
        outcome: SummaryOutcome,
    ) -> Result<bool> {
        let issue_id = ticket.issue_id;
        let applied = self
            .mutate(move |ledger| ledger.apply_summary_ticket(&ticket, outcome))
            .await?;

        if applied {
            self.publish_summary(issue_id).await;
        }
        Ok(applied)
    }

    pub async fn get_issue(
        &self,
        issue_id: Uuid,
        voter_id: Option<Uuid>,
    ) -> Result<IssueResponse> {
        let ledger = self.ledger.lock().await;
        let issue = fetch(&ledger, issue_id)?;
        let user_vote = voter_id.map(|voter| ledger.vote_of(issue_id, voter));
        Ok(IssueResponse::new(issue, user_vote))
    }

    pub async fn list_issues(
        &self,
        voter_id: Option<Uuid>,
        sort: IssueSort,
    ) -> Vec<IssueResponse> {
        let ledger = self.ledger.lock().await;
        let mut issues: Vec<IssueResponse> = ledger
            .issues()
            .iter()
            .map(|issue| {
                let user_vote = voter_id.map(|voter| ledger.vote_of(issue.id, voter));
                IssueResponse::new(issue.clone(), user_vote)
            })
            .collect();

        if sort == IssueSort::Newest {
            issues.reverse();
        }
        issues
    }

    pub async fn list_reportable(&self) -> Vec<Issue> {
        let ledger = self.ledger.lock().await;
        ledger.list_reportable().into_iter().cloned().collect()
    }

    pub async fn report(&self) -> ReportOutcome {
        report_service::build_report(&self.list_reportable().await)
    }

    /// Export payload for one reported issue.
    pub async fn document(&self, issue_id: Uuid) -> Result<IssueDocument> {
        let ledger = self.ledger.lock().await;
        let issue = fetch(&ledger, issue_id)?;
        if issue.status != IssueStatus::Reported {
            return Err(AppError::Conflict(format!(
                "Issue {} is {} and not reportable",
                issue_id, issue.status
            )));
        }
        Ok((&issue).into())
    }

    pub fn summarizer(&self) -> Option<&Arc<SummaryService>> {
        self.summarizer.as_ref()
    }

    /// Flush the current state one last time before shutdown.
    pub async fn dispose(&self) -> Result<()> {
        let ledger = self.ledger.lock().await;
        self.store.save(&ledger.snapshot()).await?;
        tracing::info!("Ledger saved on shutdown");
        Ok(())
    }

    async fn mutate<T>(&self, op: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let mut ledger = self.ledger.lock().await;

        let mut next = ledger.clone();
        let value = op(&mut next)?;

        if let Err(e) = self.store.save(&next.snapshot()).await {
            tracing::error!("Failed to persist ledger, change discarded: {}", e);
            return Err(e);
        }

        *ledger = next;
        Ok(value)
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn publish_summary(&self, issue_id: Uuid) {
        let failed = {
            let ledger = self.ledger.lock().await;
            ledger
                .get_issue(issue_id)
                .map(Issue::summary_failed)
                .unwrap_or_default()
        };
        self.publish(LedgerEvent::SummaryUpdated { issue_id, failed });
    }

    fn spawn_summary(&self, ticket: SummaryTicket) {
        let Some(summarizer) = self.summarizer.clone() else {
            return;
        };
        let service = self.clone();

        tokio::spawn(async move {
            let outcome = match summarizer.summarize(&ticket).await {
                Ok(text) => SummaryOutcome::Generated(text),
                Err(e) => {
                    tracing::warn!("Summary failed for issue {}: {}", ticket.issue_id, e);
                    SummaryOutcome::Failed
                }
            };

            let issue_id = ticket.issue_id;
            if let Err(e) = service.apply_summary_result(ticket, outcome).await {
                tracing::error!("Failed to store summary for issue {}: {}", issue_id, e);
            }
        });
    }
}

fn fetch(ledger: &Ledger, issue_id: Uuid) -> Result<Issue> {
    ledger
        .get_issue(issue_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", issue_id)))
}
