use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::Result,
    models::{
        AddOpinionRequest, Attachment, CreateIssueRequest, IssueResponse, IssueSort, NewIssue,
        VoteOutcome, VoteRequest,
    },
    voter::{OptionalVoter, Voter},
};

#[derive(Debug, Deserialize)]
pub struct ListIssuesQuery {
    pub sort: Option<IssueSort>,
}

pub async fn create_issue(
    State(state): State<AppState>,
    Json(payload): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<IssueResponse>)> {
    payload.validate()?;

    let attachment = payload
        .attachment
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .map(|url| Attachment::from_data_url(url, state.config.max_attachment_size))
        .transpose()?;

    let issue = state
        .issues
        .submit_issue(NewIssue {
            title: payload.title,
            description: payload.description,
            location: payload.location,
            attachment,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(IssueResponse::new(issue, None))))
}

pub async fn list_issues(
    State(state): State<AppState>,
    Query(params): Query<ListIssuesQuery>,
    voter: OptionalVoter,
) -> Result<Json<Vec<IssueResponse>>> {
    let issues = state
        .issues
        .list_issues(voter.voter_id(), params.sort.unwrap_or_default())
        .await;

    Ok(Json(issues))
}

pub async fn get_issue(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    voter: OptionalVoter,
) -> Result<Json<IssueResponse>> {
    let issue = state.issues.get_issue(issue_id, voter.voter_id()).await?;
    Ok(Json(issue))
}

pub async fn vote_issue(
    State(state): State<AppState>,
    voter: Voter,
    Path(issue_id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteOutcome>> {
    let outcome = state
        .issues
        .cast_vote(issue_id, voter.voter_id, payload.direction)
        .await?;

    Ok(Json(outcome))
}

pub async fn add_opinion(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    voter: OptionalVoter,
    Json(payload): Json<AddOpinionRequest>,
) -> Result<Json<IssueResponse>> {
    payload.validate()?;

    state.issues.add_opinion(issue_id, payload.text).await?;
    let issue = state.issues.get_issue(issue_id, voter.voter_id()).await?;

    Ok(Json(issue))
}
