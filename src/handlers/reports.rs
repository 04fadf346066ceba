use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    error::Result,
    models::{IssueDocument, ReportOutcome},
    services::report_service,
};

#[derive(Debug, Deserialize)]
pub struct ReportTextQuery {
    /// Route the document through the summarizer for prose formatting
    #[serde(default)]
    pub prose: bool,
}

pub async fn get_report(State(state): State<AppState>) -> Result<Json<ReportOutcome>> {
    Ok(Json(state.issues.report().await))
}

pub async fn get_report_text(
    State(state): State<AppState>,
    Query(params): Query<ReportTextQuery>,
) -> Result<impl IntoResponse> {
    let outcome = state.issues.report().await;

    let text = match (&outcome, state.issues.summarizer()) {
        (ReportOutcome::Ready(report), Some(summarizer)) if params.prose => {
            match summarizer.summarize_report(report).await {
                Ok(prose) => prose,
                Err(e) => {
                    tracing::warn!("Falling back to plain report text: {}", e);
                    report_service::render_text(&outcome)
                }
            }
        }
        _ => report_service::render_text(&outcome),
    };

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

pub async fn get_issue_document(
    State(state): State<AppState>,
    Path(issue_id): Path<Uuid>,
) -> Result<Json<IssueDocument>> {
    let document = state.issues.document(issue_id).await?;
    Ok(Json(document))
}
