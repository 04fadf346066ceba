pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod redis;
pub mod services;
pub mod store;
pub mod voter;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, HeaderValue, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, services::issue_service::IssueService, voter::VOTER_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub issues: IssueService,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {}", origin);
                        None
                    }
                })
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(VOTER_HEADER),
        ]);

    // Base64 inflates attachments by a third, plus room for the text fields
    let body_limit = state.config.max_attachment_size / 3 * 4 + 64 * 1024;

    let issue_routes = Router::new()
        .route(
            "/api/issues",
            get(handlers::issues::list_issues).post(handlers::issues::create_issue),
        )
        .route("/api/issues/{issue_id}", get(handlers::issues::get_issue))
        .route(
            "/api/issues/{issue_id}/vote",
            post(handlers::issues::vote_issue),
        )
        .route(
            "/api/issues/{issue_id}/opinions",
            post(handlers::issues::add_opinion),
        );

    let report_routes = Router::new()
        .route("/api/reports", get(handlers::reports::get_report))
        .route(
            "/api/reports/text",
            get(handlers::reports::get_report_text),
        )
        .route(
            "/api/reports/{issue_id}/document",
            get(handlers::reports::get_issue_document),
        );

    Router::new()
        .merge(issue_routes)
        .merge(report_routes)
        .route("/api/ws", get(handlers::feed::ledger_feed))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
