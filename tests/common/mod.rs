//! Shared helpers for HTTP-level tests.

use std::{path::PathBuf, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use reportify::{
    AppState,
    config::{Config, LedgerConfig, StorageBackend},
    create_app,
    services::issue_service::IssueService,
    store::{LedgerStore, MemoryStore},
    voter::VOTER_HEADER,
};

pub fn test_config(ledger: LedgerConfig) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        allowed_origins: vec!["http://localhost:3000".to_string()],
        ledger,
        storage_backend: StorageBackend::Memory,
        data_file: PathBuf::from("unused.json"),
        redis_url: "redis://localhost:6379".to_string(),
        max_attachment_size: 1024,
        summarizer: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

pub async fn setup_app(ledger: LedgerConfig) -> TestApp {
    let store = MemoryStore::default();
    let config = test_config(ledger);
    let issues = IssueService::load(config.ledger, LedgerStore::Memory(store.clone()), None).await;

    let router = create_app(AppState {
        issues,
        config: Arc::new(config),
    });

    TestApp { router, store }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        voter: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(voter) = voter {
            builder = builder.header(VOTER_HEADER, voter.to_string());
        }

        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, json)
    }

    pub async fn submit(&self, title: &str) -> Uuid {
        let (status, body) = self
            .request(
                "POST",
                "/api/issues",
                None,
                Some(serde_json::json!({
                    "title": title,
                    "description": format!("{} needs attention", title),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn vote(&self, issue_id: Uuid, voter: Uuid, direction: &str) -> (StatusCode, Value) {
        self.request(
            "POST",
            &format!("/api/issues/{}/vote", issue_id),
            Some(voter),
            Some(serde_json::json!({ "direction": direction })),
        )
        .await
    }

    pub async fn votes(&self, issue_id: Uuid, direction: &str, count: usize) {
        for _ in 0..count {
            let (status, _) = self.vote(issue_id, Uuid::new_v4(), direction).await;
            assert_eq!(status, StatusCode::OK);
        }
    }
}
