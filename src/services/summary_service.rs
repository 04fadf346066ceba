use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::SummarizerConfig,
    error::{AppError, Result},
    models::{AuthorityReport, SummaryTicket},
};

/// Client for an OpenAI-compatible chat completion endpoint. The endpoint and
/// its key always come from configuration.
#[derive(Debug, Clone)]
pub struct SummaryService {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

const ISSUE_INSTRUCTIONS: &str = "You summarize community issue reports for local authorities. \
Reply with two or three plain sentences: what the problem is, where, \
and what residents said about it.";

const REPORT_INSTRUCTIONS: &str = "You format community issue reports into a short, formal letter \
addressed to local authorities. Keep every issue, in the given order, and do not invent details.";

impl SummaryService {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Summarize one issue together with the opinions gathered so far.
    pub async fn summarize(&self, ticket: &SummaryTicket) -> Result<String> {
        tracing::debug!(
            "Requesting summary for issue {} (revision {})",
            ticket.issue_id,
            ticket.revision
        );
        self.complete(ISSUE_INSTRUCTIONS, issue_prompt(ticket)).await
    }

    /// Turn the aggregated report into prose.
    pub async fn summarize_report(&self, report: &AuthorityReport) -> Result<String> {
        self.complete(REPORT_INSTRUCTIONS, report_prompt(report)).await
    }

    async fn complete(&self, instructions: &str, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: instructions.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Summarizer API error {}: {}", status, error_text);
            return Err(AppError::Internal(format!(
                "Summarizer API error {}: {}",
                status, error_text
            )));
        }

        let body: ChatResponse = response.json().await?;
        extract_text(body)
    }
}

fn extract_text(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .map(|message| message.content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| AppError::Internal("Summarizer response missing content".to_string()))
}

pub fn issue_prompt(ticket: &SummaryTicket) -> String {
    let mut prompt = format!(
        "Title: {}\nDescription: {}\n",
        ticket.title, ticket.description
    );

    if ticket.opinions.is_empty() {
        prompt.push_str("Opinions: none yet\n");
    } else {
        prompt.push_str("Opinions:\n");
        for opinion in &ticket.opinions {
            prompt.push_str(&format!("- {}\n", opinion));
        }
    }

    prompt
}

pub fn report_prompt(report: &AuthorityReport) -> String {
    let mut prompt = format!("{} reported issues:\n", report.total);
    for (n, entry) in report.entries.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} ({} upvotes) - {}\n",
            n + 1,
            entry.title,
            entry.upvotes,
            entry.description
        ));
        if let Some(location) = &entry.location {
            prompt.push_str(&format!("   Location: {}\n", location));
        }
    }
    prompt
}
