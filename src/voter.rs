use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
};

pub const VOTER_HEADER: &str = "x-voter-id";

/// Anonymous, client-generated voter identity. Not an account: it only keeps
/// one client from voting twice on the same issue.
#[derive(Debug, Clone, Copy)]
pub struct Voter {
    pub voter_id: Uuid,
}

impl FromRequestParts<AppState> for Voter {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self> {
        let raw = parts
            .headers
            .get(VOTER_HEADER)
            .ok_or_else(|| AppError::BadRequest("Missing X-Voter-Id header".to_string()))?
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid X-Voter-Id header".to_string()))?;

        let voter_id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::BadRequest("X-Voter-Id must be a UUID".to_string()))?;

        if voter_id.is_nil() {
            return Err(AppError::BadRequest(
                "X-Voter-Id must not be the nil UUID".to_string(),
            ));
        }

        Ok(Voter { voter_id })
    }
}

// Optional voter (for read endpoints that show the caller's own vote)
#[derive(Debug)]
pub struct OptionalVoter(pub Option<Voter>);

impl OptionalVoter {
    pub fn voter_id(&self) -> Option<Uuid> {
        self.0.map(|voter| voter.voter_id)
    }
}

impl FromRequestParts<AppState> for OptionalVoter {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match Voter::from_request_parts(parts, state).await {
            Ok(voter) => Ok(OptionalVoter(Some(voter))),
            Err(_) => Ok(OptionalVoter(None)),
        }
    }
}
