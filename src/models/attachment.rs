use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Image attached to an issue. The payload is carried as-is and never inspected
/// beyond checking that it decodes and fits the size cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
}

impl Attachment {
    /// Parse a `data:image/<subtype>;base64,<payload>` URL as produced by a
    /// browser `FileReader`.
    pub fn from_data_url(data_url: &str, max_size: usize) -> Result<Self> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| AppError::BadRequest("Attachment must be a data URL".to_string()))?;

        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| AppError::BadRequest("Malformed attachment data URL".to_string()))?;

        let media_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::BadRequest("Attachment must be base64 encoded".to_string()))?;

        let mime_type: mime::Mime = media_type
            .parse()
            .map_err(|_| AppError::UnsupportedMediaType)?;

        if mime_type.type_() != mime::IMAGE {
            return Err(AppError::UnsupportedMediaType);
        }

        // Reject obviously oversized payloads before decoding them
        if payload.len() / 4 * 3 > max_size + 3 {
            return Err(AppError::ContentTooLarge);
        }

        let decoded = STANDARD
            .decode(payload)
            .map_err(|e| AppError::BadRequest(format!("Invalid attachment encoding: {}", e)))?;

        if decoded.len() > max_size {
            return Err(AppError::ContentTooLarge);
        }

        Ok(Self {
            content_type: mime_type.essence_str().to_string(),
            data: payload.to_string(),
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.data)
    }
}
