//! Request DTOs
//!
//! Payloads of client invocations.

use serde::Deserialize;
use validator::Validate;

/// Longest message body the relay accepts, in characters.
pub const MAX_CONTENT_LENGTH: u64 = 4000;

/// `sendPrivateMessage` invocation
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendPrivateMessageRequest {
    #[serde(default)]
    pub recipient_user_id: String,

    #[serde(default)]
    #[validate(
        length(min = 1, max = MAX_CONTENT_LENGTH, message = "Content must be 1-4000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

impl SendPrivateMessageRequest {
    pub fn new(recipient_user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            recipient_user_id: recipient_user_id.into(),
            content: content.into(),
        }
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("blank");
        error.message = Some("Content must not be blank".into());
        return Err(error);
    }
    Ok(())
}
