//! API schema types for OpenAPI documentation.
//!
//! The endpoint consumes `multipart/form-data`, so these types describe the form
//! rather than being deserialized directly.

use utoipa::ToSchema;

/// The form accepted by `POST /api`.
#[derive(ToSchema)]
pub struct AssistantForm {
    /// Typed text, or an audio file to transcribe. Exactly one `input` field is allowed.
    #[schema(format = Binary)]
    pub input: String,
    /// Prior conversation turns, one JSON-encoded `HistoryTurn` per field, oldest first.
    pub message: Vec<String>,
}

/// Shape of each JSON-encoded `message` field.
#[derive(ToSchema)]
pub struct HistoryTurn {
    #[schema(example = "user")]
    pub role: HistoryRole,
    #[schema(example = "What's on my calendar today?")]
    pub content: String,
}

#[derive(ToSchema)]
#[schema(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}
