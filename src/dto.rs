//! Request/response shapes for the JSON API.
//!
//! - `*Request` is deserialized from a client body or query string
//! - `*Response` is serialized back
//! - field validation is expressed with `validator` derives

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, ValidationError};
use crate::models::template::Template;
use crate::services::compose::EntryView;
use crate::services::context::Context;
use crate::services::fallback::FallbackReason;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: String,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"), length(max = 254))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
}

// ---------------------------------------------------------------------------
// Guided journal
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GuidedQuery {
    pub template_id: Option<String>,
}

/// The form a client renders for one guided entry.
#[derive(Debug, Serialize)]
pub struct GuidedFormResponse {
    pub template: Template,
    /// Why the default template was used instead of the requested one.
    pub fallback: Option<FallbackReason>,
    pub context: Context,
    pub questions: Vec<QuestionField>,
}

#[derive(Debug, Serialize)]
pub struct QuestionField {
    pub id: String,
    pub field: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: crate::models::template::QuestionType,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct EntryListQuery {
    #[validate(range(min = 1, max = 100, message = "limit must be 1-100"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "offset cannot be negative"))]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EntryListResponse {
    pub entries: Vec<EntryView>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Exercise
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ExerciseLogRequest {
    pub has_exercised: bool,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TagPath {
    pub id: Uuid,
}

/// Run `validator` checks, mapping failures to per-field errors.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(|errors| {
        let mut out = ValidationError::new();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field));
                out.push(field.to_string(), message);
            }
        }
        AppError::InvalidSubmission(out)
    })
}
