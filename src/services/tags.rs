//! User tags: name/color normalization, submission tag parsing, ownership checks.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::db::JournalStore;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::entry::{NewTag, Tag};

pub const DEFAULT_TAG_COLOR: &str = "#6366f1";
pub const MAX_TAG_NAME_LEN: usize = 50;

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid hex color regex");
}

/// A tag named in a submission: either an existing tag id or a tag to create.
#[derive(Debug, Clone, PartialEq)]
pub enum TagRef {
    Existing(Uuid),
    New(NewTag),
}

pub fn normalize_name(raw: &str) -> Result<String, String> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() || name.chars().count() > MAX_TAG_NAME_LEN {
        return Err(format!("Tag names must be 1-{} characters", MAX_TAG_NAME_LEN));
    }
    Ok(name)
}

/// Lowercased `#rrggbb`, or the default color when missing or not a hex color.
pub fn normalize_color(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(c) if HEX_COLOR.is_match(c) => c.to_ascii_lowercase(),
        _ => DEFAULT_TAG_COLOR.to_string(),
    }
}

/// Parse one token of the `tags` field: a tag id, or `name` / `name:color` for a new tag.
pub fn parse_tag_token(token: &str) -> Option<TagRef> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if let Ok(id) = Uuid::parse_str(token) {
        return Some(TagRef::Existing(id));
    }
    let (name, color) = match token.rsplit_once(':') {
        Some((name, color)) if color.trim().starts_with('#') => (name, Some(color)),
        _ => (token, None),
    };
    Some(TagRef::New(NewTag {
        name: name.to_string(),
        color: color.map(str::to_string),
    }))
}

/// Validate new tags and collapse names that differ only in case, keeping the first.
pub fn prepare_new_tags(tags: Vec<NewTag>, errors: &mut ValidationError) -> Vec<NewTag> {
    let mut out: Vec<NewTag> = Vec::with_capacity(tags.len());
    for tag in tags {
        match normalize_name(&tag.name) {
            Ok(name) => {
                if out.iter().any(|t| t.name.to_lowercase() == name.to_lowercase()) {
                    continue;
                }
                out.push(NewTag {
                    color: Some(normalize_color(tag.color.as_deref())),
                    name,
                });
            }
            Err(msg) => errors.push("new_tags", msg),
        }
    }
    out
}

pub async fn list(store: &dyn JournalStore, user_id: Uuid) -> AppResult<Vec<Tag>> {
    store.list_tags(user_id).await
}

/// Create a tag, or return the user's existing tag with the same name.
pub async fn create(store: &dyn JournalStore, user_id: Uuid, tag: NewTag) -> AppResult<Tag> {
    let name = normalize_name(&tag.name).map_err(|msg| ValidationError::single("name", msg))?;
    let tag = NewTag {
        color: Some(normalize_color(tag.color.as_deref())),
        name,
    };
    store.find_or_create_tag(user_id, &tag).await
}

pub async fn delete(store: &dyn JournalStore, user_id: Uuid, tag_id: Uuid) -> AppResult<()> {
    let tag = store
        .find_tag(tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag not found".into()))?;
    if tag.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    store.delete_tag(tag_id).await?;
    tracing::info!(user_id = %user_id, tag_id = %tag_id, "Tag deleted");
    Ok(())
}
