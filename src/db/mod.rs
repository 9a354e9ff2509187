use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::entry::{EntryRecord, ExerciseLog, NewEntry, NewTag, Tag};
use crate::models::template::{Template, TemplateDefinition};
use crate::models::user::User;

#[cfg(test)]
pub mod memory;
mod pool;
pub mod postgres;

pub use pool::create_pool;
pub use postgres::PgJournalStore;

/// Persistence used by the journal services.
///
/// `create_entry` writes the entry, its responses, tag links, new tags and the
/// exercise log as one unit: either all of it is stored or none of it is.
#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn ping(&self) -> bool;

    /// Fails with `Conflict` when the email is already registered, in any case.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        timezone: &str,
    ) -> AppResult<User>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn update_user(
        &self,
        id: Uuid,
        name: Option<&str>,
        timezone: Option<&str>,
    ) -> AppResult<User>;

    /// System templates and templates owned by `user_id`.
    async fn list_templates(&self, user_id: Uuid) -> AppResult<Vec<Template>>;
    async fn find_template(&self, id: i64) -> AppResult<Option<Template>>;
    async fn insert_template(
        &self,
        user_id: Uuid,
        definition: &TemplateDefinition,
    ) -> AppResult<Template>;
    async fn update_template(
        &self,
        id: i64,
        definition: &TemplateDefinition,
    ) -> AppResult<Template>;
    async fn delete_template(&self, id: i64) -> AppResult<bool>;
    /// Question ids with at least one stored response written from this template.
    async fn referenced_question_ids(&self, template_id: i64) -> AppResult<Vec<String>>;

    async fn latest_entry_at(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>>;
    async fn exercise_status(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<bool>>;
    async fn upsert_exercise_log(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        has_exercised: bool,
    ) -> AppResult<ExerciseLog>;
    /// Whether a non-empty answer to `question_id` was recorded in `[start, end)`.
    async fn has_answer_between(
        &self,
        user_id: Uuid,
        question_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Fails with `Forbidden` if any `tag_ids` entry is not owned by the entry's user.
    async fn create_entry(&self, entry: NewEntry) -> AppResult<EntryRecord>;
    async fn find_entry(&self, user_id: Uuid, entry_id: Uuid) -> AppResult<Option<EntryRecord>>;
    /// Newest first.
    async fn list_entries(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<EntryRecord>>;
    async fn delete_entry(&self, user_id: Uuid, entry_id: Uuid) -> AppResult<bool>;

    async fn list_tags(&self, user_id: Uuid) -> AppResult<Vec<Tag>>;
    async fn find_tag(&self, tag_id: Uuid) -> AppResult<Option<Tag>>;
    /// Reuses a tag with the same name (case-insensitive) instead of creating a second one.
    async fn find_or_create_tag(&self, user_id: Uuid, tag: &NewTag) -> AppResult<Tag>;
    async fn delete_tag(&self, tag_id: Uuid) -> AppResult<bool>;
}
