//! In-memory `JournalStore` for tests. Each write works on a copy of the state
//! and swaps it in only when the whole operation succeeded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::JournalStore;
use crate::error::{AppError, AppResult};
use crate::models::entry::{
    Entry, EntryRecord, ExerciseLog, NewEntry, NewTag, Response, Tag,
};
use crate::models::template::{Question, Template, TemplateDefinition, TemplateOwner};
use crate::models::user::User;
use crate::services::tags::DEFAULT_TAG_COLOR;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    templates: Vec<Template>,
    next_template_id: i64,
    entries: Vec<Entry>,
    responses: Vec<Response>,
    tags: Vec<Tag>,
    entry_tags: Vec<(Uuid, Uuid)>,
    exercise_logs: Vec<ExerciseLog>,
}

impl MemoryState {
    fn find_or_create_tag(&mut self, user_id: Uuid, tag: &NewTag) -> Tag {
        let name = tag.name.trim();
        if let Some(existing) = self
            .tags
            .iter()
            .find(|t| t.user_id == user_id && t.name.to_lowercase() == name.to_lowercase())
        {
            return existing.clone();
        }
        let created = Tag {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            color: tag.color.clone().unwrap_or_else(|| DEFAULT_TAG_COLOR.into()),
            created_at: Utc::now(),
        };
        self.tags.push(created.clone());
        created
    }

    fn upsert_exercise(&mut self, user_id: Uuid, date: NaiveDate, has_exercised: bool) -> ExerciseLog {
        let now = Utc::now();
        if let Some(log) = self
            .exercise_logs
            .iter_mut()
            .find(|l| l.user_id == user_id && l.log_date == date)
        {
            log.has_exercised = has_exercised;
            log.updated_at = now;
            return log.clone();
        }
        let log = ExerciseLog {
            id: Uuid::new_v4(),
            user_id,
            log_date: date,
            has_exercised,
            created_at: now,
            updated_at: now,
        };
        self.exercise_logs.push(log.clone());
        log
    }

    fn record(&self, entry: &Entry) -> EntryRecord {
        let mut responses: Vec<Response> = self
            .responses
            .iter()
            .filter(|r| r.entry_id == entry.id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.position);
        let tags = self
            .entry_tags
            .iter()
            .filter(|(entry_id, _)| *entry_id == entry.id)
            .filter_map(|(_, tag_id)| self.tags.iter().find(|t| t.id == *tag_id).cloned())
            .collect();
        EntryRecord {
            entry: entry.clone(),
            responses,
            tags,
        }
    }
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_template_id: 1,
                ..MemoryState::default()
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock poisoned")
    }

    pub fn seed_user(&self, timezone: &str) -> User {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let user = User {
            id,
            email: format!("{}@example.com", id.simple()),
            password_hash: String::new(),
            name: "Test User".into(),
            timezone: timezone.into(),
            created_at: now,
            updated_at: now,
        };
        self.lock().users.push(user.clone());
        user
    }

    pub fn seed_system_template(&self, name: &str, questions: Vec<Question>) -> Template {
        let mut state = self.lock();
        let template = Template {
            id: state.next_template_id,
            owner: TemplateOwner::System,
            name: name.into(),
            description: None,
            questions,
        };
        state.next_template_id += 1;
        state.templates.push(template.clone());
        template
    }

    /// Make the next entry writes fail after partially applying, as a lost connection would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn entry_count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn response_count(&self) -> usize {
        self.lock().responses.len()
    }

    pub fn tag_count(&self, user_id: Uuid) -> usize {
        self.lock().tags.iter().filter(|t| t.user_id == user_id).count()
    }
}

#[async_trait]
impl JournalStore for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        timezone: &str,
    ) -> AppResult<User> {
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|u| u.email.to_lowercase() == email.to_lowercase())
        {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
            timezone: timezone.into(),
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == email.to_lowercase())
            .cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        name: Option<&str>,
        timezone: Option<&str>,
    ) -> AppResult<User> {
        let mut state = self.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        if let Some(name) = name {
            user.name = name.into();
        }
        if let Some(timezone) = timezone {
            user.timezone = timezone.into();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_templates(&self, user_id: Uuid) -> AppResult<Vec<Template>> {
        Ok(self
            .lock()
            .templates
            .iter()
            .filter(|t| t.is_visible_to(user_id))
            .cloned()
            .collect())
    }

    async fn find_template(&self, id: i64) -> AppResult<Option<Template>> {
        Ok(self.lock().templates.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_template(
        &self,
        user_id: Uuid,
        definition: &TemplateDefinition,
    ) -> AppResult<Template> {
        let mut state = self.lock();
        let template = Template {
            id: state.next_template_id,
            owner: TemplateOwner::User(user_id),
            name: definition.name.trim().into(),
            description: definition.description.clone(),
            questions: definition.questions.clone(),
        };
        state.next_template_id += 1;
        state.templates.push(template.clone());
        Ok(template)
    }

    async fn update_template(
        &self,
        id: i64,
        definition: &TemplateDefinition,
    ) -> AppResult<Template> {
        let mut state = self.lock();
        let template = state
            .templates
            .iter_mut()
            .find(|t| t.id == id && !t.is_system())
            .ok_or_else(|| AppError::NotFound("Template not found".into()))?;
        template.name = definition.name.trim().into();
        template.description = definition.description.clone();
        template.questions = definition.questions.clone();
        Ok(template.clone())
    }

    async fn delete_template(&self, id: i64) -> AppResult<bool> {
        let mut state = self.lock();
        let before = state.templates.len();
        state.templates.retain(|t| t.id != id || t.is_system());
        let deleted = state.templates.len() < before;
        if deleted {
            for entry in state.entries.iter_mut().filter(|e| e.template_id == Some(id)) {
                entry.template_id = None;
            }
        }
        Ok(deleted)
    }

    async fn referenced_question_ids(&self, template_id: i64) -> AppResult<Vec<String>> {
        let state = self.lock();
        let mut ids: Vec<String> = state
            .responses
            .iter()
            .filter(|r| {
                state
                    .entries
                    .iter()
                    .any(|e| e.id == r.entry_id && e.template_id == Some(template_id))
            })
            .map(|r| r.question_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn latest_entry_at(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.created_at)
            .max())
    }

    async fn exercise_status(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<bool>> {
        Ok(self
            .lock()
            .exercise_logs
            .iter()
            .find(|l| l.user_id == user_id && l.log_date == date)
            .map(|l| l.has_exercised))
    }

    async fn upsert_exercise_log(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        has_exercised: bool,
    ) -> AppResult<ExerciseLog> {
        Ok(self.lock().upsert_exercise(user_id, date, has_exercised))
    }

    async fn has_answer_between(
        &self,
        user_id: Uuid,
        question_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool> {
        let state = self.lock();
        Ok(state.responses.iter().any(|r| {
            r.question_id == question_id
                && !r.answer.trim().is_empty()
                && state.entries.iter().any(|e| {
                    e.id == r.entry_id
                        && e.user_id == user_id
                        && e.created_at >= start
                        && e.created_at < end
                })
        }))
    }

    async fn create_entry(&self, new: NewEntry) -> AppResult<EntryRecord> {
        let mut guard = self.lock();
        let mut draft = guard.clone();

        let mut tags: Vec<Tag> = Vec::new();
        for tag_id in &new.tag_ids {
            let tag = draft
                .tags
                .iter()
                .find(|t| t.id == *tag_id && t.user_id == new.user_id)
                .cloned()
                .ok_or(AppError::Forbidden)?;
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }

        let entry = Entry {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            entry_type: new.entry_type,
            content: new.content.clone(),
            template_id: new.template_id,
            location: new.location.clone().filter(|l| !l.is_empty()),
            weather: new.weather.clone().filter(|w| !w.is_empty()),
            created_at: new.created_at,
        };
        draft.entries.push(entry.clone());

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("simulated write failure")));
        }

        for r in &new.responses {
            if draft
                .responses
                .iter()
                .any(|x| x.entry_id == entry.id && x.question_id == r.question_id)
            {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "duplicate response for question {}",
                    r.question_id
                )));
            }
            draft.responses.push(Response {
                id: Uuid::new_v4(),
                entry_id: entry.id,
                question_id: r.question_id.clone(),
                question_text: r.question_text.clone(),
                question_type: r.question_type,
                answer: r.answer.clone(),
                position: r.position,
            });
        }

        for new_tag in &new.new_tags {
            let tag = draft.find_or_create_tag(new.user_id, new_tag);
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }
        for tag in &tags {
            draft.entry_tags.push((entry.id, tag.id));
        }

        if let Some((date, has_exercised)) = new.exercise {
            draft.upsert_exercise(new.user_id, date, has_exercised);
        }

        let record = draft.record(&entry);
        *guard = draft;
        Ok(record)
    }

    async fn find_entry(&self, user_id: Uuid, entry_id: Uuid) -> AppResult<Option<EntryRecord>> {
        let state = self.lock();
        Ok(state
            .entries
            .iter()
            .find(|e| e.id == entry_id && e.user_id == user_id)
            .map(|e| state.record(e)))
    }

    async fn list_entries(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<EntryRecord>> {
        let state = self.lock();
        let mut entries: Vec<&Entry> = state.entries.iter().filter(|e| e.user_id == user_id).collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|e| state.record(e))
            .collect())
    }

    async fn delete_entry(&self, user_id: Uuid, entry_id: Uuid) -> AppResult<bool> {
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|e| !(e.id == entry_id && e.user_id == user_id));
        let deleted = state.entries.len() < before;
        if deleted {
            state.responses.retain(|r| r.entry_id != entry_id);
            state.entry_tags.retain(|(e, _)| *e != entry_id);
        }
        Ok(deleted)
    }

    async fn list_tags(&self, user_id: Uuid) -> AppResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .lock()
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tags.sort_by_key(|t| t.name.to_lowercase());
        Ok(tags)
    }

    async fn find_tag(&self, tag_id: Uuid) -> AppResult<Option<Tag>> {
        Ok(self.lock().tags.iter().find(|t| t.id == tag_id).cloned())
    }

    async fn find_or_create_tag(&self, user_id: Uuid, tag: &NewTag) -> AppResult<Tag> {
        Ok(self.lock().find_or_create_tag(user_id, tag))
    }

    async fn delete_tag(&self, tag_id: Uuid) -> AppResult<bool> {
        let mut state = self.lock();
        let before = state.tags.len();
        state.tags.retain(|t| t.id != tag_id);
        state.entry_tags.retain(|(_, t)| *t != tag_id);
        Ok(state.tags.len() < before)
    }
}
