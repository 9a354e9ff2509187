//! Turns submitted form fields into a stored entry.
//!
//! The visible question set is recomputed from a fresh context; fields for
//! questions the user was not shown are ignored. All field errors are collected
//! before anything is written, and the write itself is a single store call.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::JournalStore;
use crate::error::{AppResult, ValidationError};
use crate::models::entry::{
    EntryRecord, EntryType, Location, NewEntry, NewResponse, NewTag, Weather,
};
use crate::models::template::{QuestionType, Template};
use crate::models::user::User;
use crate::services::answers::{parse_answer, Answer};
use crate::services::context::{self, Context, LocalDay};
use crate::services::renderer::is_visible;
use crate::services::sanitize::sanitize_html;
use crate::services::tags::{parse_tag_token, prepare_new_tags, TagRef};
use crate::services::templates::EXERCISE_QUESTION_ID;

pub const MAX_CONTENT_LEN: usize = 20_000;
const MAX_PLACE_LEN: usize = 100;

/// Raw form fields in submission order. Keys may repeat.
#[derive(Debug, Clone, Default)]
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl From<Vec<(String, String)>> for FormFields {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::new(pairs)
    }
}

/// A validated submission, ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prepared {
    pub responses: Vec<NewResponse>,
    pub exercise: Option<bool>,
    pub content: Option<String>,
    pub tag_ids: Vec<Uuid>,
    pub new_tags: Vec<NewTag>,
    pub location: Option<Location>,
    pub weather: Option<Weather>,
}

/// Free-form entry body sent as JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuickEntry {
    pub content: String,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    #[serde(default)]
    pub new_tags: Vec<NewTag>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub weather: Option<Weather>,
}

pub fn prepare(
    template: &Template,
    ctx: &Context,
    fields: &FormFields,
) -> Result<Prepared, ValidationError> {
    let mut errors = ValidationError::new();
    let mut prepared = Prepared::default();

    for (position, question) in template.questions.iter().enumerate() {
        if !is_visible(question, ctx) {
            continue;
        }
        let raw = fields.get(&question.field_name());
        match parse_answer(question.kind, raw) {
            Err(msg) => errors.push(question.id.clone(), msg),
            Ok(None) => {
                if question.required && question.kind != QuestionType::MultiSelect {
                    errors.push(question.id.clone(), "This question is required");
                }
            }
            Ok(Some(answer)) => {
                if question.id == EXERCISE_QUESTION_ID {
                    if let Answer::Boolean(b) = answer {
                        prepared.exercise = Some(b);
                    }
                }
                prepared.responses.push(NewResponse {
                    question_id: question.id.clone(),
                    question_text: question.prompt.clone(),
                    question_type: question.kind,
                    answer: answer.to_stored(),
                    position: position as i32,
                });
            }
        }
    }

    prepared.content = read_content(fields.get("content"), &mut errors);

    let mut new_tags = Vec::new();
    if let Some(raw) = fields.get("new_tags").filter(|v| !v.trim().is_empty()) {
        match serde_json::from_str::<Vec<NewTag>>(raw) {
            Ok(tags) => new_tags.extend(tags),
            Err(_) => errors.push("new_tags", "New tags must be a list of {name, color}"),
        }
    }
    for token in fields.all("tags").flat_map(|v| v.split(',')) {
        match parse_tag_token(token) {
            Some(TagRef::Existing(id)) if !prepared.tag_ids.contains(&id) => {
                prepared.tag_ids.push(id)
            }
            Some(TagRef::New(tag)) => new_tags.push(tag),
            _ => {}
        }
    }
    prepared.new_tags = prepare_new_tags(new_tags, &mut errors);

    let location = Location {
        city: read_place(fields.get("location_city")),
        state: read_place(fields.get("location_state")),
        latitude: read_number(fields, "location_latitude", &mut errors),
        longitude: read_number(fields, "location_longitude", &mut errors),
    };
    let weather = Weather {
        temperature: read_number(fields, "weather_temperature", &mut errors),
        condition: read_place(fields.get("weather_condition")),
        humidity: read_number(fields, "weather_humidity", &mut errors).map(|h| h.round() as i32),
    };
    validate_location(&location, &mut errors);
    validate_weather(&weather, &mut errors);
    prepared.location = (!location.is_empty()).then_some(location);
    prepared.weather = (!weather.is_empty()).then_some(weather);

    errors.into_result()?;
    Ok(prepared)
}

/// Validate and store a guided submission against `template`.
pub async fn submit(
    store: &dyn JournalStore,
    user: &User,
    template: &Template,
    fields: &FormFields,
    now: DateTime<Utc>,
) -> AppResult<EntryRecord> {
    let ctx = context::build(store, user, now).await?;
    let prepared = match prepare(template, &ctx, fields) {
        Ok(prepared) => prepared,
        Err(errors) => {
            tracing::debug!(
                user_id = %user.id,
                template_id = template.id,
                fields = ?errors.fields.iter().map(|f| f.field.as_str()).collect::<Vec<_>>(),
                "Guided submission rejected"
            );
            return Err(errors.into());
        }
    };

    let day = LocalDay::for_user(user, now);
    let record = store
        .create_entry(NewEntry {
            user_id: user.id,
            entry_type: EntryType::Guided,
            content: prepared.content,
            template_id: template.stored_id(),
            location: prepared.location,
            weather: prepared.weather,
            responses: prepared.responses,
            tag_ids: prepared.tag_ids,
            new_tags: prepared.new_tags,
            exercise: prepared.exercise.map(|done| (day.date, done)),
            created_at: now,
        })
        .await?;

    tracing::info!(
        user_id = %user.id,
        entry_id = %record.entry.id,
        template_id = template.id,
        responses = record.responses.len(),
        "Guided entry created"
    );
    Ok(record)
}

pub async fn submit_quick(
    store: &dyn JournalStore,
    user: &User,
    entry: QuickEntry,
    now: DateTime<Utc>,
) -> AppResult<EntryRecord> {
    let mut errors = ValidationError::new();
    let content = read_content(Some(&entry.content), &mut errors);
    if content.is_none() && !errors.names("content") {
        errors.push("content", "Write something before saving");
    }
    let new_tags = prepare_new_tags(entry.new_tags, &mut errors);
    let location = entry.location.filter(|l| !l.is_empty());
    let weather = entry.weather.filter(|w| !w.is_empty());
    if let Some(location) = &location {
        validate_location(location, &mut errors);
    }
    if let Some(weather) = &weather {
        validate_weather(weather, &mut errors);
    }
    errors.into_result()?;

    let mut tag_ids = entry.tag_ids;
    tag_ids.dedup();

    let record = store
        .create_entry(NewEntry {
            user_id: user.id,
            entry_type: EntryType::Quick,
            content,
            template_id: None,
            location,
            weather,
            responses: Vec::new(),
            tag_ids,
            new_tags,
            exercise: None,
            created_at: now,
        })
        .await?;

    tracing::info!(user_id = %user.id, entry_id = %record.entry.id, "Quick entry created");
    Ok(record)
}

fn read_content(raw: Option<&str>, errors: &mut ValidationError) -> Option<String> {
    let content = sanitize_html(raw?);
    if content.chars().count() > MAX_CONTENT_LEN {
        errors.push(
            "content",
            format!("Entries are limited to {} characters", MAX_CONTENT_LEN),
        );
        return None;
    }
    (!content.is_empty()).then_some(content)
}

fn read_place(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value.contains(['<', '>']) {
        return None;
    }
    Some(value.chars().take(MAX_PLACE_LEN).collect())
}

fn read_number(fields: &FormFields, name: &str, errors: &mut ValidationError) -> Option<f64> {
    let raw = fields.get(name)?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            errors.push(name, "Must be a number");
            None
        }
    }
}

fn validate_location(location: &Location, errors: &mut ValidationError) {
    if location.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        errors.push("location_latitude", "Latitude must be between -90 and 90");
    }
    if location.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        errors.push("location_longitude", "Longitude must be between -180 and 180");
    }
}

fn validate_weather(weather: &Weather, errors: &mut ValidationError) {
    if weather.humidity.is_some_and(|h| !(0..=100).contains(&h)) {
        errors.push("weather_humidity", "Humidity must be between 0 and 100");
    }
    if weather.temperature.is_some_and(|t| !(-100.0..=150.0).contains(&t)) {
        errors.push("weather_temperature", "Temperature looks out of range");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::db::memory::MemoryStore;
    use crate::error::AppError;
    use crate::models::template::{Question, TemplateDefinition};
    use crate::services::compose::compose;
    use crate::services::templates::{
        self, default_template, EMOTIONS_QUESTION_ID, FEELING_QUESTION_ID, GOALS_QUESTION_ID,
    };

    // 15:00 UTC, so before-noon questions are hidden for a UTC user.
    fn afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
    }

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn check_in(store: &MemoryStore) -> Template {
        store.seed_system_template(
            "Check-in",
            vec![
                Question::new(FEELING_QUESTION_ID, "How are you feeling?", QuestionType::Scale)
                    .required(),
                Question::new(
                    EMOTIONS_QUESTION_ID,
                    "Which emotions?",
                    QuestionType::MultiSelect,
                )
                .with_options(&["Happy", "Excited", "Calm"]),
            ],
        )
    }

    fn invalid_fields(result: AppResult<EntryRecord>) -> ValidationError {
        match result {
            Err(AppError::InvalidSubmission(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scale_and_emotions_are_stored() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let template = check_in(&store);

        let record = submit(
            &store,
            &user,
            &template,
            &fields(&[
                ("question_feeling_scale", "7"),
                ("question_additional_emotions", r#"["Happy","Excited"]"#),
            ]),
            afternoon(),
        )
        .await
        .unwrap();

        assert_eq!(record.responses.len(), 2);
        assert_eq!(record.responses[0].question_id, FEELING_QUESTION_ID);
        assert_eq!(record.responses[0].answer, "7");
        assert_eq!(record.entry.template_id, Some(template.id));

        let view = compose(&record);
        assert_eq!(
            view.response(EMOTIONS_QUESTION_ID).unwrap().answer,
            Answer::MultiSelect(vec!["Happy".into(), "Excited".into()])
        );
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_required_scale_writes_nothing() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let template = check_in(&store);

        let result = submit(
            &store,
            &user,
            &template,
            &fields(&[("question_additional_emotions", r#"["Happy"]"#)]),
            afternoon(),
        )
        .await;

        let errors = invalid_fields(result);
        assert!(errors.names(FEELING_QUESTION_ID));
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.response_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_emotions_store_empty_selection() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let template = check_in(&store);

        let record = submit(
            &store,
            &user,
            &template,
            &fields(&[
                ("question_feeling_scale", "4"),
                ("question_additional_emotions", "not_json"),
            ]),
            afternoon(),
        )
        .await
        .unwrap();

        let view = compose(&record);
        assert_eq!(
            view.response(EMOTIONS_QUESTION_ID).unwrap().answer,
            Answer::MultiSelect(vec![])
        );
    }

    #[tokio::test]
    async fn test_all_field_errors_are_reported_together() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");

        let result = submit(
            &store,
            &user,
            &default_template(),
            &fields(&[
                ("question_feeling_scale", "11"),
                ("question_exercise", "maybe"),
                ("location_latitude", "200"),
            ]),
            afternoon(),
        )
        .await;

        let errors = invalid_fields(result);
        assert!(errors.names(FEELING_QUESTION_ID));
        assert!(errors.names(EXERCISE_QUESTION_ID));
        assert!(errors.names("location_latitude"));
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_default_template_round_trip_and_exercise_log() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let now = afternoon();

        let record = submit(
            &store,
            &user,
            &default_template(),
            &fields(&[
                ("question_feeling_scale", "8"),
                ("question_additional_emotions", r#"["Calm","Grateful","Calm"]"#),
                ("question_feeling_reason", "<b>Long walk</b><script>x()</script>"),
                ("question_exercise", "TRUE"),
                ("content", "Good day."),
                ("location_city", "Portland"),
                ("location_state", "OR"),
                ("weather_temperature", "61"),
                ("weather_condition", "Cloudy"),
            ]),
            now,
        )
        .await
        .unwrap();

        assert_eq!(record.entry.template_id, None);
        let view = compose(&record);
        assert_eq!(view.response(FEELING_QUESTION_ID).unwrap().answer, Answer::Scale(8));
        assert_eq!(
            view.response(EMOTIONS_QUESTION_ID).unwrap().answer,
            Answer::MultiSelect(vec!["Calm".into(), "Grateful".into()])
        );
        assert_eq!(
            view.response("feeling_reason").unwrap().answer,
            Answer::Text("<b>Long walk</b>".into())
        );
        assert_eq!(
            view.response(EXERCISE_QUESTION_ID).unwrap().answer,
            Answer::Boolean(true)
        );
        assert_eq!(view.location.as_deref(), Some("Portland, OR"));
        assert_eq!(view.weather.as_deref(), Some("61°F, Cloudy"));

        let today = now.date_naive();
        assert_eq!(store.exercise_status(user.id, today).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_hidden_and_unknown_fields_are_ignored() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");

        let record = submit(
            &store,
            &user,
            &default_template(),
            &fields(&[
                ("question_feeling_scale", "5"),
                ("question_goals", "Ship the release"),
                ("question_since_last_entry", "Lots"),
                ("question_made_up", "anything"),
            ]),
            afternoon(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = record
            .responses
            .iter()
            .map(|r| r.question_id.as_str())
            .collect();
        assert_eq!(ids, vec![FEELING_QUESTION_ID]);
        assert!(!ids.contains(&GOALS_QUESTION_ID));
    }

    #[tokio::test]
    async fn test_new_tag_names_are_reused() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let template = check_in(&store);
        let form = fields(&[
            ("question_feeling_scale", "6"),
            ("new_tags", r##"[{"name":"Work","color":"#ff0000"},{"name":"work"}]"##),
            ("tags", "WORK:#00ff00"),
        ]);

        let first = submit(&store, &user, &template, &form, afternoon())
            .await
            .unwrap();
        let second = submit(&store, &user, &template, &form, afternoon())
            .await
            .unwrap();

        assert_eq!(store.tag_count(user.id), 1);
        assert_eq!(first.tags.len(), 1);
        assert_eq!(first.tags[0].id, second.tags[0].id);
        assert_eq!(first.tags[0].color, "#ff0000");
    }

    #[tokio::test]
    async fn test_foreign_tag_aborts_submission() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let other = store.seed_user("UTC");
        let foreign = crate::services::tags::create(
            &store,
            other.id,
            NewTag {
                name: "Private".into(),
                color: None,
            },
        )
        .await
        .unwrap();
        let foreign_id = foreign.id.to_string();
        let template = check_in(&store);

        let result = submit(
            &store,
            &user,
            &template,
            &fields(&[
                ("question_feeling_scale", "6"),
                ("tags", foreign_id.as_str()),
                ("new_tags", r#"[{"name":"Fresh"}]"#),
            ]),
            afternoon(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.tag_count(user.id), 0);
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        store.fail_writes(true);

        let result = submit(
            &store,
            &user,
            &default_template(),
            &fields(&[("question_feeling_scale", "5"), ("question_exercise", "yes")]),
            afternoon(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.response_count(), 0);
        assert_eq!(
            store
                .exercise_status(user.id, afternoon().date_naive())
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_answered_questions_survive_template_edits() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");
        let template = templates::create(
            &store,
            user.id,
            TemplateDefinition {
                name: "Gratitude".into(),
                description: None,
                questions: vec![
                    Question::new("grateful_for", "Grateful for?", QuestionType::Text),
                    Question::new("energy", "Energy?", QuestionType::Scale),
                ],
            },
        )
        .await
        .unwrap();

        submit(
            &store,
            &user,
            &template,
            &fields(&[("question_grateful_for", "Coffee")]),
            afternoon(),
        )
        .await
        .unwrap();

        let dropped = templates::update(
            &store,
            template.id,
            user.id,
            TemplateDefinition {
                name: "Gratitude".into(),
                description: None,
                questions: vec![Question::new("energy", "Energy?", QuestionType::Scale)],
            },
        )
        .await;
        match dropped {
            Err(AppError::InvalidSubmission(errors)) => {
                assert!(errors.names("questions.grateful_for"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // Removing an unanswered question is fine.
        let updated = templates::update(
            &store,
            template.id,
            user.id,
            TemplateDefinition {
                name: "Gratitude v2".into(),
                description: None,
                questions: vec![Question::new(
                    "grateful_for",
                    "What are you grateful for?",
                    QuestionType::Text,
                )],
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_quick_entry_requires_content() {
        let store = MemoryStore::new();
        let user = store.seed_user("UTC");

        let result = submit_quick(
            &store,
            &user,
            QuickEntry {
                content: "<script>alert(1)</script>".into(),
                ..QuickEntry::default()
            },
            afternoon(),
        )
        .await;
        assert!(invalid_fields(result).names("content"));

        let record = submit_quick(
            &store,
            &user,
            QuickEntry {
                content: "Quiet morning".into(),
                new_tags: vec![NewTag {
                    name: "Morning".into(),
                    color: None,
                }],
                ..QuickEntry::default()
            },
            afternoon(),
        )
        .await
        .unwrap();
        assert_eq!(record.entry.entry_type, EntryType::Quick);
        assert_eq!(record.entry.content.as_deref(), Some("Quiet morning"));
        assert_eq!(record.tags.len(), 1);
    }
}
