//! Entry composition for display, export and AI context.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use uuid::Uuid;

use crate::models::entry::{EntryRecord, EntryType, Location, Weather};
use crate::services::answers::Answer;
use crate::services::templates::{EMOTIONS_QUESTION_ID, FEELING_QUESTION_ID};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseView {
    pub question_id: String,
    pub question_text: String,
    pub answer: Answer,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TagView {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntryView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub entry_type: EntryType,
    pub template_id: Option<i64>,
    pub content: Option<String>,
    pub responses: Vec<ResponseView>,
    pub tags: Vec<TagView>,
    pub location: Option<String>,
    pub weather: Option<String>,
}

impl EntryView {
    pub fn response(&self, question_id: &str) -> Option<&ResponseView> {
        self.responses.iter().find(|r| r.question_id == question_id)
    }
}

pub fn compose(record: &EntryRecord) -> EntryView {
    let mut responses = record.responses.clone();
    responses.sort_by_key(|r| r.position);

    let mut tags: Vec<TagView> = record
        .tags
        .iter()
        .map(|t| TagView {
            id: t.id,
            name: t.name.clone(),
            color: t.color.clone(),
        })
        .collect();
    tags.sort_by_key(|t| t.name.to_lowercase());

    EntryView {
        id: record.entry.id,
        created_at: record.entry.created_at,
        entry_type: record.entry.entry_type,
        template_id: record.entry.template_id,
        content: record.entry.content.clone().filter(|c| !c.trim().is_empty()),
        responses: responses
            .into_iter()
            .map(|r| ResponseView {
                answer: Answer::from_stored(r.question_type, &r.answer),
                question_id: r.question_id,
                question_text: r.question_text,
            })
            .collect(),
        tags,
        location: record.entry.location.as_ref().and_then(location_summary),
        weather: record.entry.weather.as_ref().and_then(weather_summary),
    }
}

/// "City, State", or whichever half is known.
pub fn location_summary(location: &Location) -> Option<String> {
    let parts: Vec<&str> = [location.city.as_deref(), location.state.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// "72°F, Sunny", or whichever half is known.
pub fn weather_summary(weather: &Weather) -> Option<String> {
    let temperature = weather.temperature.map(|t| format!("{:.0}°F", t));
    let condition = weather
        .condition
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let parts: Vec<String> = [temperature, condition].into_iter().flatten().collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Flatten an entry into the plain-text block the conversation prompt expects.
pub fn flatten(view: &EntryView, tz: Tz) -> String {
    let mut lines = vec![format!(
        "--- JOURNAL ENTRY: {} ---",
        view.created_at.with_timezone(&tz).format("%Y-%m-%d")
    )];

    if let Some(feeling) = view.response(FEELING_QUESTION_ID) {
        lines.push(format!("Feeling: {}", feeling.answer.display()));
    }
    if let Some(emotions) = view.response(EMOTIONS_QUESTION_ID) {
        if let Answer::MultiSelect(values) = &emotions.answer {
            if !values.is_empty() {
                lines.push(format!("Emotions: {}", values.join(", ")));
            }
        }
    }
    if let Some(content) = &view.content {
        lines.push("Content:".into());
        lines.push(content.clone());
    }
    for response in &view.responses {
        if response.question_id == FEELING_QUESTION_ID
            || response.question_id == EMOTIONS_QUESTION_ID
        {
            continue;
        }
        lines.push(format!("Q: {}", response.question_text));
        lines.push(format!("A: {}", response.answer.display()));
    }

    lines.join("\n")
}
