use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::template::QuestionType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "entry_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Quick,
    Guided,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.state.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

/// Weather captured when the entry was written. Temperature is in °F.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Weather {
    pub temperature: Option<f64>,
    pub condition: Option<String>,
    pub humidity: Option<i32>,
}

impl Weather {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.condition.is_none() && self.humidity.is_none()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_type: EntryType,
    pub content: Option<String>,
    pub template_id: Option<i64>,
    pub location: Option<Location>,
    pub weather: Option<Weather>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct EntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_type: EntryType,
    pub content: Option<String>,
    pub template_id: Option<i64>,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub weather_temperature: Option<f64>,
    pub weather_condition: Option<String>,
    pub weather_humidity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        let location = Location {
            city: row.location_city,
            state: row.location_state,
            latitude: row.latitude,
            longitude: row.longitude,
        };
        let weather = Weather {
            temperature: row.weather_temperature,
            condition: row.weather_condition,
            humidity: row.weather_humidity,
        };
        Self {
            id: row.id,
            user_id: row.user_id,
            entry_type: row.entry_type,
            content: row.content,
            template_id: row.template_id,
            location: (!location.is_empty()).then_some(location),
            weather: (!weather.is_empty()).then_some(weather),
            created_at: row.created_at,
        }
    }
}

/// One stored answer. Question text and type are snapshots taken at submission.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Response {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub answer: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ExerciseLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub log_date: NaiveDate,
    pub has_exercised: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An entry together with its responses and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub entry: Entry,
    pub responses: Vec<Response>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewResponse {
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub answer: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Everything written by a single entry submission, applied in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub user_id: Uuid,
    pub entry_type: EntryType,
    pub content: Option<String>,
    pub template_id: Option<i64>,
    pub location: Option<Location>,
    pub weather: Option<Weather>,
    pub responses: Vec<NewResponse>,
    pub tag_ids: Vec<Uuid>,
    pub new_tags: Vec<NewTag>,
    /// Exercise answer to record against the user's local date.
    pub exercise: Option<(NaiveDate, bool)>,
    pub created_at: DateTime<Utc>,
}
