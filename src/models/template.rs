use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::condition::DisplayCondition;

/// Id of the built-in default template. Never stored; entries written with it
/// keep `template_id = NULL`.
pub const DEFAULT_TEMPLATE_ID: i64 = 0;

/// Prefix of every question field in a guided form submission.
pub const QUESTION_FIELD_PREFIX: &str = "question_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "user_id", rename_all = "lowercase")]
pub enum TemplateOwner {
    System,
    User(Uuid),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Template {
    pub id: i64,
    pub owner: TemplateOwner,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

impl Template {
    pub fn is_system(&self) -> bool {
        self.owner == TemplateOwner::System
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_TEMPLATE_ID
    }

    /// System templates are visible to everyone, user templates only to their owner.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        match self.owner {
            TemplateOwner::System => true,
            TemplateOwner::User(owner) => owner == user_id,
        }
    }

    /// Id to persist on an entry written from this template.
    pub fn stored_id(&self) -> Option<i64> {
        (!self.is_default()).then_some(self.id)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    /// Integer 1-10.
    Scale,
    Boolean,
    MultiSelect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<DisplayCondition>,
}

impl Question {
    pub fn new(id: &str, prompt: &str, kind: QuestionType) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind,
            required: false,
            options: Vec::new(),
            condition: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn shown_when(mut self, condition: DisplayCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Form field key carrying this question's answer.
    pub fn field_name(&self) -> String {
        format!("{}{}", QUESTION_FIELD_PREFIX, self.id)
    }
}

#[derive(Debug, FromRow)]
pub struct TemplateRow {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub questions: sqlx::types::Json<Vec<Question>>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            owner: match row.user_id {
                Some(user_id) => TemplateOwner::User(user_id),
                None => TemplateOwner::System,
            },
            name: row.name,
            description: row.description,
            questions: row.questions.0,
        }
    }
}

/// Templates split for a selection UI; system templates come first.
#[derive(Debug, Serialize)]
pub struct TemplateGroups {
    pub system: Vec<Template>,
    pub custom: Vec<Template>,
}

/// Name and questions of a user template, as supplied on create or update.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TemplateDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub questions: Vec<Question>,
}
