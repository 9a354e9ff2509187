//! Template registry: the built-in default template plus system and user templates.

use std::collections::HashSet;

use uuid::Uuid;

use crate::db::JournalStore;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::template::{
    Question, QuestionType, Template, TemplateDefinition, TemplateGroups, TemplateOwner,
    DEFAULT_TEMPLATE_ID,
};
use crate::services::condition::DisplayCondition;
use crate::services::fallback::{Fallback, FallbackReason};

pub const FEELING_QUESTION_ID: &str = "feeling_scale";
pub const EMOTIONS_QUESTION_ID: &str = "additional_emotions";
pub const EXERCISE_QUESTION_ID: &str = "exercise";
pub const GOALS_QUESTION_ID: &str = "goals";

pub const EMOTIONS: &[&str] = &[
    "Happy",
    "Excited",
    "Grateful",
    "Calm",
    "Content",
    "Hopeful",
    "Proud",
    "Loved",
    "Anxious",
    "Stressed",
    "Sad",
    "Angry",
    "Frustrated",
    "Lonely",
    "Tired",
    "Overwhelmed",
];

const MAX_NAME_LEN: usize = 100;
const MAX_PROMPT_LEN: usize = 500;
const MAX_QUESTION_ID_LEN: usize = 64;

/// The template used whenever no valid template is requested.
pub fn default_template() -> Template {
    Template {
        id: DEFAULT_TEMPLATE_ID,
        owner: TemplateOwner::System,
        name: "Daily Check-In".into(),
        description: Some("A short guided reflection on how today is going.".into()),
        questions: vec![
            Question::new(
                FEELING_QUESTION_ID,
                "On a scale of 1-10, how are you feeling right now?",
                QuestionType::Scale,
            )
            .required(),
            Question::new(
                EMOTIONS_QUESTION_ID,
                "Which emotions are you experiencing?",
                QuestionType::MultiSelect,
            )
            .with_options(EMOTIONS),
            Question::new(
                "feeling_reason",
                "What's contributing to how you feel?",
                QuestionType::Text,
            ),
            Question::new(
                "since_last_entry",
                "It's been a while since your last entry. What has happened since then?",
                QuestionType::Text,
            )
            .shown_when(DisplayCondition::HoursSinceLastEntryAtLeast(48)),
            Question::new(
                EXERCISE_QUESTION_ID,
                "Have you exercised today?",
                QuestionType::Boolean,
            )
            .shown_when(DisplayCondition::ExerciseNotLoggedToday),
            Question::new(
                GOALS_QUESTION_ID,
                "What are your goals for today?",
                QuestionType::Text,
            )
            .shown_when(DisplayCondition::All(vec![
                DisplayCondition::BeforeNoon,
                DisplayCondition::GoalsNotSetToday,
            ])),
        ],
    }
}

/// System templates (the built-in default first) followed by the user's own.
pub async fn list_templates(store: &dyn JournalStore, user_id: Uuid) -> AppResult<TemplateGroups> {
    let mut system = vec![default_template()];
    let mut custom = Vec::new();

    let mut templates = store.list_templates(user_id).await?;
    templates.sort_by_key(|t| t.id);
    for template in templates {
        match template.owner {
            TemplateOwner::System => system.push(template),
            TemplateOwner::User(owner) if owner == user_id => custom.push(template),
            TemplateOwner::User(_) => {}
        }
    }

    Ok(TemplateGroups { system, custom })
}

/// Resolve a requested template id, falling back to the default template when
/// the id is missing, malformed, unknown, or belongs to another user.
pub async fn resolve(
    store: &dyn JournalStore,
    template_id: Option<&str>,
    user_id: Uuid,
) -> AppResult<Fallback<Template>> {
    let resolved = match template_id.map(str::trim).filter(|s| !s.is_empty()) {
        None => Fallback::defaulted(default_template(), FallbackReason::Missing),
        Some(raw) => match raw.parse::<i64>() {
            Err(_) => Fallback::defaulted(default_template(), FallbackReason::Malformed),
            Ok(DEFAULT_TEMPLATE_ID) => Fallback::Exact(default_template()),
            Ok(id) => match store.find_template(id).await? {
                None => Fallback::defaulted(default_template(), FallbackReason::NotFound),
                Some(t) if !t.is_visible_to(user_id) => {
                    Fallback::defaulted(default_template(), FallbackReason::NotVisible)
                }
                Some(t) => Fallback::Exact(t),
            },
        },
    };

    if let Some(reason) = resolved.reason() {
        tracing::debug!(
            user_id = %user_id,
            requested = ?template_id,
            template_id = resolved.value().id,
            ?reason,
            "Using default template"
        );
    }

    Ok(resolved)
}

pub async fn create(
    store: &dyn JournalStore,
    user_id: Uuid,
    definition: TemplateDefinition,
) -> AppResult<Template> {
    validate_definition(&definition)?;
    warn_unrecognized_conditions(&definition);
    let template = store.insert_template(user_id, &definition).await?;
    tracing::info!(user_id = %user_id, template_id = template.id, "Template created");
    Ok(template)
}

pub async fn update(
    store: &dyn JournalStore,
    template_id: i64,
    user_id: Uuid,
    definition: TemplateDefinition,
) -> AppResult<Template> {
    let existing = owned_template(store, template_id, user_id).await?;
    validate_definition(&definition)?;

    // Stored responses point at question ids; those ids must survive the edit.
    let referenced = store.referenced_question_ids(existing.id).await?;
    let mut errors = ValidationError::new();
    for id in referenced {
        if !definition.questions.iter().any(|q| q.id == id) {
            errors.push(
                format!("questions.{}", id),
                "This question has recorded answers and cannot be removed or renamed",
            );
        }
    }
    errors.into_result()?;
    warn_unrecognized_conditions(&definition);

    store.update_template(template_id, &definition).await
}

pub async fn delete(store: &dyn JournalStore, template_id: i64, user_id: Uuid) -> AppResult<()> {
    owned_template(store, template_id, user_id).await?;
    store.delete_template(template_id).await?;
    tracing::info!(user_id = %user_id, template_id, "Template deleted");
    Ok(())
}

/// Load a template the user may modify. System templates are never modifiable.
async fn owned_template(
    store: &dyn JournalStore,
    template_id: i64,
    user_id: Uuid,
) -> AppResult<Template> {
    if template_id == DEFAULT_TEMPLATE_ID {
        return Err(AppError::Forbidden);
    }
    let template = store
        .find_template(template_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".into()))?;

    match template.owner {
        TemplateOwner::User(owner) if owner == user_id => Ok(template),
        _ => Err(AppError::Forbidden),
    }
}

/// Unknown condition terms are accepted (they always show the question) but worth noticing.
fn warn_unrecognized_conditions(definition: &TemplateDefinition) {
    for q in &definition.questions {
        if let Some(condition) = q.condition.as_ref().filter(|c| !c.is_recognized()) {
            tracing::warn!(
                question_id = %q.id,
                condition = %condition,
                "Unrecognized display condition; question will always be shown"
            );
        }
    }
}

pub fn validate_definition(definition: &TemplateDefinition) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    let name = definition.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        errors.push("name", format!("Name must be 1-{} characters", MAX_NAME_LEN));
    }
    if definition.questions.is_empty() {
        errors.push("questions", "A template needs at least one question");
    }

    let mut seen = HashSet::new();
    for q in &definition.questions {
        let field = format!("questions.{}", q.id);
        if q.id.is_empty()
            || q.id.len() > MAX_QUESTION_ID_LEN
            || !q
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            errors.push(
                field.clone(),
                "Question ids may only contain lowercase letters, digits and underscores",
            );
        }
        if !seen.insert(q.id.as_str()) {
            errors.push(field.clone(), "Question ids must be unique");
        }
        if q.prompt.trim().is_empty() || q.prompt.chars().count() > MAX_PROMPT_LEN {
            errors.push(
                field.clone(),
                format!("Prompt must be 1-{} characters", MAX_PROMPT_LEN),
            );
        }
        match q.kind {
            QuestionType::MultiSelect => {
                if q.options.iter().all(|o| o.trim().is_empty()) {
                    errors.push(field, "Multi-select questions need at least one option");
                }
            }
            _ if !q.options.is_empty() => {
                errors.push(field, "Only multi-select questions take options");
            }
            _ => {}
        }
    }

    errors.into_result()
}
