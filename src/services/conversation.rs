//! Conversation about a single entry: the flattened entry (plus a few recent
//! ones) goes to Claude; when that is unavailable a deterministic reply is used.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::db::JournalStore;
use crate::error::{AppError, AppResult};
use crate::models::user::User;
use crate::services::answers::Answer;
use crate::services::compose::{compose, flatten, EntryView};
use crate::services::context::resolve_timezone;
use crate::services::templates::{EMOTIONS_QUESTION_ID, FEELING_QUESTION_ID};

const RECENT_ENTRIES: i64 = 5;
const MAX_MESSAGE_LEN: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Claude,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationReply {
    pub entry_id: Uuid,
    pub reply: String,
    pub source: ReplySource,
}

pub async fn reply(
    store: &dyn JournalStore,
    config: &Config,
    user: &User,
    entry_id: Uuid,
    message: &str,
) -> AppResult<ConversationReply> {
    let message = message.trim();
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message must be 1-{} characters",
            MAX_MESSAGE_LEN
        )));
    }

    let record = store
        .find_entry(user.id, entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))?;
    let view = compose(&record);

    if !config.ai_enabled() {
        return Ok(fallback(&view, message));
    }

    let tz = resolve_timezone(&user.timezone).into_value();
    let recent: Vec<String> = store
        .list_entries(user.id, RECENT_ENTRIES + 1, 0)
        .await?
        .iter()
        .filter(|r| r.entry.id != entry_id)
        .take(RECENT_ENTRIES as usize)
        .map(|r| flatten(&compose(r), tz))
        .collect();
    let prompt = build_prompt(&flatten(&view, tz), &recent, message, Utc::now());

    match call_claude(config, &prompt).await {
        Ok(text) => Ok(ConversationReply {
            entry_id,
            reply: text,
            source: ReplySource::Claude,
        }),
        Err(e) => {
            tracing::warn!(error = %e, entry_id = %entry_id, "Claude API unavailable, using fallback reply");
            Ok(fallback(&view, message))
        }
    }
}

pub fn build_prompt(entry: &str, recent: &[String], message: &str, now: DateTime<Utc>) -> String {
    let history = if recent.is_empty() {
        "(no other recent entries)".to_string()
    } else {
        recent.join("\n\n")
    };
    format!(
        r#"You are a warm, thoughtful journaling companion. Today is {}.
Respond to the user's message about the journal entry below in 2-4 sentences.
Be supportive and specific, and end with one gentle reflective question.

The entry being discussed:
{}

Other recent entries, newest first:
{}

User's message:
{}"#,
        now.format("%Y-%m-%d"),
        entry,
        history,
        message
    )
}

async fn call_claude(config: &Config, prompt: &str) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.ai_timeout_secs))
        .build()?;

    let response = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &config.claude_api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&serde_json::json!({
            "model": config.claude_model,
            "max_tokens": 512,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Claude API error {}: {}", status, body);
    }

    let body: serde_json::Value = response.json().await?;
    let text = body["content"][0]["text"].as_str().unwrap_or("").trim();
    if text.is_empty() {
        anyhow::bail!("Claude API returned no text");
    }
    Ok(text.to_string())
}

fn fallback(view: &EntryView, message: &str) -> ConversationReply {
    tracing::debug!(entry_id = %view.id, "Using fallback conversation reply");
    ConversationReply {
        entry_id: view.id,
        reply: fallback_reply(view, message),
        source: ReplySource::Fallback,
    }
}

pub fn fallback_reply(view: &EntryView, message: &str) -> String {
    let feeling = view.response(FEELING_QUESTION_ID).and_then(|r| match r.answer {
        Answer::Scale(n) => Some(n),
        _ => None,
    });
    let emotions: Vec<String> = match view.response(EMOTIONS_QUESTION_ID).map(|r| &r.answer) {
        Some(Answer::MultiSelect(values)) => values.iter().map(|v| v.to_lowercase()).collect(),
        _ => Vec::new(),
    };

    let mut parts = Vec::new();
    parts.push(match feeling {
        Some(n) if n <= 4 => format!(
            "Thank you for sharing this. A {}/10 day is hard, and it matters that you wrote it down.",
            n
        ),
        Some(n) if n >= 7 => format!(
            "It's good to see you at {}/10 in this entry. Noticing what goes well is worth the effort.",
            n
        ),
        Some(n) => format!(
            "You rated this day {}/10. Middle days often hold more than they seem to.",
            n
        ),
        None => "Thank you for sharing this entry.".to_string(),
    });
    if !emotions.is_empty() {
        parts.push(format!("You mentioned feeling {}.", join_natural(&emotions)));
    }
    if message.ends_with('?') {
        parts.push("I can't give a detailed answer right now, but your entry is a good place to start looking.".into());
    }
    parts.push("What stands out to you most when you read it back?".into());

    parts.join(" ")
}

fn join_natural(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
