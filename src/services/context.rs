//! Per-request facts used to decide which questions are shown.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::JournalStore;
use crate::error::AppResult;
use crate::models::user::User;
use crate::services::fallback::{Fallback, FallbackReason};
use crate::services::templates::GOALS_QUESTION_ID;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Context {
    /// `None` when the user has no entries yet.
    pub hours_since_last_entry: Option<f64>,
    pub exercised_today: bool,
    pub goals_set_today: bool,
    pub is_before_noon: bool,
}

/// Stored facts about a user's day, as read from the journal store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFacts {
    pub last_entry_at: Option<DateTime<Utc>>,
    /// The exercise log for today, if one exists.
    pub exercise_logged: Option<bool>,
    pub goals_answered: bool,
}

impl Context {
    pub fn from_facts(facts: ContextFacts, now: DateTime<Utc>, tz: Tz) -> Self {
        let hours_since_last_entry = facts
            .last_entry_at
            .map(|last| ((now - last).num_seconds().max(0)) as f64 / 3600.0);

        Self {
            hours_since_last_entry,
            // An explicit "no" counts the same as no log, so the question is asked again.
            exercised_today: facts.exercise_logged == Some(true),
            goals_set_today: facts.goals_answered,
            is_before_noon: is_before_noon(now, tz),
        }
    }
}

pub fn is_before_noon(now: DateTime<Utc>, tz: Tz) -> bool {
    now.with_timezone(&tz).hour() < 12
}

/// Parse an IANA timezone name, substituting UTC when it is empty or unknown.
pub fn resolve_timezone(name: &str) -> Fallback<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return Fallback::defaulted(Tz::UTC, FallbackReason::Missing);
    }
    match name.parse::<Tz>() {
        Ok(tz) => Fallback::Exact(tz),
        Err(_) => Fallback::defaulted(Tz::UTC, FallbackReason::Malformed),
    }
}

/// A calendar day in the user's timezone, expressed as the UTC range `[start_utc, end_utc)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalDay {
    pub tz: Tz,
    pub date: NaiveDate,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl LocalDay {
    pub fn containing(now: DateTime<Utc>, tz: Tz) -> Self {
        let date = now.with_timezone(&tz).date_naive();
        let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
        Self {
            tz,
            date,
            start_utc: local_midnight_utc(tz, date),
            end_utc: local_midnight_utc(tz, next),
        }
    }

    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        let tz = resolve_timezone(&user.timezone);
        if let Some(reason) = tz.reason() {
            tracing::debug!(
                user_id = %user.id,
                timezone = %user.timezone,
                ?reason,
                "Unknown timezone, using UTC"
            );
        }
        Self::containing(now, tz.into_value())
    }
}

fn local_midnight_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump; the day starts at the first valid hour.
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

pub async fn build(store: &dyn JournalStore, user: &User, now: DateTime<Utc>) -> AppResult<Context> {
    let day = LocalDay::for_user(user, now);

    let facts = ContextFacts {
        last_entry_at: store.latest_entry_at(user.id).await?,
        exercise_logged: store.exercise_status(user.id, day.date).await?,
        goals_answered: store
            .has_answer_between(user.id, GOALS_QUESTION_ID, day.start_utc, day.end_utc)
            .await?,
    };

    Ok(Context::from_facts(facts, now, day.tz))
}
