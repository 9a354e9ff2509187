//! Question display conditions.
//!
//! A condition is stored as a short string such as `before_noon` or
//! `hours_since_last_entry >= 48 && exercise_not_logged_today` and evaluated
//! against a [`Context`]. Terms that are not recognized are kept verbatim and
//! evaluate to `true`, so an unknown condition never hides a question.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::services::context::Context;

const HOURS_SINCE_LAST_ENTRY: &str = "hours_since_last_entry";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DisplayCondition {
    BeforeNoon,
    AfterNoon,
    ExerciseNotLoggedToday,
    ExercisedToday,
    GoalsNotSetToday,
    GoalsSetToday,
    HoursSinceLastEntryAtLeast(u32),
    All(Vec<DisplayCondition>),
    Unrecognized(String),
}

impl DisplayCondition {
    pub fn parse(raw: &str) -> Self {
        let terms: Vec<&str> = raw
            .split("&&")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        match terms.as_slice() {
            [] => DisplayCondition::Unrecognized(raw.trim().to_string()),
            [single] => Self::parse_term(single),
            many => DisplayCondition::All(many.iter().map(|t| Self::parse_term(t)).collect()),
        }
    }

    fn parse_term(term: &str) -> Self {
        match term {
            "before_noon" => DisplayCondition::BeforeNoon,
            "after_noon" => DisplayCondition::AfterNoon,
            "exercise_not_logged_today" => DisplayCondition::ExerciseNotLoggedToday,
            "exercised_today" => DisplayCondition::ExercisedToday,
            "goals_not_set_today" => DisplayCondition::GoalsNotSetToday,
            "goals_set_today" => DisplayCondition::GoalsSetToday,
            other => other
                .strip_prefix(HOURS_SINCE_LAST_ENTRY)
                .and_then(|rest| rest.trim_start().strip_prefix(">="))
                .and_then(|n| n.trim().parse().ok())
                .map(DisplayCondition::HoursSinceLastEntryAtLeast)
                .unwrap_or_else(|| DisplayCondition::Unrecognized(other.to_string())),
        }
    }

    pub fn evaluate(&self, ctx: &Context) -> bool {
        match self {
            DisplayCondition::BeforeNoon => ctx.is_before_noon,
            DisplayCondition::AfterNoon => !ctx.is_before_noon,
            DisplayCondition::ExerciseNotLoggedToday => !ctx.exercised_today,
            DisplayCondition::ExercisedToday => ctx.exercised_today,
            DisplayCondition::GoalsNotSetToday => !ctx.goals_set_today,
            DisplayCondition::GoalsSetToday => ctx.goals_set_today,
            DisplayCondition::HoursSinceLastEntryAtLeast(hours) => ctx
                .hours_since_last_entry
                .map_or(false, |h| h >= f64::from(*hours)),
            DisplayCondition::All(terms) => terms.iter().all(|t| t.evaluate(ctx)),
            DisplayCondition::Unrecognized(_) => true,
        }
    }

    pub fn is_recognized(&self) -> bool {
        match self {
            DisplayCondition::Unrecognized(_) => false,
            DisplayCondition::All(terms) => terms.iter().all(Self::is_recognized),
            _ => true,
        }
    }
}

impl fmt::Display for DisplayCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayCondition::BeforeNoon => f.write_str("before_noon"),
            DisplayCondition::AfterNoon => f.write_str("after_noon"),
            DisplayCondition::ExerciseNotLoggedToday => f.write_str("exercise_not_logged_today"),
            DisplayCondition::ExercisedToday => f.write_str("exercised_today"),
            DisplayCondition::GoalsNotSetToday => f.write_str("goals_not_set_today"),
            DisplayCondition::GoalsSetToday => f.write_str("goals_set_today"),
            DisplayCondition::HoursSinceLastEntryAtLeast(hours) => {
                write!(f, "{} >= {}", HOURS_SINCE_LAST_ENTRY, hours)
            }
            DisplayCondition::All(terms) => {
                let joined = terms
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" && ");
                f.write_str(&joined)
            }
            DisplayCondition::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for DisplayCondition {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<DisplayCondition> for String {
    fn from(condition: DisplayCondition) -> Self {
        condition.to_string()
    }
}
