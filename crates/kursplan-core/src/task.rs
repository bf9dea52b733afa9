use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Recurrence rule of a task. Unrecognized values land on `Unknown`, which
/// expands to zero occurrences rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Unique,
    Weekly,
    Biweekly,
    Monthly,
    #[serde(other)]
    Unknown,
}

impl Frequency {
    /// Maps the raw data-file keyword. A blank value means one-off, anything
    /// unrecognized is kept as `Unknown`.
    #[must_use]
    pub fn from_keyword(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "unique" => Self::Unique,
            "weekly" => Self::Weekly,
            "biweekly" => Self::Biweekly,
            "monthly" => Self::Monthly,
            _ => Self::Unknown,
        }
    }

    /// Fixed step width in days, for the fixed-interval rules only.
    #[must_use]
    pub fn step_days(self) -> Option<i64> {
        match self {
            Self::Weekly => Some(7),
            Self::Biweekly => Some(14),
            _ => None,
        }
    }
}

/// One declarative task as consumed by the occurrence engine. Built by the
/// normalization in `datastore`; `course`, `name` and `start` are guaranteed
/// present and valid there.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDefinition {
    pub course: String,
    pub name: String,
    pub description: String,
    pub start: NaiveDate,
    pub frequency: Frequency,
    pub until: Option<NaiveDate>,
}
