use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::squads::Squad;

/// A sprint as listed by `/rest/agile/1.0/board/{board}/sprint`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSprint {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintStatus {
    Closed,
    Future,
    Active,
}

impl SprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintStatus::Closed => "closed",
            SprintStatus::Future => "future",
            SprintStatus::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "closed" => Some(SprintStatus::Closed),
            "future" => Some(SprintStatus::Future),
            "active" => Some(SprintStatus::Active),
            _ => None,
        }
    }
}

/// A sprint row in the store. `id` is the local row id that tickets point at,
/// `jira_id` the id Jira uses.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprint {
    pub id: i64,
    pub squad: Squad,
    pub jira_id: i64,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub status: SprintStatus,
    pub tickets_carried_over: Option<i64>,
    pub defect_total: Option<i64>,
}

/// A sprint fetched from Jira but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSprint {
    pub squad: Squad,
    pub jira_id: i64,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub status: SprintStatus,
}
