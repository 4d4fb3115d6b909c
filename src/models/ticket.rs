use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::squads::Squad;

/// An issue as returned by the Jira agile and search APIs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTicket {
    pub id: String,
    pub key: String,
    pub fields: TicketFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketFields {
    pub summary: String,
    pub issuetype: IssueType,
    pub created: String,
    #[serde(default)]
    pub resolutiondate: Option<String>,
    #[serde(default)]
    pub statuscategorychangedate: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub components: Vec<Component>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subtasks: Vec<Subtask>,
    /// Sprint history as exposed on backlog issues. Jira sends either a
    /// single sprint object or a list depending on the endpoint.
    #[serde(default)]
    pub sprint: Option<Value>,
    /// Custom fields (`customfield_*`) and anything else we do not model.
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssueType {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Component {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subtask {
    pub key: String,
    pub fields: SubtaskFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubtaskFields {
    pub issuetype: IssueType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SprintRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawTicket {
    pub fn type_name(&self) -> String {
        self.fields.issuetype.name.to_lowercase()
    }

    pub fn status_name(&self) -> Option<&str> {
        self.fields.status.as_ref().map(|s| s.name.as_str())
    }

    pub fn component_names(&self) -> Vec<String> {
        self.fields
            .components
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect()
    }

    pub fn custom_field(&self, field: &str) -> Option<&Value> {
        self.fields.custom.get(field).filter(|v| !v.is_null())
    }

    /// Sprints listed in a custom sprint field. Entries that do not look like
    /// sprints are skipped.
    pub fn sprints_in(&self, field: &str) -> Vec<SprintRef> {
        match self.custom_field(field) {
            Some(value) => sprint_refs(value),
            None => Vec::new(),
        }
    }

    /// Sprints from the plain `sprint` field, used by refinement policies.
    pub fn sprint_history(&self) -> Vec<SprintRef> {
        match &self.fields.sprint {
            Some(value) => sprint_refs(value),
            None => Vec::new(),
        }
    }

    pub fn story_points(&self, field: &str) -> Option<i64> {
        self.custom_field(field)
            .and_then(|v| v.as_f64())
            .map(|points| points.round() as i64)
    }
}

fn sprint_refs(value: &Value) -> Vec<SprintRef> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        Value::Object(_) => serde_json::from_value(value.clone()).into_iter().collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    UserStory,
    Bug,
    Investigation,
}

impl TicketType {
    pub const ALL: [TicketType; 3] = [
        TicketType::UserStory,
        TicketType::Investigation,
        TicketType::Bug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::UserStory => "user_story",
            TicketType::Bug => "bug",
            TicketType::Investigation => "investigation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user_story" => Some(TicketType::UserStory),
            "bug" => Some(TicketType::Bug),
            "investigation" => Some(TicketType::Investigation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechLabel {
    Security,
    Devops,
    MiscTech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductLabel {
    Project,
    BauProduct,
}

/// A ticket after classification, as persisted in the `ticket` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTicket {
    pub squad: Squad,
    pub jira_id: String,
    pub jira_ref: String,
    pub ticket_type: TicketType,
    pub created: NaiveDateTime,
    pub story_points: Option<i64>,
    pub specific_completed: Option<NaiveDateTime>,
    pub sprint_completed: Option<NaiveDateTime>,
    pub sprint_id: Option<i64>,
    pub tech_labels: Vec<TechLabel>,
    pub product_labels: Vec<ProductLabel>,
    pub project_labels: Vec<String>,
    pub refined: bool,
    pub backlog: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_labels_serialize_as_stored_names() {
        let tech = serde_json::to_string(&[TechLabel::Security, TechLabel::Devops, TechLabel::MiscTech]).unwrap();
        assert_eq!(tech, r#"["security","devops","misc_tech"]"#);

        let product = serde_json::to_string(&[ProductLabel::Project, ProductLabel::BauProduct]).unwrap();
        assert_eq!(product, r#"["project","bau_product"]"#);
    }

    #[test]
    fn test_deserialize_issue_with_nulls() {
        let ticket: RawTicket = serde_json::from_value(json!({
            "id": "10001",
            "key": "BNK-1",
            "fields": {
                "summary": "Add payee",
                "issuetype": {"name": "Story"},
                "created": "2021-08-10T09:00:00.000+0100",
                "resolutiondate": null,
                "labels": null,
                "components": null,
                "customfield_10117": 3.0
            }
        }))
        .unwrap();

        assert_eq!(ticket.type_name(), "story");
        assert!(ticket.fields.labels.is_empty());
        assert!(ticket.fields.components.is_empty());
        assert_eq!(ticket.story_points("customfield_10117"), Some(3));
        assert_eq!(ticket.story_points("customfield_99999"), None);
    }

    #[test]
    fn test_sprint_history_accepts_object_or_list() {
        let single: RawTicket = serde_json::from_value(json!({
            "id": "1", "key": "BPL-1",
            "fields": {
                "summary": "s", "issuetype": {"name": "Bug"}, "created": "2022-01-01T00:00:00Z",
                "sprint": {"id": 4, "name": "BPL Sprint 4"}
            }
        }))
        .unwrap();
        assert_eq!(single.sprint_history().len(), 1);

        let many: RawTicket = serde_json::from_value(json!({
            "id": "2", "key": "BPL-2",
            "fields": {
                "summary": "s", "issuetype": {"name": "Bug"}, "created": "2022-01-01T00:00:00Z",
                "customfield_10115": [{"id": 3, "name": "a"}, {"id": 9, "name": "b"}]
            }
        }))
        .unwrap();
        let ids: Vec<i64> = many.sprints_in("customfield_10115").iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 9]);
        assert!(many.sprint_history().is_empty());
    }
}
