//! Squads, their project definitions and their refinement policies.
//!
//! Each squad lives in its own module and owns its refinement rule outright.
//! The rules look alike today but follow each squad's Jira conventions, so
//! they are kept apart.

pub mod bank;
pub mod bpl;
pub mod merchant;
pub mod mobile;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::settings::ProjectConfig;
use crate::errors::{MetricsError, Result};
use crate::models::ticket::RawTicket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Squad {
    Bank,
    Bpl,
    Merchant,
    Mobile,
}

impl Squad {
    pub const ALL: [Squad; 4] = [Squad::Bank, Squad::Bpl, Squad::Merchant, Squad::Mobile];

    /// The Jira board id, which doubles as the squad id.
    pub fn id(&self) -> i64 {
        match self {
            Squad::Bank => 126,
            Squad::Bpl => 168,
            Squad::Merchant => 172,
            Squad::Mobile => 201,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Squad::ALL.into_iter().find(|squad| squad.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Squad::Bank => "Bank",
            Squad::Bpl => "BPL",
            Squad::Merchant => "Merchant",
            Squad::Mobile => "Mobile",
        }
    }

    pub fn workbook_name(&self) -> &'static str {
        match self {
            Squad::Bank => "bank.xlsx",
            Squad::Bpl => "bpl.xlsx",
            Squad::Merchant => "merchant.xlsx",
            Squad::Mobile => "mobile.xlsx",
        }
    }

    pub fn refinement_policy(&self) -> RefinementPolicy {
        match self {
            Squad::Bank => bank::is_ticket_refined,
            Squad::Bpl => bpl::is_ticket_refined,
            Squad::Merchant => merchant::is_ticket_refined,
            Squad::Mobile => mobile::is_ticket_refined,
        }
    }
}

impl TryFrom<i64> for Squad {
    type Error = String;

    fn try_from(id: i64) -> std::result::Result<Self, Self::Error> {
        Squad::from_id(id).ok_or_else(|| format!("unknown squad id {}", id))
    }
}

impl From<Squad> for i64 {
    fn from(squad: Squad) -> Self {
        squad.id()
    }
}

impl std::fmt::Display for Squad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

/// Decides whether a backlog ticket is ready to be worked on.
pub type RefinementPolicy = fn(&RawTicket) -> Result<bool>;

/// How a ticket is tested for membership of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    pub field: String,
    pub value: String,
}

/// Ticket fields a project rule can match on.
const MATCH_FIELDS: &[&str] = &["components"];

impl MatchRule {
    pub fn component(value: &str) -> Self {
        Self {
            field: "components".to_string(),
            value: value.to_string(),
        }
    }

    /// Rejects a rule whose field we do not know how to read.
    pub fn check(&self, project: &str) -> Result<()> {
        if MATCH_FIELDS.contains(&self.field.as_str()) {
            Ok(())
        } else {
            Err(MetricsError::UnknownMatchField {
                project: project.to_string(),
                field: self.field.clone(),
            })
        }
    }

    /// Fails on fields we do not know how to read rather than reporting
    /// "no match".
    pub fn matches(&self, project: &str, ticket: &RawTicket) -> Result<bool> {
        match self.field.as_str() {
            "components" => Ok(ticket
                .component_names()
                .contains(&self.value.to_lowercase())),
            other => Err(MetricsError::UnknownMatchField {
                project: project.to_string(),
                field: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDefinition {
    pub name: String,
    pub start_date: NaiveDate,
    pub initial_estimate: u32,
    pub rule: MatchRule,
}

/// Legacy per-squad project identifiers used by the project-share report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectIdentifier {
    pub name: String,
    pub rule: MatchRule,
    pub start_sprint: NaiveDate,
    pub project_capacity: f64,
}

/// Read-only squad configuration, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    projects: HashMap<Squad, Vec<ProjectDefinition>>,
    identifiers: HashMap<Squad, Vec<ProjectIdentifier>>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let mut catalog = Catalog::default();
        for squad in Squad::ALL {
            let (projects, identifiers) = match squad {
                Squad::Bank => (bank::projects(), bank::identifiers()),
                Squad::Bpl => (Vec::new(), Vec::new()),
                Squad::Merchant => (Vec::new(), Vec::new()),
                Squad::Mobile => (Vec::new(), Vec::new()),
            };
            catalog.projects.insert(squad, projects);
            catalog.identifiers.insert(squad, identifiers);
        }
        catalog
    }

    /// Built-in tables plus any `[[projects]]` from the config file.
    pub fn load(extra: &[ProjectConfig]) -> Result<Self> {
        let mut catalog = Self::builtin();
        for project in extra {
            let squad = Squad::from_id(project.squad).ok_or_else(|| {
                MetricsError::ConfigInvalid(format!(
                    "project '{}' references unknown squad {}",
                    project.name, project.squad
                ))
            })?;
            let definitions = catalog.projects.entry(squad).or_default();
            if definitions.iter().any(|d| d.name == project.name) {
                return Err(MetricsError::ConfigInvalid(format!(
                    "project '{}' is defined twice for {}",
                    project.name, squad
                )));
            }
            let rule = MatchRule {
                field: project.match_field.clone(),
                value: project.match_value.clone(),
            };
            rule.check(&project.name)?;
            definitions.push(ProjectDefinition {
                name: project.name.clone(),
                start_date: project.start_date,
                initial_estimate: project.initial_estimate,
                rule,
            });
        }
        Ok(catalog)
    }

    pub fn projects(&self, squad: Squad) -> &[ProjectDefinition] {
        self.projects.get(&squad).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn identifiers(&self, squad: Squad) -> &[ProjectIdentifier] {
        self.identifiers.get(&squad).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Names of every project the ticket belongs to, in definition order.
pub fn match_projects(projects: &[ProjectDefinition], ticket: &RawTicket) -> Result<Vec<String>> {
    let mut matched = Vec::new();
    for project in projects {
        if project.rule.matches(&project.name, ticket)? {
            matched.push(project.name.clone());
        }
    }
    Ok(matched)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::ticket::RawTicket;
    use serde_json::{json, Value};

    /// Builds a raw ticket from a handful of fields, merging `extra` into
    /// `fields`.
    pub fn ticket(key: &str, issue_type: &str, summary: &str, extra: Value) -> RawTicket {
        let mut fields = json!({
            "summary": summary,
            "issuetype": {"name": issue_type},
            "created": "2021-09-01T09:30:00.000+0100",
            "resolutiondate": "2021-09-10T17:00:00.000+0100",
            "status": {"name": "Done"},
            "labels": [],
            "components": [],
            "subtasks": []
        });
        if let (Some(base), Value::Object(more)) = (fields.as_object_mut(), extra) {
            base.extend(more);
        }
        serde_json::from_value(json!({
            "id": format!("id-{}", key),
            "key": key,
            "fields": fields
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::ticket;
    use super::*;
    use serde_json::json;

    fn project(name: &str, component: &str) -> ProjectDefinition {
        ProjectDefinition {
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(2021, 8, 9).unwrap(),
            initial_estimate: 100,
            rule: MatchRule::component(component),
        }
    }

    #[test]
    fn test_match_projects_is_case_insensitive_and_ordered() {
        let projects = vec![project("Alpha", "Payments API"), project("Beta", "Ledger")];
        let raw = ticket(
            "BNK-1",
            "Story",
            "Wire up payments",
            json!({"components": [{"name": "LEDGER"}, {"name": "payments api"}]}),
        );
        assert_eq!(match_projects(&projects, &raw).unwrap(), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_match_projects_none() {
        let projects = vec![project("Alpha", "Payments API")];
        let raw = ticket("BNK-2", "Story", "Unrelated", json!({}));
        assert!(match_projects(&projects, &raw).unwrap().is_empty());
        assert!(match_projects(&[], &raw).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_match_field_is_fatal() {
        let mut broken = project("Gamma", "x");
        broken.rule.field = "epic".to_string();
        let raw = ticket("BNK-3", "Story", "Anything", json!({}));
        let err = match_projects(&[broken], &raw).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownMatchField { ref field, .. } if field == "epic"));
    }

    #[test]
    fn test_squad_ids_roundtrip() {
        for squad in Squad::ALL {
            assert_eq!(Squad::from_id(squad.id()), Some(squad));
        }
        assert_eq!(Squad::from_id(1), None);
    }

    #[test]
    fn test_catalog_load_rejects_duplicates_and_unknown_squads() {
        let extra = ProjectConfig {
            squad: 168,
            name: "Loyalty Revamp".to_string(),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 10).unwrap(),
            initial_estimate: 80,
            match_field: "components".to_string(),
            match_value: "Loyalty".to_string(),
        };
        let catalog = Catalog::load(std::slice::from_ref(&extra)).unwrap();
        assert_eq!(catalog.projects(Squad::Bpl).len(), 1);
        assert_eq!(catalog.projects(Squad::Bank).len(), 2);

        let twice = vec![extra.clone(), extra.clone()];
        assert!(Catalog::load(&twice).is_err());

        let mut unknown = extra.clone();
        unknown.squad = 999;
        assert!(matches!(
            Catalog::load(&[unknown]),
            Err(MetricsError::ConfigInvalid(_))
        ));

        let mut epic = extra;
        epic.match_field = "epic".to_string();
        assert!(matches!(
            Catalog::load(&[epic]),
            Err(MetricsError::UnknownMatchField { ref project, ref field })
                if project == "Loyalty Revamp" && field == "epic"
        ));
    }
}
