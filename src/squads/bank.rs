use chrono::NaiveDate;
use serde_json::Value;

use super::{MatchRule, ProjectDefinition, ProjectIdentifier, Squad};
use crate::errors::{MetricsError, Result};
use crate::models::ticket::RawTicket;

pub const IS_REFINED_FIELD: &str = "customfield_10350";

/// Bank marks refinement with a multi-select field, so the value arrives as a
/// list of options.
pub fn is_ticket_refined(ticket: &RawTicket) -> Result<bool> {
    let options = match ticket.custom_field(IS_REFINED_FIELD) {
        None => return Ok(false),
        Some(Value::Array(options)) => options,
        Some(_) => {
            return Err(MetricsError::RefinementFieldMalformed {
                squad: Squad::Bank.name().to_string(),
                ticket: ticket.key.clone(),
                field: IS_REFINED_FIELD.to_string(),
            })
        }
    };

    Ok(options.iter().any(|option| {
        option
            .get("value")
            .and_then(Value::as_str)
            .is_some_and(|value| value.eq_ignore_ascii_case("yes"))
    }))
}

pub fn projects() -> Vec<ProjectDefinition> {
    let kickoff = NaiveDate::from_ymd_opt(2021, 8, 9).unwrap_or_default();
    vec![
        ProjectDefinition {
            name: "API 2.0 Banking Release".to_string(),
            start_date: kickoff,
            initial_estimate: 200,
            rule: MatchRule::component("API v2.0 Banking release"),
        },
        ProjectDefinition {
            name: "API 2.0 Consumer Release".to_string(),
            start_date: kickoff,
            initial_estimate: 150,
            rule: MatchRule::component("API v2.0 Consumer release"),
        },
    ]
}

pub fn identifiers() -> Vec<ProjectIdentifier> {
    let start_sprint = NaiveDate::from_ymd_opt(2001, 1, 20).unwrap_or_default();
    vec![
        ProjectIdentifier {
            name: "API 2.0 Banking Release".to_string(),
            rule: MatchRule::component("API v2.0 Banking Release"),
            start_sprint,
            project_capacity: 0.3,
        },
        ProjectIdentifier {
            name: "Data Warehouse".to_string(),
            rule: MatchRule::component("Data Warehouse"),
            start_sprint,
            project_capacity: 0.3,
        },
    ]
}
