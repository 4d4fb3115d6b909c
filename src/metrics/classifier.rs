use log::{error, warn};

use super::labels;
use crate::config::settings::FieldsConfig;
use crate::errors::Result;
use crate::models::parse_jira_datetime;
use crate::models::sprint::Sprint;
use crate::models::ticket::{ClassifiedTicket, RawTicket, TicketType};
use crate::squads::{match_projects, ProjectDefinition, Squad};

/// Infers the reporting type of a ticket. An "investig..." summary wins over
/// whatever Jira says the issue type is.
pub fn infer_ticket_type(ticket: &RawTicket) -> Option<TicketType> {
    if ticket.fields.summary.to_lowercase().contains("investig") {
        return Some(TicketType::Investigation);
    }

    match ticket.type_name().as_str() {
        "story" => Some(TicketType::UserStory),
        "bug" => Some(TicketType::Bug),
        _ => None,
    }
}

/// Classifies raw tickets for one squad.
pub struct Classifier<'a> {
    squad: Squad,
    projects: &'a [ProjectDefinition],
    fields: &'a FieldsConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(squad: Squad, projects: &'a [ProjectDefinition], fields: &'a FieldsConfig) -> Self {
        Self {
            squad,
            projects,
            fields,
        }
    }

    pub fn squad(&self) -> Squad {
        self.squad
    }

    /// Returns `Ok(None)` for tickets whose type we do not report on; the
    /// caller skips them. Errors are fatal for the squad.
    pub fn classify(
        &self,
        raw: &RawTicket,
        sprint: Option<&Sprint>,
        from_backlog: bool,
    ) -> Result<Option<ClassifiedTicket>> {
        let ticket_type = match infer_ticket_type(raw) {
            Some(ticket_type) => ticket_type,
            None => {
                error!(
                    "ALERT: unexpected ticket type '{}' on {} (squad {}, from_backlog: {}), skipping",
                    raw.type_name(),
                    raw.key,
                    self.squad,
                    from_backlog
                );
                return Ok(None);
            }
        };

        let tech_labels = labels::tech_labels(&raw.fields.labels);
        let project_labels = match_projects(self.projects, raw)?;
        let product_labels = labels::product_labels(&tech_labels, &project_labels);

        let (sprint_completed, sprint_id) = match sprint {
            Some(sprint) => (sprint.end_date, Some(sprint.id)),
            None => (None, None),
        };

        let (refined, specific_completed) = if from_backlog {
            let is_refined = self.squad.refinement_policy();
            (is_refined(raw)?, None)
        } else {
            let resolved = match raw.fields.resolutiondate.as_deref() {
                Some(value) => Some(parse_jira_datetime(&raw.key, value)?),
                None => {
                    warn!(
                        "{} has no resolution date but came from a completed sprint; carried over tickets should already be filtered",
                        raw.key
                    );
                    None
                }
            };
            (true, resolved)
        };

        Ok(Some(ClassifiedTicket {
            squad: self.squad,
            jira_id: raw.id.clone(),
            jira_ref: raw.key.clone(),
            ticket_type,
            created: parse_jira_datetime(&raw.key, &raw.fields.created)?,
            story_points: raw.story_points(&self.fields.story_points),
            specific_completed,
            sprint_completed,
            sprint_id,
            tech_labels,
            product_labels,
            project_labels,
            refined,
            backlog: from_backlog,
        }))
    }
}
