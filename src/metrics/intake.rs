use log::debug;

use super::classifier::Classifier;
use crate::errors::Result;
use crate::models::sprint::Sprint;
use crate::models::ticket::{ClassifiedTicket, RawTicket};

/// Issue types that never count towards sprint metrics.
const EXCLUDED_SPRINT_TYPES: [&str; 3] = ["sub-task", "defect", "task"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    Counted,
    CarriedOver,
    Excluded,
}

/// Decides whether a ticket of a closed sprint counts towards that sprint.
///
/// A ticket that sat in several sprints belongs to the most recent one
/// (highest Jira sprint id); everywhere else it is a carry-over, as is any
/// ticket that is not done.
pub fn sprint_intake(ticket: &RawTicket, sprint_jira_id: i64, sprint_field: &str) -> Intake {
    if EXCLUDED_SPRINT_TYPES.contains(&ticket.type_name().as_str()) {
        return Intake::Excluded;
    }

    let sprints = ticket.sprints_in(sprint_field);
    if sprints.len() > 1 {
        let latest = sprints.iter().map(|s| s.id).max();
        if latest != Some(sprint_jira_id) {
            return Intake::CarriedOver;
        }
    }

    let done = ticket
        .status_name()
        .is_some_and(|status| status.eq_ignore_ascii_case("done"));
    if !done {
        return Intake::CarriedOver;
    }

    Intake::Counted
}

pub fn defect_count(ticket: &RawTicket) -> i64 {
    ticket
        .fields
        .subtasks
        .iter()
        .filter(|subtask| subtask.fields.issuetype.name.eq_ignore_ascii_case("defect"))
        .count() as i64
}

/// Everything a closed sprint contributes to the store.
#[derive(Debug, Clone, Default)]
pub struct SprintTickets {
    pub tickets: Vec<ClassifiedTicket>,
    pub carried_over: i64,
    pub defect_total: i64,
    /// Raw tickets behind `tickets`, kept for the project-share view.
    pub counted: Vec<RawTicket>,
}

pub fn collect_sprint_tickets(
    classifier: &Classifier<'_>,
    sprint: &Sprint,
    raw_tickets: &[RawTicket],
    sprint_field: &str,
) -> Result<SprintTickets> {
    let mut collected = SprintTickets::default();

    for raw in raw_tickets {
        match sprint_intake(raw, sprint.jira_id, sprint_field) {
            Intake::Excluded => continue,
            Intake::CarriedOver => {
                debug!("{} carried over from sprint {}", raw.key, sprint.name);
                collected.carried_over += 1;
                continue;
            }
            Intake::Counted => {}
        }

        collected.defect_total += defect_count(raw);
        if let Some(ticket) = classifier.classify(raw, Some(sprint), false)? {
            collected.tickets.push(ticket);
            collected.counted.push(raw.clone());
        }
    }

    Ok(collected)
}

/// Backlog tickets only lose their sub-tasks before classification.
pub fn collect_backlog_tickets(
    classifier: &Classifier<'_>,
    raw_tickets: &[RawTicket],
) -> Result<Vec<ClassifiedTicket>> {
    let mut tickets = Vec::new();
    for raw in raw_tickets {
        if raw.type_name() == "sub-task" {
            continue;
        }
        if let Some(ticket) = classifier.classify(raw, None, true)? {
            tickets.push(ticket);
        }
    }
    debug!(
        "{} backlog tickets classified for {}",
        tickets.len(),
        classifier.squad()
    );
    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::FieldsConfig;
    use crate::models::sprint::SprintStatus;
    use crate::squads::fixtures::ticket;
    use crate::squads::{Catalog, Squad};
    use serde_json::json;

    const SPRINT_FIELD: &str = "customfield_10115";

    fn sprint(id: i64, jira_id: i64) -> Sprint {
        Sprint {
            id,
            squad: Squad::Merchant,
            jira_id,
            name: format!("MER Sprint {}", jira_id),
            goal: Some("Ship it".to_string()),
            start_date: None,
            end_date: None,
            status: SprintStatus::Closed,
            tickets_carried_over: None,
            defect_total: None,
        }
    }

    fn in_sprints(key: &str, ids: &[i64], status: &str) -> RawTicket {
        let sprints: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "name": format!("MER Sprint {}", id)}))
            .collect();
        ticket(
            key,
            "Story",
            "Merchant onboarding",
            json!({SPRINT_FIELD: sprints, "status": {"name": status}}),
        )
    }

    #[test]
    fn test_multi_sprint_ticket_belongs_to_latest_sprint() {
        let raw = in_sprints("MER-1", &[5, 7], "Done");
        assert_eq!(sprint_intake(&raw, 5, SPRINT_FIELD), Intake::CarriedOver);
        assert_eq!(sprint_intake(&raw, 7, SPRINT_FIELD), Intake::Counted);
    }

    #[test]
    fn test_not_done_is_carried_over() {
        let raw = in_sprints("MER-2", &[7], "In Progress");
        assert_eq!(sprint_intake(&raw, 7, SPRINT_FIELD), Intake::CarriedOver);

        let done = in_sprints("MER-3", &[7], "DONE");
        assert_eq!(sprint_intake(&done, 7, SPRINT_FIELD), Intake::Counted);
    }

    #[test]
    fn test_subtasks_tasks_and_defects_are_excluded() {
        for issue_type in ["Sub-task", "Task", "DEFECT"] {
            let raw = ticket("MER-4", issue_type, "Plumbing", json!({"status": {"name": "To Do"}}));
            assert_eq!(sprint_intake(&raw, 7, SPRINT_FIELD), Intake::Excluded);
        }
    }

    #[test]
    fn test_collect_counts_carry_over_and_defects() {
        let catalog = Catalog::builtin();
        let fields = FieldsConfig::default();
        let classifier = Classifier::new(Squad::Merchant, catalog.projects(Squad::Merchant), &fields);

        let mut with_defects = in_sprints("MER-10", &[3], "Done");
        with_defects.fields.subtasks = serde_json::from_value(json!([
            {"key": "MER-11", "fields": {"issuetype": {"name": "Defect"}}},
            {"key": "MER-12", "fields": {"issuetype": {"name": "Sub-task"}}},
            {"key": "MER-13", "fields": {"issuetype": {"name": "defect"}}}
        ]))
        .unwrap();

        let raw = vec![
            with_defects,
            in_sprints("MER-20", &[3, 9], "Done"),
            in_sprints("MER-21", &[3], "In Review"),
            ticket("MER-22", "Task", "Rotate keys", json!({})),
            ticket("MER-23", "Epic", "Payments", json!({SPRINT_FIELD: [{"id": 3, "name": "x"}]})),
        ];

        let collected = collect_sprint_tickets(&classifier, &sprint(1, 3), &raw, SPRINT_FIELD).unwrap();
        assert_eq!(collected.carried_over, 2);
        assert_eq!(collected.defect_total, 2);
        let keys: Vec<&str> = collected.tickets.iter().map(|t| t.jira_ref.as_str()).collect();
        assert_eq!(keys, vec!["MER-10"]);
        assert_eq!(collected.counted.len(), 1);
        assert!(collected.tickets.iter().all(|t| t.sprint_id == Some(1)));
    }

    #[test]
    fn test_collect_backlog_skips_subtasks() {
        let catalog = Catalog::builtin();
        let fields = FieldsConfig::default();
        let classifier = Classifier::new(Squad::Mobile, catalog.projects(Squad::Mobile), &fields);
        let raw = vec![
            ticket("MOB-1", "Sub-task", "Write tests", json!({})),
            ticket("MOB-2", "Bug", "Crash on launch", json!({})),
        ];

        let tickets = collect_backlog_tickets(&classifier, &raw).unwrap();
        assert_eq!(tickets.len(), 1);
        assert!(tickets[0].backlog);
    }
}
