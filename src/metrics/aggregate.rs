//! Turns classified tickets into the flat count rows written to the report
//! workbooks.

use crate::errors::Result;
use crate::metrics::labels::{is_technical_label, SECURITY_LABELS};
use crate::models::format_datetime;
use crate::models::sprint::{Sprint, SprintStatus};
use crate::models::ticket::{ClassifiedTicket, ProductLabel, RawTicket, TechLabel, TicketType};
use crate::report::ReportRow;
use crate::squads::{ProjectIdentifier, Squad};
use crate::store::Store;

const CATEGORY_KEYS: [&str; 7] = [
    "tech_tickets",
    "security_tickets",
    "devops_tickets",
    "misc_technical_tickets",
    "product_tickets",
    "bau_product",
    "project",
];

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}_{}", prefix, key),
        None => key.to_string(),
    }
}

/// Counts tickets per project and per label category. Every known project
/// and category starts at zero; a ticket in two projects bumps both.
pub fn category_counts(project_names: &[String], tickets: &[ClassifiedTicket], prefix: Option<&str>) -> ReportRow {
    let mut row = ReportRow::new();
    for name in project_names {
        row.seed(prefixed(prefix, name));
    }
    for key in CATEGORY_KEYS {
        row.seed(prefixed(prefix, key));
    }

    for ticket in tickets {
        if !ticket.tech_labels.is_empty() {
            row.bump(prefixed(prefix, "tech_tickets"));
            for (label, key) in [
                (TechLabel::Security, "security_tickets"),
                (TechLabel::Devops, "devops_tickets"),
                (TechLabel::MiscTech, "misc_technical_tickets"),
            ] {
                if ticket.tech_labels.contains(&label) {
                    row.bump(prefixed(prefix, key));
                }
            }
        }

        if !ticket.product_labels.is_empty() {
            row.bump(prefixed(prefix, "product_tickets"));
            if ticket.product_labels.contains(&ProductLabel::BauProduct) {
                row.bump(prefixed(prefix, "bau_product"));
            }
            if ticket.product_labels.contains(&ProductLabel::Project) {
                row.bump(prefixed(prefix, "project"));
            }
        }

        for project in &ticket.project_labels {
            row.bump(prefixed(prefix, project));
        }
    }

    row
}

fn optional_datetime(value: Option<&chrono::NaiveDateTime>) -> Option<String> {
    value.map(format_datetime)
}

/// One row per closed sprint of the squad, in sprint order.
pub fn sprint_report(store: &Store, squad: Squad, project_names: &[String]) -> Result<Vec<ReportRow>> {
    let mut rows = Vec::new();
    for sprint in store.sprints(squad, SprintStatus::Closed)? {
        rows.push(sprint_row(store, &sprint, project_names)?);
    }
    Ok(rows)
}

fn sprint_row(store: &Store, sprint: &Sprint, project_names: &[String]) -> Result<ReportRow> {
    let mut row = ReportRow::new();
    row.set("name", sprint.name.as_str());
    row.set("goal", sprint.goal.clone());
    row.set("start_date", optional_datetime(sprint.start_date.as_ref()));
    row.set("end_date", optional_datetime(sprint.end_date.as_ref()));
    row.set("ticket_total", store.count_sprint_tickets(sprint.id, None)?);
    row.set("ticket_carry_over_count", sprint.tickets_carried_over);
    for ticket_type in TicketType::ALL {
        row.set(
            format!("{}_count", ticket_type.as_str()),
            store.count_sprint_tickets(sprint.id, Some(ticket_type))?,
        );
    }
    row.set("defect_count", sprint.defect_total);

    let tickets = store.sprint_tickets(sprint.id)?;
    row.extend(category_counts(project_names, &tickets, None));
    Ok(row)
}

/// Single backlog summary row. Totals come from store counts, category
/// counts from the refined and unrefined ticket sets.
pub fn backlog_report(store: &Store, squad: Squad, project_names: &[String]) -> Result<ReportRow> {
    let mut row = ReportRow::new();
    row.set("squad", squad.id());
    row.set("ticket_total", store.backlog_tickets(squad, None)?.len());

    for (refined, prefix) in [(true, "refined"), (false, "unrefined")] {
        row.set(
            format!("{}_ticket_total", prefix),
            store.count_backlog(squad, refined, None)?,
        );
        for ticket_type in TicketType::ALL {
            row.set(
                format!("{}_{}_count", prefix, ticket_type.as_str()),
                store.count_backlog(squad, refined, Some(ticket_type))?,
            );
        }
    }

    for (refined, prefix) in [(true, "refined"), (false, "unrefined")] {
        let tickets = store.backlog_tickets(squad, Some(refined))?;
        row.extend(category_counts(project_names, &tickets, Some(prefix)));
    }

    Ok(row)
}

fn percent(count: u64, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round_ties_even() / 10.0
}

/// Share of project, BAU and technical work across a set of raw tickets,
/// matched straight from labels and components rather than classification.
pub fn project_share(tickets: &[RawTicket], identifiers: &[ProjectIdentifier]) -> Result<ReportRow> {
    let mut row = ReportRow::new();
    for key in [
        "technical_ticket_total_count",
        "project_ticket_total_count",
        "bau_ticket_total_count",
        "devops_ticket_total_count",
        "security_ticket_total_count",
        "misc_technical_ticket_total_count",
    ] {
        row.seed(key);
    }
    for identifier in identifiers {
        row.seed(format!("{} ticket_total_count", identifier.name));
    }

    for ticket in tickets {
        let technical: Vec<String> = ticket
            .fields
            .labels
            .iter()
            .map(|label| label.to_lowercase())
            .filter(|label| is_technical_label(label))
            .collect();

        if !technical.is_empty() {
            row.bump("technical_ticket_total_count");
            if technical.iter().any(|l| SECURITY_LABELS.contains(&l.as_str())) {
                row.bump("security_ticket_total_count");
            }
            if technical.iter().any(|l| l == "devops") {
                row.bump("devops_ticket_total_count");
            }
            if technical
                .iter()
                .any(|l| l != "devops" && !SECURITY_LABELS.contains(&l.as_str()))
            {
                row.bump("misc_technical_ticket_total_count");
            }
        }

        let mut in_project = false;
        for identifier in identifiers {
            if identifier.rule.matches(&identifier.name, ticket)? {
                in_project = true;
                row.bump("project_ticket_total_count");
                row.bump(format!("{} ticket_total_count", identifier.name));
            }
        }

        if !in_project && technical.is_empty() {
            row.bump("bau_ticket_total_count");
        }
    }

    let total = tickets.len();
    row.set("percent_product_project", percent(row.count("project_ticket_total_count"), total));
    row.set("percent_product_bau", percent(row.count("bau_ticket_total_count"), total));
    row.set("percent_technical", percent(row.count("technical_ticket_total_count"), total));
    for identifier in identifiers {
        let count = row.count(&format!("{} ticket_total_count", identifier.name));
        row.set(format!("percent {}", identifier.name), percent(count, total));
    }

    Ok(row)
}
