//! Estimate trackers: ad hoc JQL reports comparing dev story points with QA
//! ticket counts for a piece of work.

use colored::*;
use log::debug;

use crate::api::jira::JiraClient;
use crate::config::settings::EstimateTrackerConfig;
use crate::errors::{MetricsError, Result};
use crate::models::ticket::RawTicket;
use crate::models::{format_datetime, parse_jira_datetime};
use crate::report::workbook::WorkbookWriter;
use crate::report::ReportRow;
use crate::squads::Squad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Dev,
    Qa,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Dev => "dev",
            Team::Qa => "qa",
        }
    }
}

pub fn tracker_row(ticket: &RawTicket, team: Team, story_points_field: &str) -> Result<ReportRow> {
    let completed = match (ticket.status_name(), ticket.fields.statuscategorychangedate.as_deref()) {
        (Some("Done"), Some(changed)) => Some(parse_jira_datetime(&ticket.key, changed)?),
        _ => None,
    };
    let created = parse_jira_datetime(&ticket.key, &ticket.fields.created)?;

    let (dev_estimate, qa_estimate) = match team {
        Team::Dev => (ticket.story_points(story_points_field).unwrap_or(0), 0),
        Team::Qa => (0, 1),
    };

    let mut row = ReportRow::new();
    row.set("key", ticket.key.as_str());
    row.set("created_date", format_datetime(&created));
    row.set("completed_date", completed.as_ref().map(format_datetime));
    row.set("done", completed.is_some());
    row.set("team", team.as_str());
    row.set("dev_estimate_story_points", dev_estimate);
    row.set("qa_estimate_story_total", qa_estimate);
    Ok(row)
}

/// Runs every configured tracker and writes each to its own sheet.
pub async fn run_trackers(
    client: &JiraClient,
    trackers: &[EstimateTrackerConfig],
    writer: &mut WorkbookWriter,
) -> Result<()> {
    for tracker in trackers {
        let squad = Squad::from_id(tracker.squad).ok_or_else(|| {
            MetricsError::ConfigInvalid(format!(
                "estimate tracker '{}' references unknown squad {}",
                tracker.name, tracker.squad
            ))
        })?;

        println!("  {} {}...", "Tracking".dimmed(), tracker.name.bright_white());
        let mut rows = Vec::new();
        for (team, jql) in [(Team::Dev, &tracker.dev_jql), (Team::Qa, &tracker.qa_jql)] {
            let tickets = client.search(jql).await?;
            debug!("{}: {} {} tickets", tracker.name, tickets.len(), team.as_str());
            for ticket in &tickets {
                rows.push(tracker_row(ticket, team, &tracker.story_points_field)?);
            }
        }

        writer.write_sheet(squad, &tracker.name, &rows);
    }
    Ok(())
}
