use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Store;
use crate::errors::Result;
use crate::models::format_datetime;
use crate::models::ticket::{ClassifiedTicket, TicketType};
use crate::squads::Squad;

const TICKET_COLUMNS: &str = "squad_id, jira_id, jira_ref, ticket_type, ticket_created_date, story_points,
    ticket_specific_completed_date, ticket_sprint_completed_date, sprint_id, tech_labels,
    product_labels, project_labels, refined, backlog";

/// Refined and backlog flags are stored as the strings existing reports
/// already filter on.
pub(crate) fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn labels_json<T: Serialize>(labels: &[T]) -> Result<Option<String>> {
    if labels.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(labels)?))
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn labels_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e)),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
            .map(Some)
            .map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

pub(crate) fn squad_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Squad> {
    let id: i64 = row.get(idx)?;
    Squad::from_id(id).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, id))
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<ClassifiedTicket> {
    let ticket_type: String = row.get(3)?;
    let ticket_type = TicketType::parse(&ticket_type)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(3, ticket_type.clone(), Type::Text))?;
    let created = datetime_column(row, 4)?
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, "ticket_created_date".to_string(), Type::Null))?;

    Ok(ClassifiedTicket {
        squad: squad_column(row, 0)?,
        jira_id: row.get(1)?,
        jira_ref: row.get(2)?,
        ticket_type,
        created,
        story_points: row.get(5)?,
        specific_completed: datetime_column(row, 6)?,
        sprint_completed: datetime_column(row, 7)?,
        sprint_id: row.get(8)?,
        tech_labels: labels_column(row, 9)?,
        product_labels: labels_column(row, 10)?,
        project_labels: labels_column(row, 11)?,
        refined: row.get::<_, String>(12)? == "True",
        backlog: row.get::<_, String>(13)? == "True",
    })
}

pub(crate) fn insert_tickets(conn: &Connection, tickets: &[ClassifiedTicket]) -> Result<()> {
    let sql = format!(
        "INSERT INTO ticket ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        TICKET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    for ticket in tickets {
        stmt.execute(params![
            ticket.squad.id(),
            ticket.jira_id,
            ticket.jira_ref,
            ticket.ticket_type.as_str(),
            format_datetime(&ticket.created),
            ticket.story_points,
            ticket.specific_completed.as_ref().map(format_datetime),
            ticket.sprint_completed.as_ref().map(format_datetime),
            ticket.sprint_id,
            labels_json(&ticket.tech_labels)?,
            labels_json(&ticket.product_labels)?,
            labels_json(&ticket.project_labels)?,
            flag(ticket.refined),
            flag(ticket.backlog),
        ])?;
    }
    Ok(())
}

impl Store {
    pub fn save_tickets(&mut self, tickets: &[ClassifiedTicket]) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_tickets(&tx, tickets)?;
        tx.commit()?;
        Ok(())
    }

    pub fn sprint_tickets(&self, sprint_id: i64) -> Result<Vec<ClassifiedTicket>> {
        let sql = format!("SELECT {} FROM ticket WHERE sprint_id = ?1 ORDER BY id", TICKET_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(params![sprint_id], ticket_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    pub fn count_sprint_tickets(&self, sprint_id: i64, ticket_type: Option<TicketType>) -> Result<i64> {
        let count = match ticket_type {
            Some(ticket_type) => self.conn.query_row(
                "SELECT COUNT(id) FROM ticket WHERE sprint_id = ?1 AND ticket_type = ?2",
                params![sprint_id, ticket_type.as_str()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(id) FROM ticket WHERE sprint_id = ?1",
                params![sprint_id],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }

    /// Backlog tickets of a squad, optionally narrowed to refined or unrefined.
    pub fn backlog_tickets(&self, squad: Squad, refined: Option<bool>) -> Result<Vec<ClassifiedTicket>> {
        let base = format!(
            "SELECT {} FROM ticket WHERE squad_id = ?1 AND backlog = 'True'",
            TICKET_COLUMNS
        );
        let tickets = match refined {
            Some(refined) => {
                let mut stmt = self.conn.prepare(&format!("{} AND refined = ?2 ORDER BY id", base))?;
                let rows = stmt.query_map(params![squad.id(), flag(refined)], ticket_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{} ORDER BY id", base))?;
                let rows = stmt.query_map(params![squad.id()], ticket_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(tickets)
    }

    pub fn count_backlog(&self, squad: Squad, refined: bool, ticket_type: Option<TicketType>) -> Result<i64> {
        let count = match ticket_type {
            Some(ticket_type) => self.conn.query_row(
                "SELECT COUNT(id) FROM ticket
                 WHERE backlog = 'True' AND refined = ?1 AND ticket_type = ?2 AND squad_id = ?3",
                params![flag(refined), ticket_type.as_str(), squad.id()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(id) FROM ticket WHERE backlog = 'True' AND refined = ?1 AND squad_id = ?2",
                params![flag(refined), squad.id()],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MetricsError;
    use crate::models::ticket::{ProductLabel, TechLabel};
    use chrono::NaiveDate;

    fn backlog_ticket(key: &str, ticket_type: TicketType, refined: bool) -> ClassifiedTicket {
        ClassifiedTicket {
            squad: Squad::Bank,
            jira_id: format!("id-{}", key),
            jira_ref: key.to_string(),
            ticket_type,
            created: NaiveDate::from_ymd_opt(2021, 9, 1)
                .and_then(|d| d.and_hms_opt(9, 30, 0))
                .unwrap(),
            story_points: Some(3),
            specific_completed: None,
            sprint_completed: None,
            sprint_id: None,
            tech_labels: vec![TechLabel::Security, TechLabel::MiscTech],
            product_labels: Vec::new(),
            project_labels: vec!["API 2.0 Banking Release".to_string()],
            refined,
            backlog: true,
        }
    }

    #[test]
    fn test_tickets_roundtrip_through_store() {
        let mut store = Store::open_in_memory().unwrap();
        let mut ticket = backlog_ticket("BNK-1", TicketType::Bug, true);
        ticket.product_labels = vec![ProductLabel::Project];
        store.save_tickets(&[ticket.clone()]).unwrap();

        let loaded = store.backlog_tickets(Squad::Bank, None).unwrap();
        assert_eq!(loaded, vec![ticket]);
    }

    #[test]
    fn test_flags_stored_as_strings() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .save_tickets(&[backlog_ticket("BNK-1", TicketType::UserStory, false)])
            .unwrap();

        let (refined, backlog, tech): (String, String, Option<String>) = store
            .conn
            .query_row("SELECT refined, backlog, tech_labels FROM ticket", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(refined, "False");
        assert_eq!(backlog, "True");
        assert_eq!(tech.as_deref(), Some("[\"security\",\"misc_tech\"]"));
    }

    #[test]
    fn test_backlog_counts_by_refined_and_type() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .save_tickets(&[
                backlog_ticket("BNK-1", TicketType::UserStory, true),
                backlog_ticket("BNK-2", TicketType::UserStory, true),
                backlog_ticket("BNK-3", TicketType::Bug, true),
                backlog_ticket("BNK-4", TicketType::Investigation, false),
            ])
            .unwrap();

        assert_eq!(store.count_backlog(Squad::Bank, true, None).unwrap(), 3);
        assert_eq!(store.count_backlog(Squad::Bank, true, Some(TicketType::UserStory)).unwrap(), 2);
        assert_eq!(store.count_backlog(Squad::Bank, false, Some(TicketType::Investigation)).unwrap(), 1);
        assert_eq!(store.count_backlog(Squad::Bpl, true, None).unwrap(), 0);
        assert_eq!(store.backlog_tickets(Squad::Bank, Some(false)).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_ticket_is_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        let ticket = backlog_ticket("BNK-1", TicketType::Bug, true);
        store.save_tickets(&[ticket.clone()]).unwrap();

        let err = store.save_tickets(&[ticket]).unwrap_err();
        assert!(matches!(err, MetricsError::Store(_)));
        assert_eq!(store.backlog_tickets(Squad::Bank, None).unwrap().len(), 1);
    }
}
