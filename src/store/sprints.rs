use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::tickets::{datetime_column, insert_tickets, squad_column};
use super::Store;
use crate::errors::{MetricsError, Result};
use crate::models::format_datetime;
use crate::models::sprint::{NewSprint, Sprint, SprintStatus};
use crate::models::ticket::ClassifiedTicket;
use crate::squads::Squad;

const SPRINT_COLUMNS: &str =
    "id, squad_id, jira_id, name, goal, start_date, end_date, status, tickets_carried_over, defect_total";

fn sprint_from_row(row: &Row<'_>) -> rusqlite::Result<Sprint> {
    let status: String = row.get(7)?;
    let status = SprintStatus::parse(&status)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(7, status.clone(), Type::Text))?;

    Ok(Sprint {
        id: row.get(0)?,
        squad: squad_column(row, 1)?,
        jira_id: row.get(2)?,
        name: row.get(3)?,
        goal: row.get(4)?,
        start_date: datetime_column(row, 5)?,
        end_date: datetime_column(row, 6)?,
        status,
        tickets_carried_over: row.get(8)?,
        defect_total: row.get(9)?,
    })
}

impl Store {
    /// Inserts sprints, ignoring ones already stored for the squad. Returns
    /// how many were new.
    pub fn insert_sprints(&mut self, sprints: &[NewSprint]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO sprint (squad_id, jira_id, name, goal, start_date, end_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for sprint in sprints {
                inserted += stmt.execute(params![
                    sprint.squad.id(),
                    sprint.jira_id,
                    sprint.name,
                    sprint.goal,
                    format_datetime(&sprint.start_date),
                    format_datetime(&sprint.end_date),
                    sprint.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn sprints(&self, squad: Squad, status: SprintStatus) -> Result<Vec<Sprint>> {
        let sql = format!(
            "SELECT {} FROM sprint WHERE squad_id = ?1 AND status = ?2 ORDER BY start_date, id",
            SPRINT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sprints = stmt
            .query_map(params![squad.id(), status.as_str()], sprint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sprints)
    }

    #[cfg(test)]
    pub fn sprint(&self, id: i64) -> Result<Option<Sprint>> {
        let sql = format!("SELECT {} FROM sprint WHERE id = ?1", SPRINT_COLUMNS);
        let sprint = self
            .conn
            .query_row(&sql, params![id], sprint_from_row)
            .optional()?;
        Ok(sprint)
    }

    /// Stores a sprint's counted tickets and writes its carry-over and defect
    /// totals. Totals can only be written once per sprint row.
    pub fn save_sprint_tickets(
        &mut self,
        sprint_id: i64,
        tickets: &[ClassifiedTicket],
        carried_over: i64,
        defect_total: i64,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        let updated = tx.execute(
            "UPDATE sprint SET tickets_carried_over = ?2, defect_total = ?3
             WHERE id = ?1 AND tickets_carried_over IS NULL AND defect_total IS NULL",
            params![sprint_id, carried_over, defect_total],
        )?;
        if updated == 0 {
            let exists: Option<i64> = tx
                .query_row("SELECT id FROM sprint WHERE id = ?1", params![sprint_id], |row| row.get(0))
                .optional()?;
            return Err(match exists {
                Some(_) => MetricsError::SprintAlreadyFinalized(sprint_id),
                None => MetricsError::Store(format!("sprint {} does not exist", sprint_id)),
            });
        }

        insert_tickets(&tx, tickets)?;
        tx.commit()?;
        Ok(())
    }
}
