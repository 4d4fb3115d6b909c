//! SQLite persistence for classified tickets, sprints, projects and the
//! freshness cache. Every public operation runs in its own transaction.

pub mod cache;
pub mod sprints;
pub mod tickets;

use rusqlite::{params, Connection};
use std::path::Path;

use crate::errors::Result;
use crate::squads::{ProjectDefinition, Squad};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sprint (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        squad_id INTEGER NOT NULL,
        jira_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        goal TEXT,
        start_date TEXT,
        end_date TEXT,
        status TEXT NOT NULL,
        tickets_carried_over INTEGER,
        defect_total INTEGER,
        UNIQUE (squad_id, jira_id)
    );

    CREATE TABLE IF NOT EXISTS ticket (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        squad_id INTEGER NOT NULL,
        jira_id TEXT NOT NULL,
        jira_ref TEXT NOT NULL,
        ticket_type TEXT NOT NULL,
        ticket_created_date TEXT NOT NULL,
        story_points INTEGER,
        ticket_specific_completed_date TEXT,
        ticket_sprint_completed_date TEXT,
        sprint_id INTEGER REFERENCES sprint(id) ON DELETE CASCADE,
        tech_labels TEXT,
        product_labels TEXT,
        project_labels TEXT,
        refined TEXT NOT NULL,
        backlog TEXT NOT NULL,
        UNIQUE (squad_id, jira_id)
    );

    CREATE TABLE IF NOT EXISTS project (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        squad_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        start_date TEXT NOT NULL,
        initial_estimate INTEGER NOT NULL DEFAULT 0,
        UNIQUE (squad_id, name)
    );

    CREATE TABLE IF NOT EXISTS cache (
        id TEXT PRIMARY KEY,
        last_update TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ticket_sprint ON ticket(sprint_id);
    CREATE INDEX IF NOT EXISTS idx_ticket_backlog ON ticket(squad_id, backlog, refined);
    CREATE INDEX IF NOT EXISTS idx_sprint_squad ON sprint(squad_id, status);
";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Drops all data and recreates the schema.
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS ticket;
             DROP TABLE IF EXISTS sprint;
             DROP TABLE IF EXISTS project;
             DROP TABLE IF EXISTS cache;",
        )?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        Ok(())
    }

    /// Registers the squad's project definitions; already known projects are
    /// left alone.
    pub fn register_projects(&mut self, squad: Squad, projects: &[ProjectDefinition]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for project in projects {
            tx.execute(
                "INSERT OR IGNORE INTO project (squad_id, name, start_date, initial_estimate)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    squad.id(),
                    project.name,
                    project.start_date.format("%Y-%m-%d").to_string(),
                    project.initial_estimate,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn project_names(&self, squad: Squad) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM project WHERE squad_id = ?1 ORDER BY id")?;
        let names = stmt
            .query_map(params![squad.id()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squads::Catalog;

    #[test]
    fn test_register_projects_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let catalog = Catalog::builtin();

        store.register_projects(Squad::Bank, catalog.projects(Squad::Bank)).unwrap();
        store.register_projects(Squad::Bank, catalog.projects(Squad::Bank)).unwrap();

        assert_eq!(
            store.project_names(Squad::Bank).unwrap(),
            vec!["API 2.0 Banking Release", "API 2.0 Consumer Release"]
        );
        assert!(store.project_names(Squad::Mobile).unwrap().is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = Store::open_in_memory().unwrap();
        let catalog = Catalog::builtin();
        store.register_projects(Squad::Bank, catalog.projects(Squad::Bank)).unwrap();

        store.reset().unwrap();
        assert!(store.project_names(Squad::Bank).unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.db");
        Store::open(&path).unwrap();
        assert!(path.exists());
    }
}
