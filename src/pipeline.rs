//! Fetch, classify, store and report, one squad at a time.

use chrono::NaiveDate;
use colored::*;
use log::{debug, info};

use crate::api::jira::JiraClient;
use crate::config::settings::Settings;
use crate::errors::Result;
use crate::metrics::aggregate;
use crate::metrics::classifier::Classifier;
use crate::metrics::intake::{collect_backlog_tickets, collect_sprint_tickets};
use crate::models::parse_jira_datetime;
use crate::models::sprint::{NewSprint, RawSprint, SprintStatus};
use crate::report::workbook::{WorkbookWriter, Worksheet};
use crate::report::ReportRow;
use crate::squads::{Catalog, Squad};
use crate::store::cache::CacheId;
use crate::store::Store;

/// Keeps closed sprints that started after `since` and have an end date.
pub fn select_sprints(squad: Squad, raw_sprints: &[RawSprint], since: NaiveDate) -> Result<Vec<NewSprint>> {
    let Some(cutoff) = since.and_hms_opt(0, 0, 0) else {
        return Ok(Vec::new());
    };

    let mut selected = Vec::new();
    for raw in raw_sprints {
        let (Some(start), Some(end)) = (raw.start_date.as_deref(), raw.end_date.as_deref()) else {
            debug!("skipping sprint {} without dates", raw.name);
            continue;
        };

        let label = format!("sprint {}", raw.id);
        let start_date = parse_jira_datetime(&label, start)?;
        if start_date <= cutoff {
            continue;
        }

        selected.push(NewSprint {
            squad,
            jira_id: raw.id,
            name: raw.name.clone(),
            goal: raw.goal.clone(),
            start_date,
            end_date: parse_jira_datetime(&label, end)?,
            status: SprintStatus::Closed,
        });
    }
    Ok(selected)
}

pub struct Pipeline<'a> {
    client: &'a JiraClient,
    settings: &'a Settings,
    catalog: &'a Catalog,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a JiraClient, settings: &'a Settings, catalog: &'a Catalog) -> Self {
        Self {
            client,
            settings,
            catalog,
        }
    }

    /// Refetches every squad from Jira when the cache is stale (or `force`
    /// is set). Returns whether a refresh happened.
    pub async fn refresh(&self, store: &mut Store, writer: &mut WorkbookWriter, force: bool) -> Result<bool> {
        if !force && !store.is_stale(CacheId::SprintReport)? {
            println!("{}", "Cache is fresh, using stored tickets".dimmed());
            return Ok(false);
        }

        println!("{}", "Cache outdated, re-fetching data from Jira...".yellow());
        store.reset()?;
        for squad in Squad::ALL {
            store.register_projects(squad, self.catalog.projects(squad))?;
        }

        for squad in Squad::ALL {
            let share = self.refresh_squad(store, squad).await?;
            writer.write_sheet(squad, Worksheet::ProjectShare.title(), &share);
        }

        store.mark_refreshed(CacheId::SprintReport)?;
        info!("sprint report cache refreshed");
        Ok(true)
    }

    /// Pulls closed sprints, their tickets and the backlog of one squad into
    /// the store. Returns one project-share row per processed sprint.
    pub async fn refresh_squad(&self, store: &mut Store, squad: Squad) -> Result<Vec<ReportRow>> {
        let fields = &self.settings.fields;
        let classifier = Classifier::new(squad, self.catalog.projects(squad), fields);

        println!("  {} {} sprints...", "Fetching".dimmed(), squad.name().bright_white());
        let raw_sprints = self.client.closed_sprints(squad.id()).await?;
        let new_sprints = select_sprints(squad, &raw_sprints, self.settings.reports.sprints_since)?;
        let inserted = store.insert_sprints(&new_sprints)?;
        debug!("{}: {} closed sprints, {} new", squad, raw_sprints.len(), inserted);

        let mut share_rows = Vec::new();
        for sprint in store.sprints(squad, SprintStatus::Closed)? {
            let raw_tickets = self.client.sprint_tickets(squad.id(), sprint.jira_id).await?;
            let collected = collect_sprint_tickets(&classifier, &sprint, &raw_tickets, &fields.sprint)?;
            debug!(
                "{}: {} counted, {} carried over, {} defects",
                sprint.name,
                collected.tickets.len(),
                collected.carried_over,
                collected.defect_total
            );

            store.save_sprint_tickets(
                sprint.id,
                &collected.tickets,
                collected.carried_over,
                collected.defect_total,
            )?;

            let mut row = ReportRow::new();
            row.set("name", sprint.name.as_str());
            row.extend(aggregate::project_share(
                &collected.counted,
                self.catalog.identifiers(squad),
            )?);
            share_rows.push(row);
        }

        println!("  {} {} backlog...", "Fetching".dimmed(), squad.name().bright_white());
        let raw_backlog = self.client.backlog_tickets(squad.id()).await?;
        let backlog = collect_backlog_tickets(&classifier, &raw_backlog)?;
        store.save_tickets(&backlog)?;

        println!("  {} {}", "✓".green(), squad.to_string().dimmed());
        Ok(share_rows)
    }
}

/// Adds the sprint and backlog sheets of every squad from the store.
pub fn write_reports(store: &Store, writer: &mut WorkbookWriter) -> Result<()> {
    for squad in Squad::ALL {
        let project_names = store.project_names(squad)?;

        println!("  {} {} sprint info...", "Organising".dimmed(), squad.name().bright_white());
        let sprints = aggregate::sprint_report(store, squad, &project_names)?;
        writer.write_sheet(squad, Worksheet::Sprint.title(), &sprints);

        println!("  {} {} backlog info...", "Organising".dimmed(), squad.name().bright_white());
        let backlog = aggregate::backlog_report(store, squad, &project_names)?;
        writer.write_sheet(squad, Worksheet::Backlog.title(), &[backlog]);

        println!("  {} {}", "✓".green(), squad.to_string().dimmed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{FieldsConfig, JiraConfig, ReportsConfig, StoreConfig};
    use mockito::Matcher;
    use serde_json::{json, Value};

    fn raw_sprint(id: i64, start: Option<&str>, end: Option<&str>) -> RawSprint {
        RawSprint {
            id,
            name: format!("Sprint {}", id),
            goal: None,
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
            state: Some("closed".to_string()),
        }
    }

    #[test]
    fn test_select_sprints_applies_cutoff_and_end_date() {
        let since = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let raw = vec![
            raw_sprint(1, Some("2020-12-20T09:00:00.000Z"), Some("2021-01-03T17:00:00.000Z")),
            raw_sprint(2, Some("2021-01-04T09:00:00.000Z"), Some("2021-01-17T17:00:00.000Z")),
            raw_sprint(3, Some("2021-01-18T09:00:00.000Z"), None),
            raw_sprint(4, None, None),
        ];

        let selected = select_sprints(Squad::Mobile, &raw, since).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].jira_id, 2);
        assert_eq!(
            crate::models::format_datetime(&selected[0].start_date),
            "2021-01-04 09:00:00"
        );
    }

    fn settings(url: String, dir: &std::path::Path) -> Settings {
        Settings {
            jira: JiraConfig {
                url,
                email: "bot@example.com".to_string(),
                api_token: "token".to_string(),
            },
            fields: FieldsConfig::default(),
            store: StoreConfig {
                path: dir.join("metrics.db"),
            },
            reports: ReportsConfig {
                dir: dir.join("spreadsheets"),
                sprints_since: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            },
            projects: Vec::new(),
            estimate_trackers: Vec::new(),
        }
    }

    fn issue(key: &str, issue_type: &str, status: &str, sprints: &[i64], extra: Value) -> Value {
        let sprint_refs: Vec<Value> = sprints.iter().map(|id| json!({"id": id})).collect();
        let mut fields = json!({
            "summary": format!("{} summary", key),
            "issuetype": {"name": issue_type},
            "created": "2021-09-01T09:30:00.000+0100",
            "resolutiondate": "2021-09-10T17:00:00.000+0100",
            "status": {"name": status},
            "labels": [],
            "components": [],
            "subtasks": [],
            "customfield_10115": sprint_refs
        });
        if let (Some(base), Value::Object(more)) = (fields.as_object_mut(), extra) {
            base.extend(more);
        }
        json!({"id": format!("id-{}", key), "key": key, "fields": fields})
    }

    async fn empty_board(server: &mut mockito::Server, board: i64) {
        for path in [
            format!("/rest/agile/1.0/board/{}/sprint", board),
            format!("/rest/agile/1.0/board/{}/backlog", board),
        ] {
            let body = if path.ends_with("sprint") {
                json!({"values": []})
            } else {
                json!({"issues": []})
            };
            server
                .mock("GET", path.as_str())
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(body.to_string())
                .create_async()
                .await;
        }
    }

    #[tokio::test]
    async fn test_refresh_and_report_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(server.url(), dir.path());
        let catalog = Catalog::builtin();
        let client = JiraClient::new(
            settings.jira.url.clone(),
            settings.jira.email.clone(),
            settings.jira.api_token.clone(),
        );

        server
            .mock("GET", "/rest/agile/1.0/board/126/sprint")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"values": [{
                    "id": 3,
                    "name": "Bank Sprint 3",
                    "goal": "Banking API",
                    "startDate": "2021-09-01T08:00:00.000Z",
                    "endDate": "2021-09-14T16:00:00.000Z"
                }]})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/rest/agile/1.0/board/126/sprint/3/issue")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"issues": [
                    issue("BNK-1", "Story", "Done", &[3], json!({
                        "components": [{"name": "API v2.0 Banking release"}],
                        "subtasks": [{"key": "BNK-9", "fields": {"issuetype": {"name": "Defect"}}}]
                    })),
                    issue("BNK-2", "Bug", "Done", &[3, 9], json!({})),
                    issue("BNK-3", "Task", "Done", &[3], json!({})),
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/rest/agile/1.0/board/126/backlog")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"issues": [
                    issue("BNK-4", "Story", "To Do", &[], json!({
                        "labels": ["devops"],
                        "customfield_10350": [{"value": "Yes"}]
                    })),
                    issue("BNK-5", "Sub-task", "To Do", &[], json!({})),
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        for board in [168, 172, 201] {
            empty_board(&mut server, board).await;
        }

        let mut store = Store::open_in_memory().unwrap();
        let mut writer = WorkbookWriter::new(&settings.reports.dir);
        let pipeline = Pipeline::new(&client, &settings, &catalog);

        assert!(pipeline.refresh(&mut store, &mut writer, false).await.unwrap());
        write_reports(&store, &mut writer).unwrap();

        let bank = writer.workbook(Squad::Bank).unwrap();
        let sprint = bank.sheet("sprint").unwrap();
        let header: Vec<&str> = sprint.rows[0].iter().filter_map(Value::as_str).collect();
        let value = |key: &str| {
            let idx = header.iter().position(|h| *h == key).unwrap();
            sprint.rows[1][idx].clone()
        };
        assert_eq!(value("name"), json!("Bank Sprint 3"));
        assert_eq!(value("ticket_total"), json!(1));
        assert_eq!(value("ticket_carry_over_count"), json!(1));
        assert_eq!(value("defect_count"), json!(1));
        assert_eq!(value("API 2.0 Banking Release"), json!(1));
        assert_eq!(value("project"), json!(1));

        let backlog = bank.sheet("backlog").unwrap();
        assert_eq!(backlog.rows.len(), 2);
        assert!(bank.sheet("project_share").is_some());

        let saved = writer.save().unwrap();
        assert_eq!(saved.len(), 4);
        assert!(saved.iter().all(|path| path.exists()));

        assert!(!store.is_stale(CacheId::SprintReport).unwrap());
        let refreshed = pipeline.refresh(&mut store, &mut writer, false).await.unwrap();
        assert!(!refreshed);
    }
}
