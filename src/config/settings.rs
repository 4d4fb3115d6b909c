use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "JIRA_METRICS";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub jira: JiraConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    #[serde(default)]
    pub estimate_trackers: Vec<EstimateTrackerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JiraConfig {
    pub url: String,
    pub email: String,
    pub api_token: String,
}

/// Jira custom field ids. These differ between Jira sites.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldsConfig {
    #[serde(default = "default_story_points_field")]
    pub story_points: String,
    #[serde(default = "default_sprint_field")]
    pub sprint: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
    /// Closed sprints that started on or before this date are ignored.
    #[serde(default = "default_sprints_since")]
    pub sprints_since: NaiveDate,
}

/// An extra project definition on top of the built-in squad tables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub squad: i64,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub initial_estimate: u32,
    #[serde(default = "default_match_field")]
    pub match_field: String,
    pub match_value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EstimateTrackerConfig {
    pub name: String,
    pub squad: i64,
    pub dev_jql: String,
    pub qa_jql: String,
    pub story_points_field: String,
}

fn default_story_points_field() -> String {
    "customfield_10117".to_string()
}

fn default_sprint_field() -> String {
    "customfield_10115".to_string()
}

fn default_store_path() -> PathBuf {
    Settings::config_dir()
        .map(|dir| dir.join("metrics.db"))
        .unwrap_or_else(|_| PathBuf::from("metrics.db"))
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("spreadsheets")
}

fn default_sprints_since() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default()
}

fn default_match_field() -> String {
    "components".to_string()
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            story_points: default_story_points_field(),
            sprint: default_sprint_field(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
            sprints_since: default_sprints_since(),
        }
    }
}

impl Settings {
    /// Loads the config file (if any) with `JIRA_METRICS_*` environment
    /// variables layered on top, e.g. `JIRA_METRICS_JIRA__API_TOKEN`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let raw = config::Config::builder()
            .add_source(config::File::from(config_path.as_path()).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read config file")?;

        if raw.get_table("jira").is_err() {
            anyhow::bail!(crate::errors::MetricsError::ConfigNotFound);
        }

        let settings: Settings = raw
            .try_deserialize()
            .context("Failed to parse config file")?;

        Ok(settings)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, config_str)
            .context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&config_path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&config_path, perms)?;
        }

        Ok(())
    }

    /// Sets a single `section.field` value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "jira.url" => self.jira.url = value.to_string(),
            "jira.email" => self.jira.email = value.to_string(),
            "jira.api_token" => self.jira.api_token = value.to_string(),
            "fields.story_points" => self.fields.story_points = value.to_string(),
            "fields.sprint" => self.fields.sprint = value.to_string(),
            "store.path" => self.store.path = PathBuf::from(value),
            "reports.dir" => self.reports.dir = PathBuf::from(value),
            "reports.sprints_since" => {
                self.reports.sprints_since = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .context("Expected a date like 2021-01-01")?
            }
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".jira-metrics"))
    }
}
