use colored::*;
use std::fmt;

#[derive(Debug)]
pub enum MetricsError {
    // Configuration errors
    ConfigNotFound,
    ConfigInvalid(String),

    // Jira errors
    JiraAuthFailed(u16),
    JiraApiError(u16, String),

    // Classification errors
    RefinementFieldMalformed {
        squad: String,
        ticket: String,
        field: String,
    },
    UnknownMatchField {
        project: String,
        field: String,
    },
    InvalidTimestamp {
        ticket: String,
        value: String,
    },

    // Store errors
    Store(String),
    SprintAlreadyFinalized(i64),

    // Report errors
    Report(String),

    // Network errors
    NetworkError(String),

    // Generic error
    Other(String),
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Configuration errors
            MetricsError::ConfigNotFound => {
                write!(f, "{}\n", "Configuration not found".red().bold())?;
                write!(f, "   {}\n\n", "Jira credentials are required to fetch tickets".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Create ~/.jira-metrics/config.toml\n")?;
                write!(f, "   2. Or export {}", "JIRA_METRICS_JIRA__API_TOKEN".green())
            }
            MetricsError::ConfigInvalid(msg) => {
                write!(f, "{}\n", "Invalid configuration".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your config file: ~/.jira-metrics/config.toml\n")?;
                write!(f, "   2. Or inspect it: {}", "jira-metrics config show".green())
            }

            // Jira errors
            MetricsError::JiraAuthFailed(status) => {
                write!(f, "{}\n", format!("Jira authentication failed ({})", status).red().bold())?;
                write!(f, "   {}\n\n", "Your API token may have expired or is invalid".dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Generate new token: {}\n", "https://id.atlassian.com/manage-profile/security/api-tokens".cyan())?;
                write!(f, "   2. Update config: {}", "jira-metrics config set jira.api_token <token>".green())
            }
            MetricsError::JiraApiError(status, msg) => {
                write!(f, "{}\n", format!("Jira API error ({})", status).red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   Try again or check your network connection")
            }

            // Classification errors
            MetricsError::RefinementFieldMalformed { squad, ticket, field } => {
                write!(f, "{}\n", format!("{} refinement field is no longer a list", squad).red().bold())?;
                write!(f, "   {}\n\n", format!("Ticket {} has an unexpected value in {}", ticket, field).dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check the field shape in Jira\n")?;
                write!(f, "   2. Update the {} refinement policy", squad)
            }
            MetricsError::UnknownMatchField { project, field } => {
                write!(f, "{}\n", format!("Unknown match field '{}'", field).red().bold())?;
                write!(f, "   {}\n\n", format!("Project '{}' cannot be matched against tickets", project).dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Use match_field = \"components\"\n")?;
                write!(f, "   2. Or remove the project from your config")
            }
            MetricsError::InvalidTimestamp { ticket, value } => {
                write!(f, "{}\n", "Unparsable Jira timestamp".red().bold())?;
                write!(f, "   {}", format!("Ticket {}: '{}'", ticket, value).dimmed())
            }

            // Store errors
            MetricsError::Store(msg) => {
                write!(f, "{}\n", "Metrics store error".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check the store path in your config\n")?;
                write!(f, "   2. Force a fresh fetch: {}", "jira-metrics run --force".green())
            }
            MetricsError::SprintAlreadyFinalized(sprint_id) => {
                write!(f, "{}\n", format!("Sprint {} already has carry-over totals", sprint_id).red().bold())?;
                write!(f, "   {}\n\n", "Sprint totals are written once per fetch cycle".dimmed())?;
                write!(f, "   Force a fresh fetch: {}", "jira-metrics run --force".green())
            }

            // Report errors
            MetricsError::Report(msg) => {
                write!(f, "{}\n", "Failed to write report".red().bold())?;
                write!(f, "   {}", msg.dimmed())
            }

            // Network errors
            MetricsError::NetworkError(msg) => {
                write!(f, "{}\n", "Network error".red().bold())?;
                write!(f, "   {}\n\n", msg.dimmed())?;
                write!(f, "   To fix:\n")?;
                write!(f, "   1. Check your internet connection\n")?;
                write!(f, "   2. Verify you can reach the Jira API\n")?;
                write!(f, "   3. Try again in a moment")
            }

            // Generic
            MetricsError::Other(msg) => {
                write!(f, "{}\n", "Error".red().bold())?;
                write!(f, "   {}", msg.dimmed())
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// Conversion from anyhow::Error
impl From<anyhow::Error> for MetricsError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<MetricsError>() {
            Ok(metrics_err) => metrics_err,
            Err(err) => MetricsError::Other(format!("{:#}", err)),
        }
    }
}

// Helper to convert common error types
impl From<std::io::Error> for MetricsError {
    fn from(err: std::io::Error) -> Self {
        MetricsError::Other(err.to_string())
    }
}

impl From<rusqlite::Error> for MetricsError {
    fn from(err: rusqlite::Error) -> Self {
        MetricsError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for MetricsError {
    fn from(err: serde_json::Error) -> Self {
        MetricsError::Report(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for MetricsError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        MetricsError::Report(err.to_string())
    }
}

impl From<reqwest::Error> for MetricsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            MetricsError::NetworkError(err.to_string())
        } else if let Some(status) = err.status() {
            if status == 401 || status == 403 {
                MetricsError::JiraAuthFailed(status.as_u16())
            } else {
                MetricsError::JiraApiError(status.as_u16(), err.to_string())
            }
        } else {
            MetricsError::Other(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_roundtrip_keeps_variant() {
        let err: anyhow::Error = MetricsError::SprintAlreadyFinalized(7).into();
        let back: MetricsError = err.into();
        assert!(matches!(back, MetricsError::SprintAlreadyFinalized(7)));
    }

    #[test]
    fn test_refinement_error_names_ticket() {
        let err = MetricsError::RefinementFieldMalformed {
            squad: "Bank".to_string(),
            ticket: "BNK-12".to_string(),
            field: "customfield_10350".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("BNK-12"));
        assert!(rendered.contains("customfield_10350"));
    }
}
