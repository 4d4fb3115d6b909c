use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

mod api;
mod config;
mod errors;
mod metrics;
mod models;
mod pipeline;
mod report;
mod squads;
mod store;
mod trackers;

#[derive(Parser)]
#[command(name = "jira-metrics")]
#[command(version = "0.1.0")]
#[command(about = "Sprint and backlog metrics for Jira squads", long_about = None)]
struct Cli {
    /// for debugging purposes
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.jira-metrics/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh stale Jira data and write every report
    Run {
        /// Refetch from Jira even if the cache is fresh
        #[arg(long)]
        force: bool,
    },

    /// Write sprint and backlog reports from stored tickets only
    Report,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Display current configuration (with masked secrets)
    Show,

    /// Set a specific configuration value
    Set {
        /// Configuration key (e.g., jira.email, reports.dir)
        key: String,
        /// New value
        value: String,
    },

    /// Validate configuration by testing the Jira connection
    Validate,

    /// Get the path to the config file
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!("{}", "Jira Metrics v0.1.0".bright_cyan().bold());
    println!();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run { force } => handle_run(config_path, force).await,

        Commands::Report => handle_report(config_path),

        Commands::Config { action } => handle_config(config_path, action).await,
    };

    if let Err(e) = result {
        eprintln!("\n{}", e);
        std::process::exit(1);
    }

    println!();
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn jira_client(settings: &config::settings::Settings) -> api::jira::JiraClient {
    api::jira::JiraClient::new(
        settings.jira.url.clone(),
        settings.jira.email.clone(),
        settings.jira.api_token.clone(),
    )
}

async fn handle_run(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    use config::settings::Settings;
    use report::workbook::WorkbookWriter;

    let settings = Settings::load(config_path)?;
    let catalog = squads::Catalog::load(&settings.projects)?;
    let jira = jira_client(&settings);
    let mut writer = WorkbookWriter::new(&settings.reports.dir);
    let mut store = store::Store::open(&settings.store.path)?;

    writer.clear()?;

    let job = pipeline::Pipeline::new(&jira, &settings, &catalog);
    if job.refresh(&mut store, &mut writer, force).await? {
        println!("{}", "✓ Jira data refreshed".green());
    }
    println!();

    println!("{}", "Starting ticket organisation...".cyan().bold());
    pipeline::write_reports(&store, &mut writer)?;

    if !settings.estimate_trackers.is_empty() {
        println!();
        println!("{}", "Running estimate trackers...".cyan().bold());
        trackers::run_trackers(&jira, &settings.estimate_trackers, &mut writer).await?;
    }

    save_workbooks(&writer)?;
    println!();
    println!(
        "{}",
        format!("✓ Reports written to {}", settings.reports.dir.display()).green().bold()
    );
    Ok(())
}

fn handle_report(config_path: Option<&Path>) -> anyhow::Result<()> {
    use config::settings::Settings;
    use report::workbook::WorkbookWriter;

    let settings = Settings::load(config_path)?;
    let store = store::Store::open(&settings.store.path)?;
    let mut writer = WorkbookWriter::new(&settings.reports.dir);

    println!("{}", "Organising stored tickets...".cyan().bold());
    pipeline::write_reports(&store, &mut writer)?;

    save_workbooks(&writer)?;
    println!();
    println!(
        "{}",
        format!("✓ Reports written to {}", settings.reports.dir.display()).green().bold()
    );
    Ok(())
}

fn save_workbooks(writer: &report::workbook::WorkbookWriter) -> anyhow::Result<()> {
    println!();
    for path in writer.save()? {
        println!("  {} {}", "✓".green(), path.display().to_string().dimmed());
    }
    Ok(())
}

fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "*".repeat(token.len());
    }
    format!("{}***{}", &token[..4], &token[token.len() - 4..])
}

async fn handle_config(config_path: Option<&Path>, action: ConfigAction) -> anyhow::Result<()> {
    use config::settings::Settings;

    match action {
        ConfigAction::Show => {
            let settings = Settings::load(config_path)?;

            println!("{}", "Current Configuration".cyan().bold());
            println!();

            println!("{}", "[jira]".bold());
            println!("  {} {}", "url:".dimmed(), settings.jira.url.bright_white());
            println!("  {} {}", "email:".dimmed(), settings.jira.email.bright_white());
            println!("  {} {}", "api_token:".dimmed(), mask_token(&settings.jira.api_token).yellow());

            println!();
            println!("{}", "[fields]".bold());
            println!("  {} {}", "story_points:".dimmed(), settings.fields.story_points.bright_white());
            println!("  {} {}", "sprint:".dimmed(), settings.fields.sprint.bright_white());

            println!();
            println!("{}", "[store]".bold());
            println!("  {} {}", "path:".dimmed(), settings.store.path.display().to_string().bright_white());

            println!();
            println!("{}", "[reports]".bold());
            println!("  {} {}", "dir:".dimmed(), settings.reports.dir.display().to_string().bright_white());
            println!(
                "  {} {}",
                "sprints_since:".dimmed(),
                settings.reports.sprints_since.to_string().bright_white()
            );

            if !settings.projects.is_empty() {
                println!();
                println!("{}", "[[projects]]".bold());
                for project in &settings.projects {
                    println!(
                        "  {} (squad {}, {} = {})",
                        project.name.bright_white(),
                        project.squad,
                        project.match_field.dimmed(),
                        project.match_value
                    );
                }
            }

            if !settings.estimate_trackers.is_empty() {
                println!();
                println!("{}", "[[estimate_trackers]]".bold());
                for tracker in &settings.estimate_trackers {
                    println!("  {} (squad {})", tracker.name.bright_white(), tracker.squad);
                }
            }

            Ok(())
        }

        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load(config_path)?;
            settings.set(&key, &value)?;
            settings.save(config_path)?;

            println!("{}", format!("✓ Updated {} to: {}", key, value).green().bold());
            println!();
            println!("{}", "Configuration saved successfully!".green());

            Ok(())
        }

        ConfigAction::Validate => {
            println!("{}", "Validating configuration...".cyan().bold());
            println!();

            let settings = Settings::load(config_path)?;

            print!("{}", "  Checking project definitions... ".dimmed());
            std::io::Write::flush(&mut std::io::stdout())?;
            match squads::Catalog::load(&settings.projects) {
                Ok(_) => println!("{}", "✓".green().bold()),
                Err(e) => {
                    println!("{}", "✗".red().bold());
                    return Err(e.into());
                }
            }

            print!("{}", "  Testing Jira connection... ".dimmed());
            std::io::Write::flush(&mut std::io::stdout())?;

            let jira = jira_client(&settings);
            match jira.closed_sprints(squads::Squad::Bank.id()).await {
                Ok(_) => {
                    println!("{}", "✓".green().bold());
                }
                Err(e) => {
                    println!("{}", "✗".red().bold());
                    println!();
                    println!("{}", format!("  Jira connection failed: {}", e).red());
                    println!();
                    println!("{}", "  To fix:".yellow());
                    println!("{}", "    1. Check your Jira URL is correct".dimmed());
                    println!("{}", "    2. Verify your API token is valid".dimmed());
                    println!("{}", "    3. Update with: jira-metrics config set jira.api_token <new-token>".dimmed());
                    return Err(anyhow::anyhow!("Jira validation failed"));
                }
            }

            println!();
            println!("{}", "✓ All validations passed!".green().bold());

            Ok(())
        }

        ConfigAction::Path => {
            let config_path = match config_path {
                Some(path) => path.to_path_buf(),
                None => Settings::config_path()?,
            };
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token_long() {
        assert_eq!(mask_token("abcd1234efgh5678"), "abcd***5678");
    }

    #[test]
    fn test_mask_token_short() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token(""), "");
    }

    #[test]
    fn test_cli_parses_run_with_force() {
        let cli = Cli::try_parse_from(["jira-metrics", "--verbose", "run", "--force"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run { force: true }));
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["jira-metrics", "report", "--config", "/tmp/metrics.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/metrics.toml")));
        assert!(matches!(cli.command, Commands::Report));
    }

    #[test]
    fn test_cli_config_set() {
        let cli = Cli::try_parse_from(["jira-metrics", "config", "set", "reports.dir", "out"]).unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigAction::Set { key, value },
            } => {
                assert_eq!(key, "reports.dir");
                assert_eq!(value, "out");
            }
            _ => panic!("expected config set"),
        }
    }
}
