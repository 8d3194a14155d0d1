//! Administrative tool for FEMSQ database connection settings.
//!
//! Shows the persisted settings, reports whether they connect, probes new
//! settings and applies them through the reconnection protocol.
//!
//! # Security Guarantees
//! - Passwords are never printed; `show` masks them
//! - `test` never writes the settings file
//! - `apply` writes the settings file only after a successful connection test

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use femsq_db_core::config::document::keys;
use femsq_db_core::logging::{LogFormat, init_logging};
use femsq_db_core::{
    ConfigStore, ConfigValidator, ConfigurationProvider, ConfigurationService, ConnectionConfiguration,
    ConnectionFactory, ConnectionStatus, ReconnectionCoordinator, SecretString, SettingsDocument,
    TiberiusBackend,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "femsq-db")]
#[command(about = "Manage FEMSQ database connection settings")]
#[command(version)]
#[command(long_about = "
FEMSQ database settings - inspect, test and apply SQL Server connection settings

Settings live in a properties file resolved in this order:
  1. --config <PATH>
  2. FEMSQ_CONFIG_PATH environment variable
  3. ~/.femsq/database.properties

New settings are tested against the server before they are written.

EXAMPLES:
  femsq-db status --json
  femsq-db test --host db.local --database femsq --username app --prompt-password
  femsq-db apply --host db.local --port 1433 --database femsq --auth-mode windows-integrated
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved settings file path
    Path,
    /// Show the persisted settings (password masked)
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Test the persisted settings against the server
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Test new settings without saving them
    Test(CandidateArgs),
    /// Test new settings, save them and reload the connection pool
    Apply(CandidateArgs),
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    quiet: bool,

    /// Settings file path
    #[arg(long, global = true, env = "FEMSQ_CONFIG_PATH", help = "Settings file path")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, default_value = "text", value_parser = parse_log_format)]
    log_format: LogFormat,
}

#[derive(Args)]
struct CandidateArgs {
    /// Server host name or address
    #[arg(long)]
    host: String,

    /// Server port
    #[arg(long, help = "Server port (1-65535)")]
    port: Option<String>,

    /// Database name
    #[arg(long)]
    database: String,

    /// Default schema
    #[arg(long)]
    schema: Option<String>,

    /// Login name for credentials authentication
    #[arg(long)]
    username: Option<String>,

    /// Login password
    #[arg(
        long,
        env = "FEMSQ_DB_PASSWORD",
        hide_env_values = true,
        value_parser = parse_secret
    )]
    password: Option<SecretString>,

    /// Prompt for the password
    #[arg(long, help = "Read the password from the terminal (takes precedence over --password)")]
    prompt_password: bool,

    /// Authentication mode
    #[arg(
        long,
        help = "credentials, windows-integrated or kerberos (default: credentials when --username is set)"
    )]
    auth_mode: Option<String>,

    /// Kerberos realm
    #[arg(long)]
    realm: Option<String>,
}

impl CandidateArgs {
    /// Builds and validates the candidate the same way persisted settings are read.
    fn into_configuration(self) -> femsq_db_core::Result<ConnectionConfiguration> {
        let password = if self.prompt_password {
            Some(read_password()?)
        } else {
            self.password
        };

        let mut document = SettingsDocument::new();
        document.set(keys::HOST, self.host);
        document.set(keys::DATABASE, self.database);
        let optional = [
            (keys::PORT, self.port),
            (keys::SCHEMA, self.schema),
            (keys::USERNAME, self.username),
            (keys::AUTH_MODE, self.auth_mode),
            (keys::REALM, self.realm),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                document.set(key, value);
            }
        }
        if let Some(password) = password {
            document.set(keys::PASSWORD, password.expose());
        }

        ConfigValidator::new().map(&document)
    }
}

fn parse_secret(value: &str) -> Result<SecretString, std::convert::Infallible> {
    Ok(SecretString::from(value))
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse().map_err(|e: femsq_db_core::FemsqError| e.to_string())
}

fn read_password() -> femsq_db_core::Result<SecretString> {
    let password = rpassword::prompt_password("Database password: ").map_err(|e| {
        femsq_db_core::FemsqError::configuration(format!("Failed to read password: {e}"))
    })?;
    if password.is_empty() {
        return Err(femsq_db_core::FemsqError::configuration("Password cannot be empty"));
    }
    Ok(SecretString::from(password))
}

/// Persisted settings as printed by `show --json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    path: PathBuf,
    host: String,
    port: Option<i32>,
    database: String,
    schema: Option<String>,
    username: Option<String>,
    password: Option<&'static str>,
    auth_mode: String,
    realm: Option<String>,
}

impl SettingsView {
    fn new(path: PathBuf, config: ConnectionConfiguration) -> Self {
        Self {
            path,
            password: config.has_password().then_some(femsq_db_core::security::REDACTED),
            host: config.host,
            port: config.port,
            database: config.database,
            schema: config.schema,
            username: config.username,
            auth_mode: config.auth_mode.to_string(),
            realm: config.realm,
        }
    }
}

struct App {
    store: ConfigStore,
    coordinator: ReconnectionCoordinator<TiberiusBackend>,
}

impl App {
    fn new(config_path: Option<PathBuf>) -> Self {
        let store = config_path.map_or_else(ConfigStore::new, ConfigStore::with_path_override);
        let provider: Arc<dyn ConfigurationProvider> = Arc::new(ConfigurationService::new(store.clone()));
        let factory = Arc::new(ConnectionFactory::new(Arc::new(TiberiusBackend::new()), Arc::clone(&provider)));
        Self {
            store,
            coordinator: ReconnectionCoordinator::new(factory, provider),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format)?;

    let app = App::new(cli.global.config);
    let outcome = run(&app, cli.command).await;
    app.coordinator.factory().close().await;
    outcome
}

async fn run(app: &App, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Path => {
            println!("{}", app.store.resolve_path().display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { json } => show(app, json).await,
        Command::Status { json } => {
            let status = app.coordinator.status().await;
            print_status(&status, json)?;
            Ok(exit_code(&status))
        }
        Command::Test(args) => {
            let candidate = args.into_configuration()?;
            info!(server = %candidate.target(), "Testing connection settings...");
            let status = app.coordinator.test_candidate(&candidate).await?;
            print_status(&status, false)?;
            Ok(exit_code(&status))
        }
        Command::Apply(args) => {
            let candidate = args.into_configuration()?;
            info!(server = %candidate.target(), "Applying connection settings...");
            app.coordinator.reconnect(candidate).await.map_err(|e| {
                error!("Connection settings were not applied: {}", e);
                e
            })?;
            println!("Connection settings saved to {}", app.store.resolve_path().display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn show(app: &App, json: bool) -> anyhow::Result<ExitCode> {
    let path = app.store.resolve_path();
    let config = app
        .coordinator
        .current_config()
        .await
        .with_context(|| format!("Cannot read settings from {}", path.display()))?;

    if json {
        let view = SettingsView::new(path, config);
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Settings file: {}", path.display());
        println!("Server:        {}", config.target());
        println!("Auth mode:     {}", config.auth_mode);
        println!("Schema:        {}", config.schema.as_deref().unwrap_or("-"));
        println!("Username:      {}", config.username.as_deref().unwrap_or("-"));
        println!(
            "Password:      {}",
            if config.has_password() { femsq_db_core::security::REDACTED } else { "-" }
        );
        if let Some(realm) = &config.realm {
            println!("Realm:         {realm}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_status(status: &ConnectionStatus, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    let marker = if status.connected { "✓" } else { "✗" };
    println!("{marker} {}", status.message);
    if let Some(error) = &status.error {
        println!("  error: {error}");
    }
    Ok(())
}

const fn exit_code(status: &ConnectionStatus) -> ExitCode {
    if status.connected { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use femsq_db_core::{AuthMode, FemsqError};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    fn candidate(extra: &[&str]) -> femsq_db_core::Result<ConnectionConfiguration> {
        let mut argv = vec!["femsq-db", "test", "--host", "db.local", "--database", "femsq"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Test(args) => args.into_configuration(),
            _ => unreachable!("parsed the test subcommand"),
        }
    }

    #[test]
    fn test_candidate_defaults() {
        let config = candidate(&["--port", "1433", "--username", "app", "--password", "secret"]).unwrap();
        assert_eq!(config.auth_mode, AuthMode::Credentials);
        assert_eq!(config.port, Some(1433));
        assert_eq!(config.password.as_ref().map(SecretString::expose), Some("secret"));

        let integrated = candidate(&["--port", "1433"]);
        assert_eq!(integrated.unwrap().auth_mode, AuthMode::WindowsIntegrated);
    }

    #[test]
    fn test_candidate_rejects_bad_port() {
        let error = candidate(&["--port", "abc"]).unwrap_err();
        assert_eq!(error.field(), Some("port"));
    }

    #[test]
    fn test_candidate_rejects_unknown_mode() {
        let error = candidate(&["--port", "1433", "--auth-mode", "ntlm"]).unwrap_err();
        assert!(matches!(error, FemsqError::UnsupportedAuthMode { .. }));
    }

    #[test]
    fn test_settings_view_masks_password() {
        let config = ConnectionConfiguration::new("db.local", Some(1433), "femsq")
            .with_credentials("app", "secret");
        let json = serde_json::to_string(&SettingsView::new(PathBuf::from("/tmp/x"), config)).unwrap();
        assert!(json.contains("\"password\":\"***\""));
        assert!(json.contains("\"authMode\":\"credentials\""));
        assert!(!json.contains("secret"));
    }
}
