use std::env;
use std::path::PathBuf;

use revtrail_core::AppError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Migrate,
    Record {
        requests_path: PathBuf,
        policy_file: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub command: AdminCommand,
    pub database_url: String,
    pub max_connections: u32,
}

impl AdminConfig {
    pub fn load() -> Result<Self, AppError> {
        let policy_file = env::var("AUDIT_POLICY_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let command = parse_command(env::args().skip(1).collect(), policy_file)?;
        let database_url = required_non_empty_env("DATABASE_URL")?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .map(|value| {
                value.parse::<u32>().map_err(|error| {
                    AppError::Validation(format!("invalid DATABASE_MAX_CONNECTIONS: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(5);

        Ok(Self {
            command,
            database_url,
            max_connections,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_command(
    args: Vec<String>,
    policy_file: Option<PathBuf>,
) -> Result<AdminCommand, AppError> {
    match args.as_slice() {
        [command] if command == "migrate" => Ok(AdminCommand::Migrate),
        [command, path] if command == "record" => {
            let policy_file = policy_file.ok_or_else(|| {
                AppError::Validation(
                    "AUDIT_POLICY_FILE is required for the record command".to_owned(),
                )
            })?;

            Ok(AdminCommand::Record {
                requests_path: PathBuf::from(path),
                policy_file,
            })
        }
        _ => Err(AppError::Validation(
            "usage: revtrail-admin migrate | revtrail-admin record <requests.json>".to_owned(),
        )),
    }
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
