//! revtrail administrative runtime: migrations and manual audit replay.

#![forbid(unsafe_code)]

mod admin_config;
mod manual_audit;

use std::path::Path;
use std::sync::Arc;

use revtrail_application::{AuditPolicyDeclaration, AuditPolicyRegistry, AuditRecorder};
use revtrail_core::{AppError, AppResult};
use revtrail_infrastructure::{
    LifecycleHookTable, MIGRATOR, PostgresAuditRecordStore, PostgresSchemaIntrospector,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use admin_config::{AdminCommand, AdminConfig, init_tracing};
use manual_audit::{parse_requests, replay_requests};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AdminConfig::load()?;
    let pool = connect_pool(config.database_url.as_str(), config.max_connections).await?;

    match &config.command {
        AdminCommand::Migrate => {
            MIGRATOR
                .run(&pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
            info!("audit record migrations applied");
        }
        AdminCommand::Record {
            requests_path,
            policy_file,
        } => {
            let recorder = build_recorder(pool, policy_file).await?;
            let requests = parse_requests(read_file(requests_path).await?.as_str())?;
            let request_count = requests.len();

            let (summary, previews) = replay_requests(&recorder, requests).await?;
            for record in previews {
                let rendered = serde_json::to_string_pretty(&record).map_err(|error| {
                    AppError::Internal(format!("failed to render audit preview: {error}"))
                })?;
                println!("{rendered}");
            }

            info!(
                requests = request_count,
                appended = summary.appended,
                previewed = summary.previewed,
                skipped = summary.skipped,
                "manual audit replay finished"
            );
        }
    }

    Ok(())
}

async fn connect_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn build_recorder(pool: PgPool, policy_file: &Path) -> AppResult<AuditRecorder> {
    let declarations: Vec<AuditPolicyDeclaration> =
        serde_json::from_str(read_file(policy_file).await?.as_str()).map_err(|error| {
            AppError::Configuration(format!(
                "invalid audit policy file '{}': {error}",
                policy_file.display()
            ))
        })?;

    let introspector = PostgresSchemaIntrospector::new(pool.clone());
    let mut hooks = LifecycleHookTable::new();
    let mut registry = AuditPolicyRegistry::new();
    for declaration in declarations {
        registry
            .register_declaration(declaration, &introspector, &mut hooks)
            .await?;
    }

    info!(policies = registry.len(), "audit policies registered");

    Ok(AuditRecorder::new(
        Arc::new(registry),
        Arc::new(PostgresAuditRecordStore::new(pool)),
    ))
}

async fn read_file(path: &Path) -> AppResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|error| {
        AppError::Validation(format!("failed to read '{}': {error}", path.display()))
    })
}
