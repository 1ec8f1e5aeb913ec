use async_trait::async_trait;
use sqlx::PgPool;

use revtrail_application::SchemaIntrospector;
use revtrail_core::{AppError, AppResult};

/// SQLSTATE raised when the target database does not exist.
const INVALID_CATALOG_NAME: &str = "3D000";

/// PostgreSQL schema metadata for entity tables. Entity types map verbatim
/// (case-sensitive) to table names in the connection's current schema.
#[derive(Clone)]
pub struct PostgresSchemaIntrospector {
    pool: PgPool,
}

impl PostgresSchemaIntrospector {
    /// Creates an introspector with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaIntrospector for PostgresSchemaIntrospector {
    async fn storage_exists(&self, entity_type: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.tables
                WHERE table_schema = current_schema()
                    AND table_name = $1
            )
            "#,
        )
        .bind(entity_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_schema_error("check table existence", entity_type, error))
    }

    async fn column_names(&self, entity_type: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT column_name::TEXT
            FROM information_schema.columns
            WHERE table_schema = current_schema()
                AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_schema_error("list columns", entity_type, error))
    }
}

fn map_schema_error(operation: &str, entity_type: &str, error: sqlx::Error) -> AppError {
    let database_missing = matches!(
        &error,
        sqlx::Error::Database(database_error)
            if database_error.code().as_deref() == Some(INVALID_CATALOG_NAME)
    );

    if database_missing {
        return AppError::Unavailable(format!(
            "database for '{entity_type}' does not exist: {error}"
        ));
    }

    AppError::Internal(format!(
        "failed to {operation} for '{entity_type}': {error}"
    ))
}
