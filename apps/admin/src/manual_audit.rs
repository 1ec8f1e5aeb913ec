use std::str::FromStr;

use revtrail_application::{AuditRecorder, AuditSubject, AuditableEntity, RecordOptions};
use revtrail_core::{AppError, AppResult};
use revtrail_domain::{AuditAction, AuditRecord, ChangeSet};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// One administrative audit of an entity that is not loaded in memory.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualAuditRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    #[serde(default)]
    pub changes: ChangeSet,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub no_save: bool,
}

impl AuditableEntity for ManualAuditRequest {
    fn entity_type(&self) -> &str {
        self.entity_type.as_str()
    }

    fn entity_id(&self) -> String {
        self.entity_id.clone()
    }

    fn saved_changes(&self) -> ChangeSet {
        ChangeSet::new()
    }

    fn pending_changes(&self) -> ChangeSet {
        self.changes.clone()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub appended: usize,
    pub previewed: usize,
    pub skipped: usize,
}

pub fn parse_requests(raw: &str) -> AppResult<Vec<ManualAuditRequest>> {
    serde_json::from_str(raw)
        .map_err(|error| AppError::Validation(format!("invalid manual audit requests: {error}")))
}

/// Records each request in manual mode, stopping at the first failure.
pub async fn replay_requests(
    recorder: &AuditRecorder,
    requests: Vec<ManualAuditRequest>,
) -> AppResult<(ReplaySummary, Vec<AuditRecord>)> {
    let mut summary = ReplaySummary::default();
    let mut previews = Vec::new();

    for request in requests {
        let action = AuditAction::from_str(request.action.as_str()).map_err(|_| {
            AppError::Validation(format!(
                "manual audit for '{}' has unknown action '{}'",
                request.entity_type, request.action
            ))
        })?;
        let outcome = recorder
            .create_audit_record_with_context(
                action,
                AuditSubject::Manual(&request),
                RecordOptions {
                    no_save: request.no_save,
                },
                request.context.clone(),
            )
            .await?;

        match outcome {
            Some(record) if record.is_persisted() => {
                summary.appended += 1;
                info!(
                    entity_type = %request.entity_type,
                    entity_id = %request.entity_id,
                    action = %action,
                    audit_record_id = ?record.id,
                    "manual audit appended"
                );
            }
            Some(record) => {
                summary.previewed += 1;
                previews.push(record);
            }
            None => {
                summary.skipped += 1;
                info!(
                    entity_type = %request.entity_type,
                    entity_id = %request.entity_id,
                    action = %action,
                    "manual audit skipped"
                );
            }
        }
    }

    Ok((summary, previews))
}
