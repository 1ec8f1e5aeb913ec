use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use revtrail_core::{AppError, AppResult};
use revtrail_domain::{
    AuditAction, AuditOptions, AuditRecord, ChangeSet, FieldChange, FieldSpec, LifecycleHook,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AuditPolicyRegistry, AuditRecordStore, AuditableEntity, LifecycleHookRegistrar,
    SchemaIntrospector, with_audit_context,
};

use super::{AuditRecorder, AuditSubject, RecordOptions};

#[derive(Default)]
struct FakeStore {
    records: Mutex<Vec<AuditRecord>>,
    fail: bool,
}

impl FakeStore {
    fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl AuditRecordStore for FakeStore {
    async fn append_record(&self, mut record: AuditRecord) -> AppResult<AuditRecord> {
        if self.fail {
            return Err(AppError::Persistence(
                "insert into audit_records failed".to_owned(),
            ));
        }

        record.id = Some(Uuid::new_v4());
        record.recorded_at = Some(Utc::now());
        self.records.lock().await.push(record.clone());
        Ok(record)
    }
}

struct FakeSchema;

#[async_trait]
impl SchemaIntrospector for FakeSchema {
    async fn storage_exists(&self, _entity_type: &str) -> AppResult<bool> {
        Ok(true)
    }

    async fn column_names(&self, _entity_type: &str) -> AppResult<Vec<String>> {
        Ok(["id", "name", "secret", "settings", "created_at", "updated_at"]
            .into_iter()
            .map(str::to_owned)
            .collect())
    }
}

struct NoopHooks;

impl LifecycleHookRegistrar for NoopHooks {
    fn register_hooks(&mut self, _entity_type: &str, _hooks: &[LifecycleHook]) -> AppResult<()> {
        Ok(())
    }
}

struct FakeEntity {
    entity_type: &'static str,
    id: &'static str,
    saved: ChangeSet,
    pending: ChangeSet,
}

impl FakeEntity {
    fn account(saved: ChangeSet, pending: ChangeSet) -> Self {
        Self {
            entity_type: "accounts",
            id: "acc-1",
            saved,
            pending,
        }
    }
}

impl AuditableEntity for FakeEntity {
    fn entity_type(&self) -> &str {
        self.entity_type
    }

    fn entity_id(&self) -> String {
        self.id.to_owned()
    }

    fn saved_changes(&self) -> ChangeSet {
        self.saved.clone()
    }

    fn pending_changes(&self) -> ChangeSet {
        self.pending.clone()
    }
}

async fn recorder_with(options: AuditOptions, store: Arc<FakeStore>) -> AuditRecorder {
    let mut registry = AuditPolicyRegistry::new();
    let registered = registry
        .register(
            "accounts",
            FieldSpec::all().except(["secret"]),
            options,
            &FakeSchema,
            &mut NoopHooks,
        )
        .await;
    assert!(registered.is_ok());

    AuditRecorder::new(Arc::new(registry), store)
}

fn unwrap_record(result: AppResult<Option<AuditRecord>>) -> AuditRecord {
    match result {
        Ok(Some(record)) => record,
        Ok(None) => panic!("expected an audit record"),
        Err(error) => panic!("unexpected error: {error}"),
    }
}

#[tokio::test]
async fn create_yields_one_record_restricted_to_auditable_fields() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new()
            .with_change("id", Value::Null, "acc-1")
            .with_change("name", Value::Null, "Alice")
            .with_change("secret", Value::Null, "x"),
        ChangeSet::new(),
    );

    let record = unwrap_record(
        recorder
            .handle_lifecycle_event(LifecycleHook::AfterCreate, &entity)
            .await,
    );

    assert_eq!(record.action, AuditAction::Create);
    assert!(record.is_persisted());
    assert_eq!(
        serde_json::to_value(&record.diff).unwrap_or_default(),
        json!({"name": [null, "Alice"]})
    );
    assert_eq!(store.records.lock().await.len(), 1);
}

#[tokio::test]
async fn update_persists_only_auditable_changes() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new()
            .with_change("name", "Alice", "Bob")
            .with_change("secret", "x", "y"),
        ChangeSet::new(),
    );

    let record = unwrap_record(
        recorder
            .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
            .await,
    );

    assert_eq!(
        serde_json::to_value(&record.diff).unwrap_or_default(),
        json!({"name": ["Alice", "Bob"]})
    );
    assert_eq!(record.auditable.entity_type.as_str(), "accounts");
    assert_eq!(record.auditable.entity_id, "acc-1");
}

#[tokio::test]
async fn actions_outside_policy_produce_no_record() {
    let store = Arc::new(FakeStore::default());
    let recorder =
        recorder_with(AuditOptions::default().when(["create"]), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new(),
    );

    let update = recorder
        .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
        .await;
    let destroy = recorder
        .handle_lifecycle_event(LifecycleHook::AfterDestroy, &entity)
        .await;

    assert!(matches!(update, Ok(None)));
    assert!(matches!(destroy, Ok(None)));
    assert!(store.records.lock().await.is_empty());
}

#[tokio::test]
async fn unregistered_entity_types_are_skipped() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity {
        entity_type: "sessions",
        id: "s-1",
        saved: ChangeSet::new().with_change("token", "a", "b"),
        pending: ChangeSet::new(),
    };

    let result = recorder
        .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
        .await;

    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn empty_update_is_suppressed_but_destroy_is_recorded() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("secret", "x", "y"),
        ChangeSet::new(),
    );

    let update = recorder
        .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
        .await;
    let destroy = recorder
        .handle_lifecycle_event(LifecycleHook::AfterDestroy, &entity)
        .await;

    assert!(matches!(update, Ok(None)));
    let record = unwrap_record(destroy);
    assert_eq!(record.action, AuditAction::Destroy);
    assert!(record.diff.is_empty());
    assert_eq!(store.records.lock().await.len(), 1);
}

#[tokio::test]
async fn empty_update_is_recorded_when_suppression_disabled() {
    let store = Arc::new(FakeStore::default());
    let recorder =
        recorder_with(AuditOptions::default().ignore_empty_diff(false), store.clone()).await;
    let entity = FakeEntity::account(ChangeSet::new(), ChangeSet::new());

    let record = unwrap_record(
        recorder
            .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
            .await,
    );

    assert!(record.diff.is_empty());
}

#[tokio::test]
async fn lifecycle_mode_merges_saved_and_pending_and_drops_no_ops() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new()
            .with_change("name", "Alice", "Bob")
            .with_change("settings", json!({"theme": "dark"}), json!({"theme": "dark"})),
        ChangeSet::new().with_change("nickname", Value::Null, "bobby"),
    );

    let mut registry = AuditPolicyRegistry::new();
    let registered = registry
        .register(
            "accounts",
            FieldSpec::explicit(["name", "settings", "nickname"]),
            AuditOptions::default(),
            &FakeSchema,
            &mut NoopHooks,
        )
        .await;
    assert!(registered.is_ok());
    let recorder_with_virtual =
        AuditRecorder::new(Arc::new(registry), store.clone() as Arc<dyn AuditRecordStore>);

    let record = unwrap_record(
        recorder_with_virtual
            .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
            .await,
    );

    assert_eq!(record.diff.len(), 2);
    assert_eq!(record.diff.get("name"), Some(&FieldChange::new("Alice", "Bob")));
    assert_eq!(
        record.diff.get("nickname"),
        Some(&FieldChange::new(Value::Null, "bobby"))
    );
    assert!(!record.diff.contains("settings"));

    let settings_only = FakeEntity::account(
        ChangeSet::new().with_change("settings", json!([1, 2]), json!([1, 2])),
        ChangeSet::new(),
    );
    let suppressed = recorder
        .handle_lifecycle_event(LifecycleHook::AfterUpdate, &settings_only)
        .await;
    assert!(matches!(suppressed, Ok(None)));
}

#[tokio::test]
async fn manual_mode_uses_only_pending_changes_and_keeps_no_ops() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new().with_change("settings", json!({"a": 1}), json!({"a": 1})),
    );

    let record = unwrap_record(
        recorder
            .create_audit_record_with_context(
                AuditAction::Update,
                AuditSubject::Manual(&entity),
                RecordOptions::default(),
                json!({"initiator": "admin:backfill"}),
            )
            .await,
    );

    assert!(!record.diff.contains("name"));
    assert_eq!(
        record.diff.get("settings"),
        Some(&FieldChange::new(json!({"a": 1}), json!({"a": 1})))
    );
    assert_eq!(record.initiator, Some(json!("admin:backfill")));
}

#[tokio::test]
async fn initiator_precedence_and_residual_context() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new(),
    );

    let record = unwrap_record(
        with_audit_context(
            json!({"initiator": "A", "current_user": "B", "request_id": "req-42"}),
            recorder.handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity),
        )
        .await,
    );

    assert_eq!(record.initiator, Some(json!("A")));
    assert!(!record.context.contains_key("initiator"));
    assert!(!record.context.contains_key("current_user"));
    assert_eq!(record.context.get("request_id"), Some(&json!("req-42")));
}

#[tokio::test]
async fn missing_context_yields_null_initiator() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new(),
    );

    let record = unwrap_record(
        recorder
            .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
            .await,
    );

    assert!(record.initiator.is_none());
    assert!(record.context.is_empty());
}

#[tokio::test]
async fn malformed_context_is_an_error() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new(),
    );

    let result = with_audit_context(
        json!(42),
        recorder.handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity),
    )
    .await;

    assert!(matches!(result, Err(AppError::InvalidContext(_))));
    assert!(store.records.lock().await.is_empty());
}

#[tokio::test]
async fn no_save_returns_unsaved_record() {
    let store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), store.clone()).await;
    let entity = FakeEntity::account(
        ChangeSet::new(),
        ChangeSet::new().with_change("name", "Alice", "Bob"),
    );

    let record = unwrap_record(
        recorder
            .create_audit_record(
                AuditAction::Update,
                AuditSubject::Manual(&entity),
                RecordOptions { no_save: true },
            )
            .await,
    );

    assert!(!record.is_persisted());
    assert!(record.recorded_at.is_none());
    assert!(store.records.lock().await.is_empty());
}

#[tokio::test]
async fn persistence_failure_propagates() {
    let recorder = recorder_with(AuditOptions::default(), Arc::new(FakeStore::failing())).await;
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new(),
    );

    let result = recorder
        .handle_lifecycle_event(LifecycleHook::AfterUpdate, &entity)
        .await;

    assert!(matches!(result, Err(AppError::Persistence(_))));
}

#[tokio::test]
async fn caller_supplied_store_receives_the_record() {
    let own_store = Arc::new(FakeStore::default());
    let recorder = recorder_with(AuditOptions::default(), own_store.clone()).await;
    let scoped_store = FakeStore::default();
    let entity = FakeEntity::account(
        ChangeSet::new().with_change("name", "Alice", "Bob"),
        ChangeSet::new(),
    );

    let record = unwrap_record(
        with_audit_context(
            json!({"initiator": "billing-job"}),
            recorder.handle_lifecycle_event_in(LifecycleHook::AfterUpdate, &entity, &scoped_store),
        )
        .await,
    );

    assert!(record.is_persisted());
    assert_eq!(record.initiator, Some(json!("billing-job")));
    assert_eq!(scoped_store.records.lock().await.len(), 1);
    assert!(own_store.records.lock().await.is_empty());
}
