//! End-to-end record lifecycle tests over the in-memory backends.

use async_trait::async_trait;
use recordio_auth::{
    AuthorizationGateway, EntitlementsProvider, GroupIdentity, MemoryCache,
    PartitionConfigProvider, PolicyDecision, PolicyEvaluator, PolicyRequest,
};
use recordio_common::{
    Acl, Ancestry, ComplianceStatus, Error, Legal, OperationType, PatchOpKind, PatchOperation,
    Record, RecordMetadata, RecordStatus, RequestContext, Result,
};
use recordio_core::legal::{InvalidTag, LegalTagValidator};
use recordio_core::{
    BulkPatchCoordinator, DuplicateDetector, IngestionPipeline, LegalComplianceResolver,
    PersistenceCoordinator, RecordLifecycleManager,
};
use recordio_store::{
    BlobStore, MemoryBlobStore, MemoryMessageBus, MemoryMetadataRepository, MessageBus,
    MetadataRepository,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KIND: &str = "tenant:wks:well:1.0.0";
const OWNERS_GROUP: &str = "data.default.owners@tenant.example.com";
const VIEWERS_GROUP: &str = "data.default.viewers@tenant.example.com";

/// Entitlements fake: group memberships keyed by credential
struct StaticEntitlements {
    by_credential: HashMap<String, Vec<GroupIdentity>>,
}

impl StaticEntitlements {
    fn two_users() -> Self {
        let owner_groups = vec![
            GroupIdentity::new("data.default.owners", OWNERS_GROUP),
            GroupIdentity::new("data.default.viewers", VIEWERS_GROUP),
        ];
        let viewer_groups = vec![GroupIdentity::new("data.default.viewers", VIEWERS_GROUP)];
        let mut by_credential = HashMap::new();
        by_credential.insert("token-a".to_string(), owner_groups);
        by_credential.insert("token-b".to_string(), viewer_groups);
        Self { by_credential }
    }
}

#[async_trait]
impl EntitlementsProvider for StaticEntitlements {
    async fn groups(&self, ctx: &RequestContext) -> Result<Vec<GroupIdentity>> {
        self.by_credential
            .get(&ctx.credential)
            .cloned()
            .ok_or_else(|| Error::forbidden("unknown credential"))
    }
}

struct AcceptingLegalService;

#[async_trait]
impl LegalTagValidator for AcceptingLegalService {
    async fn validate(
        &self,
        _ctx: &RequestContext,
        _tags: &BTreeSet<String>,
    ) -> Result<Vec<InvalidTag>> {
        Ok(Vec::new())
    }

    async fn valid_data_countries(
        &self,
        _ctx: &RequestContext,
    ) -> Result<BTreeMap<String, String>> {
        Ok([("US", "United States"), ("NO", "Norway")]
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect())
    }
}

struct RejectingLegalService;

#[async_trait]
impl LegalTagValidator for RejectingLegalService {
    async fn validate(
        &self,
        _ctx: &RequestContext,
        tags: &BTreeSet<String>,
    ) -> Result<Vec<InvalidTag>> {
        Ok(tags
            .iter()
            .map(|t| InvalidTag {
                name: t.clone(),
                reason: "expired".into(),
            })
            .collect())
    }

    async fn valid_data_countries(
        &self,
        _ctx: &RequestContext,
    ) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }
}

/// Policy evaluator fake with a flippable verdict and a call counter
struct CountingPolicy {
    allow: AtomicBool,
    calls: AtomicUsize,
}

impl CountingPolicy {
    fn allowing() -> Self {
        Self {
            allow: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    fn denying() -> Self {
        Self {
            allow: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PolicyEvaluator for CountingPolicy {
    async fn evaluate(
        &self,
        _ctx: &RequestContext,
        _request: &PolicyRequest,
    ) -> Result<PolicyDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PolicyDecision {
            allow: self.allow.load(Ordering::SeqCst),
        })
    }
}

struct PolicyOnPartitions;

#[async_trait]
impl PartitionConfigProvider for PolicyOnPartitions {
    async fn policy_enabled(&self, _partition_id: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Metadata repository whose upsert can be made to fail on demand
struct FlakyRepository {
    inner: MemoryMetadataRepository,
    fail_upsert: AtomicBool,
}

impl FlakyRepository {
    fn new() -> Self {
        Self {
            inner: MemoryMetadataRepository::new(),
            fail_upsert: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MetadataRepository for FlakyRepository {
    async fn get(&self, id: &str) -> Result<Option<RecordMetadata>> {
        self.inner.get(id).await
    }
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, RecordMetadata>> {
        self.inner.get_many(ids).await
    }
    async fn upsert(&self, records: Vec<RecordMetadata>) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(Error::internal("simulated metadata outage"));
        }
        self.inner.upsert(records).await
    }
    async fn update_with_lock(
        &self,
        records: Vec<RecordMetadata>,
        expected: &HashMap<String, Option<u64>>,
    ) -> Result<Vec<String>> {
        self.inner.update_with_lock(records, expected).await
    }
    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }
}

/// Blob store whose deletes can be made to fail on demand
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    fail_delete: AtomicBool,
}

impl FlakyBlobStore {
    fn new() -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            fail_delete: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn write(
        &self,
        ctx: &RequestContext,
        version_path: &str,
        data: &recordio_common::RecordData,
        acl: &Acl,
    ) -> Result<()> {
        self.inner.write(ctx, version_path, data, acl).await
    }
    async fn read(
        &self,
        ctx: &RequestContext,
        version_path: &str,
    ) -> Result<recordio_common::RecordData> {
        self.inner.read(ctx, version_path).await
    }
    async fn read_many(
        &self,
        ctx: &RequestContext,
        version_paths: &[String],
    ) -> Result<HashMap<String, recordio_common::RecordData>> {
        self.inner.read_many(ctx, version_paths).await
    }
    async fn delete_version(&self, ctx: &RequestContext, version_path: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::internal("simulated blob outage"));
        }
        self.inner.delete_version(ctx, version_path).await
    }
    async fn checksum(&self, ctx: &RequestContext, version_path: &str) -> Result<String> {
        self.inner.checksum(ctx, version_path).await
    }
}

struct Harness {
    repo: Arc<FlakyRepository>,
    blobs: Arc<FlakyBlobStore>,
    bus: Arc<MemoryMessageBus>,
    pipeline: IngestionPipeline,
    patcher: BulkPatchCoordinator,
    lifecycle: RecordLifecycleManager,
}

impl Harness {
    fn new() -> Self {
        Self::build(None, Arc::new(AcceptingLegalService))
    }

    /// Harness for a policy-enabled partition
    fn with_policy(
        evaluator: Arc<dyn PolicyEvaluator>,
        legal_service: Arc<dyn LegalTagValidator>,
    ) -> Self {
        Self::build(Some(evaluator), legal_service)
    }

    fn build(
        policy: Option<Arc<dyn PolicyEvaluator>>,
        legal_service: Arc<dyn LegalTagValidator>,
    ) -> Self {
        let repo = Arc::new(FlakyRepository::new());
        let blobs = Arc::new(FlakyBlobStore::new());
        let bus = Arc::new(MemoryMessageBus::new());

        let repo_dyn: Arc<dyn MetadataRepository> = repo.clone();
        let blobs_dyn: Arc<dyn BlobStore> = blobs.clone();
        let bus_dyn: Arc<dyn MessageBus> = bus.clone();

        let mut gateway = AuthorizationGateway::new(
            Arc::new(StaticEntitlements::two_users()),
            Arc::new(MemoryCache::new()),
        );
        if let Some(evaluator) = policy {
            gateway = gateway.with_policy(
                evaluator,
                Arc::new(PolicyOnPartitions),
                Arc::new(MemoryCache::new()),
                "storage",
                Duration::from_secs(60),
            );
        }
        let auth = Arc::new(gateway);
        let legal = Arc::new(LegalComplianceResolver::new(
            legal_service,
            Arc::new(MemoryCache::new()),
            "US",
        ));
        let persistence = Arc::new(PersistenceCoordinator::new(
            repo_dyn.clone(),
            blobs_dyn.clone(),
            bus_dyn.clone(),
            4,
        ));
        let pipeline = IngestionPipeline::new(
            auth.clone(),
            legal,
            Arc::new(DuplicateDetector::new(blobs_dyn.clone())),
            repo_dyn.clone(),
            persistence.clone(),
        );
        let patcher = BulkPatchCoordinator::new(auth.clone(), repo_dyn.clone(), persistence);
        let lifecycle = RecordLifecycleManager::new(auth, repo_dyn, blobs_dyn, bus_dyn);

        Self {
            repo,
            blobs,
            bus,
            pipeline,
            patcher,
            lifecycle,
        }
    }

    async fn latest_version(&self, id: &str) -> u64 {
        self.repo
            .get(id)
            .await
            .unwrap()
            .unwrap()
            .latest_version()
            .unwrap()
    }
}

fn owner_ctx() -> RequestContext {
    RequestContext::new("tenant", "user-a@example.com", "token-a")
}

fn viewer_ctx() -> RequestContext {
    RequestContext::new("tenant", "user-b@example.com", "token-b")
}

fn record(id: &str, payload: serde_json::Value) -> Record {
    Record {
        id: Some(id.to_string()),
        kind: KIND.to_string(),
        acl: Acl {
            viewers: vec![VIEWERS_GROUP.to_string()],
            owners: vec![OWNERS_GROUP.to_string()],
        },
        legal: Legal {
            legaltags: ["tenant-public".to_string()].into_iter().collect(),
            other_relevant_data_countries: BTreeSet::new(),
            status: None,
        },
        ancestry: None,
        data: payload,
        tags: Default::default(),
    }
}

// Ingestion

#[tokio::test]
async fn test_ingest_new_records() {
    let h = Harness::new();
    let info = h
        .pipeline
        .ingest(
            &owner_ctx(),
            vec![
                record("tenant:well:a", serde_json::json!({"name": "a"})),
                record("tenant:well:b", serde_json::json!({"name": "b"})),
            ],
            false,
        )
        .await
        .unwrap();

    assert_eq!(info.record_count, 2);
    assert!(info.skipped_record_ids.is_empty());

    for id in ["tenant:well:a", "tenant:well:b"] {
        let meta = h.repo.get(id).await.unwrap().unwrap();
        assert_eq!(meta.status, RecordStatus::Active);
        assert_eq!(meta.version_paths.len(), 1);
        assert_eq!(meta.legal.status, Some(ComplianceStatus::Compliant));
        assert_eq!(meta.create_user, "user-a@example.com");
    }

    let events = h.bus.published();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.op == OperationType::Create));
}

#[tokio::test]
async fn test_ingest_generates_missing_ids() {
    let h = Harness::new();
    let mut no_id = record("tenant:well:x", serde_json::json!({"name": "x"}));
    no_id.id = None;

    let info = h.pipeline.ingest(&owner_ctx(), vec![no_id], false).await.unwrap();
    assert_eq!(info.record_count, 1);
    assert_eq!(h.repo.inner.len(), 1);
}

#[tokio::test]
async fn test_ingest_rejects_structural_problems() {
    let h = Harness::new();
    let ctx = owner_ctx();

    let mut bad_kind = record("tenant:well:a", serde_json::json!({}));
    bad_kind.kind = "not-a-kind".into();
    assert!(matches!(
        h.pipeline.ingest(&ctx, vec![bad_kind], false).await.unwrap_err(),
        Error::InvalidKind(_)
    ));

    let wrong_tenant = record("other:well:a", serde_json::json!({}));
    assert!(matches!(
        h.pipeline.ingest(&ctx, vec![wrong_tenant], false).await.unwrap_err(),
        Error::InvalidRecordId(_)
    ));

    let twice = vec![
        record("tenant:well:a", serde_json::json!({"v": 1})),
        record("tenant:well:a", serde_json::json!({"v": 2})),
    ];
    assert!(matches!(
        h.pipeline.ingest(&ctx, twice, false).await.unwrap_err(),
        Error::InvalidRequest(_)
    ));

    let mut no_tags = record("tenant:well:a", serde_json::json!({}));
    no_tags.legal.legaltags.clear();
    assert!(matches!(
        h.pipeline.ingest(&ctx, vec![no_tags], false).await.unwrap_err(),
        Error::InvalidLegalTag(_)
    ));
}

#[tokio::test]
async fn test_ingest_rejects_foreign_acl_domain() {
    let h = Harness::new();
    let mut foreign = record("tenant:well:a", serde_json::json!({}));
    foreign.acl.owners.push("data.other@elsewhere.example.com".into());

    let err = h
        .pipeline
        .ingest(&owner_ctx(), vec![foreign], false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAcl(_)));
    assert!(h.repo.inner.is_empty());
}

#[tokio::test]
async fn test_update_by_non_owner_is_forbidden() {
    let h = Harness::new();
    h.pipeline
        .ingest(
            &owner_ctx(),
            vec![record("tenant:well:a", serde_json::json!({"v": 1}))],
            false,
        )
        .await
        .unwrap();

    let err = h
        .pipeline
        .ingest(
            &viewer_ctx(),
            vec![record("tenant:well:a", serde_json::json!({"v": 2}))],
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 403);

    // No version path appended
    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert_eq!(meta.version_paths.len(), 1);
}

#[tokio::test]
async fn test_update_appends_version_and_keeps_history() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();
    let first = h.latest_version("tenant:well:a").await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 2}))], false)
        .await
        .unwrap();

    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert_eq!(meta.version_paths.len(), 2);
    assert!(meta.has_version(first));
    assert!(meta.latest_version().unwrap() > first);
    assert_eq!(meta.create_user, "user-a@example.com");
    assert_eq!(meta.modify_user.as_deref(), Some("user-a@example.com"));
    assert!(h.blobs.inner.contains(meta.latest_version_path().unwrap()));
}

#[tokio::test]
async fn test_identical_update_is_skipped_with_skip_duplicates() {
    let h = Harness::new();
    let ctx = owner_ctx();
    let payload = serde_json::json!({"depth": 123});
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", payload.clone())], false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let info = h
        .pipeline
        .ingest(&ctx, vec![record("tenant:well:a", payload)], true)
        .await
        .unwrap();

    assert_eq!(info.record_count, 0);
    assert_eq!(info.skipped_record_ids, vec!["tenant:well:a".to_string()]);
    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert_eq!(meta.version_paths.len(), 1);
}

#[tokio::test]
async fn test_missing_parent_fails_batch() {
    let h = Harness::new();
    let mut child = record("tenant:well:child", serde_json::json!({}));
    child.ancestry = Some(Ancestry {
        parents: ["tenant:well:ghost:123".to_string()].into_iter().collect(),
    });

    let err = h
        .pipeline
        .ingest(&owner_ctx(), vec![child], false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.repo.inner.is_empty());
}

#[tokio::test]
async fn test_child_inherits_parent_legal_tags() {
    let h = Harness::new();
    let ctx = owner_ctx();

    let mut parent = record("tenant:well:parent", serde_json::json!({"v": 1}));
    parent.legal.legaltags.insert("tenant-parent-only".into());
    h.pipeline.ingest(&ctx, vec![parent], false).await.unwrap();
    let parent_version = h.latest_version("tenant:well:parent").await;

    let mut child = record("tenant:well:child", serde_json::json!({"v": 1}));
    child.ancestry = Some(Ancestry {
        parents: [format!("tenant:well:parent:{parent_version}")]
            .into_iter()
            .collect(),
    });
    h.pipeline.ingest(&ctx, vec![child], false).await.unwrap();

    let parent_meta = h.repo.get("tenant:well:parent").await.unwrap().unwrap();
    let child_meta = h.repo.get("tenant:well:child").await.unwrap().unwrap();
    assert!(child_meta
        .legal
        .legaltags
        .is_superset(&parent_meta.legal.legaltags));
    assert_eq!(child_meta.legal.status, Some(ComplianceStatus::Compliant));
}

#[tokio::test]
async fn test_metadata_failure_rolls_back_new_payload_version() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();
    let first_path = h
        .repo
        .get("tenant:well:a")
        .await
        .unwrap()
        .unwrap()
        .latest_version_path()
        .unwrap()
        .to_string();

    tokio::time::sleep(Duration::from_millis(5)).await;
    h.repo.fail_upsert.store(true, Ordering::SeqCst);
    let err = h
        .pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 2}))], false)
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 500);

    // The uncommitted version is gone; the committed one is untouched
    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert_eq!(meta.version_paths.len(), 1);
    assert!(h.blobs.inner.contains(&first_path));
}

// Policy-enabled partitions

#[tokio::test]
async fn test_policy_mode_evaluates_creates() {
    let policy = Arc::new(CountingPolicy::denying());
    let h = Harness::with_policy(policy.clone(), Arc::new(AcceptingLegalService));

    let err = h
        .pipeline
        .ingest(
            &owner_ctx(),
            vec![record("tenant:well:a", serde_json::json!({"v": 1}))],
            false,
        )
        .await
        .unwrap_err();

    assert_eq!(err.http_status_code(), 403);
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
    assert!(h.repo.inner.is_empty());
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn test_policy_mode_replaces_entitlements_and_legal_checks() {
    // The legal service rejects every tag and one ACL entry is from a
    // foreign domain; in policy mode neither check runs
    let policy = Arc::new(CountingPolicy::allowing());
    let h = Harness::with_policy(policy.clone(), Arc::new(RejectingLegalService));

    let mut foreign = record("tenant:well:a", serde_json::json!({"v": 1}));
    foreign.acl.owners.push("data.other@elsewhere.example.com".into());

    let info = h
        .pipeline
        .ingest(&owner_ctx(), vec![foreign], false)
        .await
        .unwrap();

    assert_eq!(info.record_count, 1);
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.repo.inner.len(), 1);
}

#[tokio::test]
async fn test_policy_mode_evaluates_updates() {
    let policy = Arc::new(CountingPolicy::allowing());
    let h = Harness::with_policy(policy.clone(), Arc::new(AcceptingLegalService));
    let ctx = owner_ctx();

    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();

    policy.allow.store(false, Ordering::SeqCst);
    let err = h
        .pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 2}))], false)
        .await
        .unwrap_err();

    assert_eq!(err.http_status_code(), 403);
    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert_eq!(meta.version_paths.len(), 1);
}

// Bulk patch

#[tokio::test]
async fn test_patch_respects_optimistic_lock() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(
            &ctx,
            vec![
                record("tenant:well:a", serde_json::json!({"v": 1})),
                record("tenant:well:b", serde_json::json!({"v": 1})),
            ],
            false,
        )
        .await
        .unwrap();

    let current_a = h.latest_version("tenant:well:a").await;
    let stale_b = h.latest_version("tenant:well:b").await - 1;

    let ids = vec![
        format!("tenant:well:a:{current_a}"),
        format!("tenant:well:b:{stale_b}"),
    ];
    let ops = vec![PatchOperation {
        op: PatchOpKind::Add,
        path: "/tags".into(),
        value: vec!["env:prod".into()],
    }];
    let outcome = h.patcher.apply_patches(&ctx, &ids, &ops).await.unwrap();

    assert_eq!(outcome.applied, vec![format!("tenant:well:a:{current_a}")]);
    assert_eq!(outcome.locked, vec![format!("tenant:well:b:{stale_b}")]);
    assert!(outcome.not_found.is_empty());
    assert!(outcome.unauthorized.is_empty());

    // Locked record was not mutated, applied one was; neither got a new version
    let meta_a = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    let meta_b = h.repo.get("tenant:well:b").await.unwrap().unwrap();
    assert_eq!(meta_a.tags.get("env").map(String::as_str), Some("prod"));
    assert!(meta_b.tags.is_empty());
    assert_eq!(meta_a.version_paths.len(), 1);
}

#[tokio::test]
async fn test_patch_partitions_missing_and_unauthorized_ids() {
    let h = Harness::new();
    h.pipeline
        .ingest(
            &owner_ctx(),
            vec![record("tenant:well:a", serde_json::json!({"v": 1}))],
            false,
        )
        .await
        .unwrap();

    let ids = vec!["tenant:well:a".to_string(), "tenant:well:ghost".to_string()];
    let ops = vec![PatchOperation {
        op: PatchOpKind::Add,
        path: "/tags".into(),
        value: vec!["env:prod".into()],
    }];
    let outcome = h.patcher.apply_patches(&viewer_ctx(), &ids, &ops).await.unwrap();

    assert_eq!(outcome.unauthorized, vec!["tenant:well:a".to_string()]);
    assert_eq!(outcome.not_found, vec!["tenant:well:ghost".to_string()]);
    assert!(outcome.applied.is_empty());
}

#[tokio::test]
async fn test_patch_rejects_duplicate_record_ids() {
    let h = Harness::new();
    h.pipeline
        .ingest(
            &owner_ctx(),
            vec![record("tenant:well:a", serde_json::json!({"v": 1}))],
            false,
        )
        .await
        .unwrap();

    // Same record supplied twice, once with a version and once bare
    let ids = vec!["tenant:well:a:5".to_string(), "tenant:well:a".to_string()];
    let ops = vec![PatchOperation {
        op: PatchOpKind::Add,
        path: "/tags".into(),
        value: vec!["env:prod".into()],
    }];
    let err = h
        .patcher
        .apply_patches(&owner_ctx(), &ids, &ops)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidRequest(_)));
    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert!(meta.tags.is_empty());
}

// Delete and purge

#[tokio::test]
async fn test_soft_delete_hides_record_from_second_delete() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();

    h.lifecycle.soft_delete(&ctx, "tenant:well:a").await.unwrap();

    let meta = h.repo.get("tenant:well:a").await.unwrap().unwrap();
    assert_eq!(meta.status, RecordStatus::Deleted);
    assert_eq!(meta.version_paths.len(), 1);
    assert!(h.blobs.inner.contains(meta.latest_version_path().unwrap()));

    let err = h
        .lifecycle
        .soft_delete(&ctx, "tenant:well:a")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_soft_delete_requires_owner() {
    let h = Harness::new();
    h.pipeline
        .ingest(
            &owner_ctx(),
            vec![record("tenant:well:a", serde_json::json!({"v": 1}))],
            false,
        )
        .await
        .unwrap();

    let err = h
        .lifecycle
        .soft_delete(&viewer_ctx(), "tenant:well:a")
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 403);
}

#[tokio::test]
async fn test_purge_removes_metadata_and_all_versions() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 2}))], false)
        .await
        .unwrap();
    let paths = h
        .repo
        .get("tenant:well:a")
        .await
        .unwrap()
        .unwrap()
        .version_paths
        .clone();
    assert_eq!(paths.len(), 2);

    h.lifecycle.purge(&ctx, "tenant:well:a").await.unwrap();

    assert!(h.repo.get("tenant:well:a").await.unwrap().is_none());
    for path in &paths {
        assert!(!h.blobs.inner.contains(path));
    }
    let last = h.bus.published().pop().unwrap();
    assert_eq!(last.op, OperationType::Purge);
}

#[tokio::test]
async fn test_purge_restores_metadata_when_blob_delete_fails() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();

    h.blobs.fail_delete.store(true, Ordering::SeqCst);
    let err = h.lifecycle.purge(&ctx, "tenant:well:a").await.unwrap_err();
    assert_eq!(err.http_status_code(), 500);

    // The record is still fully there
    let meta = h.repo.get("tenant:well:a").await.unwrap();
    assert!(meta.is_some());
    assert!(h
        .blobs
        .inner
        .contains(meta.unwrap().latest_version_path().unwrap()));
}

#[tokio::test]
async fn test_purge_works_on_soft_deleted_records() {
    let h = Harness::new();
    let ctx = owner_ctx();
    h.pipeline
        .ingest(&ctx, vec![record("tenant:well:a", serde_json::json!({"v": 1}))], false)
        .await
        .unwrap();

    h.lifecycle.soft_delete(&ctx, "tenant:well:a").await.unwrap();
    h.lifecycle.purge(&ctx, "tenant:well:a").await.unwrap();
    assert!(h.repo.get("tenant:well:a").await.unwrap().is_none());
}
