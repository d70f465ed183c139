//! Job lifecycle tests: request handling, pipeline, control operations

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use provisioning_engine::*;
use provisioning_types::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify, Semaphore};

struct Harness {
    orchestrator: Arc<Orchestrator>,
    store: Arc<InMemoryJobStore>,
    secrets: Arc<InMemorySecretsStore>,
    clock: Arc<ManualClock>,
    events: broadcast::Receiver<EventEnvelope>,
}

fn catalog() -> InMemoryTemplateCatalog {
    InMemoryTemplateCatalog::with_templates([
        TemplateDefinition::new("tmplA", "Template A")
            .with_dependencies(&["validation", "provisioning"])
            .with_field(FieldSchema::new("region", FieldType::String).required())
            .with_field(FieldSchema::new("apiKey", FieldType::String)),
        TemplateDefinition::new("bare", "No dependencies"),
    ])
    .unwrap()
}

fn harness_with(executor: Arc<dyn StageExecutor>) -> Harness {
    let store = Arc::new(InMemoryJobStore::new());
    let secrets = Arc::new(InMemorySecretsStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let notifier = Arc::new(BroadcastNotifier::new(64));
    let events = notifier.subscribe();

    let orchestrator = OrchestratorBuilder::new()
        .with_config(ProvisioningConfig::default())
        .with_store(store.clone())
        .with_catalog(Arc::new(catalog()))
        .with_secrets(secrets.clone())
        .with_executor(executor)
        .with_notifier(notifier)
        .with_clock(clock.clone())
        .build()
        .unwrap();

    Harness {
        orchestrator,
        store,
        secrets,
        clock,
        events,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(SimulatedStageExecutor::reliable()))
}

fn tmpl_a_config() -> Configuration {
    let mut config = Configuration::new();
    config.insert("apiKey".into(), json!("x"));
    config.insert("region".into(), json!("us"));
    config
}

async fn start(h: &Harness, user: &str) -> JobId {
    h.orchestrator
        .start_provisioning(
            UserId::new(user),
            WorkflowId::new("wf1"),
            TemplateId::new("tmplA"),
            tmpl_a_config(),
        )
        .await
        .unwrap()
        .job_id
}

async fn job(h: &Harness, id: &JobId) -> Job {
    h.orchestrator.get_job_status(id).await.unwrap().unwrap()
}

fn drain(events: &mut broadcast::Receiver<EventEnvelope>) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        kinds.push(envelope.event.kind());
    }
    kinds
}

/// Fails the given stage, succeeds otherwise
struct FailingAt(Stage);

#[async_trait]
impl StageExecutor for FailingAt {
    async fn execute(&self, _job: &Job, stage: Stage) -> std::result::Result<(), StageError> {
        if stage == self.0 {
            return Err(StageError::Failed(format!("{} exploded", stage)));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ── Requests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_provisioning_reaches_ready() {
    let mut h = harness();
    let ticket = h
        .orchestrator
        .start_provisioning(
            UserId::new("u1"),
            WorkflowId::new("wf1"),
            TemplateId::new("tmplA"),
            tmpl_a_config(),
        )
        .await
        .unwrap();

    assert_eq!(ticket.status, JobStatus::Pending);
    assert!(ticket.estimated_completion >= h.clock.now());

    let created = job(&h, &ticket.job_id).await;
    assert_eq!(created.status, JobStatus::Pending);
    let steps: Vec<_> = created
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.status))
        .collect();
    assert_eq!(
        steps,
        vec![
            ("validation", StepStatus::Pending),
            ("provisioning", StepStatus::Pending)
        ]
    );
    assert_eq!(created.secret_refs.len(), 1);
    assert!(h.orchestrator.queue().contains(&ticket.job_id));

    let stored = h
        .secrets
        .secrets_for(&UserId::new("u1"), &WorkflowId::new("wf1"))
        .await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key, "apiKey");

    h.orchestrator.drive_job(&ticket.job_id).await;

    let ready = job(&h, &ticket.job_id).await;
    assert_eq!(ready.status, JobStatus::Ready);
    let webhook = ready.webhook_url.clone().unwrap();
    assert!(webhook.ends_with(&format!("/wf1/{}", ready.id)));
    assert!(ready
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));
    assert_eq!(ready.stages.len(), 4);
    assert!(ready.stages.iter().all(|r| r.completed_at.is_some() && r.error.is_none()));
    assert!(ready.completed_at.is_some());
    // Four simulated stage delays of virtual time
    assert!(ready.completion_secs().unwrap() >= 8.0);

    assert_eq!(drain(&mut h.events), vec!["job_queued", "job_ready"]);
}

#[tokio::test]
async fn test_oversized_estimate_saturates_completion_time() {
    let catalog = InMemoryTemplateCatalog::with_templates([
        TemplateDefinition::new("glacial", "Glacial").with_estimated_duration(10_000_000_000_000),
    ])
    .unwrap();
    let orchestrator = OrchestratorBuilder::new()
        .with_config(ProvisioningConfig::immediate())
        .with_catalog(Arc::new(catalog))
        .with_secrets(Arc::new(InMemorySecretsStore::new()))
        .build()
        .unwrap();

    let ticket = orchestrator
        .start_provisioning(
            UserId::new("u1"),
            WorkflowId::new("wf1"),
            TemplateId::new("glacial"),
            Configuration::new(),
        )
        .await
        .unwrap();

    assert_eq!(ticket.estimated_completion, chrono::DateTime::<Utc>::MAX_UTC);
    assert_eq!(ticket.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_missing_required_field_creates_no_job() {
    let h = harness();
    let mut config = Configuration::new();
    config.insert("apiKey".into(), json!("x"));

    let err = h
        .orchestrator
        .start_provisioning(
            UserId::new("u1"),
            WorkflowId::new("wf1"),
            TemplateId::new("tmplA"),
            config,
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(err.validation_errors(), ["Field 'region' is required"]);
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert!(h.orchestrator.queue().is_empty());
    assert!(h.secrets.is_empty().await);
}

#[tokio::test]
async fn test_unknown_template_rejected() {
    let h = harness();
    let err = h
        .orchestrator
        .start_provisioning(
            UserId::new("u1"),
            WorkflowId::new("wf1"),
            TemplateId::new("missing"),
            Configuration::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.validation_errors(), ["Template 'missing' not found"]);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_no_credentials_skips_secrets_store() {
    let h = harness();
    let ticket = h
        .orchestrator
        .start_provisioning(
            UserId::new("u1"),
            WorkflowId::new("wf2"),
            TemplateId::new("bare"),
            Configuration::new(),
        )
        .await
        .unwrap();

    let created = job(&h, &ticket.job_id).await;
    assert!(created.steps.is_empty());
    assert!(created.secret_refs.is_empty());
    assert!(h.secrets.is_empty().await);
}

// ── Pipeline failures ───────────────────────────────────────────────

#[tokio::test]
async fn test_stage_failure_halts_pipeline() {
    let mut h = harness_with(Arc::new(FailingAt(Stage::Configuring)));
    let id = start(&h, "u1").await;

    h.orchestrator.drive_job(&id).await;

    let failed = job(&h, &id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("configuring exploded"));
    assert!(failed.webhook_url.is_none());

    let stages: Vec<_> = failed.stages.iter().map(|r| r.stage).collect();
    assert_eq!(
        stages,
        vec![Stage::Validating, Stage::Provisioning, Stage::Configuring]
    );
    assert_eq!(
        failed.stages[2].error.as_deref(),
        Some("configuring exploded")
    );
    // Dependencies were provisioned before the failure
    assert!(failed
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));

    assert_eq!(drain(&mut h.events), vec!["job_queued", "job_failed"]);
}

#[tokio::test]
async fn test_provisioning_failure_fails_steps() {
    let h = harness_with(Arc::new(FailingAt(Stage::Provisioning)));
    let id = start(&h, "u1").await;

    h.orchestrator.drive_job(&id).await;

    let failed = job(&h, &id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.steps.iter().all(|s| s.status == StepStatus::Failed
        && s.error_message.as_deref() == Some("provisioning exploded")));
}

#[tokio::test(start_paused = true)]
async fn test_stage_timeout_fails_job() {
    struct Stuck;

    #[async_trait]
    impl StageExecutor for Stuck {
        async fn execute(&self, _job: &Job, _stage: Stage) -> std::result::Result<(), StageError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &str {
            "stuck"
        }
    }

    let h = harness_with(Arc::new(Stuck));
    let id = start(&h, "u1").await;

    h.orchestrator.drive_job(&id).await;

    let failed = job(&h, &id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error_message
        .unwrap()
        .contains("validating timed out"));
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_owner_cancels_pending_job() {
    let mut h = harness();
    let id = start(&h, "u1").await;

    assert!(h.orchestrator.cancel_job(&id, &Actor::user("u1")).await);

    let cancelled = job(&h, &id).await;
    assert_eq!(cancelled.status, JobStatus::Failed);
    assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_BY_USER));
    assert!(!h.orchestrator.queue().contains(&id));

    // Already failed
    assert!(!h.orchestrator.cancel_job(&id, &Actor::user("u1")).await);
    assert_eq!(drain(&mut h.events), vec!["job_queued", "job_cancelled"]);
}

#[tokio::test]
async fn test_cancel_by_non_owner_leaves_job_unchanged() {
    let h = harness();
    let id = start(&h, "u1").await;
    let before = job(&h, &id).await;

    assert!(!h.orchestrator.cancel_job(&id, &Actor::user("u2")).await);

    let after = job(&h, &id).await;
    assert_eq!(after.status, JobStatus::Pending);
    assert_eq!(after.updated_at, before.updated_at);
    assert!(h.orchestrator.queue().contains(&id));
}

#[tokio::test]
async fn test_admin_may_cancel_any_job() {
    let h = harness();
    let id = start(&h, "u1").await;
    assert!(h.orchestrator.cancel_job(&id, &Actor::admin("ops")).await);
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let h = harness();
    assert!(
        !h.orchestrator
            .cancel_job(&JobId::generate(), &Actor::user("u1"))
            .await
    );
}

#[tokio::test]
async fn test_cancelled_job_is_not_driven() {
    let h = harness();
    let id = start(&h, "u1").await;
    assert!(h.orchestrator.cancel_job(&id, &Actor::user("u1")).await);

    h.orchestrator.drive_job(&id).await;

    let after = job(&h, &id).await;
    assert_eq!(after.status, JobStatus::Failed);
    assert!(after.stages.is_empty());
    assert_eq!(after.error_message.as_deref(), Some(CANCELLED_BY_USER));
}

/// Holds the given stage open until released, recording every stage it runs
struct HoldAt {
    stage: Stage,
    entered: Notify,
    release: Semaphore,
    seen: std::sync::Mutex<Vec<Stage>>,
}

impl HoldAt {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            entered: Notify::new(),
            release: Semaphore::new(0),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<Stage> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageExecutor for HoldAt {
    async fn execute(&self, _job: &Job, stage: Stage) -> std::result::Result<(), StageError> {
        self.seen.lock().unwrap().push(stage);
        if stage == self.stage {
            self.entered.notify_one();
            self.release
                .acquire()
                .await
                .map_err(|e| StageError::Failed(e.to_string()))?
                .forget();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "hold"
    }
}

#[tokio::test]
async fn test_cancel_during_provisioning_lets_stage_finish_then_halts() {
    let executor = Arc::new(HoldAt::new(Stage::Provisioning));
    let mut h = harness_with(executor.clone());
    let id = start(&h, "u1").await;

    let driver = {
        let orchestrator = h.orchestrator.clone();
        let id = id.clone();
        tokio::spawn(async move { orchestrator.drive_job(&id).await })
    };
    executor.entered.notified().await;

    let running = job(&h, &id).await;
    assert_eq!(running.status, JobStatus::Provisioning);
    assert!(running
        .steps
        .iter()
        .all(|s| s.status == StepStatus::InProgress));

    assert!(h.orchestrator.cancel_job(&id, &Actor::user("u1")).await);
    executor.release.add_permits(1);
    driver.await.unwrap();

    let cancelled = job(&h, &id).await;
    assert_eq!(cancelled.status, JobStatus::Failed);
    assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_BY_USER));
    assert!(cancelled.steps.iter().all(|s| s.status == StepStatus::Pending));

    // The running stage completes, the next one never starts
    assert_eq!(executor.seen(), vec![Stage::Validating, Stage::Provisioning]);
    let stages: Vec<_> = cancelled.stages.iter().map(|r| r.stage).collect();
    assert_eq!(stages, vec![Stage::Validating, Stage::Provisioning]);
    assert!(cancelled
        .stages
        .iter()
        .all(|r| r.completed_at.is_some() && r.error.is_none()));

    assert_eq!(drain(&mut h.events), vec!["job_queued", "job_cancelled"]);
}

#[tokio::test]
async fn test_ready_job_cannot_be_cancelled() {
    let h = harness();
    let id = start(&h, "u1").await;
    h.orchestrator.drive_job(&id).await;

    assert!(!h.orchestrator.cancel_job(&id, &Actor::user("u1")).await);
    assert_eq!(job(&h, &id).await.status, JobStatus::Ready);
}

// ── Activation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_schedule_requires_ready_and_owner() {
    let mut h = harness();
    let id = start(&h, "u1").await;
    let at = h.clock.now() + ChronoDuration::hours(1);
    let owner = Actor::user("u1");

    assert!(!h.orchestrator.schedule_activation(&id, &owner, at).await);

    h.orchestrator.drive_job(&id).await;
    assert!(
        !h.orchestrator
            .schedule_activation(&id, &Actor::user("u2"), at)
            .await
    );
    assert!(h.orchestrator.schedule_activation(&id, &owner, at).await);

    let scheduled = job(&h, &id).await;
    assert_eq!(scheduled.status, JobStatus::Scheduled);
    assert_eq!(scheduled.scheduled_activation, Some(at));

    // Second call on the now-scheduled job
    assert!(!h.orchestrator.schedule_activation(&id, &owner, at).await);
    assert_eq!(
        drain(&mut h.events),
        vec!["job_queued", "job_ready", "job_scheduled"]
    );
}

#[tokio::test]
async fn test_sweep_activates_due_job_once() {
    let h = harness();
    let id = start(&h, "u1").await;
    h.orchestrator.drive_job(&id).await;

    let at = h.clock.now() + ChronoDuration::hours(1);
    assert!(
        h.orchestrator
            .schedule_activation(&id, &Actor::user("u1"), at)
            .await
    );

    let scheduler = ActivationScheduler::new(h.orchestrator.clone());
    assert_eq!(scheduler.sweep().await.unwrap(), 0);
    assert_eq!(job(&h, &id).await.status, JobStatus::Scheduled);

    h.clock.advance(Duration::from_secs(2 * 3600));
    assert_eq!(scheduler.sweep().await.unwrap(), 1);

    let active = job(&h, &id).await;
    assert_eq!(active.status, JobStatus::Active);
    assert!(active.scheduled_activation.is_none());

    assert_eq!(scheduler.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn test_scheduler_loop_promotes_and_stops() {
    let h = harness();
    let id = start(&h, "u1").await;
    h.orchestrator.drive_job(&id).await;
    let at = h.clock.now() - ChronoDuration::minutes(1);
    assert!(
        h.orchestrator
            .schedule_activation(&id, &Actor::user("u1"), at)
            .await
    );

    let scheduler = ActivationScheduler::new(h.orchestrator.clone());
    let handle = tokio::spawn(scheduler.clone().start());

    tokio::time::timeout(Duration::from_secs(5), async {
        while job(&h, &id).await.status != JobStatus::Active {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first tick should activate the job");

    scheduler.stop().await;
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

#[tokio::test]
async fn test_immediate_activation() {
    let mut h = harness();
    let id = start(&h, "u1").await;
    let owner = Actor::user("u1");

    assert!(!h.orchestrator.activate_job(&id, &owner).await);
    h.orchestrator.drive_job(&id).await;
    assert!(!h.orchestrator.activate_job(&id, &Actor::user("u2")).await);
    assert!(h.orchestrator.activate_job(&id, &owner).await);
    assert_eq!(job(&h, &id).await.status, JobStatus::Active);
    assert!(!h.orchestrator.activate_job(&id, &owner).await);

    assert_eq!(
        drain(&mut h.events),
        vec!["job_queued", "job_ready", "job_activated"]
    );
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_user_jobs_newest_first() {
    let h = harness();
    let first = start(&h, "u1").await;
    h.clock.advance(Duration::from_secs(60));
    let second = start(&h, "u1").await;
    start(&h, "u2").await;

    let jobs = h
        .orchestrator
        .get_user_jobs(&UserId::new("u1"))
        .await
        .unwrap();
    let ids: Vec<_> = jobs.iter().map(|j| j.id.clone()).collect();
    assert_eq!(ids, vec![second, first]);

    let pending = h
        .orchestrator
        .get_jobs_by_status(JobStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);
}

/// A store whose backend is unreachable
struct UnreachableStore;

fn unreachable() -> StorageError {
    StorageError::Backend("connection refused".into())
}

#[async_trait]
impl JobStore for UnreachableStore {
    async fn get(&self, _id: &JobId) -> StorageResult<Option<Job>> {
        Err(unreachable())
    }

    async fn put(&self, _job: Job) -> StorageResult<()> {
        Err(unreachable())
    }

    async fn update(&self, _id: &JobId, _apply: JobUpdate) -> StorageResult<Job> {
        Err(unreachable())
    }

    async fn list_all(&self) -> StorageResult<Vec<Job>> {
        Err(unreachable())
    }

    async fn list_by_user(&self, _user_id: &UserId) -> StorageResult<Vec<Job>> {
        Err(unreachable())
    }

    async fn list_by_status(&self, _status: JobStatus) -> StorageResult<Vec<Job>> {
        Err(unreachable())
    }

    async fn delete(&self, _id: &JobId) -> StorageResult<bool> {
        Err(unreachable())
    }
}

#[tokio::test]
async fn test_backend_errors_surface_on_reads_and_refuse_control() {
    let orchestrator = OrchestratorBuilder::new()
        .with_config(ProvisioningConfig::immediate())
        .with_store(Arc::new(UnreachableStore))
        .with_catalog(Arc::new(catalog()))
        .with_secrets(Arc::new(InMemorySecretsStore::new()))
        .build()
        .unwrap();
    let id = JobId::generate();

    assert!(matches!(
        orchestrator.get_job_status(&id).await,
        Err(StorageError::Backend(_))
    ));
    assert!(orchestrator.statistics().await.is_err());
    assert!(!orchestrator.cancel_job(&id, &Actor::admin("ops")).await);
    assert!(
        !orchestrator
            .schedule_activation(&id, &Actor::admin("ops"), Utc::now())
            .await
    );
}

#[tokio::test]
async fn test_unknown_job_status_is_none() {
    let h = harness();
    assert!(h
        .orchestrator
        .get_job_status(&JobId::generate())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_statistics() {
    /// Fails the last stage for one user's jobs
    struct FailsFor(UserId);

    #[async_trait]
    impl StageExecutor for FailsFor {
        async fn execute(&self, job: &Job, stage: Stage) -> std::result::Result<(), StageError> {
            if stage == Stage::Testing && job.user_id == self.0 {
                return Err(StageError::Failed("smoke test failed".into()));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "fails-for"
        }
    }

    let h = harness_with(Arc::new(FailsFor(UserId::new("u2"))));
    let ok = start(&h, "u1").await;
    let failed = start(&h, "u2").await;
    start(&h, "u1").await;

    h.orchestrator.drive_job(&ok).await;
    h.orchestrator.drive_job(&failed).await;

    let stats = h.orchestrator.statistics().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.count(JobStatus::Ready), 1);
    assert_eq!(stats.count(JobStatus::Failed), 1);
    assert_eq!(stats.count(JobStatus::Pending), 1);
    assert_eq!(stats.by_user[&UserId::new("u1")], 2);
    assert!((stats.success_rate - 1.0 / 3.0).abs() < 1e-9);
    assert!(stats.average_completion_secs.unwrap() > 0.0);
}

// ── Retention ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_cleanup_old_jobs() {
    let h = harness();
    let old = start(&h, "u1").await;
    h.orchestrator.drive_job(&old).await;

    h.clock.advance(Duration::from_secs(31 * 24 * 3600));
    let recent = start(&h, "u1").await;

    assert_eq!(h.orchestrator.cleanup_old_jobs(30).await.unwrap(), 1);
    assert!(h.orchestrator.get_job_status(&old).await.unwrap().is_none());
    assert!(h.orchestrator.get_job_status(&recent).await.unwrap().is_some());
    assert!(h.orchestrator.queue().contains(&recent));

    assert_eq!(h.orchestrator.cleanup_old_jobs(30).await.unwrap(), 0);
}

// ── Properties ──────────────────────────────────────────────────────

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn seed(h: &Harness, owner: &str, status: JobStatus) -> Job {
    let mut job = Job::new(
        UserId::new(owner),
        WorkflowId::new("wf"),
        TemplateId::new("tmplA"),
        Configuration::new(),
        &[],
        Utc::now(),
    );
    job.status = status;
    h.store.put(job.clone()).await.unwrap();
    job
}

proptest! {
    #[test]
    fn cancel_succeeds_only_for_owner_in_early_states(
        status_idx in 0usize..JobStatus::ALL.len(),
        caller_is_owner in any::<bool>(),
    ) {
        let status = JobStatus::ALL[status_idx];
        let rt = runtime();
        let (result, before, after) = rt.block_on(async {
            let h = harness();
            let before = seed(&h, "owner", status).await;
            let caller = if caller_is_owner { "owner" } else { "intruder" };
            let result = h.orchestrator.cancel_job(&before.id, &Actor::user(caller)).await;
            let after = job(&h, &before.id).await;
            (result, before, after)
        });

        prop_assert_eq!(result, caller_is_owner && status.is_cancellable());
        if result {
            prop_assert_eq!(after.status, JobStatus::Failed);
        } else {
            prop_assert_eq!(after.status, before.status);
            prop_assert_eq!(after.updated_at, before.updated_at);
            prop_assert_eq!(after.error_message, before.error_message);
        }
    }

    #[test]
    fn schedule_succeeds_only_for_owner_of_ready_job(
        status_idx in 0usize..JobStatus::ALL.len(),
        caller_is_owner in any::<bool>(),
        hours_ahead in 1i64..1000,
    ) {
        let status = JobStatus::ALL[status_idx];
        let rt = runtime();
        let (result, after) = rt.block_on(async {
            let h = harness();
            let seeded = seed(&h, "owner", status).await;
            let caller = if caller_is_owner { "owner" } else { "intruder" };
            let at = h.clock.now() + ChronoDuration::hours(hours_ahead);
            let result = h
                .orchestrator
                .schedule_activation(&seeded.id, &Actor::user(caller), at)
                .await;
            (result, job(&h, &seeded.id).await)
        });

        prop_assert_eq!(result, caller_is_owner && status == JobStatus::Ready);
        if result {
            prop_assert_eq!(after.status, JobStatus::Scheduled);
            prop_assert!(after.scheduled_activation.is_some());
        } else {
            prop_assert_eq!(after.status, status);
        }
    }
}
