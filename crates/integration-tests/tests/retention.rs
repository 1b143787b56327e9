//! Result retention: finished jobs stay queryable for a window, then look unknown

mod common;

use common::{seeds, Harness, RETENTION};
use powq_core::application::{AdmissionConfig, MaintenanceScheduler, RecoveryService};
use powq_core::domain::JobState;
use powq_core::port::compute::mocks::ScriptedCompute;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_finished_job_expires_after_retention() {
    let h = Harness::new();
    let admission = h.admission(Arc::new(ScriptedCompute::new_success()), AdmissionConfig::default());
    let acks = admission.submit_async("ip:test", &seeds(&["a"])).await.unwrap();
    let id = acks[0].request_id.clone();
    let lookup = json!({ "requestIds": [id] });

    let worker = h.worker(Arc::new(ScriptedCompute::new_success()), 3, None);
    assert!(worker.process_next_job().await.unwrap());

    h.clock.advance_secs(RETENTION.as_secs() as i64 - 1);
    let snapshot = &admission.status(&lookup).await.unwrap()[0];
    assert_eq!(snapshot.status, JobState::Done);
    assert!(snapshot.hash.is_some());

    h.clock.advance_secs(2);
    let snapshot = &admission.status(&lookup).await.unwrap()[0];
    assert_eq!(snapshot.request_id, id);
    assert_eq!(snapshot.status, JobState::Queued);
    assert_eq!(snapshot.attempts, 1);
    assert!(snapshot.seed.is_none());
    assert!(snapshot.hash.is_none());

    let maintenance = MaintenanceScheduler::new(
        h.store.clone(),
        Arc::new(RecoveryService::new(h.queue.clone(), h.store.clone(), None)),
        Duration::from_secs(60),
    );
    let stats = maintenance.run_now().await.unwrap();
    assert_eq!(stats.purged_jobs, 1);
    assert_eq!(stats.recovered_jobs, 0);
}

#[tokio::test]
async fn test_unfinished_jobs_do_not_expire() {
    let h = Harness::new();
    let admission = h.admission(Arc::new(ScriptedCompute::new_success()), AdmissionConfig::default());
    let acks = admission.submit_async("ip:test", &seeds(&["a"])).await.unwrap();

    h.clock.advance_secs(RETENTION.as_secs() as i64 * 3);

    let snapshot = &admission
        .status(&json!({ "requestIds": [acks[0].request_id] }))
        .await
        .unwrap()[0];
    assert_eq!(snapshot.status, JobState::Queued);
    assert_eq!(snapshot.seed.as_deref(), Some("a"));
}
