//! Offload cycle integration tests.
//!
//! These tests run complete offload cycles against a scripted mock card:
//! health gate -> classify -> drain -> delete, plus the rebuild-on-failure
//! and fatal-offline paths.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use dashvault_core::{
    testing::{fixtures, MockDashcam},
    CycleState, OffloadConfig, OffloadError, Offloader,
};

/// Test helper bundling the mock card and an offloader pointed at a temp dir.
struct TestHarness {
    cam: Arc<MockDashcam>,
    offloader: Arc<Offloader>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new(config: OffloadConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cam = Arc::new(MockDashcam::new());
        let offloader = Arc::new(Offloader::new(
            config,
            temp_dir.path().to_path_buf(),
            Arc::clone(&cam) as Arc<dyn dashvault_core::Dashcam>,
        ));
        Self {
            cam,
            offloader,
            temp_dir,
        }
    }

    fn local_path(&self, rel: &str) -> std::path::PathBuf {
        self.temp_dir.path().join(rel)
    }
}

fn fast_config() -> OffloadConfig {
    OffloadConfig {
        max_rebuilds_per_cycle: 1,
        ..OffloadConfig::default()
    }
}

#[tokio::test]
async fn test_full_cycle_transfers_in_priority_order() {
    let harness = TestHarness::new(OffloadConfig::default());

    let locked = fixtures::locked_clip("2023_1104_090000_F.MP4");
    let front_new = fixtures::driving_clip("2023_1104_110000_F.MP4");
    let front_old = fixtures::driving_clip("2023_1104_100000_F.MP4");
    let rear = fixtures::driving_clip("2023_1104_110000_R.MP4");
    let parking = fixtures::parking_clip("2023_1104_120000_F.MP4");

    harness
        .cam
        .set_catalog(vec![
            front_old.clone(),
            parking.clone(),
            rear.clone(),
            locked.clone(),
            front_new.clone(),
        ])
        .await;

    let report = harness.offloader.run_cycle().await.unwrap();

    // Parking is excluded by default; everything else transfers.
    assert_eq!(report.transferred, 4);
    assert_eq!(report.bytes_transferred, 4 * 2048);
    assert_eq!(report.rebuilds, 0);

    // Deletes happen in priority order: locked first, then driving footage
    // front-lens first and newest first.
    assert_eq!(
        harness.cam.deleted_paths().await,
        vec![
            locked.remote_path.clone(),
            front_new.remote_path.clone(),
            front_old.remote_path.clone(),
            rear.remote_path.clone(),
        ]
    );

    // Locked footage is segregated; everything lands under year/month.
    assert!(harness
        .local_path("Locked/2023/11/2023_1104_090000_F.MP4")
        .exists());
    assert!(harness
        .local_path("2023/11/2023_1104_110000_F.MP4")
        .exists());
    assert!(harness
        .local_path("2023/11/2023_1104_110000_R.MP4")
        .exists());
    assert!(!harness
        .local_path("2023/11/2023_1104_120000_F.MP4")
        .exists());

    let status = harness.offloader.status().await;
    assert_eq!(status.cycle_state, CycleState::Idle);
    assert_eq!(status.queue_len, 0);
    assert!(status.active_transfers.is_empty());
}

#[tokio::test]
async fn test_health_gate_blocks_catalog_fetch() {
    let harness = TestHarness::new(OffloadConfig::default());
    harness
        .cam
        .set_catalog(vec![fixtures::driving_clip("2023_1104_100000_F.MP4")])
        .await;
    harness.cam.set_latency_ms(250).await;

    let err = harness.offloader.run_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        OffloadError::HealthDegraded {
            latency_ms: 250,
            threshold_ms: 200
        }
    ));
    assert!(err.is_retryable());

    // The gate fires before the catalog is even requested.
    assert_eq!(harness.cam.catalog_calls().await, 0);
    assert!(harness.cam.deleted_paths().await.is_empty());

    let status = harness.offloader.status().await;
    assert_eq!(status.last_health.unwrap().latency_ms, 250);
}

#[tokio::test]
async fn test_heartbeat_failure_is_retryable() {
    let harness = TestHarness::new(OffloadConfig::default());
    harness.cam.set_heartbeat_fails(true).await;

    let err = harness.offloader.run_cycle().await.unwrap_err();
    assert!(matches!(err, OffloadError::HealthCheck(_)));
    assert!(err.is_retryable());
    assert_eq!(harness.cam.catalog_calls().await, 0);
}

#[tokio::test]
async fn test_unfinished_recordings_are_skipped() {
    let harness = TestHarness::new(OffloadConfig::default());

    let finished = fixtures::driving_clip("2023_1104_100000_F.MP4");
    let in_progress = fixtures::unfinished_clip("2023_1104_110000_F.MP4");
    harness
        .cam
        .set_catalog(vec![finished.clone(), in_progress.clone()])
        .await;

    let report = harness.offloader.run_cycle().await.unwrap();
    assert_eq!(report.transferred, 1);
    assert_eq!(
        harness.cam.deleted_paths().await,
        vec![finished.remote_path]
    );
}

#[tokio::test]
async fn test_parking_included_when_configured() {
    let harness = TestHarness::new(OffloadConfig {
        include_parking: true,
        ..OffloadConfig::default()
    });

    let driving = fixtures::driving_clip("2023_1104_100000_F.MP4");
    let parking = fixtures::parking_clip("2023_1104_120000_F.MP4");
    harness
        .cam
        .set_catalog(vec![parking.clone(), driving.clone()])
        .await;

    let report = harness.offloader.run_cycle().await.unwrap();
    assert_eq!(report.transferred, 2);

    // Driving footage outranks parking footage.
    assert_eq!(
        harness.cam.deleted_paths().await,
        vec![driving.remote_path, parking.remote_path]
    );
}

#[tokio::test]
async fn test_transient_stream_failure_triggers_rebuild() {
    let harness = TestHarness::new(OffloadConfig::default());

    let clip = fixtures::driving_clip("2023_1104_100000_F.MP4");
    harness.cam.set_catalog(vec![clip.clone()]).await;
    harness.cam.fail_stream_once(&clip.remote_path).await;

    let report = harness.offloader.run_cycle().await.unwrap();

    // First attempt breaks mid-stream, the rebuild retries and succeeds.
    assert_eq!(report.rebuilds, 1);
    assert_eq!(report.transferred, 1);
    assert_eq!(harness.cam.catalog_calls().await, 2);
    assert_eq!(harness.cam.deleted_paths().await, vec![clip.remote_path]);
    assert!(harness
        .local_path("2023/11/2023_1104_100000_F.MP4")
        .exists());
}

#[tokio::test]
async fn test_size_mismatch_writes_nothing() {
    let harness = TestHarness::new(fast_config());

    let clip = fixtures::driving_clip("2023_1104_100000_F.MP4");
    harness.cam.set_catalog(vec![clip.clone()]).await;
    harness.cam.set_declared_len(&clip.remote_path, 9999).await;

    let err = harness.offloader.run_cycle().await.unwrap_err();
    match err {
        OffloadError::Transfer { remote_path, reason } => {
            assert_eq!(remote_path, clip.remote_path);
            assert!(reason.contains("content length"));
        }
        other => panic!("expected transfer error, got {other:?}"),
    }

    // The mismatch is caught before the partial file is created.
    assert!(!harness
        .local_path("2023/11/2023_1104_100000_F.MP4")
        .exists());
    assert!(!harness
        .local_path("2023/11/2023_1104_100000_F.MP4.partial")
        .exists());
    assert!(harness.cam.deleted_paths().await.is_empty());
}

#[tokio::test]
async fn test_rebuild_failure_goes_fatal_offline() {
    let harness = TestHarness::new(OffloadConfig::default());

    let clip = fixtures::driving_clip("2023_1104_100000_F.MP4");
    harness.cam.set_catalog(vec![clip.clone()]).await;
    harness.cam.fail_stream_once(&clip.remote_path).await;
    // The first build succeeds; the rebuild after the stream failure cannot
    // reach the card any more.
    harness.cam.fail_catalog_after(1).await;

    let err = harness.offloader.run_cycle().await.unwrap_err();
    assert!(matches!(err, OffloadError::FatalOffline(_)));
    assert!(!err.is_retryable());

    let status = harness.offloader.status().await;
    assert_eq!(status.cycle_state, CycleState::FatalOffline);
}

#[tokio::test]
async fn test_delete_failure_fails_item_but_keeps_local_copy() {
    let harness = TestHarness::new(fast_config());

    let clip = fixtures::driving_clip("2023_1104_100000_F.MP4");
    harness.cam.set_catalog(vec![clip.clone()]).await;
    harness.cam.set_delete_fails(&clip.remote_path).await;

    let err = harness.offloader.run_cycle().await.unwrap_err();
    match err {
        OffloadError::Delete { remote_path, .. } => {
            assert_eq!(remote_path, clip.remote_path);
        }
        other => panic!("expected delete error, got {other:?}"),
    }

    // The local copy is finalized even though the remote delete failed.
    assert!(harness
        .local_path("2023/11/2023_1104_100000_F.MP4")
        .exists());
    assert!(harness.cam.deleted_paths().await.is_empty());
}

#[tokio::test]
async fn test_cycle_is_not_reentrant() {
    let harness = TestHarness::new(OffloadConfig::default());

    let clip = fixtures::driving_clip("2023_1104_100000_F.MP4");
    harness.cam.set_catalog(vec![clip.clone()]).await;
    harness.cam.stall_stream(&clip.remote_path).await;

    let offloader = Arc::clone(&harness.offloader);
    let running = tokio::spawn(async move { offloader.run_cycle().await });

    // Give the cycle time to reach the stalled stream.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = harness.offloader.status().await;
    assert_eq!(status.cycle_state, CycleState::Draining);
    assert_eq!(status.active_transfers.len(), 1);

    let err = harness.offloader.run_cycle().await.unwrap_err();
    assert!(matches!(err, OffloadError::AlreadyRunning));

    running.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_survives_sessions_finishing_before_first_poll() {
    let harness = TestHarness::new(OffloadConfig::default());

    // Zero-byte payloads make every session finish almost immediately, often
    // before the drain loop observes a single snapshot.
    let mut catalog = Vec::new();
    for minute in 0..25 {
        let mut clip = fixtures::driving_clip(&format!("2023_1104_10{minute:02}00_F.MP4"));
        clip.size_bytes = 0;
        catalog.push(clip);
    }
    harness.cam.set_catalog(catalog).await;

    let report = tokio::time::timeout(Duration::from_secs(10), harness.offloader.run_cycle())
        .await
        .expect("cycle must complete even when snapshots were published before the drain loop attached")
        .unwrap();

    assert_eq!(report.transferred, 25);
    assert_eq!(report.bytes_transferred, 0);
    assert_eq!(harness.cam.deleted_paths().await.len(), 25);
}

#[tokio::test]
async fn test_empty_catalog_is_a_noop_cycle() {
    let harness = TestHarness::new(OffloadConfig::default());

    let report = harness.offloader.run_cycle().await.unwrap();
    assert_eq!(report.transferred, 0);
    assert_eq!(report.bytes_transferred, 0);
    assert_eq!(harness.cam.catalog_calls().await, 1);
}
