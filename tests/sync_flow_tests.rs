//! End-to-end tests of the command layer over a SQLite record store
use std::sync::Arc;

use famly_sync::application::AppState;
use famly_sync::commands::{self, CreateEntriesRequest, RunRequest, ScrapeRequest};
use famly_sync::domain::{ProgressStatus, SourceSystem};
use famly_sync::infrastructure::config::AppConfig;
use famly_sync::test_utils::TestContext;

async fn setup() -> (TestContext, AppState) {
    let ctx = TestContext::new().await.unwrap();
    let state = AppState::new(Arc::clone(&ctx.engine), AppConfig::default());
    (ctx, state)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_sync_is_rejected_while_first_is_replaying() {
    let (ctx, state) = setup().await;
    ctx.seed(SourceSystem::Famly, &[1, 2, 3]).await.unwrap();
    let hold = ctx.writer.hold_first_write();

    let running = {
        let state = state.clone();
        tokio::spawn(async move { commands::sync_missing(&state).await })
    };
    hold.wait_until_entered().await;

    // First run is parked inside its first write
    let status = commands::get_status(&state).await.unwrap();
    assert!(status.sync_in_progress);
    assert_eq!(status.sync_status, "running");
    let entry = &status.progress["sync"];
    assert_eq!((entry.current, entry.total), (0, 3));
    assert_eq!(entry.message.as_deref(), Some("Syncing missing entries..."));

    let err = commands::sync_missing(&state).await.unwrap_err();
    assert_eq!(err.status, 409);
    let err = commands::create_entries(&state, CreateEntriesRequest { event_ids: vec![2] })
        .await
        .unwrap_err();
    assert_eq!(err.status, 409);
    let err = commands::homeassistant_run(&state, RunRequest { days_back: Some(0) }).await.unwrap_err();
    assert_eq!(err.status, 409);
    assert!(err.detail.starts_with("Syncing missing events failed"));

    hold.release();
    let result = running.await.unwrap().unwrap();
    assert_eq!(result.created, 3);
    assert_eq!(result.synced_event_ids, vec![1, 2, 3]);
    assert_eq!(ctx.writer.created(), vec![1, 2, 3]);

    assert!(!ctx.gate.is_held());
    assert!(commands::get_progress(&state).await.unwrap().get("sync").is_none());
}

#[tokio::test]
async fn scrape_then_sync_converges() {
    let (ctx, state) = setup().await;
    ctx.famly.set_ids(&[10, 11, 12]);
    ctx.baby_connect.set_ids(&[11]);

    commands::scrape_famly(&state, ScrapeRequest { days_back: 7 }).await.unwrap();
    commands::scrape_baby_connect(&state, ScrapeRequest { days_back: 3 }).await.unwrap();

    let stub = commands::sync_stub(&state).await.unwrap();
    assert_eq!(stub.pending_count, Some(2));

    let result = commands::sync_missing(&state).await.unwrap();
    assert_eq!(result.missing_event_ids, vec![10, 12]);
    assert_eq!(result.created, 2);

    // target scrape now sees the replayed entries
    ctx.baby_connect.set_ids(&[10, 11, 12]);
    commands::scrape_baby_connect(&state, ScrapeRequest { days_back: 0 }).await.unwrap();
    let again = commands::sync_missing(&state).await.unwrap();
    assert_eq!(again.created, 0);
    assert!(again.missing_event_ids.is_empty());

    let progress = commands::get_progress(&state).await.unwrap();
    assert_eq!(progress["famly"].status, ProgressStatus::Succeeded);
    assert_eq!(progress["baby_connect"].status, ProgressStatus::Succeeded);
    assert!(!progress.contains_key("sync"));
}

#[tokio::test]
async fn partial_failure_keeps_completed_entries() {
    let (ctx, state) = setup().await;
    ctx.seed(SourceSystem::Famly, &[10, 11, 12]).await.unwrap();
    ctx.writer.fail_on(11);

    let err = commands::sync_missing(&state).await.unwrap_err();
    assert_eq!(err.status, 500);
    assert!(err.detail.contains("event 11"));
    assert!(err.detail.contains("(1/3 created)"));
    assert_eq!(ctx.writer.created(), vec![10]);
    assert_eq!(ctx.writer.attempts(), 2);
    assert!(!ctx.gate.is_held());

    // A retry resumes from what is still missing once the target is rescraped
    ctx.baby_connect.set_ids(&[10]);
    commands::scrape_baby_connect(&state, ScrapeRequest { days_back: 0 }).await.unwrap();
    let err = commands::sync_missing(&state).await.unwrap_err();
    assert!(err.detail.contains("(0/2 created)"));
}

#[tokio::test]
async fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("events.db").display());

    {
        let db = famly_sync::infrastructure::DatabaseConnection::new(&url).await.unwrap();
        db.migrate().await.unwrap();
        let repo = famly_sync::infrastructure::SqliteEventRepository::new(db.pool().clone());
        let events: Vec<_> = [1, 2]
            .iter()
            .map(|&id| famly_sync::test_utils::sample_event(SourceSystem::Famly, id))
            .collect();
        use famly_sync::domain::EventRepository;
        repo.upsert(&events).await.unwrap();
        db.pool().close().await;
    }

    let mut config = AppConfig::default();
    config.database.url = url;
    let state = AppState::initialize(
        config,
        Arc::new(famly_sync::infrastructure::UnavailableDriver::new(SourceSystem::Famly)),
        Arc::new(famly_sync::infrastructure::UnavailableDriver::new(SourceSystem::BabyConnect)),
        Arc::new(famly_sync::infrastructure::UnavailableWriter),
    )
    .await
    .unwrap();

    assert_eq!(state.engine.compute_missing().await.unwrap(), vec![1, 2]);
    let status = commands::get_status(&state).await.unwrap();
    assert_eq!(status.last_sync_at, Some(famly_sync::test_utils::event_time(2)));

    // No writer configured: replay fails on the first id and releases the gate
    let err = commands::sync_missing(&state).await.unwrap_err();
    assert_eq!(err.status, 500);
    assert!(err.detail.contains("no Baby Connect writer is configured"));
    assert!(!state.engine.gate().is_held());
}
