//! End-to-end tests of the workspace against the in-memory remote store.
//!
//! Every test runs on a paused clock, so debounce and echo windows elapse
//! only when the test sleeps.

use std::sync::Arc;

use arunika_core::cache::LocalCache;
use arunika_core::domain::{Asset, Course, Module, ModuleKind, RemoteConfig};
use arunika_core::ports::{
    ChangeEvent, ChangeKind, PortError, PortResult, RemoteStore, RemoteStoreFactory, Table,
};
use arunika_core::share::course_link;
use async_trait::async_trait;
use serde_json::json;
use studio_lib::adapters::storage::{FileStorage, MemoryStorage};
use studio_lib::adapters::{MemoryBackend, MemoryRemoteStore, MemoryRemoteStoreFactory};
use studio_lib::sync::rows::course_to_row;
use studio_lib::sync::{
    EntityGroup, FailureKind, PushOutcome, SyncNotice, SyncSettings, Workspace, WorkspaceError,
};
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

const VIDEO_URL: &str = "https://youtube.com/watch?v=abc12345678";

fn remote() -> RemoteConfig {
    RemoteConfig::new("postgres://db.example.co/postgres", "service-key")
}

fn memory_cache() -> LocalCache {
    LocalCache::new(Box::new(MemoryStorage::new()))
}

async fn open(
    backend: &Arc<MemoryBackend>,
    remote: RemoteConfig,
) -> (Workspace, Arc<MemoryRemoteStoreFactory>) {
    let factory = Arc::new(MemoryRemoteStoreFactory::new(backend.clone()));
    let workspace = Workspace::open(memory_cache(), factory.clone(), SyncSettings::default(), remote).await;
    (workspace, factory)
}

/// Lets spawned listener and worker tasks catch up.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn intro_course_is_saved_and_its_echo_ignored() {
    let backend = MemoryBackend::new();
    let (workspace, _) = open(&backend, remote()).await;

    let course = workspace.create_course().await;
    let mut module = Module::new();
    module.content = VIDEO_URL.to_string();
    workspace
        .update_course(&course.id, |c| {
            c.title = "Intro to X".to_string();
            c.add_module(module);
            Ok(())
        })
        .await
        .unwrap();

    let outcome = workspace.save_course(&course.id).await.unwrap();
    assert_eq!(outcome, PushOutcome::Pushed(1));

    let row = backend.row(Table::Courses, &course.id).unwrap();
    assert_eq!(row["id"], course.id.as_str());
    assert_eq!(row["title"], "Intro to X");
    assert_eq!(row["modules"].as_array().unwrap().len(), 1);
    assert_eq!(row["modules"][0]["type"], "video");
    assert_eq!(row["modules"][0]["content"], VIDEO_URL);

    // The same upsert delivered again without an origin, within a second,
    // carrying the timestamp the server stamped on it.
    let before = workspace.courses().await;
    sleep(Duration::from_millis(500)).await;
    let mut stamped = workspace.course(&course.id).await.unwrap();
    stamped.updated_at += chrono::Duration::seconds(1);
    let echo = ChangeEvent {
        table: "courses".to_string(),
        kind: ChangeKind::Update,
        record: Some(course_to_row(&stamped)),
        old_record: None,
        origin: None,
    };
    backend.broadcast(echo.clone());
    settle().await;
    assert_eq!(workspace.courses().await, before);
    assert_eq!(workspace.apply_remote_change(echo.clone()).await, None);
    assert_eq!(workspace.courses().await, before);

    // The row differs from local state, so only the window kept it out.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(
        workspace.apply_remote_change(echo).await,
        Some(EntityGroup::Courses)
    );
    assert_eq!(
        workspace.course(&course.id).await.unwrap().updated_at,
        stamped.updated_at
    );
}

#[tokio::test(start_paused = true)]
async fn untagged_change_is_dropped_inside_window_and_applied_after() {
    let backend = MemoryBackend::new();
    let (workspace, _) = open(&backend, remote()).await;
    let course = workspace.create_course().await;
    workspace.save_course(&course.id).await.unwrap();

    let mut edited = workspace.course(&course.id).await.unwrap();
    edited.title = "Edited elsewhere".to_string();
    edited.updated_at = chrono::Utc::now() + chrono::Duration::seconds(60);
    let change = ChangeEvent {
        table: "courses".to_string(),
        kind: ChangeKind::Update,
        record: Some(course_to_row(&edited)),
        old_record: None,
        origin: None,
    };

    assert_eq!(workspace.apply_remote_change(change.clone()).await, None);
    assert_eq!(workspace.course(&course.id).await.unwrap().title, "New course");

    // Past the window, including the initial branding and mentor pushes.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(
        workspace.apply_remote_change(change).await,
        Some(EntityGroup::Courses)
    );
    assert_eq!(workspace.course(&course.id).await.unwrap().title, "Edited elsewhere");
}

#[tokio::test(start_paused = true)]
async fn pushed_course_round_trips_to_a_fresh_client() {
    let backend = MemoryBackend::new();
    let (first, _) = open(&backend, remote()).await;

    let course = first.create_course().await;
    let mut intro = Module::new();
    intro.title = "Intro".to_string();
    intro.content = VIDEO_URL.to_string();
    let mut notes = Module::new();
    notes.title = "Notes".to_string();
    notes.kind = ModuleKind::Text;
    notes.content = "# Reading list".to_string();
    notes.duration = None;
    first
        .update_course(&course.id, |c| {
            c.description = "Everything about X".to_string();
            c.add_module(intro);
            c.add_module(notes);
            c.move_module(1, 0)?;
            c.add_asset(Asset::link("Slides", "https://example.com/slides"));
            c.add_asset(Asset::file("Workbook", "data:application/pdf;base64,JVBERi0=", "workbook.pdf"));
            c.category_ids = vec!["design".to_string()];
            Ok(())
        })
        .await
        .unwrap();

    first.save_course(&course.id).await.unwrap();
    // Saving an unchanged course again upserts the same row.
    first.save_course(&course.id).await.unwrap();
    assert_eq!(backend.rows(Table::Courses).len(), 1);

    let pushed = first.course(&course.id).await.unwrap();
    let (second, _) = open(&backend, remote()).await;
    let fetched = second.course(&course.id).await.unwrap();
    assert_eq!(fetched, pushed);
    assert_eq!(fetched.modules[0].title, "Notes");
    assert_eq!(fetched.assets[1].file_name.as_deref(), Some("workbook.pdf"));
}

#[tokio::test(start_paused = true)]
async fn empty_credentials_never_touch_the_network() {
    let backend = MemoryBackend::new();
    let (workspace, factory) = open(&backend, RemoteConfig::default()).await;

    let course = workspace.create_course().await;
    workspace
        .update_course(&course.id, |c| {
            c.add_module(Module::new());
            Ok(())
        })
        .await
        .unwrap();
    workspace.update_branding(|b| b.site_name = "Offline Academy".to_string()).await;
    workspace.update_mentor(|m| m.name = "Sam".to_string()).await;
    let second = workspace.create_course().await;
    workspace.delete_course(&second.id).await.unwrap();
    sleep(Duration::from_secs(3)).await;

    assert_eq!(workspace.courses().await.len(), 1);
    assert_eq!(workspace.branding().await.site_name, "Offline Academy");
    assert!(matches!(
        workspace.save(EntityGroup::Courses).await,
        Err(WorkspaceError::NotConfigured)
    ));
    assert_eq!(factory.connect_count(), 0);
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn burst_of_branding_edits_is_one_push() {
    let backend = MemoryBackend::new();
    let (workspace, _) = open(&backend, remote()).await;
    // Let the initial pushes of the seed singletons finish.
    sleep(Duration::from_secs(2)).await;
    let baseline = backend.request_count();

    for i in 1..=5 {
        workspace
            .update_branding(|b| b.site_name = format!("Academy v{i}"))
            .await;
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(backend.request_count(), baseline);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.request_count(), baseline + 1);
    let row = backend.row(Table::Branding, "config").unwrap();
    assert_eq!(row["site_name"], "Academy v5");
}

#[tokio::test(start_paused = true)]
async fn outdated_schema_is_reported_and_the_edit_kept() {
    let backend = MemoryBackend::new();
    backend.drop_column(Table::Courses, "categories");
    let (workspace, _) = open(&backend, remote()).await;
    let mut notices = workspace.subscribe();

    let course = workspace.create_course().await;
    workspace
        .update_course(&course.id, |c| {
            c.title = "Unsaved work".to_string();
            Ok(())
        })
        .await
        .unwrap();

    let err = workspace.save_course(&course.id).await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Remote(PortError::SchemaMismatch(_))));

    let failure = timeout(Duration::from_secs(5), async {
        loop {
            if let SyncNotice::PushFailed { group, kind, .. } = notices.recv().await.unwrap() {
                return (group, kind);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(failure, (EntityGroup::Courses, FailureKind::SchemaOutdated));
    assert_eq!(workspace.course(&course.id).await.unwrap().title, "Unsaved work");
    assert!(backend.rows(Table::Courses).is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_cache_write_keeps_state_and_last_cached_value() {
    let dir = tempfile::tempdir().unwrap();
    let factory = Arc::new(MemoryRemoteStoreFactory::new(MemoryBackend::new()));
    let cache = LocalCache::new(Box::new(FileStorage::open(dir.path(), 4096).unwrap()));
    let workspace =
        Workspace::open(cache, factory.clone(), SyncSettings::default(), RemoteConfig::default()).await;

    let course = workspace.create_course().await;
    let huge = "x".repeat(8192);
    let edited = workspace
        .update_course(&course.id, |c| {
            c.description = huge.clone();
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(edited.description.len(), 8192);
    assert_eq!(workspace.course(&course.id).await.unwrap().description, huge);

    // A restart reads what the cache last accepted.
    let cache = LocalCache::new(Box::new(FileStorage::open(dir.path(), 4096).unwrap()));
    let reopened = Workspace::open(cache, factory, SyncSettings::default(), RemoteConfig::default()).await;
    let cached = reopened.course(&course.id).await.unwrap();
    assert_eq!(cached.description, course.description);
}

#[tokio::test(start_paused = true)]
async fn edits_from_another_session_arrive_through_realtime() {
    let backend = MemoryBackend::new();
    let (admin_a, _) = open(&backend, remote()).await;
    let (admin_b, _) = open(&backend, remote()).await;

    admin_a
        .update_branding(|b| b.site_name = "Shared Academy".to_string())
        .await;
    admin_a.save(EntityGroup::Branding).await.unwrap();
    settle().await;
    assert_eq!(admin_b.branding().await.site_name, "Shared Academy");

    let course = admin_a.create_course().await;
    admin_a.save_course(&course.id).await.unwrap();
    settle().await;
    assert!(admin_b.course(&course.id).await.is_some());

    admin_a.delete_course(&course.id).await.unwrap();
    settle().await;
    assert!(admin_b.course(&course.id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn older_remote_row_loses_to_newer_local_edit() {
    let backend = MemoryBackend::new();
    let (workspace, _) = open(&backend, remote()).await;
    let course = workspace.create_course().await;

    let mut stale: Course = course.clone();
    stale.title = "Stale title".to_string();
    stale.updated_at = course.updated_at - chrono::Duration::seconds(30);
    let change = ChangeEvent {
        table: "courses".to_string(),
        kind: ChangeKind::Update,
        record: Some(course_to_row(&stale)),
        old_record: None,
        origin: Some(Uuid::new_v4()),
    };

    assert_eq!(workspace.apply_remote_change(change).await, None);
    assert_eq!(workspace.course(&course.id).await.unwrap().title, "New course");
}

#[tokio::test(start_paused = true)]
async fn unknown_tables_are_ignored() {
    let backend = MemoryBackend::new();
    let (workspace, _) = open(&backend, remote()).await;
    let change = ChangeEvent {
        table: "audit_log".to_string(),
        kind: ChangeKind::Insert,
        record: Some(json!({ "id": "a-1" })),
        old_record: None,
        origin: Some(Uuid::new_v4()),
    };
    assert_eq!(workspace.apply_remote_change(change).await, None);
}

#[tokio::test(start_paused = true)]
async fn lagging_listener_refetches_everything() {
    let backend = MemoryBackend::new();
    let (workspace, _) = open(&backend, remote()).await;

    // Another client writes, then enough noise follows to overflow the stream.
    let other = MemoryRemoteStore::new(backend.clone(), Uuid::new_v4());
    let mut course = Course::new("profile");
    course.title = "Written while lagging".to_string();
    other
        .upsert(Table::Courses, course_to_row(&course), "id")
        .await
        .unwrap();
    for i in 0..400 {
        backend.broadcast(ChangeEvent {
            table: "audit_log".to_string(),
            kind: ChangeKind::Insert,
            record: Some(json!({ "id": i })),
            old_record: None,
            origin: None,
        });
    }
    settle().await;

    let fetched = workspace.course(&course.id).await.unwrap();
    assert_eq!(fetched.title, "Written while lagging");
}

#[tokio::test(start_paused = true)]
async fn shared_link_credentials_are_adopted_when_none_are_set() {
    let backend = MemoryBackend::new();
    let (workspace, factory) = open(&backend, RemoteConfig::default()).await;

    let link = course_link("https://learn.example.com/", "course-1", Some(&remote()));
    let shared = workspace.adopt_shared_link(&link).await.unwrap();

    assert_eq!(shared.course_id, "course-1");
    assert_eq!(workspace.remote_config().await, remote());
    assert_eq!(factory.connect_count(), 1);
    assert!(workspace.client().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn delete_waits_for_the_push_in_flight() {
    let backend = MemoryBackend::new();
    backend.set_upsert_delay(Duration::from_millis(200));
    let (workspace, _) = open(&backend, remote()).await;

    let course = workspace.create_course().await;
    // The debounce has elapsed and the slow upsert is under way.
    sleep(Duration::from_millis(1050)).await;
    workspace.delete_course(&course.id).await.unwrap();
    sleep(Duration::from_secs(1)).await;

    assert!(workspace.course(&course.id).await.is_none());
    assert!(backend.row(Table::Courses, &course.id).is_none());
    let (fresh, _) = open(&backend, remote()).await;
    assert!(fresh.course(&course.id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn delete_while_unreachable_is_sent_after_reconnect() {
    let backend = MemoryBackend::new();
    let (first, _) = open(&backend, remote()).await;
    let course = first.create_course().await;
    first.save_course(&course.id).await.unwrap();
    drop(first);

    backend.fail_next(PortError::Timeout("database restarting".into()));
    let (workspace, _) = open(&backend, remote()).await;
    assert!(!workspace.is_synced().await);
    workspace.delete_course(&course.id).await.unwrap();
    assert!(backend.row(Table::Courses, &course.id).is_some());

    sleep(Duration::from_secs(5)).await;
    assert!(workspace.is_synced().await);
    assert!(workspace.course(&course.id).await.is_none());
    assert!(backend.row(Table::Courses, &course.id).is_none());
}

/// Refuses to connect to `postgres://unreachable`.
struct PickyFactory(MemoryRemoteStoreFactory);

#[async_trait]
impl RemoteStoreFactory for PickyFactory {
    async fn connect(&self, config: &RemoteConfig, origin: Uuid) -> PortResult<Arc<dyn RemoteStore>> {
        if config.endpoint_url == "postgres://unreachable" {
            return Err(PortError::Timeout("connection refused".into()));
        }
        self.0.connect(config, origin).await
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_never_fall_back_to_the_old_backend() {
    let backend = MemoryBackend::new();
    let factory = Arc::new(PickyFactory(MemoryRemoteStoreFactory::new(backend.clone())));
    let workspace = Workspace::open(memory_cache(), factory, SyncSettings::default(), remote()).await;
    let course = workspace.create_course().await;
    sleep(Duration::from_secs(2)).await;
    let before = backend.request_count();

    let err = workspace
        .set_remote_config(RemoteConfig::new("postgres://unreachable", "service-key"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::Remote(PortError::Timeout(_))));
    assert!(workspace.client().await.is_none());
    assert!(!workspace.is_synced().await);

    workspace
        .update_course(&course.id, |c| {
            c.title = "Edited after the switch".to_string();
            Ok(())
        })
        .await
        .unwrap();
    assert!(matches!(
        workspace.save_course(&course.id).await,
        Err(WorkspaceError::Remote(PortError::Timeout(_)))
    ));
    sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.request_count(), before);
    assert_eq!(backend.row(Table::Courses, &course.id).unwrap()["title"], "New course");
}

#[tokio::test(start_paused = true)]
async fn unreachable_store_at_startup_is_retried() {
    let backend = MemoryBackend::new();
    backend.fail_next(PortError::Timeout("database starting up".into()));
    let factory = Arc::new(MemoryRemoteStoreFactory::new(backend.clone()));
    let settings = SyncSettings {
        debounce: Duration::from_millis(100),
        ..SyncSettings::default()
    };
    let workspace = Workspace::open(memory_cache(), factory, settings, remote()).await;
    assert!(!workspace.is_synced().await);

    // Nothing is pushed before a full fetch has succeeded.
    let local = workspace.create_course().await;
    sleep(Duration::from_millis(300)).await;
    assert!(backend.rows(Table::Courses).is_empty());

    let other = MemoryRemoteStore::new(backend.clone(), Uuid::new_v4());
    let mut theirs = Course::new("profile");
    theirs.title = "Written by another admin".to_string();
    other
        .upsert(Table::Courses, course_to_row(&theirs), "id")
        .await
        .unwrap();

    sleep(Duration::from_secs(30)).await;
    assert!(workspace.is_synced().await);
    assert_eq!(
        workspace.course(&theirs.id).await.unwrap().title,
        "Written by another admin"
    );
    assert!(backend.row(Table::Courses, &local.id).is_some());

    // Realtime is live again.
    let later = Course::new("profile");
    other
        .upsert(Table::Courses, course_to_row(&later), "id")
        .await
        .unwrap();
    settle().await;
    assert!(workspace.course(&later.id).await.is_some());
}
