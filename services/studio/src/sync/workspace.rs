//! services/studio/src/sync/workspace.rs
//!
//! The admin workspace: the in-memory state every view reads and mutates,
//! kept in step with the local cache (immediately) and the remote store
//! (debounced, through the `SyncScheduler`). Remote changes arrive through a
//! listener task and are merged unless they are echoes of our own writes.
//!
//! Concurrent edits from two admin sessions resolve by last-write-wins on
//! `updated_at`: a remote row replaces the local copy unless the local copy
//! is newer.
//!
//! Nothing is pushed through a handle until a full fetch through that same
//! handle has succeeded. When the fetch or the realtime stream fails, a
//! background task retries both with exponential backoff.

use arunika_core::cache::{
    LocalCache, BRANDING_KEY, COURSES_KEY, MENTOR_KEY, REMOTE_CONFIG_KEY, SESSION_KEY,
};
use arunika_core::domain::{
    Branding, Course, EditError, Mentor, RemoteConfig, Session, BRANDING_ID, MENTOR_ID,
};
use arunika_core::echo::{EchoSuppressor, DEFAULT_ECHO_WINDOW};
use arunika_core::ports::{
    ChangeEvent, ChangeKind, ChangeStream, PortError, PortResult, RealtimeEvent, RemoteStore,
    RemoteStoreFactory, Table,
};
use arunika_core::share::{parse_course_link, ShareLinkError, SharedLink};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::ClientRegistry;
use super::rows;
use super::scheduler::{
    EntityGroup, GroupPusher, PushOutcome, SyncNotice, SyncScheduler, DEFAULT_DEBOUNCE,
};

const NOTICE_BUFFER: usize = 64;
const RETRY_INITIAL: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(30);

//=========================================================================================
// Settings and errors
//=========================================================================================

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub debounce: Duration,
    pub echo_window: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            echo_window: DEFAULT_ECHO_WINDOW,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Remote store is not configured")]
    NotConfigured,
    #[error("Course {0} not found")]
    CourseNotFound(String),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Remote(#[from] PortError),
    #[error(transparent)]
    ShareLink(#[from] ShareLinkError),
}

//=========================================================================================
// State
//=========================================================================================

struct State {
    branding: Branding,
    mentor: Mentor,
    courses: Vec<Course>,
    remote: RemoteConfig,
    session: Session,
    /// Courses edited locally and not yet acknowledged by the remote store.
    dirty_courses: BTreeSet<String>,
    /// Courses deleted locally whose remote rows still have to go.
    deleted_courses: BTreeSet<String>,
}

struct Inner {
    state: Mutex<State>,
    cache: LocalCache,
    registry: ClientRegistry,
    echo: EchoSuppressor,
    notices: broadcast::Sender<SyncNotice>,
    /// Held for writing during a full fetch so no push overlaps it.
    hydration: RwLock<()>,
    /// The handle of the last successful full fetch.
    synced: std::sync::Mutex<Option<Arc<dyn RemoteStore>>>,
}

fn table_of(group: EntityGroup) -> Table {
    match group {
        EntityGroup::Branding => Table::Branding,
        EntityGroup::Mentor => Table::Mentor,
        EntityGroup::Courses => Table::Courses,
    }
}

//=========================================================================================
// Workspace
//=========================================================================================

pub struct Workspace {
    inner: Arc<Inner>,
    scheduler: SyncScheduler,
    listener: std::sync::Mutex<Option<CancellationToken>>,
}

impl Workspace {
    /// Loads the cached state, connects to the remote store if credentials are
    /// known and fetches the server state before any push can run.
    ///
    /// `fallback_remote` is used when no credentials have been cached yet.
    pub async fn open(
        cache: LocalCache,
        factory: Arc<dyn RemoteStoreFactory>,
        settings: SyncSettings,
        fallback_remote: RemoteConfig,
    ) -> Self {
        let state = State {
            branding: cache.get(BRANDING_KEY, Branding::default()),
            mentor: cache.get(MENTOR_KEY, Mentor::default()),
            courses: cache.get(COURSES_KEY, Vec::new()),
            remote: cache.get(REMOTE_CONFIG_KEY, fallback_remote),
            session: cache.get(SESSION_KEY, Session::default()),
            dirty_courses: BTreeSet::new(),
            deleted_courses: BTreeSet::new(),
        };
        info!(
            "Loaded {} cached course(s) for '{}'",
            state.courses.len(),
            state.branding.site_name
        );

        let origin = Uuid::new_v4();
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            cache,
            registry: ClientRegistry::new(factory, origin),
            echo: EchoSuppressor::new(origin, settings.echo_window),
            notices: notices.clone(),
            hydration: RwLock::new(()),
            synced: std::sync::Mutex::new(None),
        });
        let scheduler = SyncScheduler::start(inner.clone(), settings.debounce, notices);
        let workspace = Self {
            inner,
            scheduler,
            listener: std::sync::Mutex::new(None),
        };

        if let Err(e) = workspace.connect().await {
            warn!("Remote store unavailable, continuing with local state: {}", e);
        }
        workspace
    }

    /// (Re)connects with the current credentials: realtime subscription and
    /// full fetch. Returns `false` in local-only mode.
    ///
    /// When the first attempt fails the error is returned and a background
    /// task keeps retrying.
    pub async fn connect(&self) -> Result<bool, WorkspaceError> {
        self.stop_listener();
        self.inner.lock_synced().take();
        let config = self.inner.state.lock().await.remote.clone();
        let Some(client) = self.inner.registry.client_for(&config).await? else {
            info!("No remote credentials; running in local-only mode");
            return Ok(false);
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.lock_listener().replace(token.clone()) {
            previous.cancel();
        }
        let (stream, result) = match establish(&self.inner, &self.scheduler, &client).await {
            Ok(stream) => (Some(stream), Ok(true)),
            Err(e) => (None, Err(WorkspaceError::from(e))),
        };
        tokio::spawn(supervise(
            self.inner.clone(),
            self.scheduler.clone(),
            client,
            stream,
            token,
        ));
        result
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.listener.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stop_listener(&self) {
        if let Some(token) = self.lock_listener().take() {
            token.cancel();
        }
    }

    pub fn shutdown(&self) {
        self.stop_listener();
    }

    pub fn origin(&self) -> Uuid {
        self.inner.echo.origin()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.notices.subscribe()
    }

    /// The remote handle in use, if any.
    pub async fn client(&self) -> Option<Arc<dyn RemoteStore>> {
        self.inner.registry.current().await
    }

    /// Whether local edits currently reach the remote store.
    pub async fn is_synced(&self) -> bool {
        self.inner.synced_client().await.is_some()
    }

    //-------------------------------------------------------------------------------------
    // Reads
    //-------------------------------------------------------------------------------------

    pub async fn branding(&self) -> Branding {
        self.inner.state.lock().await.branding.clone()
    }

    pub async fn mentor(&self) -> Mentor {
        self.inner.state.lock().await.mentor.clone()
    }

    pub async fn courses(&self) -> Vec<Course> {
        self.inner.state.lock().await.courses.clone()
    }

    pub async fn course(&self, id: &str) -> Option<Course> {
        self.inner
            .state
            .lock()
            .await
            .courses
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub async fn remote_config(&self) -> RemoteConfig {
        self.inner.state.lock().await.remote.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.lock().await.session.authenticated
    }

    //-------------------------------------------------------------------------------------
    // Mutations
    //-------------------------------------------------------------------------------------

    pub async fn set_session(&self, authenticated: bool) {
        let mut state = self.inner.state.lock().await;
        state.session = Session { authenticated };
        self.inner.cache.set(SESSION_KEY, &state.session);
    }

    pub async fn update_branding(&self, edit: impl FnOnce(&mut Branding)) -> Branding {
        let branding = {
            let mut state = self.inner.state.lock().await;
            edit(&mut state.branding);
            state.branding.updated_at = Utc::now();
            self.inner.cache.set(BRANDING_KEY, &state.branding);
            state.branding.clone()
        };
        self.scheduler.notify(EntityGroup::Branding);
        branding
    }

    pub async fn update_mentor(&self, edit: impl FnOnce(&mut Mentor)) -> Mentor {
        let mentor = {
            let mut state = self.inner.state.lock().await;
            edit(&mut state.mentor);
            state.mentor.updated_at = Utc::now();
            self.inner.cache.set(MENTOR_KEY, &state.mentor);
            state.mentor.clone()
        };
        self.scheduler.notify(EntityGroup::Mentor);
        mentor
    }

    /// Adds a course with a fresh client-generated id.
    pub async fn create_course(&self) -> Course {
        let course = {
            let mut state = self.inner.state.lock().await;
            let course = Course::new(MENTOR_ID);
            state.courses.push(course.clone());
            state.dirty_courses.insert(course.id.clone());
            self.inner.cache.set(COURSES_KEY, &state.courses);
            course
        };
        info!("Created course {}", course.id);
        self.scheduler.notify(EntityGroup::Courses);
        course
    }

    /// Applies `edit` to a copy of the course and keeps it only if the edit succeeds.
    pub async fn update_course(
        &self,
        id: &str,
        edit: impl FnOnce(&mut Course) -> Result<(), EditError>,
    ) -> Result<Course, WorkspaceError> {
        let course = {
            let mut state = self.inner.state.lock().await;
            let slot = state
                .courses
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| WorkspaceError::CourseNotFound(id.to_string()))?;
            let mut edited = slot.clone();
            edit(&mut edited)?;
            edited.id = slot.id.clone();
            edited.created_at = slot.created_at;
            edited.updated_at = Utc::now();
            *slot = edited.clone();
            state.dirty_courses.insert(id.to_string());
            self.inner.cache.set(COURSES_KEY, &state.courses);
            edited
        };
        self.scheduler.notify(EntityGroup::Courses);
        Ok(course)
    }

    /// Removes the course locally. The remote delete runs on the courses
    /// worker right away when connected, after any push already in flight,
    /// and otherwise with the first push after reconnecting.
    pub async fn delete_course(&self, id: &str) -> Result<(), WorkspaceError> {
        {
            let mut state = self.inner.state.lock().await;
            let index = state
                .courses
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| WorkspaceError::CourseNotFound(id.to_string()))?;
            state.courses.remove(index);
            state.dirty_courses.remove(id);
            state.deleted_courses.insert(id.to_string());
            self.inner.cache.set(COURSES_KEY, &state.courses);
        }
        info!("Deleted course {}", id);

        if self.is_synced().await {
            self.scheduler.flush(EntityGroup::Courses).await?;
        }
        Ok(())
    }

    /// The explicit "Save": pushes `group` now and reports the typed result.
    /// Reconnects first if the last full fetch did not succeed.
    pub async fn save(&self, group: EntityGroup) -> Result<PushOutcome, WorkspaceError> {
        if !self.inner.state.lock().await.remote.is_complete() {
            return Err(WorkspaceError::NotConfigured);
        }
        if !self.is_synced().await {
            self.connect().await?;
        }
        Ok(self.scheduler.flush(group).await?)
    }

    pub async fn save_course(&self, id: &str) -> Result<PushOutcome, WorkspaceError> {
        {
            let mut state = self.inner.state.lock().await;
            if !state.courses.iter().any(|c| c.id == id) {
                return Err(WorkspaceError::CourseNotFound(id.to_string()));
            }
            state.dirty_courses.insert(id.to_string());
        }
        self.save(EntityGroup::Courses).await
    }

    /// Stores new credentials and reconnects with them.
    pub async fn set_remote_config(&self, config: RemoteConfig) -> Result<bool, WorkspaceError> {
        {
            let mut state = self.inner.state.lock().await;
            state.remote = config;
            self.inner.cache.set(REMOTE_CONFIG_KEY, &state.remote);
        }
        self.connect().await
    }

    /// Parses a shared course link and adopts its credentials when this
    /// workspace has none of its own.
    pub async fn adopt_shared_link(&self, link: &str) -> Result<SharedLink, WorkspaceError> {
        let shared = parse_course_link(link)?;
        if let Some(remote) = &shared.remote {
            let current = self.remote_config().await;
            if !current.is_complete() {
                info!("Adopting remote credentials from shared link");
                self.set_remote_config(remote.clone()).await?;
            }
        }
        Ok(shared)
    }

    /// Merges one realtime change. Returns the group that changed, if any.
    pub async fn apply_remote_change(&self, event: ChangeEvent) -> Option<EntityGroup> {
        self.inner.apply_remote_change(event).await
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

//=========================================================================================
// Full fetch and realtime merge
//=========================================================================================

/// Fetches branding, mentor and courses and schedules pushes for local data
/// the server has not seen.
async fn hydrate_and_schedule(
    inner: &Inner,
    scheduler: &SyncScheduler,
    client: &Arc<dyn RemoteStore>,
) -> PortResult<()> {
    let pending = inner.hydrate(client).await?;
    for group in pending {
        scheduler.notify(group);
    }
    Ok(())
}

/// Subscribes, then fetches. Changes written during the fetch wait in the
/// stream and merge afterwards.
async fn establish(
    inner: &Inner,
    scheduler: &SyncScheduler,
    client: &Arc<dyn RemoteStore>,
) -> PortResult<ChangeStream> {
    let stream = client.subscribe(None).await?;
    hydrate_and_schedule(inner, scheduler, client).await?;
    Ok(stream)
}

/// Runs the realtime listener for `client` and re-establishes it, with
/// backoff, whenever the stream or a refetch fails.
async fn supervise(
    inner: Arc<Inner>,
    scheduler: SyncScheduler,
    client: Arc<dyn RemoteStore>,
    mut stream: Option<ChangeStream>,
    token: CancellationToken,
) {
    let mut backoff = RETRY_INITIAL;
    loop {
        let current = match stream.take() {
            Some(current) => current,
            None => {
                warn!("Remote store unreachable; retrying in {:?}", backoff);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = sleep(backoff) => {}
                }
                match establish(&inner, &scheduler, &client).await {
                    Ok(current) => {
                        info!("Remote store reachable again");
                        current
                    }
                    Err(e) => {
                        warn!("Reconnect failed: {}", e);
                        backoff = (backoff * 2).min(RETRY_MAX);
                        continue;
                    }
                }
            }
        };
        backoff = RETRY_INITIAL;
        if !listen(&inner, &scheduler, &client, current, &token).await {
            return;
        }
        inner.lock_synced().take();
    }
}

/// Merges changes until cancelled (`false`) or until the stream needs to be
/// re-established (`true`).
async fn listen(
    inner: &Inner,
    scheduler: &SyncScheduler,
    client: &Arc<dyn RemoteStore>,
    mut stream: ChangeStream,
    token: &CancellationToken,
) -> bool {
    debug!("Realtime listener started");
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Realtime listener stopped");
                return false;
            }
            item = stream.next() => match item {
                Some(RealtimeEvent::Change(event)) => {
                    inner.apply_remote_change(event).await;
                }
                Some(RealtimeEvent::Reconnected) => {
                    info!("Realtime stream reconnected; refetching");
                    if let Err(e) = hydrate_and_schedule(inner, scheduler, client).await {
                        warn!("Refetch after reconnect failed: {}", e);
                        return true;
                    }
                }
                None => {
                    warn!("Realtime stream ended");
                    return true;
                }
            },
        }
    }
}

impl Inner {
    fn lock_synced(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn RemoteStore>>> {
        self.synced.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The registered handle, provided a full fetch through it succeeded.
    async fn synced_client(&self) -> Option<Arc<dyn RemoteStore>> {
        let current = self.registry.current().await?;
        let in_sync = self
            .lock_synced()
            .as_ref()
            .is_some_and(|synced| Arc::ptr_eq(synced, &current));
        in_sync.then_some(current)
    }

    async fn hydrate(&self, client: &Arc<dyn RemoteStore>) -> PortResult<Vec<EntityGroup>> {
        let _gate = self.hydration.write().await;
        let branding = client.select_singleton(Table::Branding, BRANDING_ID).await?;
        let mentor = client.select_singleton(Table::Mentor, MENTOR_ID).await?;
        let course_rows = client.select_all(Table::Courses).await?;

        let mut pending = Vec::new();
        let mut state = self.state.lock().await;

        match branding.map(rows::branding_from_row).transpose() {
            Ok(Some(remote)) if remote.updated_at >= state.branding.updated_at => {
                state.branding = remote;
            }
            Ok(Some(_)) | Ok(None) => pending.push(EntityGroup::Branding),
            Err(e) => warn!("Ignoring unreadable branding row: {}", e),
        }
        match mentor.map(rows::mentor_from_row).transpose() {
            Ok(Some(remote)) if remote.updated_at >= state.mentor.updated_at => {
                state.mentor = remote;
            }
            Ok(Some(_)) | Ok(None) => pending.push(EntityGroup::Mentor),
            Err(e) => warn!("Ignoring unreadable mentor row: {}", e),
        }

        let mut courses = Vec::with_capacity(course_rows.len());
        for row in course_rows {
            match rows::course_from_row(row) {
                Ok(remote) if state.deleted_courses.contains(&remote.id) => {}
                Ok(remote) => {
                    let local = state.courses.iter().find(|c| c.id == remote.id);
                    match local {
                        Some(local)
                            if state.dirty_courses.contains(&local.id)
                                && local.updated_at > remote.updated_at =>
                        {
                            courses.push(local.clone());
                        }
                        _ => {
                            state.dirty_courses.remove(&remote.id);
                            courses.push(remote);
                        }
                    }
                }
                Err(e) => warn!("Ignoring unreadable course row: {}", e),
            }
        }
        // Courses created locally and never pushed survive the fetch.
        for local in &state.courses {
            if state.dirty_courses.contains(&local.id) && !courses.iter().any(|c| c.id == local.id)
            {
                courses.push(local.clone());
            }
        }
        state.courses = courses;
        if !state.dirty_courses.is_empty() || !state.deleted_courses.is_empty() {
            pending.push(EntityGroup::Courses);
        }

        self.cache.set(BRANDING_KEY, &state.branding);
        self.cache.set(MENTOR_KEY, &state.mentor);
        self.cache.set(COURSES_KEY, &state.courses);
        info!("Fetched remote state: {} course(s)", state.courses.len());
        drop(state);
        *self.lock_synced() = Some(client.clone());

        let _ = self.notices.send(SyncNotice::Hydrated);
        Ok(pending)
    }

    async fn apply_remote_change(&self, event: ChangeEvent) -> Option<EntityGroup> {
        let Some(table) = event.table() else {
            debug!("Ignoring change on unknown table '{}'", event.table);
            return None;
        };
        if self.echo.should_ignore(&event) {
            debug!("Ignoring echo of local write on {}", table);
            return None;
        }

        let mut state = self.state.lock().await;
        let group = match (table, event.kind) {
            (Table::Events, _) => return None,
            // Singletons are never deleted.
            (Table::Branding | Table::Mentor, ChangeKind::Delete) => return None,
            (Table::Branding, _) => {
                let remote = parse_record(event.record, rows::branding_from_row)?;
                if remote.updated_at < state.branding.updated_at || remote == state.branding {
                    return None;
                }
                state.branding = remote;
                self.cache.set(BRANDING_KEY, &state.branding);
                EntityGroup::Branding
            }
            (Table::Mentor, _) => {
                let remote = parse_record(event.record, rows::mentor_from_row)?;
                if remote.updated_at < state.mentor.updated_at || remote == state.mentor {
                    return None;
                }
                state.mentor = remote;
                self.cache.set(MENTOR_KEY, &state.mentor);
                EntityGroup::Mentor
            }
            (Table::Courses, ChangeKind::Delete) => {
                let id = event.record_id()?.to_string();
                let index = state.courses.iter().position(|c| c.id == id)?;
                state.courses.remove(index);
                state.dirty_courses.remove(&id);
                self.cache.set(COURSES_KEY, &state.courses);
                EntityGroup::Courses
            }
            (Table::Courses, _) => {
                let remote = parse_record(event.record, rows::course_from_row)?;
                if state.deleted_courses.contains(&remote.id) {
                    return None;
                }
                match state.courses.iter().position(|c| c.id == remote.id) {
                    Some(index) => {
                        let local = &state.courses[index];
                        if remote.updated_at < local.updated_at || remote == *local {
                            return None;
                        }
                        state.dirty_courses.remove(&remote.id);
                        state.courses[index] = remote;
                    }
                    None => state.courses.push(remote),
                }
                self.cache.set(COURSES_KEY, &state.courses);
                EntityGroup::Courses
            }
        };
        drop(state);

        debug!("Applied remote change to {}", group);
        let _ = self.notices.send(SyncNotice::RemoteApplied { group });
        Some(group)
    }
}

fn parse_record<T>(
    record: Option<Value>,
    parse: impl FnOnce(Value) -> Result<T, serde_json::Error>,
) -> Option<T> {
    match parse(record?) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable remote row: {}", e);
            None
        }
    }
}

//=========================================================================================
// `GroupPusher` Implementation
//=========================================================================================

/// What one push cycle sends.
#[derive(Default)]
struct Batch {
    rows: Vec<Value>,
    /// Course ids whose dirty flag was taken for this batch.
    sent_ids: Vec<String>,
    deletes: Vec<String>,
}

#[async_trait]
impl GroupPusher for Inner {
    async fn push(&self, group: EntityGroup) -> PortResult<PushOutcome> {
        let _gate = self.hydration.read().await;
        let Some(client) = self.synced_client().await else {
            return Ok(PushOutcome::LocalOnly);
        };

        let batch = {
            let mut state = self.state.lock().await;
            match group {
                EntityGroup::Branding => Batch {
                    rows: vec![rows::branding_to_row(&state.branding)],
                    ..Batch::default()
                },
                EntityGroup::Mentor => Batch {
                    rows: vec![rows::mentor_to_row(&state.mentor)],
                    ..Batch::default()
                },
                EntityGroup::Courses => {
                    let deletes = std::mem::take(&mut state.deleted_courses).into_iter().collect();
                    let sent_ids: Vec<String> = std::mem::take(&mut state.dirty_courses)
                        .into_iter()
                        .filter(|id| state.courses.iter().any(|c| &c.id == id))
                        .collect();
                    let rows = sent_ids
                        .iter()
                        .filter_map(|id| state.courses.iter().find(|c| &c.id == id))
                        .map(rows::course_to_row)
                        .collect();
                    Batch {
                        rows,
                        sent_ids,
                        deletes,
                    }
                }
            }
        };
        if batch.rows.is_empty() && batch.deletes.is_empty() {
            return Ok(PushOutcome::NothingToPush);
        }

        let table = table_of(group);
        let count = batch.rows.len() + batch.deletes.len();
        self.echo.mark_local_write();
        for (done, id) in batch.deletes.iter().enumerate() {
            if let Err(e) = client.delete_by_id(table, id).await {
                let mut state = self.state.lock().await;
                state.deleted_courses.extend(batch.deletes[done..].iter().cloned());
                state.dirty_courses.extend(batch.sent_ids);
                return Err(e);
            }
        }
        for row in batch.rows {
            if let Err(e) = client.upsert(table, row, "id").await {
                // Keep the edits queued so the next save resends them.
                let mut state = self.state.lock().await;
                state.dirty_courses.extend(batch.sent_ids);
                return Err(e);
            }
        }
        self.echo.mark_local_write();
        Ok(PushOutcome::Pushed(count))
    }
}
