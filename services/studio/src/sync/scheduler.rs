//! services/studio/src/sync/scheduler.rs
//!
//! Debounced pushes of local edits to the remote store.
//!
//! Each entity group runs its own worker task:
//!
//! * **Idle**: waits for a change signal.
//! * **PendingDebounce**: every further change restarts the quiet-period timer,
//!   so a burst of edits collapses into a single push.
//! * **Pushing**: the group's pusher sends the current snapshot. Signals that
//!   arrive meanwhile stay queued and start the next cycle afterwards, so at
//!   most one push per group is ever in flight.
//!
//! Failures end the cycle like successes do; they are reported as notices and
//! nothing is retried until the next change or an explicit flush.

use arunika_core::ports::{PortError, PortResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

//=========================================================================================
// Groups, outcomes and notices
//=========================================================================================

/// Independently scheduled groups of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityGroup {
    Branding,
    Mentor,
    Courses,
}

impl EntityGroup {
    pub const ALL: [EntityGroup; 3] = [EntityGroup::Branding, EntityGroup::Mentor, EntityGroup::Courses];
}

impl fmt::Display for EntityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityGroup::Branding => "branding",
            EntityGroup::Mentor => "mentor",
            EntityGroup::Courses => "courses",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "rows", rename_all = "snake_case")]
pub enum PushOutcome {
    /// `n` rows were written.
    Pushed(usize),
    /// Nothing was waiting to be sent.
    NothingToPush,
    /// No remote store is configured.
    LocalOnly,
}

/// How a failed push should be explained to the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SchemaOutdated,
    Timeout,
    Generic,
}

impl FailureKind {
    pub fn of(error: &PortError) -> Self {
        match error {
            PortError::SchemaMismatch(_) => FailureKind::SchemaOutdated,
            PortError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Generic,
        }
    }

    /// An actionable, user-facing message.
    pub fn advice(&self) -> &'static str {
        match self {
            FailureKind::SchemaOutdated => {
                "Your database schema is out of date. Run the latest migration, then save again."
            }
            FailureKind::Timeout => "The database did not answer in time. Try saving again.",
            FailureKind::Generic => "Saving to the database failed. Your changes are kept; try again.",
        }
    }
}

/// Events for the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncNotice {
    Pushed { group: EntityGroup, rows: usize },
    PushFailed {
        group: EntityGroup,
        kind: FailureKind,
        message: String,
        detail: String,
    },
    /// A remote change was merged into local state.
    RemoteApplied { group: EntityGroup },
    /// Local state was replaced by a full fetch.
    Hydrated,
}

impl SyncNotice {
    pub fn push_failed(group: EntityGroup, error: &PortError) -> Self {
        let kind = FailureKind::of(error);
        SyncNotice::PushFailed {
            group,
            kind,
            message: kind.advice().to_string(),
            detail: error.to_string(),
        }
    }
}

//=========================================================================================
// The pusher port
//=========================================================================================

/// Sends the current snapshot of a group to the remote store.
#[async_trait]
pub trait GroupPusher: Send + Sync {
    async fn push(&self, group: EntityGroup) -> PortResult<PushOutcome>;
}

//=========================================================================================
// Scheduler
//=========================================================================================

enum Signal {
    Changed,
    Flush(oneshot::Sender<PortResult<PushOutcome>>),
}

#[derive(Clone)]
pub struct SyncScheduler {
    workers: HashMap<EntityGroup, mpsc::UnboundedSender<Signal>>,
}

impl SyncScheduler {
    /// Spawns one worker per group. Workers stop once every clone of the
    /// scheduler is dropped.
    pub fn start(
        pusher: Arc<dyn GroupPusher>,
        debounce: Duration,
        notices: broadcast::Sender<SyncNotice>,
    ) -> Self {
        let workers = EntityGroup::ALL
            .into_iter()
            .map(|group| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(group, rx, pusher.clone(), debounce, notices.clone()));
                (group, tx)
            })
            .collect();
        Self { workers }
    }

    /// Records that `group` changed; a push follows after the quiet period.
    pub fn notify(&self, group: EntityGroup) {
        if let Some(tx) = self.workers.get(&group) {
            if tx.send(Signal::Changed).is_err() {
                warn!("Sync worker for {} has stopped", group);
            }
        }
    }

    /// Pushes `group` now, after any push already in flight, and returns the result.
    pub async fn flush(&self, group: EntityGroup) -> PortResult<PushOutcome> {
        let (reply, result) = oneshot::channel();
        let stopped = || PortError::Unexpected(format!("sync worker for {group} has stopped"));
        self.workers
            .get(&group)
            .ok_or_else(stopped)?
            .send(Signal::Flush(reply))
            .map_err(|_| stopped())?;
        result.await.map_err(|_| stopped())?
    }
}

async fn run_worker(
    group: EntityGroup,
    mut rx: mpsc::UnboundedReceiver<Signal>,
    pusher: Arc<dyn GroupPusher>,
    debounce: Duration,
    notices: broadcast::Sender<SyncNotice>,
) {
    // Idle
    while let Some(signal) = rx.recv().await {
        let mut waiting = Vec::new();
        if let Signal::Flush(reply) = signal {
            waiting.push(reply);
        } else {
            // PendingDebounce
            loop {
                tokio::select! {
                    _ = sleep(debounce) => break,
                    next = rx.recv() => match next {
                        Some(Signal::Changed) => continue,
                        Some(Signal::Flush(reply)) => {
                            waiting.push(reply);
                            break;
                        }
                        None => return,
                    },
                }
            }
        }

        // Pushing
        debug!("Pushing {}", group);
        let result = pusher.push(group).await;
        match &result {
            Ok(PushOutcome::Pushed(rows)) => {
                info!("Pushed {} row(s) for {}", rows, group);
                let _ = notices.send(SyncNotice::Pushed { group, rows: *rows });
            }
            Ok(outcome) => debug!("Push of {} skipped: {:?}", group, outcome),
            Err(e) => {
                error!("Push of {} failed: {}", group, e);
                let _ = notices.send(SyncNotice::push_failed(group, e));
            }
        }
        for reply in waiting {
            let _ = reply.send(result.clone());
        }
    }
    debug!("Sync worker for {} stopped", group);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every push together with the value it would have sent.
    #[derive(Default)]
    struct RecordingPusher {
        value: Mutex<u32>,
        pushes: Mutex<Vec<(EntityGroup, u32)>>,
        fail_with: Mutex<Option<PortError>>,
        push_time: Duration,
    }

    #[async_trait]
    impl GroupPusher for RecordingPusher {
        async fn push(&self, group: EntityGroup) -> PortResult<PushOutcome> {
            let snapshot = *self.value.lock().unwrap();
            if !self.push_time.is_zero() {
                sleep(self.push_time).await;
            }
            if let Some(e) = self.fail_with.lock().unwrap().take() {
                return Err(e);
            }
            self.pushes.lock().unwrap().push((group, snapshot));
            Ok(PushOutcome::Pushed(1))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_is_one_push_with_final_state() {
        let pusher = Arc::new(RecordingPusher::default());
        let (notices, _) = broadcast::channel(16);
        let scheduler = SyncScheduler::start(pusher.clone(), Duration::from_millis(500), notices);

        for i in 1..=10 {
            *pusher.value.lock().unwrap() = i;
            scheduler.notify(EntityGroup::Branding);
            sleep(Duration::from_millis(100)).await;
        }
        assert!(pusher.pushes.lock().unwrap().is_empty());

        sleep(Duration::from_millis(600)).await;
        assert_eq!(*pusher.pushes.lock().unwrap(), vec![(EntityGroup::Branding, 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn change_during_push_is_queued_for_next_cycle() {
        let pusher = Arc::new(RecordingPusher {
            push_time: Duration::from_millis(300),
            ..Default::default()
        });
        let (notices, _) = broadcast::channel(16);
        let scheduler = SyncScheduler::start(pusher.clone(), Duration::from_millis(100), notices);

        *pusher.value.lock().unwrap() = 1;
        scheduler.notify(EntityGroup::Courses);
        // Debounce elapses and the first push is in flight.
        sleep(Duration::from_millis(150)).await;
        *pusher.value.lock().unwrap() = 2;
        scheduler.notify(EntityGroup::Courses);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(
            *pusher.pushes.lock().unwrap(),
            vec![(EntityGroup::Courses, 1), (EntityGroup::Courses, 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_and_worker_returns_to_idle() {
        let pusher = Arc::new(RecordingPusher::default());
        *pusher.fail_with.lock().unwrap() =
            Some(PortError::SchemaMismatch("column \"categories\" does not exist".into()));
        let (notices, mut notice_rx) = broadcast::channel(16);
        let scheduler = SyncScheduler::start(pusher.clone(), Duration::from_millis(100), notices);

        let err = scheduler.flush(EntityGroup::Courses).await.unwrap_err();
        assert!(matches!(err, PortError::SchemaMismatch(_)));
        match notice_rx.recv().await.unwrap() {
            SyncNotice::PushFailed { group, kind, .. } => {
                assert_eq!(group, EntityGroup::Courses);
                assert_eq!(kind, FailureKind::SchemaOutdated);
            }
            other => panic!("unexpected notice: {other:?}"),
        }

        // The next explicit save goes through.
        assert_eq!(scheduler.flush(EntityGroup::Courses).await, Ok(PushOutcome::Pushed(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_skips_the_debounce() {
        let pusher = Arc::new(RecordingPusher::default());
        let (notices, _) = broadcast::channel(16);
        let scheduler = SyncScheduler::start(pusher.clone(), Duration::from_secs(60), notices);

        scheduler.notify(EntityGroup::Mentor);
        let started = tokio::time::Instant::now();
        scheduler.flush(EntityGroup::Mentor).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pusher.pushes.lock().unwrap().len(), 1);
    }
}
