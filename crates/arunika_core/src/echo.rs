//! crates/arunika_core/src/echo.rs
//!
//! Filters realtime notifications that are echoes of this client's own writes.
//!
//! Writes are tagged with the client's origin id; notifications that carry an
//! origin are judged by it alone. Notifications without one fall back to a
//! time window after the most recent local write. Inside that window a
//! genuine concurrent edit from another session is dropped too.

use std::sync::Mutex;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::ports::ChangeEvent;

pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_millis(2500);

#[derive(Debug)]
pub struct EchoSuppressor {
    origin: Uuid,
    window: Duration,
    last_local_write: Mutex<Option<Instant>>,
}

impl EchoSuppressor {
    pub fn new(origin: Uuid, window: Duration) -> Self {
        Self {
            origin,
            window,
            last_local_write: Mutex::new(None),
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records "now" as the time of the latest local write.
    pub fn mark_local_write(&self) {
        let mut last = self
            .last_local_write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(Instant::now());
    }

    pub fn within_window(&self) -> bool {
        let last = self
            .last_local_write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last.is_some_and(|at| at.elapsed() < self.window)
    }

    pub fn should_ignore(&self, event: &ChangeEvent) -> bool {
        match event.origin {
            Some(origin) => origin == self.origin,
            None => self.within_window(),
        }
    }
}
