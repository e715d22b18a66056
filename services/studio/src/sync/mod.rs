//! services/studio/src/sync/mod.rs
//!
//! Keeps the admin workspace in step with the local cache and the remote store.

pub mod client;
pub mod rows;
pub mod scheduler;
pub mod visits;
pub mod workspace;

pub use client::ClientRegistry;
pub use scheduler::{EntityGroup, FailureKind, PushOutcome, SyncNotice, SyncScheduler};
pub use visits::{summarize, AnalyticsSummary, VisitRequest, VisitTracker};
pub use workspace::{SyncSettings, Workspace, WorkspaceError};
