//! services/studio/src/sync/visits.rs
//!
//! Page-view tracking for the public viewer and the analytics summary built
//! from the recorded events.

use arunika_core::domain::{DeviceType, VisitEvent};
use arunika_core::ports::{RemoteStore, Table};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::rows;

pub const PAGE_VIEW_EVENT: &str = "page_view";

/// Visitors remembered for de-duplication before the table is reset.
const MAX_TRACKED_VISITORS: usize = 10_000;

/// What the viewer knows about one page view.
#[derive(Debug, Clone, Default)]
pub struct VisitRequest {
    pub course_id: String,
    pub visitor_id: String,
    pub user_agent: String,
    pub referrer: String,
    pub full_path: String,
}

#[derive(Default)]
pub struct VisitTracker {
    last_route: Mutex<HashMap<String, String>>,
}

impl VisitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a view unless it repeats the visitor's previous route. The
    /// insert runs in the background; its failure is only logged.
    pub fn record(
        &self,
        client: Option<Arc<dyn RemoteStore>>,
        visit: VisitRequest,
    ) -> Option<VisitEvent> {
        {
            let mut last = self
                .last_route
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if last.get(&visit.visitor_id) == Some(&visit.full_path) {
                debug!("Repeated view of {} by the same visitor", visit.full_path);
                return None;
            }
            if last.len() >= MAX_TRACKED_VISITORS {
                last.clear();
            }
            last.insert(visit.visitor_id.clone(), visit.full_path.clone());
        }

        let event = build_event(visit);
        match client {
            Some(client) => {
                let row = rows::event_to_row(&event);
                tokio::spawn(async move {
                    if let Err(e) = client.upsert(Table::Events, row, "id").await {
                        warn!("Failed to record visit: {}", e);
                    }
                });
            }
            None => debug!("Local-only mode; visit to {} not recorded", event.course_id),
        }
        Some(event)
    }
}

fn build_event(visit: VisitRequest) -> VisitEvent {
    let source = visit_source(&visit.full_path, &visit.referrer);
    VisitEvent {
        id: Uuid::new_v4(),
        event_name: PAGE_VIEW_EVENT.to_string(),
        course_id: visit.course_id,
        visitor_id: visit.visitor_id,
        device_type: DeviceType::from_user_agent(&visit.user_agent),
        user_agent: visit.user_agent,
        referrer: visit.referrer,
        source,
        full_path: visit.full_path,
        created_at: Utc::now(),
    }
}

/// The traffic source: `utm_source` or `ref` from the query, else the
/// referrer's host, else `"direct"`.
pub fn visit_source(full_path: &str, referrer: &str) -> String {
    let query = full_path.split_once('?').map(|(_, q)| q).unwrap_or("");
    let param = |name: &str| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, value)| *key == name && !value.is_empty())
            .map(|(_, value)| value.to_string())
    };
    if let Some(source) = param("utm_source").or_else(|| param("ref")) {
        return source;
    }

    let host = referrer
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(referrer)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .trim_start_matches("www.");
    if host.is_empty() {
        "direct".to_string()
    } else {
        host.to_string()
    }
}

//=========================================================================================
// Analytics
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseStats {
    pub views: usize,
    pub visitors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_views: usize,
    pub unique_visitors: usize,
    pub by_course: BTreeMap<String, CourseStats>,
    pub by_device: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
}

pub fn summarize(events: &[VisitEvent]) -> AnalyticsSummary {
    let mut summary = AnalyticsSummary::default();
    let mut visitors = BTreeSet::new();
    let mut course_visitors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for event in events.iter().filter(|e| e.event_name == PAGE_VIEW_EVENT) {
        summary.total_views += 1;
        visitors.insert(event.visitor_id.as_str());
        course_visitors
            .entry(event.course_id.as_str())
            .or_default()
            .insert(event.visitor_id.as_str());
        summary
            .by_course
            .entry(event.course_id.clone())
            .or_default()
            .views += 1;
        *summary
            .by_device
            .entry(event.device_type.as_str().to_string())
            .or_default() += 1;
        *summary.by_source.entry(event.source.clone()).or_default() += 1;
    }

    summary.unique_visitors = visitors.len();
    for (course_id, ids) in course_visitors {
        if let Some(stats) = summary.by_course.get_mut(course_id) {
            stats.visitors = ids.len();
        }
    }
    summary
}
