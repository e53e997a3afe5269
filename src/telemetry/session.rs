//! Per-instance session state.

use crate::telemetry::event::SessionInfo;
use crate::telemetry::storage::{ClientStorage, SESSION_EXISTS_KEY, USER_COHORT_KEY};
use chrono::{TimeZone, Utc};
use tracing::warn;
use uuid::Uuid;

/// Session counters and timing references.
///
/// One session lives as long as the pipeline instance. Whether it is the
/// shopper's first session is decided once, from durable storage.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    is_first_session: bool,
    started_at: i64,
    page_views: u32,
    event_count: u32,
    page_loaded_at: i64,
}

impl Session {
    /// Start a session at `now` and mark the storage as having seen one.
    ///
    /// The first session also records the shopper's cohort (`YYYY-MM` of the
    /// first visit).
    pub fn start(storage: &dyn ClientStorage, now: i64) -> Self {
        let is_first_session = storage.get(SESSION_EXISTS_KEY).is_none();

        if is_first_session {
            if let Err(e) = storage.set(SESSION_EXISTS_KEY, "true") {
                warn!("Could not persist session marker: {}", e);
            }
        }
        if storage.get(USER_COHORT_KEY).is_none() {
            if let Some(cohort) = cohort_for(now) {
                if let Err(e) = storage.set(USER_COHORT_KEY, &cohort) {
                    warn!("Could not persist user cohort: {}", e);
                }
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            is_first_session,
            started_at: now,
            page_views: 0,
            event_count: 0,
            page_loaded_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_first_session(&self) -> bool {
        self.is_first_session
    }

    pub fn page_views(&self) -> u32 {
        self.page_views
    }

    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    pub(crate) fn record_event(&mut self) {
        self.event_count = self.event_count.saturating_add(1);
    }

    /// Count a page view and restart the dwell timer.
    ///
    /// Returns the time spent since the previous page load marker.
    pub(crate) fn record_page_view(&mut self, now: i64) -> i64 {
        self.page_views = self.page_views.saturating_add(1);
        let elapsed = (now - self.page_loaded_at).max(0);
        self.page_loaded_at = now;
        elapsed
    }

    pub fn snapshot(&self, now: i64) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            is_first_session: self.is_first_session,
            duration: (now - self.started_at).max(0),
            page_views: self.page_views,
            event_count: self.event_count,
        }
    }
}

fn cohort_for(now: i64) -> Option<String> {
    Utc.timestamp_millis_opt(now)
        .single()
        .map(|date| date.format("%Y-%m").to_string())
}
