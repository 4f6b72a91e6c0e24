//! Per-vendor analytics over event lifecycles.
//!
//! Counts cover every record; milestone durations cover completed, live
//! events only. A duration pair contributes only when both endpoints exist
//! and the later one is not before the earlier one, so inconsistent records
//! never drag an average negative.

use crate::types::{Event, EventStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated view of one vendor's events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorAnalytics {
    /// Every record, deleted or not
    pub total_events: u64,
    /// Records not soft-deleted
    pub active_events: u64,
    /// Soft-deleted records
    pub deleted_events: u64,
    /// Active records per status; every status is present
    pub status_counts: BTreeMap<EventStatus, u64>,
    /// Completed, active records (the duration population)
    pub completed_events: u64,
    /// Milestone duration averages
    pub average_durations: DurationAverages,
}

impl Default for VendorAnalytics {
    fn default() -> Self {
        Self {
            total_events: 0,
            active_events: 0,
            deleted_events: 0,
            status_counts: empty_status_counts(),
            completed_events: 0,
            average_durations: DurationAverages::default(),
        }
    }
}

/// Mean durations in milliseconds, `None` when nothing contributed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationAverages {
    /// Check-in to start verification
    pub check_in_to_start_ms: Option<i64>,
    /// Start verification to close
    pub start_to_close_ms: Option<i64>,
    /// Check-in to close
    pub check_in_to_close_ms: Option<i64>,
    /// Contributing pairs per average
    pub samples: DurationSamples,
}

/// How many pairs contributed to each average.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationSamples {
    /// See [`DurationAverages::check_in_to_start_ms`]
    pub check_in_to_start: u64,
    /// See [`DurationAverages::start_to_close_ms`]
    pub start_to_close: u64,
    /// See [`DurationAverages::check_in_to_close_ms`]
    pub check_in_to_close: u64,
}

/// A zero entry for every status.
#[must_use]
pub fn empty_status_counts() -> BTreeMap<EventStatus, u64> {
    EventStatus::ALL.into_iter().map(|s| (s, 0)).collect()
}

/// Aggregate a vendor's records.
#[must_use]
pub fn aggregate(events: &[Event]) -> VendorAnalytics {
    let mut analytics = VendorAnalytics::default();
    for event in events {
        analytics.total_events += 1;
        if event.is_deleted {
            analytics.deleted_events += 1;
        } else {
            analytics.active_events += 1;
            *analytics.status_counts.entry(event.status).or_insert(0) += 1;
        }
    }
    let completed: Vec<&Event> = events
        .iter()
        .filter(|e| !e.is_deleted && e.status == EventStatus::Completed)
        .collect();
    analytics.completed_events = completed.len() as u64;
    analytics.average_durations = from_completed(completed);
    analytics
}

/// Duration averages over already-filtered completed events.
///
/// Stores that count natively call this with only their completed records.
#[must_use]
pub fn from_completed<'a>(events: impl IntoIterator<Item = &'a Event>) -> DurationAverages {
    let mut check_in_to_start = Mean::default();
    let mut start_to_close = Mean::default();
    let mut check_in_to_close = Mean::default();

    for event in events {
        let checked_in = event.check_in.as_ref().map(|c| c.timestamp);
        let started = event.start_otp.as_ref().and_then(|o| o.verified_at);
        let closed = event
            .closing_otp
            .as_ref()
            .and_then(|o| o.verified_at)
            .or(event.completed_at);

        check_in_to_start.push(checked_in, started);
        start_to_close.push(started, closed);
        check_in_to_close.push(checked_in, closed);
    }

    DurationAverages {
        check_in_to_start_ms: check_in_to_start.value(),
        start_to_close_ms: start_to_close.value(),
        check_in_to_close_ms: check_in_to_close.value(),
        samples: DurationSamples {
            check_in_to_start: check_in_to_start.count,
            start_to_close: start_to_close.count,
            check_in_to_close: check_in_to_close.count,
        },
    }
}

#[derive(Default)]
struct Mean {
    sum: i128,
    count: u64,
}

impl Mean {
    fn push(&mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) {
        let (Some(from), Some(to)) = (from, to) else {
            return;
        };
        let ms = (to - from).num_milliseconds();
        if ms >= 0 {
            self.sum += i128::from(ms);
            self.count += 1;
        }
    }

    /// Arithmetic mean rounded half up.
    fn value(&self) -> Option<i64> {
        if self.count == 0 {
            return None;
        }
        let n = i128::from(self.count);
        i64::try_from((2 * self.sum + n) / (2 * n)).ok()
    }
}
