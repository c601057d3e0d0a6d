//! Calendar-day grouping and start-time ordering.
//!
//! Pure, deterministic derivations used to present appointment-like items
//! as day buckets. Start times are local wall-clock times, so the calendar
//! day of an item is simply the date part of its start time.

use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Anything with an optional start time
pub trait Scheduled {
    /// Local start time, if the item has one
    fn start_time(&self) -> Option<NaiveDateTime>;
}

/// Bucket key: a calendar day, or the bucket for items without a start time.
///
/// Orders chronologically, with `Unscheduled` after every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DayKey {
    /// Items starting on this local calendar day
    Day(NaiveDate),
    /// Items without a start time
    Unscheduled,
}

impl DayKey {
    /// Key for a start time, truncated to its calendar day
    #[must_use]
    pub fn of(start_time: Option<NaiveDateTime>) -> Self {
        start_time.map_or(Self::Unscheduled, |time| Self::Day(time.date()))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            Self::Unscheduled => f.write_str("unscheduled"),
        }
    }
}

/// One presentation bucket
#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket<T> {
    /// Day shared by every item in the bucket
    pub day: DayKey,
    /// Items of that day
    pub items: Vec<T>,
    /// Whether `items` has been ordered by start time
    pub sorted_by_start_time: bool,
}

/// Group items by calendar day, keeping source order inside each group
#[must_use]
pub fn group_by_day<T: Scheduled + Clone>(items: &[T]) -> BTreeMap<DayKey, Vec<T>> {
    let mut grouped: BTreeMap<DayKey, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped
            .entry(DayKey::of(item.start_time()))
            .or_default()
            .push(item.clone());
    }
    grouped
}

/// Days in ascending chronological order, `Unscheduled` last
#[must_use]
pub fn sorted_days<T>(grouped: &BTreeMap<DayKey, Vec<T>>) -> Vec<DayKey> {
    grouped.keys().copied().collect()
}

/// Stable sort by start time; items without one go last in original order
pub fn sort_within_day<T: Scheduled>(items: &mut [T]) {
    items.sort_by(|a, b| compare_start_times(a.start_time(), b.start_time()));
}

/// Group, order days and order items within each day
#[must_use]
pub fn bucket_by_day<T: Scheduled + Clone>(items: &[T]) -> Vec<DayBucket<T>> {
    let mut grouped = group_by_day(items);
    sorted_days(&grouped)
        .into_iter()
        .filter_map(|day| {
            let mut items = grouped.remove(&day)?;
            sort_within_day(&mut items);
            Some(DayBucket {
                day,
                items,
                sorted_by_start_time: true,
            })
        })
        .collect()
}

fn compare_start_times(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
