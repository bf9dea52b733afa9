use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::{add_days, add_months_keep_day, day_key};
use crate::task::{Frequency, TaskDefinition};

/// Half-open span of calendar days: `[start, end)`. Built from "today" plus a
/// forward length, where the window keeps today itself and `days` further
/// full days (length 90 spans 91 calendar days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    /// Exclusive far edge.
    pub end: NaiveDate,
}

impl Window {
    #[must_use]
    pub fn forward_from(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today,
            end: add_days(today, i64::from(days) + 1),
        }
    }

    /// The one shared acceptance predicate for dates anywhere in the
    /// pipeline.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// One concrete dated instance of a task, borrowed from its definition.
/// Rebuilt from scratch on every pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct Occurrence<'a> {
    pub task: &'a TaskDefinition,
    pub date: NaiveDate,
}

/// All occurrences of a single day, keyed by the canonical `YYYY-MM-DD`
/// string.
#[derive(Debug, Clone)]
pub struct DayBucket<'a> {
    pub day: String,
    pub items: Vec<Occurrence<'a>>,
}

/// Expands one task into the ordered occurrence dates inside `window`.
pub fn expand(task: &TaskDefinition, window: &Window) -> Vec<NaiveDate> {
    // Effective end: the task's own expiry or the window edge, whichever
    // comes first.
    let effective_end = match task.until {
        Some(until) if until < window.end => until,
        _ => window.end,
    };

    match task.frequency {
        Frequency::Unique => {
            if window.contains(task.start) {
                vec![task.start]
            } else {
                Vec::new()
            }
        }
        Frequency::Weekly | Frequency::Biweekly => {
            let Some(step) = task.frequency.step_days() else {
                return Vec::new();
            };
            collect_stepped(task.start, effective_end, window, |d| add_days(d, step))
        }
        Frequency::Monthly => {
            collect_stepped(task.start, effective_end, window, |d| {
                add_months_keep_day(d, 1)
            })
        }
        Frequency::Unknown => Vec::new(),
    }
}

/// Fast-forward from `start` to the window, then emit every stepped date up
/// to and including `effective_end`. Deliberately an iterative scan for both
/// fixed-interval and clamped monthly stepping; the monthly rule has no
/// closed form, and both rules share one loop shape.
fn collect_stepped(
    start: NaiveDate,
    effective_end: NaiveDate,
    window: &Window,
    advance: impl Fn(NaiveDate) -> NaiveDate,
) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut date = start;

    while date < window.start {
        let next = advance(date);
        if next <= date {
            // A non-advancing step at the date range ceiling would spin
            // forever.
            return out;
        }
        date = next;
    }

    while date <= effective_end {
        if window.contains(date) {
            out.push(date);
        }
        let next = advance(date);
        if next <= date {
            return out;
        }
        date = next;
    }

    out
}

/// Expands every task, flattens and sorts ascending by date. The sort is
/// stable, so same-day occurrences keep the task input order.
#[tracing::instrument(skip(tasks, window), fields(task_count = tasks.len()))]
pub fn build_occurrences<'a>(tasks: &'a [TaskDefinition], window: &Window) -> Vec<Occurrence<'a>> {
    let mut occurrences = Vec::new();

    for task in tasks {
        let dates = expand(task, window);
        trace!(
            course = %task.course,
            name = %task.name,
            count = dates.len(),
            "expanded task"
        );
        occurrences.extend(dates.into_iter().map(|date| Occurrence { task, date }));
    }

    occurrences.sort_by_key(|occ| occ.date);
    occurrences
}

/// Buckets a date-sorted occurrence list by day key, preserving input order
/// within each bucket. The final re-sort of the bucket list guards the
/// ascending order even if the input had ties resolved oddly.
pub fn group_by_day(occurrences: Vec<Occurrence<'_>>) -> Vec<DayBucket<'_>> {
    let mut buckets: Vec<DayBucket> = Vec::new();

    for occ in occurrences {
        let key = day_key(occ.date);
        match buckets.iter_mut().find(|bucket| bucket.day == key) {
            Some(bucket) => bucket.items.push(occ),
            None => buckets.push(DayBucket {
                day: key,
                items: vec![occ],
            }),
        }
    }

    buckets.sort_by(|a, b| a.day.cmp(&b.day));
    buckets
}
