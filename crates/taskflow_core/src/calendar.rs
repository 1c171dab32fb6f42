use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datekey::DateKey;
use crate::recurrence;
use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Month,
    Week,
}

/// Inclusive date range visible in the calendar, used to bound occurrence
/// expansion. Literal task dates are always bucketed regardless of it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewWindow {
    pub start: DateKey,
    pub end: DateKey,
}

impl ViewWindow {
    pub fn new(start: DateKey, end: DateKey) -> Self {
        Self { start, end }
    }

    pub fn of(mode: ViewMode, anchor: DateKey) -> Self {
        match mode {
            ViewMode::Month => Self::month_of(anchor),
            ViewMode::Week => Self::week_of(anchor),
        }
    }

    /// First day of the anchor's month through the 15th of the following
    /// month, so the tail of the grid previews near-term recurrences.
    pub fn month_of(anchor: DateKey) -> Self {
        let start = anchor.first_of_month();
        let end = start
            .add_months(1)
            .and_then(|next| next.with_day(15))
            .unwrap_or(start);
        Self { start, end }
    }

    /// Sunday of the anchor's week through fourteen days later.
    pub fn week_of(anchor: DateKey) -> Self {
        let start = anchor
            .add_days(-(anchor.weekday_index() as i64))
            .unwrap_or(anchor);
        let end = start.add_days(14).unwrap_or(start);
        Self { start, end }
    }

    pub fn contains(&self, date: DateKey) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Overdue,
    DueToday,
    Upcoming,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryRole {
    /// The task's literal due date.
    Due,
    /// The task's literal start date.
    Start,
    /// A subtask's own due date, with a back-reference to its parent.
    Subtask { parent_id: Uuid, parent_title: String },
    /// A generated cycle of a recurring task, keeping the real due date
    /// for traceability.
    RecurringInstance { original_due: DateKey },
}

/// One calendar row. Ephemeral, rebuilt on every aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEntry {
    pub date: DateKey,
    pub title: String,
    pub category: String,
    pub priority: Priority,
    pub done: bool,
    pub time: Option<NaiveTime>,
    pub status: EntryStatus,
    pub role: EntryRole,
    /// The owning task, or the subtask itself for subtask entries.
    pub source_id: Uuid,
}

impl CalendarEntry {
    pub fn is_subtask(&self) -> bool {
        matches!(self.role, EntryRole::Subtask { .. })
    }
}

/// Per-day calendar entries, keyed and iterated in ascending date order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarBucket {
    days: BTreeMap<DateKey, Vec<CalendarEntry>>,
}

impl CalendarBucket {
    fn push(&mut self, entry: CalendarEntry) {
        self.days.entry(entry.date).or_default().push(entry);
    }

    pub fn entries_on(&self, date: DateKey) -> &[CalendarEntry] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn days(&self) -> impl Iterator<Item = (DateKey, &[CalendarEntry])> {
        self.days.iter().map(|(date, entries)| (*date, entries.as_slice()))
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn entry_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Statuses for a day cell's summary dots: the first `limit` entries of
    /// the day, minus completed subtasks. Completed main tasks keep their
    /// dot; a finished checklist item does not need one.
    pub fn marker_statuses(&self, date: DateKey, limit: usize) -> Vec<EntryStatus> {
        self.entries_on(date)
            .iter()
            .take(limit)
            .filter(|entry| !(entry.is_subtask() && entry.done))
            .map(|entry| entry.status)
            .collect()
    }
}

/// Aggregates a task snapshot into per-day calendar entries.
///
/// Three passes keep every day's entries in a stable order: due entries
/// (each literal due followed by that task's recurring instances), then
/// start entries, then subtask entries, each pass in task-collection order.
/// Rebuilding from unchanged input yields an identical bucket.
pub fn build_calendar(tasks: &[Task], window: ViewWindow, today: DateKey) -> CalendarBucket {
    let mut bucket = CalendarBucket::default();

    for task in tasks {
        let Some(due) = task.due_date else { continue };
        bucket.push(CalendarEntry {
            date: due.date,
            title: task.text.clone(),
            category: task.category.clone(),
            priority: task.priority,
            done: task.done,
            time: due.time,
            status: classify(Some(due.date), task.done, today),
            role: EntryRole::Due,
            source_id: task.id,
        });

        if !task.done && task.has_active_recurrence() {
            for occurrence in recurrence::expand_occurrences(task, window) {
                bucket.push(CalendarEntry {
                    date: occurrence.date,
                    title: task.text.clone(),
                    category: task.category.clone(),
                    priority: task.priority,
                    done: task.done,
                    time: None,
                    status: classify(Some(occurrence.date), task.done, today),
                    role: EntryRole::RecurringInstance {
                        original_due: due.date,
                    },
                    source_id: task.id,
                });
            }
        }
    }

    for task in tasks {
        let Some(start) = task.start_date else { continue };
        bucket.push(CalendarEntry {
            date: start.date,
            title: task.text.clone(),
            category: task.category.clone(),
            priority: task.priority,
            done: task.done,
            time: start.time,
            // A start marker signals the state of the whole task, so it is
            // classed by the task's due date, not by the day it sits on.
            status: classify(task.due_date.map(|due| due.date), task.done, today),
            role: EntryRole::Start,
            source_id: task.id,
        });
    }

    for task in tasks {
        for subtask in &task.subtasks {
            let Some(due) = subtask.due_date else { continue };
            bucket.push(CalendarEntry {
                date: due.date,
                title: format!("↳ {}", subtask.text),
                category: task.category.clone(),
                priority: task.priority,
                done: subtask.done,
                time: due.time,
                status: classify(Some(due.date), subtask.done, today),
                role: EntryRole::Subtask {
                    parent_id: task.id,
                    parent_title: task.text.clone(),
                },
                source_id: subtask.id,
            });
        }
    }

    bucket
}

fn classify(relevant_date: Option<DateKey>, done: bool, today: DateKey) -> EntryStatus {
    match relevant_date {
        Some(date) if date < today && !done => EntryStatus::Overdue,
        Some(date) if date == today => EntryStatus::DueToday,
        _ => EntryStatus::Upcoming,
    }
}
