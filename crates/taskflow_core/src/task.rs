use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datekey::{DateKey, DateValue};
use crate::recurrence::RecurrenceRule;

pub type TaskId = Uuid;
pub type SubtaskId = Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    /// Next stop on the quick-cycle wheel: none, low, medium, high, none.
    pub fn cycled(self) -> Self {
        match self {
            Priority::None => Priority::Low,
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub id: SubtaskId,
    pub text: String,
    pub done: bool,
    #[serde(default)]
    pub due_date: Option<DateValue>,
}

impl Subtask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            done: false,
            due_date: None,
        }
    }

    pub fn is_overdue(&self, today: DateKey) -> bool {
        match &self.due_date {
            Some(due) if !self.done => due.date < today,
            _ => false,
        }
    }

    pub fn is_due_today(&self, today: DateKey) -> bool {
        self.due_date.map(|due| due.date == today).unwrap_or(false)
    }
}

/// One tracked task. Date fields hold literals as entered; everything derived
/// from them (status, occurrences, calendar rows) is computed on demand and
/// never stored back. Defaulted serde fields keep older exported records
/// loadable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub start_date: Option<DateValue>,
    #[serde(default)]
    pub due_date: Option<DateValue>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
}

impl Task {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            category: category.into(),
            done: false,
            favorite: false,
            priority: Priority::None,
            start_date: None,
            due_date: None,
            progress: 0,
            subtasks: Vec::new(),
            note: String::new(),
            recurrence: None,
        }
    }

    pub fn is_overdue(&self, today: DateKey) -> bool {
        match &self.due_date {
            Some(due) if !self.done => due.date < today,
            _ => false,
        }
    }

    pub fn is_due_today(&self, today: DateKey) -> bool {
        self.due_date.map(|due| due.date == today).unwrap_or(false)
    }

    /// A recurrence rule only means something while both dates are present.
    pub fn has_active_recurrence(&self) -> bool {
        self.recurrence.is_some() && self.start_date.is_some() && self.due_date.is_some()
    }

    /// Whole-day span between the two dates, when both exist.
    pub fn duration_days(&self) -> Option<i64> {
        let start = self.start_date?;
        let due = self.due_date?;
        Some(start.date.days_until(due.date).abs())
    }

    /// How far along the date range today is, 0 through 100. A range that
    /// starts and ends on the same day counts as complete once reached.
    pub fn date_progress(&self, today: DateKey) -> Option<u8> {
        let start = self.start_date?.date;
        let due = self.due_date?.date;
        if today < start {
            return Some(0);
        }
        if today > due {
            return Some(100);
        }
        let total = start.days_until(due);
        if total <= 0 {
            return Some(100);
        }
        let elapsed = start.days_until(today);
        Some((elapsed as f64 / total as f64 * 100.0).round() as u8)
    }

    /// Re-derives `progress` from the subtask checklist.
    pub fn recompute_progress(&mut self) {
        if self.subtasks.is_empty() {
            self.progress = 0;
            return;
        }
        let completed = self.subtasks.iter().filter(|s| s.done).count();
        self.progress = (completed as f64 / self.subtasks.len() as f64 * 100.0).round() as u8;
    }

    pub fn subtask(&self, subtask_id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn subtask_mut(&mut self, subtask_id: SubtaskId) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }
}

/// Compact label for a whole-day span.
pub fn format_duration(days: i64) -> String {
    match days {
        0 => "Today".to_string(),
        1 => "1 day".to_string(),
        2..=6 => format!("{} days", days),
        7..=29 => {
            let weeks = days / 7;
            if weeks == 1 {
                "1 week".to_string()
            } else {
                format!("{} weeks", weeks)
            }
        }
        _ => {
            let months = days / 30;
            if months == 1 {
                "1 month".to_string()
            } else {
                format!("{} months", months)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> DateKey {
        s.parse().expect("valid date key")
    }

    fn value(s: &str) -> DateValue {
        s.parse().expect("valid date value")
    }

    #[test]
    fn priority_cycle_wraps_around() {
        let mut p = Priority::None;
        let seen: Vec<Priority> = (0..5)
            .map(|_| {
                p = p.cycled();
                p
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                Priority::Low,
                Priority::Medium,
                Priority::High,
                Priority::None,
                Priority::Low
            ]
        );
    }

    #[test]
    fn overdue_requires_an_unfinished_task() {
        let today = key("2024-06-10");
        let mut task = Task::new("Water plants", "Tasks");
        task.due_date = Some(value("2024-06-09"));
        assert!(task.is_overdue(today));
        assert!(!task.is_due_today(today));

        task.done = true;
        assert!(!task.is_overdue(today), "completed tasks are never overdue");

        task.due_date = Some(value("2024-06-10T22:00"));
        assert!(task.is_due_today(today), "due today regardless of done state");
    }

    #[test]
    fn date_progress_tracks_the_span() {
        let mut task = Task::new("Trip prep", "Tasks");
        task.start_date = Some(value("2024-06-01"));
        task.due_date = Some(value("2024-06-11"));

        assert_eq!(task.date_progress(key("2024-05-20")), Some(0));
        assert_eq!(task.date_progress(key("2024-06-06")), Some(50));
        assert_eq!(task.date_progress(key("2024-06-11")), Some(100));
        assert_eq!(task.date_progress(key("2024-07-01")), Some(100));

        task.due_date = Some(value("2024-06-01"));
        assert_eq!(
            task.date_progress(key("2024-06-01")),
            Some(100),
            "zero-length span is complete once reached"
        );

        task.start_date = None;
        assert_eq!(task.date_progress(key("2024-06-01")), None);
    }

    #[test]
    fn duration_formatting_matches_the_scale() {
        let mut task = Task::new("Paint fence", "Tasks");
        task.start_date = Some(value("2024-06-01T09:00"));
        task.due_date = Some(value("2024-06-04"));
        assert_eq!(task.duration_days(), Some(3));

        assert_eq!(format_duration(0), "Today");
        assert_eq!(format_duration(1), "1 day");
        assert_eq!(format_duration(3), "3 days");
        assert_eq!(format_duration(7), "1 week");
        assert_eq!(format_duration(20), "2 weeks");
        assert_eq!(format_duration(30), "1 month");
        assert_eq!(format_duration(75), "2 months");
    }

    #[test]
    fn progress_reflects_the_checklist() {
        let mut task = Task::new("Pack bags", "Tasks");
        task.recompute_progress();
        assert_eq!(task.progress, 0);

        task.subtasks.push(Subtask::new("Clothes"));
        task.subtasks.push(Subtask::new("Chargers"));
        task.subtasks.push(Subtask::new("Passport"));
        task.subtasks[0].done = true;
        task.recompute_progress();
        assert_eq!(task.progress, 33);

        task.subtasks[1].done = true;
        task.subtasks[2].done = true;
        task.recompute_progress();
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn minimal_stored_records_deserialize_with_defaults() {
        let raw = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "text": "Buy milk",
            "category": "Shopping List"
        }"#;
        let task: Task = serde_json::from_str(raw).expect("minimal record loads");
        assert_eq!(task.text, "Buy milk");
        assert!(!task.done);
        assert!(!task.favorite);
        assert_eq!(task.priority, Priority::None);
        assert_eq!(task.progress, 0);
        assert!(task.subtasks.is_empty());
        assert!(task.note.is_empty());
        assert!(task.recurrence.is_none());
    }
}
