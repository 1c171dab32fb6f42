use std::collections::BTreeSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::calendar::ViewWindow;
use crate::datekey::{DateKey, DateValue};
use crate::task::{Task, TaskId};

/// Hard bound on generator loop passes. A safety stop for pathological
/// ranges, not a completeness guarantee past one year of steps.
pub const MAX_EXPANSION_STEPS: usize = 365;

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Set of weekdays a weekly rule may land on, stored as a Sunday-based
/// bitmask and serialized as a sorted list of column indices.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "Vec<u8>", try_from = "Vec<u8>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_sunday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn indices(&self) -> impl Iterator<Item = u8> {
        let bits = self.0;
        (0u8..7).filter(move |idx| bits & (1 << idx) != 0)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.indices()
            .map(|idx| WEEKDAY_LABELS[idx as usize])
            .collect()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::default();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<WeekdaySet> for Vec<u8> {
    fn from(set: WeekdaySet) -> Self {
        set.indices().collect()
    }
}

impl TryFrom<Vec<u8>> for WeekdaySet {
    type Error = String;

    fn try_from(indices: Vec<u8>) -> Result<Self, Self::Error> {
        let mut set = WeekdaySet::default();
        for idx in indices {
            if idx > 6 {
                return Err(format!("weekday index out of range: {idx}"));
            }
            set.0 |= 1 << idx;
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl IntervalUnit {
    fn label(self, interval: u32) -> &'static str {
        match (self, interval) {
            (IntervalUnit::Days, 1) => "day",
            (IntervalUnit::Days, _) => "days",
            (IntervalUnit::Weeks, 1) => "week",
            (IntervalUnit::Weeks, _) => "weeks",
            (IntervalUnit::Months, 1) => "month",
            (IntervalUnit::Months, _) => "months",
            (IntervalUnit::Years, 1) => "year",
            (IntervalUnit::Years, _) => "years",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom { interval: u32, unit: IntervalUnit },
}

/// How a task repeats between its start and due date. The rule only carries
/// the pattern; the range it runs over always comes from the owning task's
/// two dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    #[serde(flatten)]
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "WeekdaySet::is_empty")]
    pub weekdays: WeekdaySet,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exceptions: BTreeSet<DateKey>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            weekdays: WeekdaySet::default(),
            exceptions: BTreeSet::new(),
        }
    }

    /// Human-readable pattern summary, e.g. "Repeats weekly on Mon, Wed, Fri".
    pub fn describe(&self) -> String {
        let mut desc = match self.frequency {
            Frequency::Daily => "Repeats daily".to_string(),
            Frequency::Weekly if self.weekdays.is_empty() => "Repeats weekly".to_string(),
            Frequency::Weekly => format!("Repeats weekly on {}", self.weekdays.labels().join(", ")),
            Frequency::Monthly => "Repeats monthly".to_string(),
            Frequency::Yearly => "Repeats yearly".to_string(),
            Frequency::Custom { interval, unit } => {
                format!("Repeats every {} {}", interval, unit.label(interval))
            }
        };
        if !self.exceptions.is_empty() {
            let count = self.exceptions.len();
            let plural = if count == 1 { "" } else { "s" };
            desc.push_str(&format!(" ({count} skip{plural})"));
        }
        desc
    }
}

/// One generated calendar date for a recurring task. Ephemeral, recomputed
/// on every pass, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Occurrence {
    pub date: DateKey,
    pub task_id: TaskId,
}

/// Outcome of completing one cycle of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollForward {
    /// The start date moved to the next cycle and the task reopened.
    Advanced(DateKey),
    /// The next cycle would land past the due date; the task stays done.
    Expired,
}

/// The single stepping authority: next cycle date for `rule` after
/// `current`, or `None` when the rule cannot produce one (zero custom
/// interval, date overflow). Every consumer of "what comes next" goes
/// through here.
pub fn advance(rule: &RecurrenceRule, current: DateKey) -> Option<DateKey> {
    match rule.frequency {
        Frequency::Daily => current.add_days(1),
        Frequency::Weekly => next_weekly(&rule.weekdays, current),
        Frequency::Monthly => current.add_months(1),
        Frequency::Yearly => current.add_years(1),
        Frequency::Custom { interval, unit } => {
            if interval == 0 {
                return None;
            }
            match unit {
                IntervalUnit::Days => current.add_days(interval as i64),
                IntervalUnit::Weeks => current.add_days(interval as i64 * 7),
                IntervalUnit::Months => current.add_months(interval),
                IntervalUnit::Years => current.add_years(interval),
            }
        }
    }
}

fn next_weekly(weekdays: &WeekdaySet, current: DateKey) -> Option<DateKey> {
    if weekdays.is_empty() {
        return current.add_days(7);
    }
    for offset in 1..=7 {
        let candidate = current.add_days(offset)?;
        if weekdays.contains(candidate.weekday()) {
            return Some(candidate);
        }
    }
    current.add_days(7)
}

/// Expands a recurring task into the occurrences visible inside `window`.
///
/// Walks cycle by cycle from the task's start date, emitting every candidate
/// that falls inside the window, is not the start date itself (that day is
/// already visible as the task's literal entries) and is not an exception.
/// Stops past the due date, when the rule cannot advance, or at the step
/// cap. A task without a rule or without both dates yields nothing.
pub fn expand_occurrences(task: &Task, window: ViewWindow) -> Vec<Occurrence> {
    let (Some(rule), Some(start), Some(due)) = (&task.recurrence, task.start_date, task.due_date)
    else {
        tracing::debug!(task = %task.id, "expansion skipped, no rule or incomplete date range");
        return Vec::new();
    };

    let effective_start = start.date;
    let effective_end = due.date;
    let mut occurrences = Vec::new();
    let mut current = effective_start;
    let mut steps = 0usize;

    loop {
        if current > effective_end {
            break;
        }
        steps += 1;
        if steps > MAX_EXPANSION_STEPS {
            tracing::warn!(
                task = %task.id,
                cap = MAX_EXPANSION_STEPS,
                "recurrence truncated at the expansion step cap"
            );
            break;
        }
        if window.contains(current)
            && current != effective_start
            && !rule.exceptions.contains(&current)
        {
            occurrences.push(Occurrence {
                date: current,
                task_id: task.id,
            });
        }
        let Some(next) = advance(rule, current) else {
            break;
        };
        current = next;
    }

    occurrences
}

/// Moves a just-completed recurring task to its next cycle: start date
/// advances (date-only), done clears, every subtask reopens. When the next
/// cycle would fall past the due date the task is left untouched and stays
/// done, which is how a bounded recurrence expires. `None` means the task
/// was not eligible at all (no rule, no start date, or the rule cannot
/// advance).
pub fn roll_forward(task: &mut Task) -> Option<RollForward> {
    let rule = task.recurrence.as_ref()?;
    let start = task.start_date?;
    let next = advance(rule, start.date)?;

    if let Some(due) = task.due_date {
        if next > due.date {
            return Some(RollForward::Expired);
        }
    }

    task.start_date = Some(DateValue::date_only(next));
    task.done = false;
    for subtask in &mut task.subtasks {
        subtask.done = false;
    }
    task.recompute_progress();
    tracing::debug!(task = %task.id, next = %next, "recurring task rolled forward");
    Some(RollForward::Advanced(next))
}
