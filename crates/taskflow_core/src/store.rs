use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveTime;
use parking_lot::RwLock;

use crate::calendar::{self, CalendarBucket, ViewWindow};
use crate::datekey::{DateKey, DateValue};
use crate::filter::TaskQuery;
use crate::recurrence::{self, Occurrence, RecurrenceRule, RollForward};
use crate::task::{Priority, Subtask, SubtaskId, Task, TaskId};

const DEFAULT_CATEGORIES: [&str; 2] = ["Tasks", "Shopping List"];

/// Thread-safe task collection plus its category list. All engine
/// computations (calendar, queries, previews) run over a cloned snapshot;
/// nothing here persists anything, callers serialize `tasks()` when they
/// want to.
pub struct TaskStore {
    state: RwLock<StoreState>,
}

struct StoreState {
    tasks: Vec<Task>,
    categories: Vec<String>,
}

pub struct TaskStoreBuilder {
    tasks: Vec<Task>,
    categories: Vec<String>,
}

impl TaskStoreBuilder {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Replaces the seed categories entirely.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_category(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !Self::contains_ignore_case(&self.categories, &name) {
            self.categories.push(name);
        }
        self
    }

    pub fn add_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn build(self) -> TaskStore {
        TaskStore {
            state: RwLock::new(StoreState {
                tasks: self.tasks,
                categories: self.categories,
            }),
        }
    }

    fn contains_ignore_case(categories: &[String], name: &str) -> bool {
        categories.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

impl Default for TaskStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn builder() -> TaskStoreBuilder {
        TaskStoreBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.state.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().tasks.is_empty()
    }

    /// Snapshot of the collection in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    pub fn get(&self, id: TaskId) -> Result<Task> {
        self.state
            .read()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("task not found"))
    }

    pub fn categories(&self) -> Vec<String> {
        self.state.read().categories.clone()
    }

    pub fn query(&self, query: &TaskQuery) -> Vec<Task> {
        query.apply(&self.state.read().tasks)
    }

    /// Calendar for `window` as of the local calendar day.
    pub fn calendar(&self, window: ViewWindow) -> CalendarBucket {
        self.calendar_at(window, DateKey::today())
    }

    pub fn calendar_at(&self, window: ViewWindow, today: DateKey) -> CalendarBucket {
        let started = Instant::now();
        let tasks = self.tasks();
        let bucket = calendar::build_calendar(&tasks, window, today);
        tracing::debug!(
            tasks = tasks.len(),
            days = bucket.day_count(),
            entries = bucket.entry_count(),
            elapsed_ms = %started.elapsed().as_millis(),
            "calendar aggregated"
        );
        bucket
    }

    /// Occurrences one task would contribute inside `window`.
    pub fn recurring_preview(&self, id: TaskId, window: ViewWindow) -> Result<Vec<Occurrence>> {
        let task = self.get(id)?;
        Ok(recurrence::expand_occurrences(&task, window))
    }

    pub fn add_task(&self, text: &str, category: impl Into<String>) -> Result<TaskId> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            bail!("task text must not be empty");
        }
        let task = Task::new(trimmed, category);
        let id = task.id;
        self.state.write().tasks.push(task);
        tracing::debug!(task = %id, "task added");
        Ok(id)
    }

    pub fn remove_task(&self, id: TaskId) -> Result<()> {
        let mut state = self.state.write();
        let position = state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| anyhow!("task not found"))?;
        state.tasks.remove(position);
        tracing::debug!(task = %id, "task removed");
        Ok(())
    }

    pub fn clear_tasks(&self) {
        self.state.write().tasks.clear();
    }

    /// Removes every task in `category`, returning how many went away.
    pub fn remove_tasks_in_category(&self, category: &str) -> usize {
        let mut state = self.state.write();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.category != category);
        before - state.tasks.len()
    }

    /// Flips the done flag. When the flip completes a recurring task the
    /// start date rolls forward to the next cycle (or the recurrence
    /// expires); un-checking never rolls anything.
    pub fn toggle_done(&self, id: TaskId) -> Result<Option<RollForward>> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        task.done = !task.done;
        if task.done && task.has_active_recurrence() {
            return Ok(recurrence::roll_forward(task));
        }
        Ok(None)
    }

    pub fn toggle_favorite(&self, id: TaskId) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        task.favorite = !task.favorite;
        Ok(())
    }

    pub fn set_text(&self, id: TaskId, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            bail!("task text must not be empty");
        }
        let mut state = self.state.write();
        task_mut(&mut state.tasks, id)?.text = trimmed.to_string();
        Ok(())
    }

    pub fn set_note(&self, id: TaskId, note: impl Into<String>) -> Result<()> {
        let mut state = self.state.write();
        task_mut(&mut state.tasks, id)?.note = note.into();
        Ok(())
    }

    pub fn set_category(&self, id: TaskId, category: impl Into<String>) -> Result<()> {
        let mut state = self.state.write();
        task_mut(&mut state.tasks, id)?.category = category.into();
        Ok(())
    }

    pub fn set_priority(&self, id: TaskId, priority: Priority) -> Result<()> {
        let mut state = self.state.write();
        task_mut(&mut state.tasks, id)?.priority = priority;
        Ok(())
    }

    pub fn cycle_priority(&self, id: TaskId) -> Result<Priority> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        task.priority = task.priority.cycled();
        Ok(task.priority)
    }

    pub fn set_due_date(&self, id: TaskId, due: Option<DateValue>) -> Result<()> {
        let mut state = self.state.write();
        task_mut(&mut state.tasks, id)?.due_date = due;
        Ok(())
    }

    /// Sets the start date. A start landing after the existing due date
    /// swaps the two so the range stays ordered.
    pub fn set_start_date(&self, id: TaskId, start: Option<DateValue>) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        task.start_date = start;
        if let (Some(new_start), Some(due)) = (task.start_date, task.due_date) {
            if new_start > due {
                task.start_date = Some(due);
                task.due_date = Some(new_start);
            }
        }
        Ok(())
    }

    pub fn set_due_time(&self, id: TaskId, time: NaiveTime) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let Some(due) = task.due_date else {
            bail!("task has no due date to carry a time");
        };
        task.due_date = Some(DateValue::at(due.date, time));
        Ok(())
    }

    pub fn set_start_time(&self, id: TaskId, time: NaiveTime) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let Some(start) = task.start_date else {
            bail!("task has no start date to carry a time");
        };
        task.start_date = Some(DateValue::at(start.date, time));
        Ok(())
    }

    pub fn add_subtask(&self, id: TaskId, text: &str) -> Result<SubtaskId> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            bail!("subtask text must not be empty");
        }
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let subtask = Subtask::new(trimmed);
        let subtask_id = subtask.id;
        task.subtasks.push(subtask);
        task.recompute_progress();
        Ok(subtask_id)
    }

    pub fn toggle_subtask_done(&self, id: TaskId, subtask_id: SubtaskId) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let subtask = task
            .subtask_mut(subtask_id)
            .ok_or_else(|| anyhow!("subtask not found"))?;
        subtask.done = !subtask.done;
        task.recompute_progress();
        Ok(())
    }

    pub fn remove_subtask(&self, id: TaskId, subtask_id: SubtaskId) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let position = task
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
            .ok_or_else(|| anyhow!("subtask not found"))?;
        task.subtasks.remove(position);
        task.recompute_progress();
        Ok(())
    }

    pub fn set_subtask_due_date(
        &self,
        id: TaskId,
        subtask_id: SubtaskId,
        due: Option<DateValue>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        task.subtask_mut(subtask_id)
            .ok_or_else(|| anyhow!("subtask not found"))?
            .due_date = due;
        Ok(())
    }

    pub fn set_subtask_due_time(
        &self,
        id: TaskId,
        subtask_id: SubtaskId,
        time: NaiveTime,
    ) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let subtask = task
            .subtask_mut(subtask_id)
            .ok_or_else(|| anyhow!("subtask not found"))?;
        let Some(due) = subtask.due_date else {
            bail!("subtask has no due date to carry a time");
        };
        subtask.due_date = Some(DateValue::at(due.date, time));
        Ok(())
    }

    /// Turns recurrence on. Requires an ordered date range on the task; the
    /// rule itself is stored as given, malformed patterns degrade at
    /// expansion time instead of being rejected here.
    pub fn set_recurrence(&self, id: TaskId, rule: RecurrenceRule) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let (Some(start), Some(due)) = (task.start_date, task.due_date) else {
            bail!("recurrence needs both a start and a due date");
        };
        if start.date > due.date {
            bail!("start date must not be after the due date");
        }
        task.recurrence = Some(rule);
        Ok(())
    }

    /// Turns recurrence off, which also clears both dates. The range
    /// belonged to the pattern; a fresh one can be set manually afterwards.
    pub fn clear_recurrence(&self, id: TaskId) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        task.recurrence = None;
        task.start_date = None;
        task.due_date = None;
        Ok(())
    }

    /// Adds a skip date. Out-of-range dates are accepted and simply never
    /// match a generated candidate.
    pub fn add_exception(&self, id: TaskId, date: DateKey) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let rule = task
            .recurrence
            .as_mut()
            .ok_or_else(|| anyhow!("task is not recurring"))?;
        rule.exceptions.insert(date);
        Ok(())
    }

    pub fn remove_exception(&self, id: TaskId, date: DateKey) -> Result<()> {
        let mut state = self.state.write();
        let task = task_mut(&mut state.tasks, id)?;
        let rule = task
            .recurrence
            .as_mut()
            .ok_or_else(|| anyhow!("task is not recurring"))?;
        rule.exceptions.remove(&date);
        Ok(())
    }

    pub fn add_category(&self, name: &str) -> Result<String> {
        let clean = name.trim();
        if clean.is_empty() {
            bail!("category name must not be empty");
        }
        let mut state = self.state.write();
        if TaskStoreBuilder::contains_ignore_case(&state.categories, clean) {
            bail!("category already exists");
        }
        state.categories.push(clean.to_string());
        Ok(clean.to_string())
    }

    /// Drops the category from the list. Tasks keep their category string;
    /// clearing them out is a separate, deliberate operation.
    pub fn remove_category(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        let position = state
            .categories
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("category not found"))?;
        state.categories.remove(position);
        Ok(())
    }
}

fn task_mut(tasks: &mut [Task], id: TaskId) -> Result<&mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| anyhow!("task not found"))
}
