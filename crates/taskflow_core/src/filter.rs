use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Done,
    NotDone,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    TitleAsc,
    TitleDesc,
    /// High priority first, title order inside each band.
    Priority,
    /// Completed tasks ahead of open ones, title order inside each group.
    DoneFirst,
}

/// List-view criteria: every field narrows the result, the default matches
/// everything in title order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub favorites_only: bool,
    #[serde(default)]
    pub sort: SortMode,
}

impl TaskQuery {
    pub fn matches(&self, task: &Task) -> bool {
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() && !task.text.to_lowercase().contains(&needle) {
            return false;
        }
        if let Some(category) = &self.category {
            if task.category != *category {
                return false;
            }
        }
        match self.status {
            StatusFilter::All => {}
            StatusFilter::Done => {
                if !task.done {
                    return false;
                }
            }
            StatusFilter::NotDone => {
                if task.done {
                    return false;
                }
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if self.favorites_only && !task.favorite {
            return false;
        }
        true
    }

    /// Filtered, sorted clones of the matching tasks.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let mut list: Vec<Task> = tasks.iter().filter(|t| self.matches(t)).cloned().collect();
        match self.sort {
            SortMode::TitleAsc => list.sort_by(compare_titles),
            SortMode::TitleDesc => list.sort_by(|a, b| compare_titles(b, a)),
            SortMode::Priority => list.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| compare_titles(a, b))
            }),
            SortMode::DoneFirst => {
                list.sort_by(|a, b| b.done.cmp(&a.done).then_with(|| compare_titles(a, b)))
            }
        }
        list
    }
}

fn compare_titles(a: &Task, b: &Task) -> Ordering {
    a.text.to_lowercase().cmp(&b.text.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(text: &str, category: &str) -> Task {
        Task::new(text, category)
    }

    fn fixture() -> Vec<Task> {
        let mut buy_oranges = named("buy Oranges", "Shopping List");
        buy_oranges.favorite = true;
        let mut call_dentist = named("Call dentist", "Tasks");
        call_dentist.done = true;
        call_dentist.priority = Priority::High;
        let mut water_plants = named("water plants", "Tasks");
        water_plants.priority = Priority::Low;
        let mut air_filter = named("Air filter order", "Shopping List");
        air_filter.priority = Priority::High;
        vec![buy_oranges, call_dentist, water_plants, air_filter]
    }

    #[test]
    fn default_query_keeps_everything_in_title_order() {
        let result = TaskQuery::default().apply(&fixture());
        let titles: Vec<&str> = result.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Air filter order",
                "buy Oranges",
                "Call dentist",
                "water plants"
            ]
        );
    }

    #[test]
    fn search_is_case_insensitive_and_trimmed() {
        let query = TaskQuery {
            search: "  ORANGE ".to_string(),
            ..TaskQuery::default()
        };
        let result = query.apply(&fixture());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "buy Oranges");
    }

    #[test]
    fn category_status_and_priority_narrow_together() {
        let query = TaskQuery {
            category: Some("Tasks".to_string()),
            status: StatusFilter::NotDone,
            ..TaskQuery::default()
        };
        let result = query.apply(&fixture());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "water plants");

        let by_priority = TaskQuery {
            priority: Some(Priority::High),
            ..TaskQuery::default()
        };
        let titles: Vec<String> = by_priority
            .apply(&fixture())
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(titles, vec!["Air filter order", "Call dentist"]);
    }

    #[test]
    fn favorites_only_keeps_flagged_tasks() {
        let query = TaskQuery {
            favorites_only: true,
            ..TaskQuery::default()
        };
        let result = query.apply(&fixture());
        assert_eq!(result.len(), 1);
        assert!(result[0].favorite);
    }

    #[test]
    fn priority_sort_ranks_high_first_with_title_tiebreak() {
        let query = TaskQuery {
            sort: SortMode::Priority,
            ..TaskQuery::default()
        };
        let titles: Vec<String> = query.apply(&fixture()).into_iter().map(|t| t.text).collect();
        assert_eq!(
            titles,
            vec![
                "Air filter order",
                "Call dentist",
                "water plants",
                "buy Oranges"
            ]
        );
    }

    #[test]
    fn done_first_groups_completed_tasks() {
        let query = TaskQuery {
            sort: SortMode::DoneFirst,
            ..TaskQuery::default()
        };
        let result = query.apply(&fixture());
        assert!(result[0].done);
        assert!(result[1..].iter().all(|t| !t.done));
    }

    #[test]
    fn descending_title_sort_reverses_the_order() {
        let query = TaskQuery {
            sort: SortMode::TitleDesc,
            ..TaskQuery::default()
        };
        let titles: Vec<String> = query.apply(&fixture()).into_iter().map(|t| t.text).collect();
        assert_eq!(
            titles,
            vec![
                "water plants",
                "Call dentist",
                "buy Oranges",
                "Air filter order"
            ]
        );
    }
}
