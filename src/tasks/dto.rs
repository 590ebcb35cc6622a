use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    error::{StoreError, StoreResult},
    tasks::repo_types::{Priority, Task},
};

/// Fields supplied when creating a task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub priority: Priority,
    #[serde(default)]
    pub user_id: String,
}

impl NewTask {
    /// Task form rules: title and description required, no due date in the past.
    pub fn validate(&self, now: OffsetDateTime) -> StoreResult<()> {
        check_text("title", Some(self.title.as_str()))?;
        check_text("description", Some(self.description.as_str()))?;
        check_due_date(self.due_date, now)
    }
}

/// Shallow patch; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn validate(&self, now: OffsetDateTime) -> StoreResult<()> {
        check_text("title", self.title.as_deref())?;
        check_text("description", self.description.as_deref())?;
        check_due_date(self.due_date, now)
    }

    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = description.trim().to_string();
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
    }
}

fn check_text(field: &str, value: Option<&str>) -> StoreResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(StoreError::InvalidInput(format!(
            "task {} is required",
            field
        ))),
        _ => Ok(()),
    }
}

fn check_due_date(due: Option<OffsetDateTime>, now: OffsetDateTime) -> StoreResult<()> {
    match due {
        Some(d) if d < now => Err(StoreError::InvalidInput(
            "due date cannot be in the past".into(),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    DueDate,
    Priority,
    CreatedDate,
    Completed,
    /// Keeps input order.
    Unsorted,
}

impl SortKey {
    pub fn parse(s: &str) -> Self {
        match s {
            "dueDate" => SortKey::DueDate,
            "priority" => SortKey::Priority,
            "createdDate" => SortKey::CreatedDate,
            "completed" => SortKey::Completed,
            _ => SortKey::Unsorted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Completed,
    Pending,
}

impl StatusFilter {
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => StatusFilter::Completed,
            "pending" => StatusFilter::Pending,
            _ => StatusFilter::All,
        }
    }
}

/// List query: search term, then priority and status filters, then sort.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    pub q: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
}

impl TaskQuery {
    pub fn term(&self) -> &str {
        self.q.as_deref().unwrap_or("")
    }

    pub fn status_filter(&self) -> StatusFilter {
        StatusFilter::parse(self.status.as_deref().unwrap_or("all"))
    }

    /// Lists default to newest first.
    pub fn sort_key(&self) -> SortKey {
        SortKey::parse(self.sort.as_deref().unwrap_or("createdDate"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = TaskStats::default();
        for t in tasks {
            stats.total += 1;
            if t.completed {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }
            match t.priority {
                Priority::High => stats.high += 1,
                Priority::Medium => stats.medium += 1,
                Priority::Low => stats.low += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: TaskStats,
    pub overdue: usize,
}

/// Home page digest for a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: TaskStats,
    pub overdue: usize,
    pub recent_tasks: Vec<Task>,
    pub upcoming_tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}
