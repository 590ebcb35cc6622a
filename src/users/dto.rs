use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{auth::repo_types::PublicAccount, tasks::dto::TaskStats, tasks::repo_types::Task};

/// A user with activity counters, as listed to admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(flatten)]
    pub user: PublicAccount,
    pub task_count: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub high_priority_pending: usize,
    /// Newest task creation, or account creation for users without tasks.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

/// A task alongside its owner, for the admin task list.
#[derive(Debug, Clone, Serialize)]
pub struct AdminTaskRow {
    #[serde(flatten)]
    pub task: Task,
    pub user: Option<PublicAccount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub stats: TaskStats,
    pub total_users: usize,
    pub active_users: usize,
    /// Rounded percentage of completed tasks, 0 with no tasks.
    pub completion_rate: u32,
    pub recent_tasks: Vec<Task>,
    pub top_users: Vec<UserStats>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}
