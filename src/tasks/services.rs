use std::cmp::Ordering;

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{StoreError, StoreResult},
    storage::{keys, Storage},
    tasks::{
        dto::{NewTask, SortKey, StatusFilter, TaskPatch, TaskQuery, TaskStats},
        repo_types::Task,
    },
};

pub const RECENT_TASKS: usize = 5;
pub const UPCOMING_TASKS: usize = 3;

/// Case-insensitive substring match over title and description.
pub fn matches_term(task: &Task, lowercase_term: &str) -> bool {
    task.title.to_lowercase().contains(lowercase_term)
        || task.description.to_lowercase().contains(lowercase_term)
}

fn by_due_date(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort; undated tasks go last under `DueDate`.
pub fn sort_tasks(mut tasks: Vec<Task>, key: SortKey) -> Vec<Task> {
    match key {
        SortKey::DueDate => tasks.sort_by(by_due_date),
        SortKey::Priority => tasks.sort_by_key(|t| t.priority.rank()),
        SortKey::CreatedDate => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Completed => tasks.sort_by_key(|t| t.completed),
        SortKey::Unsorted => {}
    }
    tasks
}

/// `None`, empty and `"all"` keep everything; anything else is an exact match.
pub fn filter_tasks_by_priority(tasks: Vec<Task>, priority: Option<&str>) -> Vec<Task> {
    match priority {
        None | Some("") | Some("all") => tasks,
        Some(p) => tasks
            .into_iter()
            .filter(|t| t.priority.as_str() == p)
            .collect(),
    }
}

pub fn filter_tasks_by_status(tasks: Vec<Task>, status: StatusFilter) -> Vec<Task> {
    match status {
        StatusFilter::All => tasks,
        StatusFilter::Completed => tasks.into_iter().filter(|t| t.completed).collect(),
        StatusFilter::Pending => tasks.into_iter().filter(|t| !t.completed).collect(),
    }
}

pub fn overdue_count(tasks: &[Task], now: OffsetDateTime) -> usize {
    tasks.iter().filter(|t| t.is_overdue(now)).count()
}

/// Filter and sort stages of a [`TaskQuery`], after the search term was applied.
pub fn refine(tasks: Vec<Task>, query: &TaskQuery) -> Vec<Task> {
    let tasks = filter_tasks_by_priority(tasks, query.priority.as_deref());
    let tasks = filter_tasks_by_status(tasks, query.status_filter());
    sort_tasks(tasks, query.sort_key())
}

/// All tasks, held in memory and written through to storage on each change.
pub struct TaskStore {
    storage: Storage,
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(storage: Storage) -> Self {
        let tasks: Vec<Task> = storage.read(keys::TASKS);
        debug!(count = tasks.len(), "tasks loaded");
        Self { storage, tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn save(&mut self, updated: Vec<Task>) -> StoreResult<()> {
        self.storage.write(keys::TASKS, &updated)?;
        self.tasks = updated;
        Ok(())
    }

    pub fn create_task(&mut self, data: NewTask) -> StoreResult<Task> {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: data.title.trim().to_string(),
            description: data.description.trim().to_string(),
            due_date: data.due_date,
            priority: data.priority,
            user_id: data.user_id,
            completed: false,
            completed_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let mut updated = self.tasks.clone();
        updated.push(task.clone());
        self.save(updated)?;
        info!(task_id = %task.id, user_id = %task.user_id, "task created");
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        let mut updated = self.tasks.clone();
        let Some(task) = updated.iter_mut().find(|t| t.id == id) else {
            return Err(StoreError::NotFound("task"));
        };
        patch.apply(task);
        let task = task.clone();
        self.save(updated)?;
        info!(task_id = %id, "task updated");
        Ok(task)
    }

    /// Succeeds whether or not the task exists.
    pub fn delete_task(&mut self, id: &str) -> StoreResult<()> {
        let updated: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        let removed = self.tasks.len() - updated.len();
        self.save(updated)?;
        info!(task_id = %id, removed, "task deleted");
        Ok(())
    }

    pub fn toggle_task_complete(&mut self, id: &str) -> StoreResult<Task> {
        let mut updated = self.tasks.clone();
        let Some(task) = updated.iter_mut().find(|t| t.id == id) else {
            return Err(StoreError::NotFound("task"));
        };
        task.completed = !task.completed;
        task.completed_at = task.completed.then(OffsetDateTime::now_utc);
        let task = task.clone();
        self.save(updated)?;
        info!(task_id = %id, completed = task.completed, "task toggled");
        Ok(task)
    }

    /// Removes every task owned by `user_id`, returning how many went.
    pub fn delete_tasks_owned_by(&mut self, user_id: &str) -> StoreResult<usize> {
        let updated: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.user_id != user_id)
            .cloned()
            .collect();
        let removed = self.tasks.len() - updated.len();
        self.save(updated)?;
        Ok(removed)
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_user_tasks(&self, user_id: &str) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn get_all_tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn search_tasks(&self, user_id: &str, term: &str) -> Vec<Task> {
        let tasks = self.get_user_tasks(user_id);
        if term.is_empty() {
            return tasks;
        }
        let term = term.to_lowercase();
        tasks.into_iter().filter(|t| matches_term(t, &term)).collect()
    }

    pub fn query_tasks(&self, user_id: &str, query: &TaskQuery) -> Vec<Task> {
        refine(self.search_tasks(user_id, query.term()), query)
    }

    /// Counts over one user's tasks, or over every task when `user_id` is `None`.
    pub fn get_task_stats(&self, user_id: Option<&str>) -> TaskStats {
        match user_id {
            Some(id) => TaskStats::from_tasks(self.tasks.iter().filter(|t| t.user_id == id)),
            None => TaskStats::from_tasks(&self.tasks),
        }
    }

    pub fn recent_tasks(&self, user_id: &str, limit: usize) -> Vec<Task> {
        let mut tasks = sort_tasks(self.get_user_tasks(user_id), SortKey::CreatedDate);
        tasks.truncate(limit);
        tasks
    }

    /// Open tasks with a due date, soonest first.
    pub fn upcoming_tasks(&self, user_id: &str, limit: usize) -> Vec<Task> {
        let open: Vec<Task> = self
            .get_user_tasks(user_id)
            .into_iter()
            .filter(|t| !t.completed && t.due_date.is_some())
            .collect();
        let mut tasks = sort_tasks(open, SortKey::DueDate);
        tasks.truncate(limit);
        tasks
    }
}
