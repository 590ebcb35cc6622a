use std::collections::HashMap;

use tracing::info;

use crate::{
    auth::repo_types::{Account, PublicAccount, Role},
    error::StoreResult,
    storage::Storage,
    tasks::{
        dto::{SortKey, TaskQuery, TaskStats},
        repo_types::{Priority, Task},
        services::{matches_term, refine, sort_tasks, TaskStore, RECENT_TASKS},
    },
    users::dto::{AdminOverview, AdminTaskRow, UserStats},
};

pub const TOP_USERS: usize = 5;

/// Admin view over user accounts and their tasks.
///
/// Accounts are read from storage on every call so users registered through
/// the auth store show up immediately.
pub struct UserStore {
    storage: Storage,
}

impl UserStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn accounts(&self) -> Vec<Account> {
        Account::load_all(&self.storage, Role::User)
    }

    pub fn get_all_users(&self) -> Vec<PublicAccount> {
        self.accounts().into_iter().map(PublicAccount::from).collect()
    }

    pub fn get_user_by_id(&self, id: &str) -> Option<PublicAccount> {
        self.accounts()
            .into_iter()
            .find(|a| a.id == id)
            .map(PublicAccount::from)
    }

    /// Removes the account and every task it owns. Unknown ids are a no-op.
    pub fn delete_user(&self, tasks: &mut TaskStore, id: &str) -> StoreResult<()> {
        let accounts = self.accounts();
        let before = accounts.len();
        let remaining: Vec<Account> = accounts.into_iter().filter(|a| a.id != id).collect();
        let removed_user = before != remaining.len();
        Account::save_all(&self.storage, Role::User, &remaining)?;
        let removed_tasks = tasks.delete_tasks_owned_by(id)?;
        info!(user_id = %id, removed_user, removed_tasks, "user deleted");
        Ok(())
    }

    pub fn get_user_stats(&self, tasks: &[Task]) -> Vec<UserStats> {
        let mut owned: HashMap<&str, Vec<&Task>> = HashMap::new();
        for t in tasks {
            owned.entry(t.user_id.as_str()).or_default().push(t);
        }
        self.accounts()
            .into_iter()
            .map(|account| {
                let mine = owned.get(account.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let completed = mine.iter().filter(|t| t.completed).count();
                let last_activity = mine
                    .iter()
                    .map(|t| t.created_at)
                    .max()
                    .unwrap_or(account.created_at);
                UserStats {
                    task_count: mine.len(),
                    completed_tasks: completed,
                    pending_tasks: mine.len() - completed,
                    high_priority_pending: mine
                        .iter()
                        .filter(|t| t.priority == Priority::High && !t.completed)
                        .count(),
                    last_activity,
                    user: account.into(),
                }
            })
            .collect()
    }

    /// Name, email or company substring, case-insensitive. Empty term keeps all.
    pub fn search_users(&self, tasks: &[Task], term: &str) -> Vec<UserStats> {
        let stats = self.get_user_stats(tasks);
        if term.is_empty() {
            return stats;
        }
        let term = term.to_lowercase();
        stats
            .into_iter()
            .filter(|s| {
                s.user.name.to_lowercase().contains(&term)
                    || s.user.email.to_lowercase().contains(&term)
                    || s.user
                        .company
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&term))
            })
            .collect()
    }

    /// Every task with its owner; the search term also matches owner names.
    pub fn search_all_tasks(&self, tasks: &TaskStore, query: &TaskQuery) -> Vec<AdminTaskRow> {
        let owners: HashMap<String, PublicAccount> = self
            .get_all_users()
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let term = query.term().to_lowercase();
        let matching: Vec<Task> = tasks
            .get_all_tasks()
            .into_iter()
            .filter(|t| {
                term.is_empty()
                    || matches_term(t, &term)
                    || owners
                        .get(&t.user_id)
                        .is_some_and(|u| u.name.to_lowercase().contains(&term))
            })
            .collect();

        refine(matching, query)
            .into_iter()
            .map(|task| AdminTaskRow {
                user: owners.get(&task.user_id).cloned(),
                task,
            })
            .collect()
    }

    pub fn admin_overview(&self, tasks: &TaskStore) -> AdminOverview {
        let stats: TaskStats = tasks.get_task_stats(None);
        let user_stats = self.get_user_stats(tasks.tasks());

        let completion_rate = if stats.total > 0 {
            ((stats.completed as f64 / stats.total as f64) * 100.0).round() as u32
        } else {
            0
        };

        let mut recent_tasks = sort_tasks(tasks.get_all_tasks(), SortKey::CreatedDate);
        recent_tasks.truncate(RECENT_TASKS);

        let active_users = user_stats.iter().filter(|u| u.task_count > 0).count();
        let total_users = user_stats.len();
        let mut top_users = user_stats;
        top_users.sort_by(|a, b| b.task_count.cmp(&a.task_count));
        top_users.truncate(TOP_USERS);

        AdminOverview {
            stats,
            total_users,
            active_users,
            completion_rate,
            recent_tasks,
            top_users,
        }
    }
}
