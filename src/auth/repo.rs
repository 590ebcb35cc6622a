use crate::{
    auth::repo_types::{Account, Role},
    error::StoreResult,
    storage::{keys, Storage},
};

fn collection_key(role: Role) -> &'static str {
    match role {
        Role::User => keys::USERS,
        Role::Admin => keys::ADMINS,
    }
}

impl Account {
    /// All accounts of the given role.
    pub fn load_all(storage: &Storage, role: Role) -> Vec<Account> {
        let mut accounts: Vec<Account> = storage.read(collection_key(role));
        for account in &mut accounts {
            account.role = role;
        }
        accounts
    }

    pub fn save_all(storage: &Storage, role: Role, accounts: &[Account]) -> StoreResult<()> {
        storage.write(collection_key(role), accounts)
    }

    /// Find an account by normalized (trimmed, lowercased) email.
    pub fn find_by_email(storage: &Storage, role: Role, email: &str) -> Option<Account> {
        Self::load_all(storage, role)
            .into_iter()
            .find(|a| a.email_matches(email))
    }

    /// Append a new account to its collection.
    pub fn insert(storage: &Storage, account: &Account) -> StoreResult<()> {
        let mut all = Self::load_all(storage, account.role);
        all.push(account.clone());
        Self::save_all(storage, account.role, &all)
    }
}
