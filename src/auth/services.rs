use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{ProfilePatch, RegisterRequest},
        password::{hash_password, verify_password},
        repo_types::{Account, PublicAccount, Role},
    },
    error::{StoreError, StoreResult},
    storage::{keys, Storage},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Form rules for a normalized registration request. Admin passwords are
/// held to a longer minimum.
pub fn validate_registration(req: &RegisterRequest, role: Role) -> StoreResult<()> {
    let invalid = |msg: &str| Err(StoreError::InvalidInput(msg.to_string()));

    if req.name.is_empty() {
        return invalid("name is required");
    }
    if req.email.is_empty() {
        return invalid("email is required");
    }
    if !is_valid_email(&req.email) {
        return invalid("email is invalid");
    }

    let pw = &req.password;
    if pw.is_empty() {
        return invalid("password is required");
    }
    let has_lower = pw.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = pw.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = pw.chars().any(|c| c.is_ascii_digit());
    match role {
        Role::User => {
            if pw.chars().count() < 6 {
                return invalid("password must be at least 6 characters long");
            }
            if !(has_lower && has_upper && has_digit) {
                return invalid(
                    "password must contain an uppercase letter, a lowercase letter and a number",
                );
            }
        }
        Role::Admin => {
            if pw.chars().count() < 8 {
                return invalid("password must be at least 8 characters");
            }
            if !(has_upper && has_digit) {
                return invalid("password must include an uppercase letter and a number");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Anonymous,
    User(PublicAccount),
    Admin(PublicAccount),
}

impl Session {
    pub fn account(&self) -> Option<&PublicAccount> {
        match self {
            Session::Anonymous => None,
            Session::User(a) | Session::Admin(a) => Some(a),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Session::Admin(_))
    }
}

/// Identity records and the single active session.
pub struct AuthStore {
    storage: Storage,
    session: Session,
}

impl AuthStore {
    /// Builds the store and resumes any session persisted in `storage`.
    pub fn new(storage: Storage) -> Self {
        let session = Self::restore(&storage);
        Self { storage, session }
    }

    fn restore(storage: &Storage) -> Session {
        let Some(user) = storage.read_one::<PublicAccount>(keys::CURRENT_USER) else {
            return Session::Anonymous;
        };
        let is_admin = storage.get_raw(keys::IS_ADMIN).as_deref() == Some("true");
        debug!(user_id = %user.id, is_admin, "session restored");
        if is_admin {
            Session::Admin(user)
        } else {
            Session::User(user)
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_user(&self) -> Option<&PublicAccount> {
        self.session.account()
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    pub fn login(
        &mut self,
        email: &str,
        password: &str,
        as_admin: bool,
    ) -> StoreResult<PublicAccount> {
        let email = email.trim().to_lowercase();
        let password = password.trim();
        let role = if as_admin { Role::Admin } else { Role::User };

        let Some(account) = Account::find_by_email(&self.storage, role, &email) else {
            warn!(email = %email, as_admin, "login unknown email");
            return Err(StoreError::InvalidCredentials);
        };
        if !verify_password(password, &account.password) {
            warn!(email = %email, user_id = %account.id, "login invalid password");
            return Err(StoreError::InvalidCredentials);
        }

        let public = account.public();
        self.establish(public.clone(), as_admin)?;
        info!(user_id = %public.id, as_admin, "logged in");
        Ok(public)
    }

    /// Registers a user and logs them in.
    pub fn register(&mut self, req: RegisterRequest) -> StoreResult<PublicAccount> {
        self.register_as(req, Role::User)
    }

    /// Registers an admin and logs them in as admin.
    pub fn register_admin(&mut self, req: RegisterRequest) -> StoreResult<PublicAccount> {
        self.register_as(req, Role::Admin)
    }

    fn register_as(&mut self, req: RegisterRequest, role: Role) -> StoreResult<PublicAccount> {
        let req = req.normalized();

        // uniqueness is per collection: an admin may share a user's email
        if Account::find_by_email(&self.storage, role, &req.email).is_some() {
            warn!(email = %req.email, ?role, "email already registered");
            return Err(StoreError::EmailTaken);
        }

        let id = match role {
            Role::User => Uuid::new_v4().to_string(),
            Role::Admin => format!("admin-{}", Uuid::new_v4()),
        };
        let account = Account {
            id,
            name: req.name,
            email: req.email,
            phone: req.phone,
            password: hash_password(&req.password)?,
            company: req.company,
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        Account::insert(&self.storage, &account)?;

        let public = account.public();
        self.establish(public.clone(), role == Role::Admin)?;
        info!(user_id = %public.id, email = %public.email, ?role, "account registered");
        Ok(public)
    }

    /// Clears the session. Calling it while logged out is a no-op.
    pub fn logout(&mut self) -> StoreResult<()> {
        if let Some(user) = self.session.account() {
            info!(user_id = %user.id, "logged out");
        }
        self.session = Session::Anonymous;
        self.storage.remove(keys::CURRENT_USER)?;
        self.storage.remove(keys::IS_ADMIN)?;
        Ok(())
    }

    pub fn update_profile(&mut self, patch: ProfilePatch) -> StoreResult<PublicAccount> {
        let user_id = match &self.session {
            Session::User(u) => u.id.clone(),
            Session::Admin(_) => return Err(StoreError::Forbidden("cannot update admin profile")),
            Session::Anonymous => return Err(StoreError::Forbidden("no active session")),
        };

        let mut users = Account::load_all(&self.storage, Role::User);
        let Some(account) = users.iter_mut().find(|u| u.id == user_id) else {
            return Err(StoreError::NotFound("user"));
        };
        if let Some(name) = patch.name {
            account.name = name.trim().to_string();
        }
        if let Some(phone) = patch.phone {
            account.phone = phone.trim().to_string();
        }
        if let Some(company) = patch.company {
            let company = company.trim().to_string();
            account.company = (!company.is_empty()).then_some(company);
        }
        let public = account.public();
        Account::save_all(&self.storage, Role::User, &users)?;

        self.establish(public.clone(), false)?;
        info!(user_id = %public.id, "profile updated");
        Ok(public)
    }

    fn establish(&mut self, user: PublicAccount, is_admin: bool) -> StoreResult<()> {
        self.storage.write_one(keys::CURRENT_USER, &user)?;
        self.storage
            .set_raw(keys::IS_ADMIN, if is_admin { "true" } else { "false" })?;
        self.session = if is_admin {
            Session::Admin(user)
        } else {
            Session::User(user)
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> RegisterRequest {
        RegisterRequest {
            name: "Ann".into(),
            email: "Ann@X.com".into(),
            password: "Secret1".into(),
            ..Default::default()
        }
    }

    fn admin_req() -> RegisterRequest {
        RegisterRequest {
            name: "Root".into(),
            email: "root@x.com".into(),
            password: "Password9".into(),
            ..Default::default()
        }
    }

    #[test]
    fn register_then_login_ignores_email_case_and_whitespace() {
        let storage = Storage::in_memory();
        let mut auth = AuthStore::new(storage);

        let user = auth.register(ann()).expect("register");
        assert_eq!(user.email, "ann@x.com");
        assert_eq!(user.role, Role::User);
        assert!(matches!(auth.session(), Session::User(_)));

        auth.logout().unwrap();
        let again = auth.login("  ann@x.com ", "Secret1 ", false).expect("login");
        assert_eq!(again.id, user.id);
        assert!(!auth.is_admin());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let mut auth = AuthStore::new(Storage::in_memory());
        auth.register(ann()).unwrap();
        let dup = RegisterRequest {
            email: " ANN@x.com".into(),
            ..ann()
        };
        let err = auth.register(dup).unwrap_err();
        assert_eq!(err.code(), "email_taken");
    }

    #[test]
    fn stored_password_is_hashed() {
        let storage = Storage::in_memory();
        let mut auth = AuthStore::new(storage.clone());
        auth.register(ann()).unwrap();
        let stored = Account::load_all(&storage, Role::User);
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].password, "Secret1");
        let raw_session = storage.get_raw(keys::CURRENT_USER).unwrap();
        assert!(!raw_session.contains("password"));
    }

    #[test]
    fn accounts_without_role_survive_new_registrations() {
        let storage = Storage::in_memory();
        storage
            .set_raw(
                keys::USERS,
                r#"[{"id":"1700000000000","name":"Old","email":"old@x.com","phone":"",
                     "password":"legacy","createdAt":"2023-11-14T22:13:20.000Z"}]"#,
            )
            .unwrap();

        let mut auth = AuthStore::new(storage.clone());
        auth.register(ann()).unwrap();

        let users = Account::load_all(&storage, Role::User);
        assert_eq!(users.len(), 2);
        let old = users.iter().find(|a| a.email == "old@x.com").unwrap();
        assert_eq!(old.role, Role::User);
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let mut auth = AuthStore::new(Storage::in_memory());
        auth.register(ann()).unwrap();
        auth.logout().unwrap();
        let err = auth.login("ann@x.com", "secret1", false).unwrap_err();
        assert_eq!(err.code(), "invalid_credentials");
        assert_eq!(auth.session(), &Session::Anonymous);
    }

    #[test]
    fn user_cannot_log_in_as_admin() {
        let mut auth = AuthStore::new(Storage::in_memory());
        auth.register(ann()).unwrap();
        auth.logout().unwrap();
        let err = auth.login("ann@x.com", "Secret1", true).unwrap_err();
        assert_eq!(err.code(), "invalid_credentials");
    }

    #[test]
    fn admin_collection_is_separate() {
        let storage = Storage::in_memory();
        let mut auth = AuthStore::new(storage.clone());
        auth.register(ann()).unwrap();

        let admin = auth
            .register_admin(RegisterRequest {
                email: "ann@x.com".into(),
                ..admin_req()
            })
            .expect("admins may reuse a user email");
        assert!(admin.id.starts_with("admin-"));
        assert_eq!(admin.role, Role::Admin);
        assert!(auth.is_admin());
        assert_eq!(storage.get_raw(keys::IS_ADMIN).as_deref(), Some("true"));
        assert_eq!(Account::load_all(&storage, Role::Admin).len(), 1);
        assert_eq!(Account::load_all(&storage, Role::User).len(), 1);

        auth.logout().unwrap();
        auth.login("ann@x.com", "Password9", true).expect("admin login");
        assert!(auth.is_admin());
    }

    #[test]
    fn logout_is_idempotent_and_clears_persisted_session() {
        let storage = Storage::in_memory();
        let mut auth = AuthStore::new(storage.clone());
        auth.register(ann()).unwrap();
        auth.logout().unwrap();
        auth.logout().unwrap();
        assert_eq!(auth.session(), &Session::Anonymous);
        assert!(storage.get_raw(keys::CURRENT_USER).is_none());
        assert!(storage.get_raw(keys::IS_ADMIN).is_none());
    }

    #[test]
    fn session_survives_restart() {
        let storage = Storage::in_memory();
        let user = AuthStore::new(storage.clone()).register(ann()).unwrap();

        let reloaded = AuthStore::new(storage);
        assert_eq!(reloaded.current_user(), Some(&user));
        assert!(!reloaded.is_admin());
    }

    #[test]
    fn malformed_session_restores_anonymous() {
        let storage = Storage::in_memory();
        storage.set_raw(keys::CURRENT_USER, "{broken").unwrap();
        storage.set_raw(keys::IS_ADMIN, "true").unwrap();
        let auth = AuthStore::new(storage);
        assert_eq!(auth.session(), &Session::Anonymous);
    }

    #[test]
    fn update_profile_requires_user_session() {
        let mut auth = AuthStore::new(Storage::in_memory());
        let err = auth.update_profile(ProfilePatch::default()).unwrap_err();
        assert_eq!(err.code(), "forbidden");

        auth.register_admin(admin_req()).unwrap();
        let err = auth.update_profile(ProfilePatch::default()).unwrap_err();
        assert_eq!(err.code(), "forbidden");
    }

    #[test]
    fn update_profile_merges_and_refreshes_session() {
        let storage = Storage::in_memory();
        let mut auth = AuthStore::new(storage.clone());
        auth.register(ann()).unwrap();

        let updated = auth
            .update_profile(ProfilePatch {
                name: Some(" Ann Lee ".into()),
                company: Some("Acme".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.name, "Ann Lee");
        assert_eq!(updated.company.as_deref(), Some("Acme"));
        assert_eq!(updated.email, "ann@x.com");

        let stored = Account::load_all(&storage, Role::User);
        assert_eq!(stored[0].name, "Ann Lee");
        let session: PublicAccount = storage.read_one(keys::CURRENT_USER).unwrap();
        assert_eq!(session.name, "Ann Lee");
    }

    #[test]
    fn update_profile_for_vanished_user_is_not_found() {
        let storage = Storage::in_memory();
        let mut auth = AuthStore::new(storage.clone());
        auth.register(ann()).unwrap();
        Account::save_all(&storage, Role::User, &[]).unwrap();
        let err = auth.update_profile(ProfilePatch::default()).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn registration_rules() {
        let ok = ann().normalized();
        assert!(validate_registration(&ok, Role::User).is_ok());

        let no_name = RegisterRequest { name: "  ".into(), ..ann() }.normalized();
        assert!(validate_registration(&no_name, Role::User).is_err());

        let bad_email = RegisterRequest { email: "ann.x.com".into(), ..ann() }.normalized();
        assert!(validate_registration(&bad_email, Role::User).is_err());

        let weak = RegisterRequest { password: "secret1".into(), ..ann() }.normalized();
        assert!(validate_registration(&weak, Role::User).is_err());

        // six characters is enough for users, not for admins
        assert!(validate_registration(&ok, Role::Admin).is_err());
        let admin = admin_req().normalized();
        assert!(validate_registration(&admin, Role::Admin).is_ok());
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email(""));
    }
}
