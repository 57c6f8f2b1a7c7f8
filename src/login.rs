use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
#[cfg(feature = "web")]
use axum::{
    Extension, Json,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
#[cfg(feature = "web")]
use std::sync::Arc;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

#[cfg(feature = "web")]
use crate::app::AppState;
use crate::config::MAX_SESSION_HOURS;
use crate::error::{AppError, AppResult};
use crate::role::Role;

/// User data structure representing a registered application user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Email address (unique across users)
    pub email: String,

    /// Display name
    pub full_name: String,

    /// Business unit the user works for
    #[serde(default)]
    pub business_unit: String,

    pub role: Role,

    /// Deactivated users can neither log in nor act
    pub is_active: bool,

    /// Argon2 hash of the user's password
    pub password_hash: String,
}

impl User {
    /// An active user without a password.
    #[cfg(test)]
    pub(crate) fn new(username: &str, role: Role) -> Self {
        User {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: username.to_string(),
            business_unit: String::new(),
            role,
            is_active: true,
            password_hash: String::new(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            business_unit: self.business_unit.clone(),
            role: self.role,
            is_active: self.is_active,
        }
    }

    fn require_admin(&self, action: &str) -> AppResult<()> {
        if self.is_active && self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("only admins can {}", action)))
        }
    }
}

/// Public view of a user (never carries the password hash)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub business_unit: String,
    pub role: Role,
    pub is_active: bool,
}

/// Data for creating a user account
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub business_unit: String,
    pub role: Role,
    pub password: String,
}

/// Profile changes. Empty or missing fields are left as they are; only
/// admins may change a role.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: String,
    pub business_unit: Option<String>,
    pub role: Option<Role>,
}

/// Credential data for login
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// Password change request data
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
    /// Must match `new_password`
    pub confirm_password: String,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";
const GENERATED_PASSWORD_LEN: usize = 12;

/// Accounts created on first start when the directory is empty.
const DEFAULT_USERS: [(&str, &str, Role); 3] = [
    ("admin", "Admin User", Role::Admin),
    ("manager", "Manager User", Role::Manager),
    ("staff", "Staff User", Role::Staff),
];

/// File-backed directory of user accounts.
///
/// Accounts live in a single pretty-printed JSON map keyed by username.
/// Every mutation writes the whole file before the in-memory copy is
/// replaced, so a failed write leaves both untouched.
#[derive(Debug)]
pub struct UserDirectory {
    path: PathBuf,
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    /// Open (or create) the users file at `path`.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                create_dir_all(dir)?;
            }
        }
        if !path.exists() {
            let mut file = File::create(&path)?;
            file.write_all(b"{}")?;
        }

        let contents = fs::read_to_string(&path)?;
        let users: HashMap<String, User> = serde_json::from_str(&contents)?;
        log::info!("loaded {} user(s) from {}", users.len(), path.display());

        Ok(UserDirectory {
            path,
            users: RwLock::new(users),
        })
    }

    fn save(&self, users: &HashMap<String, User>) -> AppResult<()> {
        let json = serde_json::to_string_pretty(users)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut HashMap<String, User>) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.save(&next)?;
        *guard = next;
        Ok(out)
    }

    pub fn get(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn insert_user(users: &mut HashMap<String, User>, new: NewUser) -> AppResult<User> {
        let username = new.username.trim();
        if username.is_empty() || new.password.is_empty() {
            return Err(AppError::invalid_input("username and password cannot be empty"));
        }
        if !EMAIL_REGEX.is_match(&new.email) {
            return Err(AppError::invalid_input(format!(
                "'{}' is not a valid email address",
                new.email
            )));
        }
        if users.contains_key(username) {
            return Err(AppError::Conflict("username already exists".to_string()));
        }
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(AppError::Conflict(
                "email address is already registered".to_string(),
            ));
        }

        let full_name = if new.full_name.trim().is_empty() {
            username.to_string()
        } else {
            new.full_name.clone()
        };
        let user = User {
            username: username.to_string(),
            email: new.email.clone(),
            full_name,
            business_unit: new.business_unit.trim().to_string(),
            role: new.role,
            is_active: true,
            password_hash: hash_password(&new.password)?,
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    /// Create a user account (admin only).
    pub fn register(&self, actor: &User, new: NewUser) -> AppResult<User> {
        actor.require_admin("create users")?;
        let user = self.mutate(|users| Self::insert_user(users, new))?;
        log::info!(
            "{} created user {} with role {}",
            actor.username,
            user.username,
            user.role
        );
        Ok(user)
    }

    /// Create the default admin/manager/staff accounts when no user exists yet.
    ///
    /// Returns the number of accounts created.
    pub fn seed_defaults(&self) -> AppResult<usize> {
        if !self.is_empty() {
            return Ok(0);
        }
        let created = self.mutate(|users| {
            for (username, full_name, role) in DEFAULT_USERS {
                Self::insert_user(
                    users,
                    NewUser {
                        username: username.to_string(),
                        email: format!("{}@example.com", username),
                        full_name: full_name.to_string(),
                        business_unit: String::new(),
                        role,
                        password: format!("{}123", username),
                    },
                )?;
            }
            Ok(DEFAULT_USERS.len())
        })?;
        log::warn!("seeded {} default accounts; change their passwords", created);
        Ok(created)
    }

    /// Check credentials; inactive users never verify.
    pub fn verify(&self, username: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.get(username) else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// All accounts sorted by username (admin only).
    pub fn list(&self, actor: &User) -> AppResult<Vec<UserProfile>> {
        actor.require_admin("list users")?;
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        let mut profiles: Vec<UserProfile> = users.values().map(User::profile).collect();
        profiles.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(profiles)
    }

    /// Activate or deactivate an account (admin only, never oneself).
    pub fn set_active(&self, actor: &User, username: &str, active: bool) -> AppResult<UserProfile> {
        actor.require_admin("change account status")?;
        if actor.username == username && !active {
            return Err(AppError::invalid_input("admins cannot deactivate themselves"));
        }
        let profile = self.mutate(|users| {
            let user = users
                .get_mut(username)
                .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
            user.is_active = active;
            Ok(user.profile())
        })?;
        if !active {
            end_sessions_for(username);
        }
        log::info!(
            "{} {} user {}",
            actor.username,
            if active { "activated" } else { "deactivated" },
            username
        );
        Ok(profile)
    }

    /// Replace a user's password with a generated one and return it (admin only).
    pub fn reset_password(&self, actor: &User, username: &str) -> AppResult<String> {
        actor.require_admin("reset passwords")?;
        let password = generate_password();
        let hash = hash_password(&password)?;
        self.mutate(|users| {
            let user = users
                .get_mut(username)
                .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
            user.password_hash = hash;
            Ok(())
        })?;
        end_sessions_for(username);
        log::info!("{} reset the password of {}", actor.username, username);
        Ok(password)
    }

    /// Update a user's display name, business unit or role.
    ///
    /// Users may edit their own profile; admins may edit anyone's. Role
    /// changes are admin-only, and an admin cannot change their own role.
    pub fn update_profile(
        &self,
        actor: &User,
        username: &str,
        update: ProfileUpdate,
    ) -> AppResult<UserProfile> {
        if !actor.is_active {
            return Err(AppError::forbidden("inactive users cannot edit profiles"));
        }
        if actor.username != username {
            actor.require_admin("edit other users' profiles")?;
        }
        let profile = self.mutate(|users| {
            let user = users
                .get_mut(username)
                .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
            if let Some(role) = update.role.filter(|r| *r != user.role) {
                actor.require_admin("change roles")?;
                if actor.username == username {
                    return Err(AppError::invalid_input("admins cannot change their own role"));
                }
                user.role = role;
            }
            let full_name = update.full_name.trim();
            if !full_name.is_empty() {
                user.full_name = full_name.to_string();
            }
            if let Some(unit) = &update.business_unit {
                user.business_unit = unit.trim().to_string();
            }
            Ok(user.profile())
        })?;
        log::info!("{} updated the profile of {}", actor.username, username);
        Ok(profile)
    }

    /// Change one's own password after checking the current one.
    pub fn change_password(&self, username: &str, change: &PasswordChangeRequest) -> AppResult<()> {
        if change.new_password != change.confirm_password {
            return Err(AppError::invalid_input("new passwords don't match"));
        }
        if change.new_password.is_empty() {
            return Err(AppError::invalid_input("new password cannot be empty"));
        }
        let user = self
            .get(username)
            .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
        if !verify_password(&change.old_password, &user.password_hash)? {
            return Err(AppError::invalid_input("invalid old password"));
        }
        let hash = hash_password(&change.new_password)?;
        self.mutate(|users| {
            if let Some(user) = users.get_mut(username) {
                user.password_hash = hash;
            }
            Ok(())
        })
    }
}

/// Hash a password using Argon2id with a random salt
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Auth(e.to_string()))
}

/// Verify a password against a stored hash; a mismatch is `Ok(false)`
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Auth("invalid password hash format".into()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random password for admin resets.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();

    (0..GENERATED_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

/// Create and store a new session for an authenticated user, returning its id.
pub fn create_session(username: &str, ttl: Duration) -> String {
    let session_id = Uuid::new_v4().to_string();
    let now = SystemTime::now();
    let ttl = ttl.min(Duration::from_secs(MAX_SESSION_HOURS * 60 * 60));
    let session = Session {
        user_id: username.to_string(),
        expires_at: now.checked_add(ttl).unwrap_or(now),
    };

    let mut sessions = SESSIONS.write().unwrap_or_else(PoisonError::into_inner);
    sessions.retain(|_, s| s.expires_at > SystemTime::now());
    sessions.insert(session_id.clone(), session);

    session_id
}

/// The username behind a live session, if any.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap_or_else(PoisonError::into_inner);

    sessions
        .get(session_id)
        .filter(|session| session.expires_at > SystemTime::now())
        .map(|session| session.user_id.clone())
}

pub fn end_session(session_id: &str) {
    SESSIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(session_id);
}

fn end_sessions_for(username: &str) {
    SESSIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|_, s| s.user_id != username);
}

// Web handler functions below (only compiled with "web" feature)

#[cfg(feature = "web")]
const SESSION_COOKIE: &str = "session";

/// Handle user login requests
///
/// Validates credentials and sets the session cookie.
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<(CookieJar, Json<UserProfile>), AppError> {
    match state.users.verify(&credentials.username, &credentials.password)? {
        Some(user) => {
            let session_id = create_session(&user.username, state.config.session_ttl());
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true);
            log::info!("{} logged in", user.username);
            Ok((jar.add(cookie), Json(user.profile())))
        }
        None => {
            log::warn!("failed login for {}", credentials.username);
            Err(AppError::Unauthorized)
        }
    }
}

/// Handle user logout
///
/// Ends the session and clears the cookie.
#[cfg(feature = "web")]
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }
    (jar.remove(Cookie::from(SESSION_COOKIE)), StatusCode::NO_CONTENT)
}

/// Authentication middleware
///
/// Resolves the session cookie to an active `User` and inserts it into the
/// request extensions; anything else is a 401.
#[cfg(feature = "web")]
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let user = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| validate_session(cookie.value()))
        .and_then(|username| state.users.get(&username))
        .filter(|user| user.is_active);

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => AppError::Unauthorized.into_response(),
    }
}

#[cfg(feature = "web")]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(state.users.list(&user)?))
}

#[cfg(feature = "web")]
pub async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(new): Json<NewUser>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let created = state.users.register(&user, new)?;
    Ok((StatusCode::CREATED, Json(created.profile())))
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct ActiveForm {
    pub is_active: bool,
}

#[cfg(feature = "web")]
pub async fn handle_set_active(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AxumPath(username): AxumPath<String>,
    Json(form): Json<ActiveForm>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.set_active(&user, &username, form.is_active)?))
}

#[cfg(feature = "web")]
pub async fn handle_reset_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let password = state.users.reset_password(&user, &username)?;
    Ok(Json(serde_json::json!({
        "username": username,
        "temporary_password": password,
    })))
}

/// Update the caller's own profile.
#[cfg(feature = "web")]
pub async fn handle_update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.update_profile(&user, &user.username, update)?))
}

#[cfg(feature = "web")]
pub async fn handle_update_user_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AxumPath(username): AxumPath<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.update_profile(&user, &username, update)?))
}

#[cfg(feature = "web")]
pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(change): Json<PasswordChangeRequest>,
) -> Result<StatusCode, AppError> {
    state.users.change_password(&user.username, &change)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> (tempfile::TempDir, UserDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let users = UserDirectory::open(dir.path().join("users.json")).unwrap();
        (dir, users)
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{}@corp.example", username),
            full_name: String::new(),
            business_unit: "Finance".to_string(),
            role,
            password: "s3cret".to_string(),
        }
    }

    #[test]
    fn only_admins_register_users() {
        let (_dir, users) = directory();
        let admin = User::new("root", Role::Admin);
        let manager = User::new("boss", Role::Manager);

        assert!(matches!(
            users.register(&manager, new_user("alice", Role::Staff)),
            Err(AppError::Forbidden(_))
        ));
        let alice = users.register(&admin, new_user("alice", Role::Staff)).unwrap();
        assert_eq!(alice.full_name, "alice");
        assert!(users.verify("alice", "s3cret").unwrap().is_some());
        assert!(users.verify("alice", "wrong").unwrap().is_none());
    }

    #[test]
    fn rejects_duplicates_and_bad_email() {
        let (_dir, users) = directory();
        let admin = User::new("root", Role::Admin);
        users.register(&admin, new_user("alice", Role::Staff)).unwrap();

        assert!(matches!(
            users.register(&admin, new_user("alice", Role::Staff)),
            Err(AppError::Conflict(_))
        ));
        let mut same_email = new_user("alice2", Role::Staff);
        same_email.email = "ALICE@corp.example".to_string();
        assert!(matches!(
            users.register(&admin, same_email),
            Err(AppError::Conflict(_))
        ));
        let mut bad = new_user("bob", Role::Staff);
        bad.email = "not-an-email".to_string();
        assert!(matches!(
            users.register(&admin, bad),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn deactivated_users_cannot_log_in() {
        let (_dir, users) = directory();
        let admin = User::new("root", Role::Admin);
        users.register(&admin, new_user("alice", Role::Staff)).unwrap();
        users.set_active(&admin, "alice", false).unwrap();
        assert!(users.verify("alice", "s3cret").unwrap().is_none());
        assert!(users.set_active(&admin, "root", false).is_err());
    }

    #[test]
    fn accounts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        {
            let users = UserDirectory::open(&path).unwrap();
            assert_eq!(users.seed_defaults().unwrap(), 3);
            assert_eq!(users.seed_defaults().unwrap(), 0);
        }
        let reopened = UserDirectory::open(&path).unwrap();
        assert_eq!(reopened.get("manager").unwrap().role, Role::Manager);
        assert!(reopened.verify("staff", "staff123").unwrap().is_some());
    }

    #[test]
    fn reset_and_change_password() {
        let (_dir, users) = directory();
        let admin = User::new("root", Role::Admin);
        users.register(&admin, new_user("alice", Role::Staff)).unwrap();

        let temporary = users.reset_password(&admin, "alice").unwrap();
        assert_eq!(temporary.len(), GENERATED_PASSWORD_LEN);
        assert!(users.verify("alice", &temporary).unwrap().is_some());

        let change = PasswordChangeRequest {
            old_password: temporary,
            new_password: "fresh".to_string(),
            confirm_password: "fresh".to_string(),
        };
        users.change_password("alice", &change).unwrap();
        assert!(users.verify("alice", "fresh").unwrap().is_some());
    }

    #[test]
    fn profiles_are_edited_by_owner_or_admin() {
        let (_dir, users) = directory();
        let admin = User::new("root", Role::Admin);
        let alice = users.register(&admin, new_user("alice", Role::Staff)).unwrap();
        users.register(&admin, new_user("bob", Role::Staff)).unwrap();

        let profile = users
            .update_profile(
                &alice,
                "alice",
                ProfileUpdate {
                    full_name: "  Alice Tan ".to_string(),
                    business_unit: Some("Operations".to_string()),
                    role: None,
                },
            )
            .unwrap();
        assert_eq!(profile.full_name, "Alice Tan");
        assert_eq!(profile.business_unit, "Operations");

        // Blank name and missing unit keep the current values.
        let unchanged = users
            .update_profile(&alice, "alice", ProfileUpdate::default())
            .unwrap();
        assert_eq!(unchanged, profile);

        assert!(matches!(
            users.update_profile(&alice, "bob", ProfileUpdate::default()),
            Err(AppError::Forbidden(_))
        ));
        let promote = ProfileUpdate {
            role: Some(Role::Manager),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            users.update_profile(&alice, "alice", promote.clone()),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(
            users.update_profile(&admin, "alice", promote).unwrap().role,
            Role::Manager
        );
        assert_eq!(users.get("alice").unwrap().role, Role::Manager);
    }

    #[test]
    fn admins_keep_their_own_role() {
        let (_dir, users) = directory();
        let admin = User::new("root", Role::Admin);
        let root = users
            .register(&admin, new_user("root", Role::Admin))
            .unwrap();
        let demote = ProfileUpdate {
            role: Some(Role::Staff),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            users.update_profile(&root, "root", demote),
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(users.get("root").unwrap().role, Role::Admin);
    }

    #[test]
    fn huge_session_lifetimes_do_not_overflow() {
        let session = create_session("alice", Duration::MAX);
        assert_eq!(validate_session(&session).as_deref(), Some("alice"));
        end_session(&session);
    }

    #[test]
    fn sessions_expire_and_end() {
        let live = create_session("alice", Duration::from_secs(60));
        assert_eq!(validate_session(&live).as_deref(), Some("alice"));
        end_session(&live);
        assert!(validate_session(&live).is_none());

        let expired = create_session("alice", Duration::ZERO);
        assert!(validate_session(&expired).is_none());
    }
}
