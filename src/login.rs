#![cfg(not(tarpaulin_include))]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

#[cfg(feature = "web")]
use axum::{
    Form,
    async_trait,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
#[cfg(feature = "web")]
use log::{error, info, warn};
#[cfg(feature = "web")]
use uuid::Uuid;

use crate::config::{DashboardConfig, UserEntry};
use crate::error::{Result, WearError};

#[cfg(feature = "web")]
use crate::app::AppState;

/// Identity of a logged-in user, shown in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name
    pub name: String,
    /// Account (login) name
    pub username: String,
}

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials matched a registered user
    Success(Identity),
    /// Unknown user or wrong password
    InvalidCredentials,
    /// Username or password left blank
    NoCredentials,
}

/// Credential data posted by the login form
///
/// Missing fields deserialize as empty strings so a blank form is reported
/// as "no credentials" rather than rejected by the extractor.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Registered users, keyed by username
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: BTreeMap<String, UserEntry>,
}

impl CredentialStore {
    /// Build the store from the `[credentials]` section of the config
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            users: config.credentials.usernames.clone(),
        }
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user is registered
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check a username and password against the store
    ///
    /// # Arguments
    /// * `username` - Login name as typed
    /// * `password` - Plaintext password as typed
    ///
    /// # Returns
    /// * `LoginOutcome` - `NoCredentials` when either field is blank,
    ///   `InvalidCredentials` for an unknown user, a wrong password or an
    ///   unparseable stored hash, `Success` otherwise
    pub fn authenticate(&self, username: &str, password: &str) -> LoginOutcome {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return LoginOutcome::NoCredentials;
        }

        let Some(user) = self.users.get(username) else {
            return LoginOutcome::InvalidCredentials;
        };

        match verify_password(password, &user.password) {
            Ok(true) => LoginOutcome::Success(Identity {
                name: user.name.clone(),
                username: username.to_string(),
            }),
            Ok(false) | Err(_) => LoginOutcome::InvalidCredentials,
        }
    }
}

/// Hash a password using Argon2
///
/// Creates a PHC-format Argon2id hash with a random salt, suitable for the
/// `password` field of a `[credentials.usernames.<name>]` entry.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String>` - The password hash or an error
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => Err(WearError::Auth(format!("password hashing failed: {}", e))),
    }
}

/// Verify a password against a stored hash
///
/// # Arguments
/// * `password` - The plaintext password to verify
/// * `hash` - The stored password hash to check against
///
/// # Returns
/// * `Result<bool>` - True if the password matches, false if not
///
/// # Errors
/// * Returns an error if the hash is not a valid PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| WearError::Auth(format!("invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// An authenticated session
///
/// Handlers receive one of these per request through the extractor; there is
/// no process-wide "logged in" flag.
#[derive(Debug, Clone)]
pub struct Session {
    /// Random session id carried by the cookie
    pub id: String,
    pub identity: Identity,
    /// Time when the session expires
    pub expires_at: SystemTime,
}

impl Session {
    /// Whether the session is still valid at `now`
    pub fn is_active(&self, now: SystemTime) -> bool {
        self.expires_at > now
    }
}

/// Active sessions of one server instance
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    lifetime: Duration,
}

impl SessionStore {
    /// Creates an empty store whose sessions live for `lifetime`
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Store for the cookie expiry configured in days
    pub fn with_expiry_days(days: u32) -> Self {
        Self::new(Duration::from_secs(u64::from(days) * 24 * 60 * 60))
    }

    /// Open a session for `identity` under the given id
    ///
    /// Sessions that have expired by now are dropped first.
    pub fn create_with_id(&self, id: String, identity: Identity) -> Session {
        let now = SystemTime::now();
        let session = Session {
            id: id.clone(),
            identity,
            expires_at: now + self.lifetime,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, session| session.is_active(now));
        sessions.insert(id, session.clone());
        session
    }

    /// Open a session with a fresh random id
    #[cfg(feature = "web")]
    pub fn create(&self, identity: Identity) -> Session {
        self.create_with_id(Uuid::new_v4().to_string(), identity)
    }

    /// Look up a live session; expired ones are dropped on the way
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = SystemTime::now();
        {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            match sessions.get(id) {
                Some(session) if session.is_active(now) => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, session| session.is_active(now));
        None
    }

    /// End a session
    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id)
    }

    /// Number of stored sessions, expired ones included
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no session
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed salt for deriving the cookie signing key from the configured secret
#[cfg(feature = "web")]
const COOKIE_KEY_SALT: &[u8] = b"millwear-session-cookie";

/// Derive the 64-byte cookie signing key from the `[cookie] key` secret
///
/// The configured secret can be any length; Argon2 stretches it into key
/// material so the same secret always yields the same key.
#[cfg(feature = "web")]
pub fn derive_cookie_key(secret: &str) -> Result<Key> {
    let mut material = [0u8; 64];
    Argon2::default()
        .hash_password_into(secret.as_bytes(), COOKIE_KEY_SALT, &mut material)
        .map_err(|e| WearError::Auth(format!("cannot derive cookie key: {}", e)))?;
    Ok(Key::from(&material))
}

/// Message shown above the login form
#[cfg(feature = "web")]
#[derive(Debug, Serialize)]
struct LoginMessage {
    kind: &'static str,
    text: &'static str,
}

#[cfg(feature = "web")]
const ENTER_CREDENTIALS: LoginMessage = LoginMessage {
    kind: "warning",
    text: "Please enter your username and password",
};

#[cfg(feature = "web")]
const INCORRECT_CREDENTIALS: LoginMessage = LoginMessage {
    kind: "error",
    text: "Username/password is incorrect",
};

#[cfg(feature = "web")]
fn render_login(state: &AppState, message: &LoginMessage) -> Response {
    let data = serde_json::json!({
        "branding": &state.config.branding,
        "message": message,
    });

    match state.templates.render("login", &data) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render login page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render login page").into_response()
        }
    }
}

/// Serve the login page
///
/// Users that already hold a live session are sent to the dashboard.
#[cfg(feature = "web")]
pub async fn serve_login_page(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    if session_from_jar(&state, &jar).is_some() {
        return Redirect::to("/").into_response();
    }
    render_login(&state, &ENTER_CREDENTIALS)
}

/// Handle user login requests
///
/// Processes login form submissions, validates credentials, and creates a session if valid.
///
/// # Arguments
/// * `state` - Application state holding the credential and session stores
/// * `jar` - Signed cookie jar for storing the session cookie
/// * `credentials` - Form data containing the username and password
///
/// # Returns
/// * `Response` - Redirect to the dashboard if successful, or the login page with a message
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    match state
        .credentials
        .authenticate(&credentials.username, &credentials.password)
    {
        LoginOutcome::Success(identity) => {
            info!("User '{}' logged in", identity.username);
            let session = state.sessions.create(identity);
            let cookie = Cookie::build((state.config.cookie.name.clone(), session.id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::days(i64::from(state.config.cookie.expiry_days)));
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        LoginOutcome::InvalidCredentials => {
            warn!("Failed login attempt for '{}'", credentials.username.trim());
            let mut response = render_login(&state, &INCORRECT_CREDENTIALS);
            if response.status() == StatusCode::OK {
                *response.status_mut() = StatusCode::UNAUTHORIZED;
            }
            response
        }
        LoginOutcome::NoCredentials => render_login(&state, &ENTER_CREDENTIALS),
    }
}

/// Handle user logout
///
/// Ends the server-side session, clears the session cookie and redirects to the login page.
#[cfg(feature = "web")]
pub async fn handle_logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    let name = state.config.cookie.name.clone();
    if let Some(cookie) = jar.get(&name) {
        if let Some(session) = state.sessions.remove(cookie.value()) {
            info!("User '{}' logged out", session.identity.username);
        }
    }

    (jar.remove(Cookie::build((name, "")).path("/")), Redirect::to("/login"))
}

#[cfg(feature = "web")]
fn session_from_jar(state: &AppState, jar: &SignedCookieJar) -> Option<Session> {
    let cookie = jar.get(&state.config.cookie.name)?;
    state.sessions.get(cookie.value())
}

/// Authentication extractor
///
/// Handlers that take a `Session` argument only run for requests carrying a
/// valid signed session cookie; everything else is redirected to `/login`.
#[cfg(feature = "web")]
#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        session_from_jar(state, &jar).ok_or_else(|| Redirect::to("/login"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(username: &str, name: &str, password: &str) -> CredentialStore {
        let mut users = BTreeMap::new();
        users.insert(
            username.to_string(),
            UserEntry {
                name: name.to_string(),
                password: hash_password(password).unwrap(),
                email: None,
            },
        );
        CredentialStore { users }
    }

    fn identity() -> Identity {
        Identity {
            name: "John Smith".to_string(),
            username: "jsmith".to_string(),
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("abc123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("abc123", &hash).unwrap());
        assert!(!verify_password("abc124", &hash).unwrap());
        assert!(verify_password("abc123", "plaintext").is_err());
    }

    #[test]
    fn test_authenticate_outcomes() {
        let store = store_with("jsmith", "John Smith", "abc123");

        assert_eq!(store.authenticate("jsmith", "abc123"), LoginOutcome::Success(identity()));
        assert_eq!(store.authenticate(" jsmith ", "abc123"), LoginOutcome::Success(identity()));
        assert_eq!(store.authenticate("jsmith", "wrong"), LoginOutcome::InvalidCredentials);
        assert_eq!(store.authenticate("nobody", "abc123"), LoginOutcome::InvalidCredentials);
        assert_eq!(store.authenticate("", "abc123"), LoginOutcome::NoCredentials);
        assert_eq!(store.authenticate("jsmith", ""), LoginOutcome::NoCredentials);
    }

    #[test]
    fn test_corrupt_stored_hash_is_invalid_not_error() {
        let mut store = store_with("jsmith", "John Smith", "abc123");
        store.users.get_mut("jsmith").unwrap().password = "oops".to_string();
        assert_eq!(store.authenticate("jsmith", "abc123"), LoginOutcome::InvalidCredentials);
    }

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::with_expiry_days(30);
        let session = store.create_with_id("s-1".to_string(), identity());

        assert_eq!(store.get("s-1").unwrap().identity, identity());
        assert!(session.expires_at > SystemTime::now() + Duration::from_secs(29 * 24 * 3600));
        assert!(store.get("s-2").is_none());

        assert!(store.remove("s-1").is_some());
        assert!(store.get("s-1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_sessions_are_purged() {
        let store = SessionStore::new(Duration::ZERO);
        store.create_with_id("old".to_string(), identity());
        assert_eq!(store.len(), 1);

        assert!(store.get("old").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_new_session_drops_expired_ones() {
        let store = SessionStore::with_expiry_days(1);
        store.create_with_id("stale".to_string(), identity());
        store
            .sessions
            .write()
            .unwrap()
            .get_mut("stale")
            .unwrap()
            .expires_at = SystemTime::now() - Duration::from_secs(60);

        store.create_with_id("fresh".to_string(), identity());

        assert_eq!(store.len(), 1);
        assert!(store.get("fresh").is_some());
    }

    #[cfg(feature = "web")]
    #[test]
    fn test_cookie_key_is_stable() {
        let a = derive_cookie_key("some_signature_key").unwrap();
        let b = derive_cookie_key("some_signature_key").unwrap();
        let c = derive_cookie_key("another key").unwrap();

        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}
