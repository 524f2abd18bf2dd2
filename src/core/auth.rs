//! Email/password accounts
//!
//! `IdentityToolkit` talks to the Identity Toolkit REST API; `AuthSession`
//! holds the signed-in user and publishes every change on the bus.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::core::store::{Collection, RecordStore};
use crate::shared::emit::EventBus;
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::WorkspaceEvent;
use crate::shared::types::{Notice, ProfilePreferences, UserProfile, UserRecord, UserSession};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Typed account failure decoded from the provider's error code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("This email is already registered")]
    EmailExists,
    #[error("No account exists for this email")]
    EmailNotFound,
    #[error("Incorrect password")]
    InvalidPassword,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password should be at least 6 characters")]
    WeakPassword,
    #[error("Too many attempts, try again later")]
    TooManyAttempts,
    #[error("This account has been disabled")]
    UserDisabled,
    #[error("Session expired, please sign in again")]
    SessionExpired,
    #[error("{0}")]
    Other(String),
}

impl AuthFailure {
    /// Codes arrive as e.g. `WEAK_PASSWORD : Password should be at least 6 characters`
    pub fn from_code(raw: &str) -> Self {
        let code = raw.split(" : ").next().unwrap_or(raw).trim();
        match code {
            "EMAIL_EXISTS" => AuthFailure::EmailExists,
            "EMAIL_NOT_FOUND" => AuthFailure::EmailNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthFailure::InvalidPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => AuthFailure::InvalidEmail,
            "WEAK_PASSWORD" => AuthFailure::WeakPassword,
            "USER_DISABLED" => AuthFailure::UserDisabled,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" => AuthFailure::SessionExpired,
            _ if code.starts_with("TOO_MANY_ATTEMPTS_TRY_LATER") => AuthFailure::TooManyAttempts,
            _ => AuthFailure::Other(code.to_string()),
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        AppError::Auth(failure.to_string())
    }
}

/// Tokens and identity returned by sign-up and sign-in
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTokens {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<AuthTokens>;
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthTokens>;
    async fn send_password_reset(&self, email: &str) -> AppResult<()>;
    async fn update_display_name(&self, id_token: &str, display_name: &str) -> AppResult<()>;
    async fn lookup(&self, id_token: &str) -> AppResult<UserProfile>;
}

// -- Wire types for Identity Toolkit v1 --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity Toolkit REST client
pub struct IdentityToolkit {
    http: Client,
    base_url: String,
    api_key: String,
}

impl IdentityToolkit {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn call<B: Serialize + Sync>(&self, method: &str, body: &B) -> AppResult<reqwest::Response> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Validation("Missing API Key".to_string()));
        }

        let url = format!("{}/v1/accounts:{}", self.base_url, method);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => {
                let failure = AuthFailure::from_code(&envelope.error.message);
                tracing::warn!("[Auth] accounts:{} rejected: {}", method, envelope.error.message);
                Err(failure.into())
            }
            Err(_) => {
                tracing::error!("[Auth] API error ({}): {}", status, text.trim());
                Err(AppError::provider_status(
                    status.as_u16(),
                    format!("Identity API error: {}", status.as_u16()),
                ))
            }
        }
    }

    async fn tokens(&self, method: &str, email: &str, password: &str) -> AppResult<AuthTokens> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let parsed = self
            .call(method, &request)
            .await?
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse token response: {}", e)))?;

        Ok(AuthTokens {
            uid: parsed.local_id,
            email: parsed.email,
            display_name: parsed.display_name.filter(|n| !n.is_empty()),
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkit {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        self.tokens("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        self.tokens("signInWithPassword", email, password).await
    }

    async fn send_password_reset(&self, email: &str) -> AppResult<()> {
        let request = OobRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        self.call("sendOobCode", &request).await?;
        Ok(())
    }

    async fn update_display_name(&self, id_token: &str, display_name: &str) -> AppResult<()> {
        let request = UpdateRequest {
            id_token,
            display_name,
            return_secure_token: false,
        };
        self.call("update", &request).await?;
        Ok(())
    }

    async fn lookup(&self, id_token: &str) -> AppResult<UserProfile> {
        let parsed = self
            .call("lookup", &LookupRequest { id_token })
            .await?
            .json::<LookupResponse>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse lookup response: {}", e)))?;

        let user = parsed
            .users
            .into_iter()
            .next()
            .ok_or(AuthFailure::SessionExpired)?;
        Ok(UserProfile {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name.filter(|n| !n.is_empty()),
        })
    }
}

/// Called with the current ID token whenever the session changes
pub type TokenSink = Arc<dyn Fn(Option<String>) + Send + Sync>;

pub struct AuthSession {
    identity: Arc<dyn IdentityProvider>,
    bus: EventBus,
    session: Mutex<Option<UserSession>>,
    token_sink: Option<TokenSink>,
    /// Users collection plus the defaults written into new profile records
    profiles: Option<(Arc<dyn RecordStore>, ProfilePreferences)>,
}

impl AuthSession {
    pub fn new(identity: Arc<dyn IdentityProvider>, bus: EventBus) -> Self {
        Self {
            identity,
            bus,
            session: Mutex::new(None),
            token_sink: None,
            profiles: None,
        }
    }

    pub fn with_token_sink(mut self, sink: TokenSink) -> Self {
        self.token_sink = Some(sink);
        self
    }

    /// Keep a `users/{uid}` record in step with sign-up, login and renames
    pub fn with_profile_store(mut self, store: Arc<dyn RecordStore>, defaults: ProfilePreferences) -> Self {
        self.profiles = Some((store, defaults));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<UserSession>> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.lock().as_ref().map(|s| s.profile.clone())
    }

    pub fn id_token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.id_token.clone())
    }

    fn set_session(&self, session: Option<UserSession>) {
        let profile = session.as_ref().map(|s| s.profile.clone());
        let token = session.as_ref().map(|s| s.id_token.clone());
        *self.lock() = session;

        if let Some(sink) = &self.token_sink {
            sink(token);
        }
        self.bus.emit(WorkspaceEvent::AuthChanged(profile));
    }

    fn require_session(&self) -> AppResult<UserSession> {
        self.lock()
            .clone()
            .ok_or_else(|| AppError::Auth("Not signed in".to_string()))
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
        display_name: &str,
    ) -> AppResult<UserProfile> {
        if password != confirm_password {
            return Err(AppError::Validation("Passwords do not match".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let tokens = self.identity.sign_up(email.trim(), password).await?;

        // The account exists from here on, so the user stays signed in even if naming fails
        let mut profile = UserProfile {
            uid: tokens.uid,
            email: tokens.email,
            display_name: None,
        };
        let display_name = display_name.trim();
        if !display_name.is_empty() {
            match self.identity.update_display_name(&tokens.id_token, display_name).await {
                Ok(()) => profile.display_name = Some(display_name.to_string()),
                Err(e) => {
                    tracing::warn!("[Auth] Signed up {} but setting the display name failed: {}", profile.uid, e);
                    self.bus.notify(Notice::error(format!("Could not save display name: {}", e)));
                }
            }
        }

        let session = UserSession {
            profile: profile.clone(),
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
        };
        tracing::info!("[Auth] Signed up {}", profile.uid);
        self.set_session(Some(session));
        self.sync_profile(&profile, true).await;
        Ok(profile)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserProfile> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation("Email and password are required".to_string()));
        }

        let tokens = self.identity.sign_in(email.trim(), password).await?;
        let session = UserSession {
            profile: UserProfile {
                uid: tokens.uid,
                email: tokens.email,
                display_name: tokens.display_name,
            },
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
        };
        let profile = session.profile.clone();
        tracing::info!("[Auth] Signed in {}", profile.uid);
        self.set_session(Some(session));
        self.sync_profile(&profile, true).await;
        Ok(profile)
    }

    pub fn logout(&self) {
        if self.lock().is_some() {
            tracing::info!("[Auth] Signed out");
        }
        self.set_session(None);
    }

    pub async fn reset_password(&self, email: &str) -> AppResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("Please enter your email".to_string()));
        }
        self.identity.send_password_reset(email).await?;
        self.bus.notify(Notice::success("Password reset email sent"));
        Ok(())
    }

    pub async fn update_display_name(&self, display_name: &str) -> AppResult<UserProfile> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::Validation("Display name cannot be empty".to_string()));
        }
        let mut session = self.require_session()?;

        self.identity
            .update_display_name(&session.id_token, display_name)
            .await?;
        session.profile.display_name = Some(display_name.to_string());

        let profile = session.profile.clone();
        self.set_session(Some(session));
        self.sync_profile(&profile, false).await;
        Ok(profile)
    }

    /// Stored profile of the signed-in user, for the account view
    pub async fn profile_record(&self) -> AppResult<Option<UserRecord>> {
        let session = self.require_session()?;
        let Some((store, _)) = &self.profiles else {
            return Ok(None);
        };
        match store.get(Collection::Users, &session.profile.uid).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Profile record failures are logged; they never undo a successful sign-in
    async fn sync_profile(&self, profile: &UserProfile, touch_login: bool) {
        let Some((store, defaults)) = &self.profiles else {
            return;
        };
        if let Err(e) = write_profile(store.as_ref(), defaults, profile, touch_login).await {
            tracing::warn!("[Auth] Failed to update profile record for {}: {}", profile.uid, e);
        }
    }

    /// Re-read the profile from the provider. An expired token ends the session.
    pub async fn refresh_profile(&self) -> AppResult<UserProfile> {
        let mut session = self.require_session()?;

        match self.identity.lookup(&session.id_token).await {
            Ok(profile) => {
                session.profile = profile.clone();
                self.set_session(Some(session));
                Ok(profile)
            }
            Err(e) => {
                if e == AppError::from(AuthFailure::SessionExpired) {
                    tracing::warn!("[Auth] Session expired");
                    self.set_session(None);
                }
                Err(e)
            }
        }
    }
}

/// Create the record on first sight, then refresh email, name and optionally `last_login`
async fn write_profile(
    store: &dyn RecordStore,
    defaults: &ProfilePreferences,
    profile: &UserProfile,
    touch_login: bool,
) -> AppResult<UserRecord> {
    let now = Utc::now();
    let existing = match store.get(Collection::Users, &profile.uid).await? {
        Some(body) => Some(serde_json::from_value::<UserRecord>(body)?),
        None => None,
    };

    let mut record = existing.unwrap_or_else(|| UserRecord {
        uid: profile.uid.clone(),
        email: profile.email.clone(),
        display_name: None,
        created_at: now,
        last_login: now,
        preferences: defaults.clone(),
    });
    record.email = profile.email.clone();
    if profile.display_name.is_some() {
        record.display_name = profile.display_name.clone();
    }
    if touch_login {
        record.last_login = now;
    }

    store
        .put(Collection::Users, &profile.uid, serde_json::to_value(&record)?)
        .await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::InMemoryStore;
    use crate::shared::emit::drain_events;
    use crate::shared::types::NoticeLevel;
    use mockito::{Matcher, Server};
    use serde_json::json;

    async fn toolkit(server: &Server) -> IdentityToolkit {
        IdentityToolkit::new(Client::new(), server.url(), "test-key")
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(AuthFailure::from_code("EMAIL_EXISTS"), AuthFailure::EmailExists);
        assert_eq!(
            AuthFailure::from_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthFailure::WeakPassword
        );
        assert_eq!(
            AuthFailure::from_code("TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled"),
            AuthFailure::TooManyAttempts
        );
        assert_eq!(AuthFailure::from_code("SOMETHING_NEW"), AuthFailure::Other("SOMETHING_NEW".into()));
    }

    #[tokio::test]
    async fn test_sign_in_parses_tokens() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(json!({"email": "a@b.co", "returnSecureToken": true})))
            .with_status(200)
            .with_body(
                r#"{"localId":"u1","email":"a@b.co","displayName":"Ada","idToken":"id-1","refreshToken":"rt-1"}"#,
            )
            .create_async()
            .await;

        let tokens = toolkit(&server).await.sign_in("a@b.co", "secret1").await.unwrap();
        assert_eq!(tokens.uid, "u1");
        assert_eq!(tokens.display_name.as_deref(), Some("Ada"));
        assert_eq!(tokens.id_token, "id-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_envelope_maps_to_auth_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#)
            .create_async()
            .await;

        let err = toolkit(&server).await.sign_up("a@b.co", "secret1").await.unwrap_err();
        assert_eq!(err, AppError::from(AuthFailure::EmailExists));
    }

    #[tokio::test]
    async fn test_non_json_error_keeps_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:lookup")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = toolkit(&server).await.lookup("tok").await.unwrap_err();
        assert!(matches!(err, AppError::Provider { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn test_signup_validates_before_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let session = AuthSession::new(Arc::new(toolkit(&server).await), EventBus::new());

        let err = session.signup("a@b.co", "secret1", "secret2", "Ada").await.unwrap_err();
        assert_eq!(err, AppError::Validation("Passwords do not match".to_string()));

        let err = session.signup("a@b.co", "abc", "abc", "Ada").await.unwrap_err();
        assert!(err.is_validation());

        let err = session.reset_password("  ").await.unwrap_err();
        assert!(err.is_validation());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_signup_sets_name_and_publishes_session() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co","idToken":"id-1","refreshToken":"rt-1"}"#)
            .create_async()
            .await;
        let update = server
            .mock("POST", "/v1/accounts:update")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"idToken": "id-1", "displayName": "Ada"})))
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co","displayName":"Ada"}"#)
            .create_async()
            .await;

        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let seen_token = Arc::new(Mutex::new(None));
        let sink_target = seen_token.clone();
        let session = AuthSession::new(Arc::new(toolkit(&server).await), bus)
            .with_token_sink(Arc::new(move |token| *sink_target.lock().unwrap() = token));

        let profile = session.signup("a@b.co", "secret1", "secret1", "Ada").await.unwrap();

        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
        assert_eq!(session.current_user(), Some(profile.clone()));
        assert_eq!(*seen_token.lock().unwrap(), Some("id-1".to_string()));
        assert_eq!(drain_events(&mut events), vec![WorkspaceEvent::AuthChanged(Some(profile))]);
        update.assert_async().await;

        session.logout();
        assert_eq!(session.current_user(), None);
        assert_eq!(*seen_token.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn test_signup_keeps_session_when_naming_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co","idToken":"id-1","refreshToken":"rt-1"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/accounts:update")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"TOO_MANY_ATTEMPTS_TRY_LATER"}}"#)
            .create_async()
            .await;

        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let session = AuthSession::new(Arc::new(toolkit(&server).await), bus);

        let profile = session.signup("a@b.co", "secret1", "secret1", "Ada").await.unwrap();

        assert_eq!(profile.uid, "u1");
        assert_eq!(profile.display_name, None);
        assert_eq!(session.current_user(), Some(profile.clone()));
        assert_eq!(session.id_token().as_deref(), Some("id-1"));

        let events = drain_events(&mut events);
        assert!(events.iter().any(|e| matches!(
            e,
            WorkspaceEvent::Notification(n) if n.level == NoticeLevel::Error
        )));
        assert!(events.contains(&WorkspaceEvent::AuthChanged(Some(profile))));
    }

    #[tokio::test]
    async fn test_profile_record_follows_account() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co","idToken":"id-1","refreshToken":"rt-1"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/accounts:update")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co","displayName":"Ada","idToken":"id-2","refreshToken":"rt-2"}"#)
            .create_async()
            .await;

        let store = Arc::new(InMemoryStore::new());
        let defaults = ProfilePreferences {
            theme: "system".to_string(),
            default_source_lang: "EN".to_string(),
            default_target_lang: "TR".to_string(),
        };
        let session = AuthSession::new(Arc::new(toolkit(&server).await), EventBus::new())
            .with_profile_store(store.clone(), defaults.clone());

        assert!(matches!(session.profile_record().await.unwrap_err(), AppError::Auth(_)));

        session.signup("a@b.co", "secret1", "secret1", "Ada").await.unwrap();
        let created = session.profile_record().await.unwrap().unwrap();
        assert_eq!(created.uid, "u1");
        assert_eq!(created.email, "a@b.co");
        assert_eq!(created.display_name.as_deref(), Some("Ada"));
        assert_eq!(created.preferences, defaults);
        assert_eq!(created.created_at, created.last_login);

        session.logout();
        session.login("a@b.co", "secret1").await.unwrap();
        let after_login = session.profile_record().await.unwrap().unwrap();
        assert_eq!(after_login.created_at, created.created_at);
        assert!(after_login.last_login >= created.last_login);

        session.update_display_name("Ada L").await.unwrap();
        let renamed = session.profile_record().await.unwrap().unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Ada L"));
        assert_eq!(renamed.last_login, after_login.last_login);

        let stored = store.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(stored["displayName"], "Ada L");
        assert_eq!(stored["preferences"]["defaultTargetLang"], "TR");
        assert_eq!(store.list(Collection::Users).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_display_name_requires_session() {
        let server = Server::new_async().await;
        let session = AuthSession::new(Arc::new(toolkit(&server).await), EventBus::new());

        assert!(session.update_display_name(" ").await.unwrap_err().is_validation());
        assert!(matches!(
            session.update_display_name("Ada").await.unwrap_err(),
            AppError::Auth(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_ends_session_on_refresh() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"localId":"u1","email":"a@b.co","idToken":"id-1","refreshToken":"rt-1"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/accounts:lookup")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"INVALID_ID_TOKEN"}}"#)
            .create_async()
            .await;

        let session = AuthSession::new(Arc::new(toolkit(&server).await), EventBus::new());
        session.login("a@b.co", "secret1").await.unwrap();
        assert!(session.refresh_profile().await.is_err());
        assert_eq!(session.current_user(), None);
    }
}
