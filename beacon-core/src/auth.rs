//! Tracking around hosted authentication
//!
//! The hosted-auth service is an external collaborator behind
//! [`AuthProvider`]. [`AuthFlow`] reacts to its outcomes: a successful
//! login or registration emits the identity sequence, a visitor without a
//! session gets the anonymous identity. Auth errors go back to the caller
//! untouched and no tracking failure ever changes an auth result.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dispatch::DispatchOutcome;
use crate::error::{AuthError, AuthResult};
use crate::tracker::{IdentityTraits, Tracker};

/// Profile metadata stored with the account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Account returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Active session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Kind of auth state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

/// Notification pushed to `subscribe` receivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<AuthSession>,
}

/// Hosted email/password auth
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<AuthUser>;

    async fn sign_up(&self, email: &str, password: &str, metadata: UserMetadata) -> AuthResult<AuthUser>;

    async fn sign_out(&self) -> AuthResult<()>;

    async fn get_session(&self) -> AuthResult<Option<AuthSession>>;

    /// Auth state changes from now on
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
}

/// Name shown in the navigation bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&AuthUser> for DisplayUser {
    fn from(user: &AuthUser) -> Self {
        let first_name = non_empty(user.user_metadata.first_name.as_deref())
            .or_else(|| {
                user.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or("User")
            .to_string();

        Self {
            first_name,
            last_name: user.user_metadata.last_name.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
        }
    }
}

/// Which auth modal was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Login,
    Register,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Login => f.write_str("login"),
            AuthMode::Register => f.write_str("register"),
        }
    }
}

/// Registration form contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Displayed-user updates derived from auth state changes
pub struct SessionChanges {
    changes: broadcast::Receiver<AuthStateChange>,
}

impl SessionChanges {
    /// The user to show after the next change, `None` inside when signed out
    ///
    /// Returns `None` once the provider has gone away.
    pub async fn next(&mut self) -> Option<Option<DisplayUser>> {
        loop {
            match self.changes.recv().await {
                Ok(change) => {
                    return Some(change.session.as_ref().map(|session| DisplayUser::from(&session.user)))
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Auth state changes lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Auth calls plus the tracking that follows them
pub struct AuthFlow {
    provider: Arc<dyn AuthProvider>,
    tracker: Arc<Tracker>,
}

impl AuthFlow {
    pub fn new(provider: Arc<dyn AuthProvider>, tracker: Arc<Tracker>) -> Self {
        Self { provider, tracker }
    }

    /// Page load: resume the session or announce an anonymous visitor
    pub async fn start(&self) -> AuthResult<Option<DisplayUser>> {
        match self.provider.get_session().await? {
            Some(session) => Ok(Some(DisplayUser::from(&session.user))),
            None => {
                self.tracker.track_anonymous_once();
                Ok(None)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<DisplayUser> {
        let user = self.provider.sign_in_with_password(email, password).await?;
        info!(user_id = %user.id, "User logged in");

        self.track_known_user(
            &user,
            user.user_metadata.first_name.clone(),
            user.user_metadata.last_name.clone(),
            "user_login",
        );
        Ok(DisplayUser::from(&user))
    }

    /// Create an account; the session starts after email confirmation
    pub async fn register(&self, form: &RegistrationForm) -> AuthResult<AuthUser> {
        let metadata = UserMetadata {
            first_name: Some(form.first_name.clone()),
            last_name: Some(form.last_name.clone()),
        };
        let user = self.provider.sign_up(&form.email, &form.password, metadata).await?;
        info!(user_id = %user.id, "User registered");

        self.track_known_user(
            &user,
            Some(form.first_name.clone()),
            Some(form.last_name.clone()),
            "user_registration",
        );
        Ok(user)
    }

    /// Follow sign-ins and sign-outs from now on
    pub fn watch_session(&self) -> SessionChanges {
        SessionChanges {
            changes: self.provider.subscribe(),
        }
    }

    pub async fn logout(&self) -> AuthResult<()> {
        self.provider.sign_out().await
    }

    pub fn open_auth(&self, mode: AuthMode) -> DispatchOutcome {
        self.tracker
            .track_event(&format!("auth_modal_opened_{}", mode), BTreeMap::new())
    }

    /// Identity, email contact point, id mapping, then the named interaction
    fn track_known_user(
        &self,
        user: &AuthUser,
        first_name: Option<String>,
        last_name: Option<String>,
        interaction: &str,
    ) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(4);
        outcomes.push(self.tracker.track_identity(
            false,
            IdentityTraits {
                first_name,
                last_name,
                email: user.email.clone(),
                phone_number: None,
            },
        ));

        let email = non_empty(user.email.as_deref());
        if let Some(email) = email {
            outcomes.push(self.tracker.track_email(email));
        }

        outcomes.push(self.tracker.track_user_id(
            &user.id,
            &self.tracker.config().identity.id_type,
            email.unwrap_or("unknown"),
        ));
        outcomes.push(self.tracker.track_event(interaction, BTreeMap::new()));
        outcomes
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

struct Account {
    password: String,
    user: AuthUser,
}

/// In-process auth provider for tests and dry runs
pub struct InMemoryAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<AuthSession>>,
    changes: broadcast::Sender<AuthStateChange>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            changes,
        }
    }

    fn notify(&self, event: AuthEvent, session: Option<AuthSession>) {
        // No subscribers is fine.
        let _ = self.changes.send(AuthStateChange { event, session });
    }
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let user = {
            let accounts = self.accounts.lock();
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let session = AuthSession {
            user: user.clone(),
            access_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        *self.session.lock() = Some(session.clone());
        self.notify(AuthEvent::SignedIn, Some(session));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: UserMetadata) -> AuthResult<AuthUser> {
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("Unable to validate email address".to_string()));
        }
        if password.len() < 6 {
            return Err(AuthError::InvalidInput(
                "Password should be at least 6 characters".to_string(),
            ));
        }

        let key = email.to_lowercase();
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(&key) {
            return Err(AuthError::AlreadyRegistered(email.to_string()));
        }

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        accounts.insert(
            key,
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        Ok(user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let had_session = self.session.lock().take().is_some();
        if had_session {
            self.notify(AuthEvent::SignedOut, None);
        }
        Ok(())
    }

    async fn get_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.session.lock().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.changes.subscribe()
    }
}
