//! Firebase Authentication (Identity Toolkit REST) identity provider.
//!
//! Email/password accounts only. The ID token returned by sign-in is kept
//! in memory and shared with [`crate::stores::FirestoreDatabase`] through
//! [`FirebaseCredentials`]. Tokens are never refreshed and never persisted,
//! so a restarted process always starts signed out.

use crate::config::FirebaseConfig;
use crate::error::{Result, SessionError};
use crate::providers::IdentityProvider;
use crate::state::{AuthState, Identity};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// ID token of the signed-in user, shared between Firebase backends.
#[derive(Clone, Default)]
pub struct FirebaseCredentials {
    id_token: Arc<RwLock<Option<String>>>,
}

impl FirebaseCredentials {
    /// Current ID token, if signed in.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, token: Option<String>) {
        *self.id_token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

impl std::fmt::Debug for FirebaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseCredentials")
            .field("signed_in", &self.id_token().is_some())
            .finish()
    }
}

/// Account payload shared by `signInWithPassword`, `signUp` and `update`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: Option<String>,
}

impl AccountResponse {
    fn identity(&self) -> Identity {
        Identity {
            id: self.local_id.clone().into(),
            email: self.email.clone(),
            display_name: self.display_name.clone().filter(|name| !name.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map an Identity Toolkit error message (`"WEAK_PASSWORD : Password
/// should be at least 6 characters"`) to a [`SessionError`].
fn map_error(message: &str) -> SessionError {
    let (code, detail) = message
        .split_once(':')
        .map_or((message.trim(), ""), |(code, detail)| (code.trim(), detail.trim()));

    match code {
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => SessionError::UserNotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_ID_TOKEN" => {
            SessionError::InvalidCredentials
        },
        "USER_DISABLED" => SessionError::UserDisabled,
        "EMAIL_EXISTS" => SessionError::EmailAlreadyInUse,
        "WEAK_PASSWORD" => SessionError::WeakPassword(detail.to_string()),
        "INVALID_EMAIL" | "MISSING_EMAIL" => SessionError::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => SessionError::TooManyRequests,
        _ => SessionError::Backend(message.to_string()),
    }
}

/// Identity provider backed by Firebase Authentication.
///
/// # Example
///
/// ```no_run
/// use quill_session::config::FirebaseConfig;
/// use quill_session::stores::FirebaseAuthProvider;
///
/// let auth = FirebaseAuthProvider::new(FirebaseConfig::from_env()?);
/// auth.restore_session();
/// # Ok::<(), quill_session::SessionError>(())
/// ```
#[derive(Clone)]
pub struct FirebaseAuthProvider {
    config: Arc<FirebaseConfig>,
    http_client: Client,
    state: Arc<watch::Sender<AuthState>>,
    credentials: FirebaseCredentials,
}

impl FirebaseAuthProvider {
    /// Provider for a project. Starts in [`AuthState::Initializing`].
    #[must_use]
    pub fn new(config: FirebaseConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Provider using a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(config: FirebaseConfig, http_client: Client) -> Self {
        let (state, _) = watch::channel(AuthState::Initializing);
        Self {
            config: Arc::new(config),
            http_client,
            state: Arc::new(state),
            credentials: FirebaseCredentials::default(),
        }
    }

    /// Token handle for the Firestore backend.
    #[must_use]
    pub fn credentials(&self) -> FirebaseCredentials {
        self.credentials.clone()
    }

    /// Resolve the initial state.
    ///
    /// Nothing is persisted between runs, so an initializing provider
    /// becomes signed out.
    pub fn restore_session(&self) {
        self.state.send_if_modified(|state| {
            if *state == AuthState::Initializing {
                *state = AuthState::SignedOut;
                true
            } else {
                false
            }
        });
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{method}?key={}",
            self.config.identity_url, self.config.api_key
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .http_client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<ErrorEnvelope>(&text).map_or_else(
                |_| SessionError::Backend(format!("{method} returned {status}")),
                |envelope| map_error(&envelope.error.message),
            );
            tracing::debug!(method, %status, %error, "Identity Toolkit request failed");
            return Err(error);
        }

        Ok(response.json().await?)
    }

    fn signed_in(&self, account: &AccountResponse) -> Identity {
        if let Some(token) = &account.id_token {
            self.credentials.replace(Some(token.clone()));
        }
        let identity = account.identity();
        self.state.send_replace(AuthState::SignedIn(identity.clone()));
        identity
    }
}

impl std::fmt::Debug for FirebaseAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuthProvider")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for FirebaseAuthProvider {
    fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        self.credentials.replace(None);
        self.state.send_replace(AuthState::SignedOut);
        tracing::debug!("Firebase session ended");
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account: AccountResponse = self.call("signInWithPassword", &body).await?;
        Ok(self.signed_in(&account))
    }

    async fn register_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let account: AccountResponse = self.call("signUp", &body).await?;
        Ok(self.signed_in(&account))
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity> {
        let token = self
            .credentials
            .id_token()
            .ok_or_else(|| SessionError::Backend("no signed-in user".to_string()))?;

        let body = json!({
            "idToken": token,
            "displayName": display_name,
            "returnSecureToken": true,
        });
        let account: AccountResponse = self.call("update", &body).await?;
        Ok(self.signed_in(&account))
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let body = json!({ "requestType": "PASSWORD_RESET", "email": email });
        let _: Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }
}
