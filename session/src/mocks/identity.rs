//! Mock identity provider for testing.

use crate::error::{Result, SessionError};
use crate::providers::IdentityProvider;
use crate::state::{AuthState, Identity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    identity: Identity,
}

/// Mock identity provider.
///
/// Tests drive the auth state directly with [`MockIdentityProvider::emit`];
/// the email/password operations work against an in-memory account table.
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    state: Arc<watch::Sender<AuthState>>,
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    sign_out_calls: Arc<AtomicUsize>,
    fail_sign_out: Arc<AtomicBool>,
    password_resets: Arc<Mutex<Vec<String>>>,
    next_id: Arc<AtomicUsize>,
}

impl MockIdentityProvider {
    /// Create a provider in [`AuthState::Initializing`] with no accounts.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::Initializing);
        Self {
            state: Arc::new(state),
            accounts: Arc::new(Mutex::new(HashMap::new())),
            sign_out_calls: Arc::new(AtomicUsize::new(0)),
            fail_sign_out: Arc::new(AtomicBool::new(false)),
            password_resets: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Register an account that `sign_in_with_password` accepts.
    pub fn add_account(&self, email: &str, password: &str, identity: Identity) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity,
                },
            );
    }

    /// Publish an auth state, as the real provider would.
    pub fn emit(&self, state: AuthState) {
        self.state.send_replace(state);
    }

    /// Publish `SignedIn(identity)`.
    pub fn emit_signed_in(&self, identity: Identity) {
        self.emit(AuthState::SignedIn(identity));
    }

    /// Publish `SignedOut`.
    pub fn emit_signed_out(&self) {
        self.emit(AuthState::SignedOut);
    }

    /// Make `sign_out` fail.
    pub fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Number of `sign_out` calls (for testing).
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Emails that were sent a password reset (for testing).
    #[must_use]
    pub fn password_resets(&self) -> Vec<String> {
        self.password_resets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current(&self) -> Option<Identity> {
        match &*self.state.borrow() {
            AuthState::SignedIn(identity) => Some(identity.clone()),
            AuthState::Initializing | AuthState::SignedOut => None,
        }
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("network unreachable".to_string()));
        }
        self.emit_signed_out();
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let account = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
            .ok_or(SessionError::UserNotFound)?;

        if account.password != password {
            return Err(SessionError::InvalidCredentials);
        }

        self.emit_signed_in(account.identity.clone());
        Ok(account.identity)
    }

    async fn register_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        if !email.contains('@') {
            return Err(SessionError::InvalidEmail);
        }
        if password.len() < 6 {
            return Err(SessionError::WeakPassword(
                "Password should be at least 6 characters".to_string(),
            ));
        }

        let identity = {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if accounts.contains_key(email) {
                return Err(SessionError::EmailAlreadyInUse);
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let identity = Identity::new(format!("user-{n}")).with_email(email);
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };

        self.emit_signed_in(identity.clone());
        Ok(identity)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity> {
        let identity = self
            .current()
            .ok_or_else(|| SessionError::Backend("no signed-in user".to_string()))?
            .with_display_name(display_name);

        for account in self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values_mut()
            .filter(|account| account.identity.id == identity.id)
        {
            account.identity = identity.clone();
        }

        self.emit_signed_in(identity.clone());
        Ok(identity)
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        if !self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(email)
        {
            return Err(SessionError::UserNotFound);
        }
        self.password_resets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_checks_password_and_emits() {
        let provider = MockIdentityProvider::new();
        provider.add_account("a@x.com", "secret1", Identity::new("u1"));
        let rx = provider.auth_state();

        let wrong = tokio_test::block_on(provider.sign_in_with_password("a@x.com", "nope"));
        assert_eq!(wrong, Err(SessionError::InvalidCredentials));
        assert_eq!(*rx.borrow(), AuthState::Initializing);

        let identity = tokio_test::block_on(provider.sign_in_with_password("a@x.com", "secret1")).unwrap();
        assert_eq!(*rx.borrow(), AuthState::SignedIn(identity));
    }

    #[test]
    fn register_rejects_duplicates_and_weak_passwords() {
        let provider = MockIdentityProvider::new();
        assert!(matches!(
            tokio_test::block_on(provider.register_with_password("a@x.com", "123")),
            Err(SessionError::WeakPassword(_))
        ));

        tokio_test::block_on(provider.register_with_password("a@x.com", "secret1")).unwrap();
        assert_eq!(
            tokio_test::block_on(provider.register_with_password("a@x.com", "secret1")),
            Err(SessionError::EmailAlreadyInUse)
        );
    }
}
