//! Session environment.
//!
//! Dependencies injected into the session reducer. Local storage is not
//! part of it: persistence runs as a state observer, outside the reducer.

use crate::config::SessionConfig;
use crate::providers::{DocumentDatabase, IdentityProvider};

/// Session environment.
///
/// # Type Parameters
///
/// - `I`: Identity provider
/// - `D`: Document database
#[derive(Clone)]
pub struct SessionEnvironment<I, D>
where
    I: IdentityProvider + Clone,
    D: DocumentDatabase + Clone,
{
    /// Identity provider (sign-out requests).
    pub identity: I,

    /// Document database (profile reads).
    pub database: D,

    /// Collection names and storage key.
    pub config: SessionConfig,
}

impl<I, D> SessionEnvironment<I, D>
where
    I: IdentityProvider + Clone,
    D: DocumentDatabase + Clone,
{
    /// Environment with the default [`SessionConfig`].
    #[must_use]
    pub fn new(identity: I, database: D) -> Self {
        Self {
            identity,
            database,
            config: SessionConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }
}
