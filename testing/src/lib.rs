//! # Quill Testing
//!
//! Testing utilities and helpers for Quill reducers and stores.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for single reducer steps
//! - Effect assertions
//! - A fixed clock for deterministic timestamps
//! - Helpers for waiting on state published through a watch channel
//!
//! ## Example
//!
//! ```ignore
//! use quill_testing::helpers::wait_for;
//!
//! #[tokio::test]
//! async fn signs_in() {
//!     let store = session_store();
//!     provider.emit_signed_in(identity);
//!
//!     let state = wait_for(store.subscribe(), |s| s.identity.is_some()).await;
//!     assert_eq!(state.identity.unwrap().id.as_str(), "u1");
//! }
//! ```

use chrono::{DateTime, Utc};
use quill_core::environment::Clock;


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use quill_testing::mocks::FixedClock;
    /// use quill_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::time::Duration;
    use tokio::sync::watch;

    /// Default deadline used by [`wait_for`].
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

    /// Install a `tracing` subscriber that writes to the test harness.
    ///
    /// Honours `RUST_LOG`; safe to call from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }

    /// Wait until the watched value satisfies `predicate`, returning a copy.
    ///
    /// # Panics
    ///
    /// Panics if the predicate does not hold within [`DEFAULT_WAIT`] or the
    /// sender is dropped first.
    #[allow(clippy::panic)] // Test helper
    pub async fn wait_for<T, F>(mut rx: watch::Receiver<T>, mut predicate: F) -> T
    where
        T: Clone,
        F: FnMut(&T) -> bool,
    {
        match tokio::time::timeout(DEFAULT_WAIT, rx.wait_for(|value| predicate(value))).await {
            Ok(Ok(value)) => value.clone(),
            Ok(Err(_)) => panic!("watch sender dropped before the condition held"),
            Err(_) => panic!("condition did not hold within {DEFAULT_WAIT:?}"),
        }
    }
}

pub use mocks::{test_clock, FixedClock};
