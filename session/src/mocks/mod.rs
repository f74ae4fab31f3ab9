//! Mock provider implementations for testing.
//!
//! Simple in-memory implementations of every provider trait, with call
//! counting and failure injection for the cases tests need to provoke.

pub mod database;
pub mod identity;
pub mod storage;

pub use database::MockDocumentDatabase;
pub use identity::MockIdentityProvider;
pub use storage::MockLocalStorage;
