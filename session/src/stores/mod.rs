//! Production implementations of the provider traits.
//!
//! - **`FirebaseAuthProvider`** (Identity Toolkit REST) - email/password identity
//! - **`FirestoreDatabase`** (Firestore REST v1) - documents, queries, transforms
//! - **`FileStorage`** - one JSON file per key under a directory
//! - **`MemoryStorage`** - process-local storage for embedding and demos

pub mod file_storage;
pub mod firebase_auth;
pub mod firestore;
pub mod memory;

// Re-exports
pub use file_storage::FileStorage;
pub use firebase_auth::{FirebaseAuthProvider, FirebaseCredentials};
pub use firestore::FirestoreDatabase;
pub use memory::MemoryStorage;
