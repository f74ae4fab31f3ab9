//! Local key-value storage trait.

use crate::error::Result;

/// Synchronous string key-value storage that survives restarts.
///
/// Calls happen inside a reducer step, so implementations must not block
/// for long.
pub trait LocalStorage: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backing medium cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if the backing medium cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backing medium cannot be written.
    fn remove_item(&self, key: &str) -> Result<()>;
}
