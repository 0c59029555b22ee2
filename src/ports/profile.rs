//! Profile port: Trait for user profile rows.

use crate::domain::UserProfile;

/// Trait for user profile storage.
pub trait ProfileStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a profile, replacing any existing row for the same user.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn save_profile(&self, profile: &UserProfile) -> Result<(), Self::Error>;

    /// Overwrite the fields of an existing profile.
    ///
    /// # Returns
    /// `false` if no row exists for `profile.user_id`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn update_profile(&self, profile: &UserProfile) -> Result<bool, Self::Error>;

    /// Load a profile.
    ///
    /// # Returns
    /// `None` if the user has no profile row.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Self::Error>;
}
