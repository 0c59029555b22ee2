//! User profile rows.
//!
//! Users are registered with an external identity provider, which issues the
//! `user_id`. This crate only keeps the profile fields next to it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserProfile {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// "First Last", as shown to the identity provider.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Validate required fields.
    ///
    /// # Errors
    /// Returns the list of problems found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.user_id.trim().is_empty() {
            errors.push("userId is required".to_string());
        }
        let email = self.email.trim();
        if email.is_empty() {
            errors.push("email is required".to_string());
        } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.push("email is not a valid address".to_string());
        }
        if self.first_name.trim().is_empty() {
            errors.push("firstName is required".to_string());
        }
        if self.last_name.trim().is_empty() {
            errors.push("lastName is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
