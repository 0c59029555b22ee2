//! Profile service: Validated access to user profile rows.

use std::sync::Arc;

use crate::adapters::StorageError;
use crate::domain::UserProfile;
use crate::ports::ProfileStore;
use crate::SymptraError;

pub struct ProfileService<S>
where
    S: ProfileStore,
{
    store: Arc<S>,
}

impl<S> ProfileService<S>
where
    S: ProfileStore,
    S::Error: Into<StorageError>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create or replace the profile of `profile.user_id`.
    ///
    /// # Errors
    /// `Validation` for missing fields, `Storage` if the write fails.
    pub fn save(&self, profile: &UserProfile) -> Result<(), SymptraError> {
        Self::check(profile)?;
        self.store
            .save_profile(profile)
            .map_err(|e| SymptraError::Storage(e.into()))?;

        tracing::info!("User profile saved");
        Ok(())
    }

    /// Change an existing profile.
    ///
    /// # Errors
    /// `Validation` for missing fields, `Storage(NotFound)` if the user has
    /// no profile yet.
    pub fn update(&self, profile: &UserProfile) -> Result<(), SymptraError> {
        Self::check(profile)?;
        let updated = self
            .store
            .update_profile(profile)
            .map_err(|e| SymptraError::Storage(e.into()))?;

        if !updated {
            return Err(SymptraError::Storage(StorageError::NotFound(
                "user profile".to_string(),
            )));
        }

        tracing::info!("User profile updated");
        Ok(())
    }

    /// # Errors
    /// `Validation` for a blank user id, `Storage` if the read fails.
    pub fn get(&self, user_id: &str) -> Result<Option<UserProfile>, SymptraError> {
        if user_id.trim().is_empty() {
            return Err(SymptraError::Validation("userId is required".to_string()));
        }
        self.store
            .load_profile(user_id)
            .map_err(|e| SymptraError::Storage(e.into()))
    }

    fn check(profile: &UserProfile) -> Result<(), SymptraError> {
        profile
            .validate()
            .map_err(|errors| SymptraError::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;

    fn service() -> ProfileService<SqliteStorage> {
        ProfileService::new(Arc::new(SqliteStorage::in_memory().expect("Should create db")))
    }

    #[test]
    fn test_save_and_get() {
        let svc = service();
        let profile = UserProfile::new("uid-1", "budi@example.com", "Budi", "Santoso");

        svc.save(&profile).expect("Should save");
        assert_eq!(svc.get("uid-1").expect("Should load"), Some(profile));
        assert_eq!(svc.get("uid-2").expect("Should load"), None);
    }

    #[test]
    fn test_update_requires_existing_profile() {
        let svc = service();
        let profile = UserProfile::new("uid-1", "budi@example.com", "Budi", "Santoso");

        let err = svc.update(&profile).expect_err("Should fail");
        assert!(matches!(err, SymptraError::Storage(StorageError::NotFound(_))));

        svc.save(&profile).expect("Should save");
        let renamed = UserProfile::new("uid-1", "budi@example.com", "Budi", "Hartono");
        svc.update(&renamed).expect("Should update");
        assert_eq!(
            svc.get("uid-1").expect("Should load").map(|p| p.last_name),
            Some("Hartono".to_string())
        );
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let svc = service();
        let err = svc
            .save(&UserProfile::new("uid-1", "not-an-email", "", "Santoso"))
            .expect_err("Should fail");

        match err {
            SymptraError::Validation(msg) => {
                assert!(msg.contains("email"));
                assert!(msg.contains("firstName"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(svc.get("uid-1").expect("Should load"), None);
    }
}
