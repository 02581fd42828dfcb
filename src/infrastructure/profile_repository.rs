use crate::domain::models::Profile;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable copy of the locally owned profile, restored on start.
pub trait ProfileRepository: Send + Sync {
    fn load(&self) -> Result<Option<Profile>, InfraError>;
    fn save(&self, profile: &Profile) -> Result<(), InfraError>;
    fn clear(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteProfileRepository {
    db_path: PathBuf,
}

impl SqliteProfileRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl ProfileRepository for SqliteProfileRepository {
    fn load(&self) -> Result<Option<Profile>, InfraError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row("SELECT payload FROM local_profile WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let profile = serde_json::from_str::<Profile>(&payload).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid local_profile.payload: {error}"))
        })?;
        Ok(Some(profile))
    }

    fn save(&self, profile: &Profile) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let payload = serde_json::to_string(profile)?;
        connection.execute(
            "INSERT INTO local_profile (id, payload, updated_at, saved_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at,
               saved_at = excluded.saved_at",
            params![
                payload,
                profile.updated_at.map(|value| value.to_rfc3339()),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM local_profile WHERE id = 1", [])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profile: Mutex<Option<Profile>>,
}

impl ProfileRepository for InMemoryProfileRepository {
    fn load(&self) -> Result<Option<Profile>, InfraError> {
        let profile = self
            .profile
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("profile repository lock poisoned: {error}")))?;
        Ok(profile.clone())
    }

    fn save(&self, profile: &Profile) -> Result<(), InfraError> {
        let mut stored = self
            .profile
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("profile repository lock poisoned: {error}")))?;
        *stored = Some(profile.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        let mut stored = self
            .profile
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("profile repository lock poisoned: {error}")))?;
        *stored = None;
        Ok(())
    }
}
