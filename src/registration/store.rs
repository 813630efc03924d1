//! Registration persistence
//!
//! Directory layout for the JSON store: `{data_dir}/registration-{id}.json`
//!
//! `JsonDirStore::list_all` skips a record file it cannot read or parse and
//! logs a warning. Listings, and the leaderboard counts built from them, cover
//! readable records only.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registration::error::StoreError;
use crate::registration::registration_info::{Registration, RegistrationInput};

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Stores a new record and returns it with its assigned id.
    async fn create(&self, input: &RegistrationInput) -> Result<Registration, StoreError>;

    async fn list_all(&self) -> Result<Vec<Registration>, StoreError>;
}

fn new_record(input: &RegistrationInput) -> Registration {
    Registration {
        id: Uuid::new_v4().to_string(),
        input: input.clone(),
        registered_at: Utc::now(),
    }
}

/// Keeps registrations in insertion order for the life of the process.
#[derive(Default)]
pub struct InMemoryStore {
    registrations: Mutex<Vec<Registration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn create(&self, input: &RegistrationInput) -> Result<Registration, StoreError> {
        let registration = new_record(input);
        self.registrations
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .push(registration.clone());

        debug!("Stored registration {} in memory", registration.id);
        Ok(registration)
    }

    async fn list_all(&self) -> Result<Vec<Registration>, StoreError> {
        let registrations = self
            .registrations
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(registrations.clone())
    }
}

/// One pretty-printed JSON file per registration.
pub struct JsonDirStore {
    data_dir: PathBuf,
}

impl JsonDirStore {
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;

        info!("JsonDirStore initialized at {}", data_dir.display());
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn is_record(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("registration-") && name.ends_with(".json"))
            .unwrap_or(false)
    }

    async fn read_record(path: &Path) -> Result<Registration, StoreError> {
        let content = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl RegistrationStore for JsonDirStore {
    async fn create(&self, input: &RegistrationInput) -> Result<Registration, StoreError> {
        let registration = new_record(input);
        let json_content = serde_json::to_string_pretty(&registration)?;

        // write then rename so readers never see a partial record
        let path = self.data_dir.join(registration.filename());
        let staging = self.data_dir.join(format!(".{}.tmp", registration.id));
        tokio::fs::write(&staging, json_content.as_bytes()).await?;
        tokio::fs::rename(&staging, &path).await?;

        info!("Stored registration {} at {}", registration.id, path.display());
        Ok(registration)
    }

    async fn list_all(&self) -> Result<Vec<Registration>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        let mut registrations = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !Self::is_record(&path) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(registration) => registrations.push(registration),
                Err(e) => {
                    warn!("Failed to read registration file {}: {}", path.display(), e);
                }
            }
        }

        registrations.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(registrations)
    }
}
