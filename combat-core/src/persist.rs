//! Snapshot persistence for encounters and character rosters.
//!
//! Snapshots are wrapped in a versioned JSON envelope and stored one file
//! per campaign and kind:
//!
//! ```text
//! <root>/<campaign>/combat.json
//! <root>/<campaign>/characters.json
//! ```
//!
//! Loaded snapshots are normalized before they are handed back, so a file
//! edited by hand can't break the roster invariants.

use crate::combatant::Combatant;
use crate::tracker::{ensure_unique_ids, EncounterState, TrackerError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Invalid campaign key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] TrackerError),
}

/// Current snapshot format version.
pub const SAVE_VERSION: u32 = 1;

/// A versioned wrapper around any stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSnapshot<T> {
    pub version: u32,
    /// Seconds since the Unix epoch.
    pub saved_at: String,
    pub payload: T,
}

impl<T: Serialize + DeserializeOwned> SavedSnapshot<T> {
    pub fn new(payload: T) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            payload,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an envelope, checking the version before the payload.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        #[derive(Deserialize)]
        struct Header {
            version: u32,
        }

        let header: Header = serde_json::from_str(json)?;
        if header.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: header.version,
            });
        }
        Ok(serde_json::from_str(json)?)
    }
}

/// Which document of a campaign a snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Combat,
    Characters,
}

impl SnapshotKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            SnapshotKind::Combat => "combat.json",
            SnapshotKind::Characters => "characters.json",
        }
    }
}

/// A directory of campaign snapshots.
#[derive(Debug, Clone)]
pub struct CampaignStore {
    root: PathBuf,
}

impl CampaignStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a snapshot lives. Fails for keys that would escape the root.
    pub fn path_for(&self, campaign: &str, kind: SnapshotKind) -> Result<PathBuf, PersistError> {
        validate_key(campaign)?;
        Ok(self.root.join(campaign).join(kind.file_name()))
    }

    pub async fn save_encounter(
        &self,
        campaign: &str,
        state: &EncounterState,
    ) -> Result<PathBuf, PersistError> {
        self.save(campaign, SnapshotKind::Combat, state).await
    }

    /// Load the stored encounter, or `None` if the campaign has none.
    pub async fn load_encounter(&self, campaign: &str) -> Result<Option<EncounterState>, PersistError> {
        let Some(mut state) = self.load::<EncounterState>(campaign, SnapshotKind::Combat).await? else {
            return Ok(None);
        };
        state.normalize()?;
        Ok(Some(state))
    }

    pub async fn save_characters(
        &self,
        campaign: &str,
        characters: &[Combatant],
    ) -> Result<PathBuf, PersistError> {
        self.save(campaign, SnapshotKind::Characters, characters).await
    }

    pub async fn load_characters(&self, campaign: &str) -> Result<Option<Vec<Combatant>>, PersistError> {
        let Some(mut characters) = self.load::<Vec<Combatant>>(campaign, SnapshotKind::Characters).await? else {
            return Ok(None);
        };
        ensure_unique_ids(&characters)?;
        for character in &mut characters {
            character.normalize();
        }
        Ok(Some(characters))
    }

    /// Delete one snapshot. Returns whether a file was removed.
    pub async fn delete(&self, campaign: &str, kind: SnapshotKind) -> Result<bool, PersistError> {
        let path = self.path_for(campaign, kind)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Snapshot deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Campaigns with at least one directory under the root, sorted by name.
    pub async fn list_campaigns(&self) -> Result<Vec<String>, PersistError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut campaigns = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                campaigns.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        campaigns.sort();
        Ok(campaigns)
    }

    async fn save<T: Serialize + ?Sized>(
        &self,
        campaign: &str,
        kind: SnapshotKind,
        payload: &T,
    ) -> Result<PathBuf, PersistError> {
        let path = self.path_for(campaign, kind)?;
        let envelope = SavedSnapshot {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            payload,
        };
        let content = serde_json::to_string_pretty(&envelope)?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&path, content).await?;
        debug!(campaign, file = kind.file_name(), "Snapshot saved");
        Ok(path)
    }

    async fn load<T: Serialize + DeserializeOwned>(
        &self,
        campaign: &str,
        kind: SnapshotKind,
    ) -> Result<Option<T>, PersistError> {
        let path = self.path_for(campaign, kind)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match SavedSnapshot::<T>::from_json(&content) {
            Ok(saved) => Ok(Some(saved.payload)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read snapshot");
                Err(e)
            }
        }
    }
}

fn validate_key(campaign: &str) -> Result<(), PersistError> {
    let invalid = campaign.trim().is_empty()
        || campaign.contains(|c: char| c == '/' || c == '\\')
        || campaign.contains("..")
        || campaign == ".";
    if invalid {
        return Err(PersistError::InvalidKey(campaign.to_string()));
    }
    Ok(())
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}
