//! Result sink
//!
//! Persists what the classifier found, keyed by message ID, together with
//! the current inbox identity and the one message the user dismissed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use verifyme_core::VerificationArtifact;
use verifyme_mail::Identity;

/// Errors from the result store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// An artifact found in a specific message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundVerification {
    #[serde(flatten)]
    pub artifact: VerificationArtifact,
    /// Message ID
    pub id: String,
    /// Message subject
    pub subject: String,
    /// When it was found
    pub time: DateTime<Utc>,
}

impl FoundVerification {
    pub fn new(artifact: VerificationArtifact, id: &str, subject: &str) -> Self {
        Self {
            artifact,
            id: id.to_string(),
            subject: subject.to_string(),
            time: Utc::now(),
        }
    }

    pub fn notification_title(&self) -> &'static str {
        "Verification Found!"
    }

    pub fn notification_message(&self) -> String {
        match &self.artifact {
            VerificationArtifact::Otp { value } => format!("Your code is {}", value),
            VerificationArtifact::Link { .. } => "Open the link to complete verification.".to_string(),
        }
    }
}

/// Where found artifacts go
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist a found artifact
    async fn record(&self, found: &FoundVerification) -> Result<(), StoreError>;

    /// The message the user dismissed, if any
    async fn dismissed_id(&self) -> Result<Option<String>, StoreError>;
}

/// Everything kept between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub last_found: Option<FoundVerification>,
    #[serde(default)]
    pub ignored_id: Option<String>,
}

/// JSON file backed state
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state; a missing file is an empty state
    pub async fn load(&self) -> Result<StoredState, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the state file (write to a sibling, then rename)
    pub async fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    /// Load, modify and save under the store lock
    pub async fn update<F>(&self, f: F) -> Result<StoredState, StoreError>
    where
        F: FnOnce(&mut StoredState),
    {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        f(&mut state);
        self.save(&state).await?;
        Ok(state)
    }

    /// Switch to a new inbox; results from the old one are dropped
    pub async fn set_identity(&self, identity: Identity) -> Result<(), StoreError> {
        self.update(|state| {
            state.identity = Some(identity);
            state.last_found = None;
        })
        .await?;
        Ok(())
    }

    /// Ignore the message behind the last result and clear it
    pub async fn dismiss(&self) -> Result<Option<String>, StoreError> {
        let state = self
            .update(|state| {
                if let Some(found) = state.last_found.take() {
                    state.ignored_id = Some(found.id);
                }
            })
            .await?;
        Ok(state.ignored_id)
    }

    /// Forget the dismissed message
    pub async fn reset_session(&self) -> Result<(), StoreError> {
        self.update(|state| state.ignored_id = None).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultSink for StateStore {
    async fn record(&self, found: &FoundVerification) -> Result<(), StoreError> {
        let found = found.clone();
        self.update(|state| state.last_found = Some(found)).await?;
        Ok(())
    }

    async fn dismissed_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.load().await?.ignored_id)
    }
}

/// In-memory sink, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<FoundVerification>>,
    dismissed: Mutex<Option<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dismissed(id: &str) -> Self {
        let sink = Self::default();
        *sink.dismissed.lock() = Some(id.to_string());
        sink
    }

    /// Everything recorded so far, oldest first
    pub fn records(&self) -> Vec<FoundVerification> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn record(&self, found: &FoundVerification) -> Result<(), StoreError> {
        self.records.lock().push(found.clone());
        Ok(())
    }

    async fn dismissed_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.dismissed.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: "acc-1".to_string(),
            address: "k3x9q2m1zp@mail.example".to_string(),
            password: "p4ss".to_string(),
            token: "tok".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_found_wire_shape() {
        let found = FoundVerification::new(VerificationArtifact::otp("482913"), "m1", "Your code");
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["type"], "OTP");
        assert_eq!(json["value"], "482913");
        assert_eq!(json["id"], "m1");

        let back: FoundVerification = serde_json::from_value(json).unwrap();
        assert_eq!(back, found);
    }

    #[test]
    fn test_notification_message() {
        let otp = FoundVerification::new(VerificationArtifact::otp("4821"), "m1", "");
        assert_eq!(otp.notification_message(), "Your code is 4821");

        let link = FoundVerification::new(VerificationArtifact::link("https://ex.com/verify"), "m2", "");
        assert!(!link.notification_message().contains("https://"));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().await.unwrap(), StoredState::default());
        assert_eq!(store.dismissed_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_dismiss_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let found = FoundVerification::new(VerificationArtifact::otp("482913"), "m1", "Code");
        store.record(&found).await.unwrap();
        assert_eq!(store.load().await.unwrap().last_found, Some(found));

        assert_eq!(store.dismiss().await.unwrap(), Some("m1".to_string()));
        let state = store.load().await.unwrap();
        assert_eq!(state.last_found, None);
        assert_eq!(store.dismissed_id().await.unwrap(), Some("m1".to_string()));

        store.reset_session().await.unwrap();
        assert_eq!(store.dismissed_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_new_identity_clears_last_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let found = FoundVerification::new(VerificationArtifact::otp("482913"), "m1", "Code");
        store.record(&found).await.unwrap();

        let identity = identity();
        store.set_identity(identity.clone()).await.unwrap();

        let state = store.load().await.unwrap();
        assert_eq!(state.identity, Some(identity));
        assert_eq!(state.last_found, None);
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = StateStore::new(&path);
        assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::with_dismissed("m0");
        assert_eq!(sink.dismissed_id().await.unwrap(), Some("m0".to_string()));

        let found = FoundVerification::new(VerificationArtifact::link("https://ex.com/verify"), "m1", "");
        sink.record(&found).await.unwrap();
        assert_eq!(sink.records(), vec![found]);
    }
}
