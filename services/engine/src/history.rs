//! Bet history storage
//!
//! The lifecycle simulator writes a pending record per bet at submission and
//! patches it exactly once with the terminal outcome. The store assigns ids
//! and creation timestamps; a patch against a terminal record is ignored.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::errors::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Pending,
    Won,
    Lost,
}

impl HistoryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, HistoryStatus::Won | HistoryStatus::Lost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub platform: String,
    pub account_id: String,
    pub account_name: String,
    pub match_label: String,
    pub league: String,
    pub market: String,
    pub odds: String,
    pub amount: f64,
    pub status: HistoryStatus,
    pub payout: Option<f64>,
    pub error: Option<String>,
    pub error_artifact: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
}

/// Fields supplied by the submitting flow; the store assigns the id, the
/// creation timestamp and the initial `pending` status.
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub platform: String,
    pub account_id: String,
    pub account_name: String,
    pub match_label: String,
    pub league: String,
    pub market: String,
    pub odds: String,
    pub amount: f64,
}

/// Partial update merged into an existing record; `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct HistoryPatch {
    pub status: Option<HistoryStatus>,
    pub payout: Option<f64>,
    pub error: Option<String>,
    pub error_artifact: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a new pending record and return its assigned id.
    async fn add_record(&self, new: NewHistoryRecord) -> Result<Uuid>;

    /// Merge `patch` into the record with `id` and re-persist.
    async fn update_record(&self, id: Uuid, patch: HistoryPatch) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HistoryRecord>>;

    /// Most recent records first.
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>>;
}

fn build_record(new: NewHistoryRecord) -> HistoryRecord {
    HistoryRecord {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        platform: new.platform,
        account_id: new.account_id,
        account_name: new.account_name,
        match_label: new.match_label,
        league: new.league,
        market: new.market,
        odds: new.odds,
        amount: new.amount,
        status: HistoryStatus::Pending,
        payout: None,
        error: None,
        error_artifact: None,
        completed_at: None,
        elapsed_ms: None,
    }
}

/// Returns false when the record is already terminal and must not change.
fn apply_patch(record: &mut HistoryRecord, patch: HistoryPatch) -> bool {
    if record.status.is_terminal() {
        return false;
    }
    if let Some(status) = patch.status {
        record.status = status;
    }
    if patch.payout.is_some() {
        record.payout = patch.payout;
    }
    if patch.error.is_some() {
        record.error = patch.error;
    }
    if patch.error_artifact.is_some() {
        record.error_artifact = patch.error_artifact;
    }
    if patch.completed_at.is_some() {
        record.completed_at = patch.completed_at;
    }
    if patch.elapsed_ms.is_some() {
        record.elapsed_ms = patch.elapsed_ms;
    }
    true
}

/// Volatile store used by tests and as the working set of the file store.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn dump(&self) -> Vec<HistoryRecord> {
        self.records.read().await.clone()
    }

    async fn load(&self, records: Vec<HistoryRecord>) {
        *self.records.write().await = records;
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn add_record(&self, new: NewHistoryRecord) -> Result<Uuid> {
        let record = build_record(new);
        let id = record.id;
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn update_record(&self, id: Uuid, patch: HistoryPatch) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(EngineError::RecordNotFound(id))?;
        if !apply_patch(record, patch) {
            tracing::warn!(record_id = %id, "Ignoring update to terminal history record");
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HistoryRecord>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

/// File-backed store: the demo's stand-in for the dashboard's local
/// key-value storage. The whole log is rewritten on each mutation; the
/// on-disk format is private to this store.
pub struct JsonFileHistoryStore {
    path: PathBuf,
    inner: InMemoryHistoryStore,
}

impl JsonFileHistoryStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = InMemoryHistoryStore::new();

        if tokio::fs::try_exists(&path).await? {
            let raw = tokio::fs::read_to_string(&path).await?;
            if !raw.trim().is_empty() {
                let records: Vec<HistoryRecord> = serde_json::from_str(&raw)?;
                tracing::debug!(
                    path = %path.display(),
                    record_count = records.len(),
                    "Loaded bet history"
                );
                inner.load(records).await;
            }
        }

        Ok(Self { path, inner })
    }

    async fn persist(&self) -> Result<()> {
        let records = self.inner.dump().await;
        let raw = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn add_record(&self, new: NewHistoryRecord) -> Result<Uuid> {
        let id = self.inner.add_record(new).await?;
        self.persist().await?;
        Ok(id)
    }

    async fn update_record(&self, id: Uuid, patch: HistoryPatch) -> Result<()> {
        self.inner.update_record(id, patch).await?;
        self.persist().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HistoryRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.inner.recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> NewHistoryRecord {
        NewHistoryRecord {
            platform: "betkings".to_string(),
            account_id: "bk-001".to_string(),
            account_name: "Marcus R.".to_string(),
            match_label: "Riverton FC vs Harbor City".to_string(),
            league: "Premier League".to_string(),
            market: "Moneyline".to_string(),
            odds: "+150".to_string(),
            amount: 100.0,
        }
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_pending_status() {
        let store = InMemoryHistoryStore::new();
        let id = store.add_record(sample_record()).await.unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.status, HistoryStatus::Pending);
        assert_eq!(record.amount, 100.0);
        assert!(record.payout.is_none());
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_update_merges_partial_fields() {
        let store = InMemoryHistoryStore::new();
        let id = store.add_record(sample_record()).await.unwrap();

        store
            .update_record(
                id,
                HistoryPatch {
                    status: Some(HistoryStatus::Won),
                    payout: Some(250.0),
                    completed_at: Some(Utc::now()),
                    elapsed_ms: Some(2_450),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.status, HistoryStatus::Won);
        assert_eq!(record.payout, Some(250.0));
        assert_eq!(record.elapsed_ms, Some(2_450));
        // Untouched fields survive the merge
        assert_eq!(record.odds, "+150");
    }

    #[tokio::test]
    async fn test_terminal_record_refuses_further_updates() {
        let store = InMemoryHistoryStore::new();
        let id = store.add_record(sample_record()).await.unwrap();

        store
            .update_record(
                id,
                HistoryPatch {
                    status: Some(HistoryStatus::Lost),
                    error: Some("Connection timeout".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        store
            .update_record(
                id,
                HistoryPatch {
                    status: Some(HistoryStatus::Won),
                    payout: Some(999.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.status, HistoryStatus::Lost);
        assert!(record.payout.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_record_errors() {
        let store = InMemoryHistoryStore::new();
        let result = store
            .update_record(Uuid::new_v4(), HistoryPatch::default())
            .await;
        assert!(matches!(result, Err(EngineError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let store = InMemoryHistoryStore::new();
        let first = store.add_record(sample_record()).await.unwrap();
        let second = store.add_record(sample_record()).await.unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[1].id, first);

        let limited = store.recent(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, second);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let path = std::env::temp_dir().join(format!("wagerdeck-test-{}.json", Uuid::new_v4()));

        let id = {
            let store = JsonFileHistoryStore::open(&path).await.unwrap();
            let id = store.add_record(sample_record()).await.unwrap();
            store
                .update_record(
                    id,
                    HistoryPatch {
                        status: Some(HistoryStatus::Won),
                        payout: Some(250.0),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            id
        };

        // A fresh handle reads back what the first one wrote
        let reopened = JsonFileHistoryStore::open(&path).await.unwrap();
        let record = reopened.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.status, HistoryStatus::Won);
        assert_eq!(record.payout, Some(250.0));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
