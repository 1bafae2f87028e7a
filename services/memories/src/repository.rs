use crate::backend::{error_message, BackendClient};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Single-object representation; makes the insert answer with the row itself
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Stored memory row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMemory {
    /// Server-generated identifier (uuid or identity column)
    #[serde(with = "id_serde")]
    pub id: String,
    /// Title as stored
    pub title: String,
    /// Free text description
    #[serde(default)]
    pub description: Option<String>,
    /// Public address of the uploaded photo
    #[serde(default)]
    pub image_url: Option<String>,
    /// When the row was created, the listing sort key
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new memory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMemoryRow {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Identifier helper: the backend may send the id as a string or a number
mod id_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => id,
            RawId::Number(id) => id.to_string(),
        })
    }
}

/// Persistence for memory rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert a row and return it as the server stored it.
    async fn create_memory_row(&self, row: NewMemoryRow) -> Result<StoredMemory>;

    /// Every stored memory, newest first.
    async fn fetch_memories(&self) -> Result<Vec<StoredMemory>>;
}

/// Metadata repository backed by the hosted database's REST interface
pub struct MemoryRepository {
    backend: Arc<BackendClient>,
    table: String,
}

impl MemoryRepository {
    /// Create a new repository for the configured table
    pub fn new(backend: Arc<BackendClient>, config: &DatabaseConfig) -> Self {
        info!(table = %config.table, "Memory repository initialized");

        Self {
            backend,
            table: config.table.clone(),
        }
    }

    fn table_url(&self) -> String {
        self.backend.endpoint(&format!("rest/v1/{}", self.table))
    }
}

#[async_trait]
impl MemoryStore for MemoryRepository {
    #[instrument(skip(self, row), fields(table = %self.table))]
    async fn create_memory_row(&self, row: NewMemoryRow) -> Result<StoredMemory> {
        let response = self
            .backend
            .http()
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&row)
            .timeout(self.backend.timeout())
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Persistence(error_message(response).await));
        }

        let created: StoredMemory = response
            .json()
            .await
            .map_err(|e| Error::Persistence(format!("invalid insert response: {e}")))?;

        debug!(
            memory_id = %created.id,
            image_url = ?created.image_url,
            "Memory row created"
        );

        Ok(created)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn fetch_memories(&self) -> Result<Vec<StoredMemory>> {
        let response = self
            .backend
            .http()
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .timeout(self.backend.timeout())
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(error_message(response).await));
        }

        let mut memories: Vec<StoredMemory> = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("invalid listing response: {e}")))?;

        // Newest first is part of the listing contract, not just a server hint
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(count = memories.len(), "Fetched memories");

        Ok(memories)
    }
}
