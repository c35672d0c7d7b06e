//! SQLite persistence for documents, chunks and interaction events.
//!
//! Ids are UUID v4 strings and timestamps RFC 3339 strings. Counters are
//! only ever changed with in-place `SET n = n + 1` updates inside a
//! transaction, see [`interactions`].

pub mod interactions;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analyzer::{self, ChunkInteractions, HeatmapEntry};
use crate::chunking::{BoundingBox, SemanticChunk};
use crate::config::DatabaseConfig;
use crate::error::{ChunkheatError, ChunkheatResult};

pub use interactions::{ClickRecord, InteractionEvent};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        file_name TEXT NOT NULL,
        total_clicks INTEGER NOT NULL DEFAULT 0 CHECK (total_clicks >= 0),
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        page_number INTEGER NOT NULL CHECK (page_number >= 1),
        content TEXT NOT NULL,
        summary TEXT,
        is_image INTEGER NOT NULL DEFAULT 0,
        x_min REAL NOT NULL,
        x_max REAL NOT NULL,
        y_min REAL NOT NULL,
        y_max REAL NOT NULL,
        chunk_index INTEGER NOT NULL CHECK (chunk_index >= 0),
        interactions INTEGER NOT NULL DEFAULT 0 CHECK (interactions >= 0),
        UNIQUE (document_id, page_number, chunk_index)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS interaction_events (
        id TEXT PRIMARY KEY,
        chunk_id TEXT NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
        user_id TEXT,
        x_coord REAL,
        y_coord REAL,
        page_number INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_chunk ON interaction_events(chunk_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_page ON interaction_events(page_number)",
];

const CHUNK_COLUMNS: &str = "id, document_id, page_number, content, summary, is_image, \
     x_min, x_max, y_min, y_max, chunk_index, interactions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub file_name: String,
    /// Always the sum of the document's chunk counters
    pub total_clicks: i64,
    pub created_at: DateTime<Utc>,
}

/// A persisted chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub page_number: u32,
    pub content: String,
    /// Filled in later by the image description service; `None` until then
    pub summary: Option<String>,
    pub is_image: bool,
    pub bbox: BoundingBox,
    pub chunk_index: u32,
    pub interactions: i64,
}

/// What the explanation generator is given for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkContext {
    pub chunk_id: Uuid,
    pub page_number: u32,
    pub content: String,
    pub summary: Option<String>,
    pub is_image: bool,
    pub interactions: i64,
}

impl From<Chunk> for ChunkContext {
    fn from(chunk: Chunk) -> Self {
        Self {
            chunk_id: chunk.id,
            page_number: chunk.page_number,
            content: chunk.content,
            summary: chunk.summary,
            is_image: chunk.is_image,
            interactions: chunk.interactions,
        }
    }
}

pub(crate) fn decode_uuid(raw: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn decode_u32(value: i64) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn document_from_row(row: &SqliteRow) -> Result<Document, sqlx::Error> {
    Ok(Document {
        id: decode_uuid(&row.try_get::<String, _>("id")?)?,
        file_name: row.try_get("file_name")?,
        total_clicks: row.try_get("total_clicks")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Result<Chunk, sqlx::Error> {
    Ok(Chunk {
        id: decode_uuid(&row.try_get::<String, _>("id")?)?,
        document_id: decode_uuid(&row.try_get::<String, _>("document_id")?)?,
        page_number: decode_u32(row.try_get("page_number")?)?,
        content: row.try_get("content")?,
        summary: row.try_get("summary")?,
        is_image: row.try_get("is_image")?,
        bbox: BoundingBox::new(
            row.try_get("x_min")?,
            row.try_get("x_max")?,
            row.try_get("y_min")?,
            row.try_get("y_max")?,
        ),
        chunk_index: decode_u32(row.try_get("chunk_index")?)?,
        interactions: row.try_get("interactions")?,
    })
}

pub struct ChunkStore {
    pool: SqlitePool,
}

impl ChunkStore {
    /// Open (creating if needed) the database file and make sure the
    /// schema exists.
    pub async fn open(config: &DatabaseConfig) -> ChunkheatResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| ChunkheatError::database(format!("open {}", config.path.display()), e))?;

        info!("🗄️ Opened chunk store at {}", config.path.display());
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> ChunkheatResult<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| ChunkheatError::database("initialize schema", e))?;
        }
        debug!("Schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Persist a document and all of its chunks in one transaction. Either
    /// every chunk is stored or nothing is.
    pub async fn save_document(
        &self,
        file_name: &str,
        chunks: &[SemanticChunk],
    ) -> ChunkheatResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            total_clicks: 0,
            created_at: Utc::now(),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ChunkheatError::database("begin document save", e))?;

        sqlx::query(
            "INSERT INTO documents (id, file_name, total_clicks, created_at) VALUES (?, ?, 0, ?)",
        )
        .bind(document.id.to_string())
        .bind(&document.file_name)
        .bind(document.created_at.to_rfc3339())
        .execute(&mut *tx)
            .await
            .map_err(|e| ChunkheatError::database("insert document", e))?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, page_number, content, summary, is_image, \
                 x_min, x_max, y_min, y_max, chunk_index, interactions) \
                 VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, 0)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(document.id.to_string())
            .bind(chunk.page_number as i64)
            .bind(&chunk.content)
            .bind(chunk.is_image)
            .bind(chunk.bbox.x_min)
            .bind(chunk.bbox.x_max)
            .bind(chunk.bbox.y_min)
            .bind(chunk.bbox.y_max)
            .bind(chunk.chunk_index as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                ChunkheatError::database(
                    format!("insert chunk {} on page {}", chunk.chunk_index, chunk.page_number),
                    e,
                )
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| ChunkheatError::database("commit document save", e))?;

        info!("💾 Saved document {} ({}) with {} chunks", document.id, file_name, chunks.len());
        Ok(document)
    }

    pub async fn get_document(&self, document_id: Uuid) -> ChunkheatResult<Document> {
        let row = sqlx::query(
            "SELECT id, file_name, total_clicks, created_at FROM documents WHERE id = ?",
        )
        .bind(document_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChunkheatError::database("load document", e))?
        .ok_or_else(|| ChunkheatError::not_found("document", document_id))?;

        document_from_row(&row).map_err(|e| ChunkheatError::database("decode document", e))
    }

    /// Newest first
    pub async fn list_documents(&self) -> ChunkheatResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, file_name, total_clicks, created_at FROM documents \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChunkheatError::database("list documents", e))?;

        rows.iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ChunkheatError::database("decode document", e))
    }

    /// All chunks of a document ordered by page, then chunk index
    pub async fn load_chunks(&self, document_id: Uuid) -> ChunkheatResult<Vec<Chunk>> {
        let sql = format!(
            "SELECT {} FROM chunks WHERE document_id = ? ORDER BY page_number, chunk_index",
            CHUNK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(document_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ChunkheatError::database("load chunks", e))?;

        rows.iter()
            .map(chunk_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ChunkheatError::database("decode chunk", e))
    }

    pub async fn get_chunk(&self, chunk_id: Uuid) -> ChunkheatResult<Chunk> {
        let sql = format!("SELECT {} FROM chunks WHERE id = ?", CHUNK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(chunk_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChunkheatError::database("load chunk", e))?
            .ok_or_else(|| ChunkheatError::not_found("chunk", chunk_id))?;

        chunk_from_row(&row).map_err(|e| ChunkheatError::database("decode chunk", e))
    }

    /// Attach (or replace) the description of a chunk
    pub async fn set_summary(&self, chunk_id: Uuid, summary: &str) -> ChunkheatResult<()> {
        let result = sqlx::query("UPDATE chunks SET summary = ? WHERE id = ?")
            .bind(summary)
            .bind(chunk_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ChunkheatError::database("set summary", e))?;

        if result.rows_affected() == 0 {
            return Err(ChunkheatError::not_found("chunk", chunk_id));
        }
        debug!(%chunk_id, "Summary updated");
        Ok(())
    }

    pub async fn chunk_context(&self, chunk_id: Uuid) -> ChunkheatResult<ChunkContext> {
        self.get_chunk(chunk_id).await.map(ChunkContext::from)
    }

    /// Removes the document together with its chunks and their events
    pub async fn delete_document(&self, document_id: Uuid) -> ChunkheatResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ChunkheatError::database("delete document", e))?;

        if result.rows_affected() == 0 {
            return Err(ChunkheatError::not_found("document", document_id));
        }
        info!("🗑️ Deleted document {}", document_id);
        Ok(())
    }

    pub async fn chunk_interactions(
        &self,
        document_id: Uuid,
    ) -> ChunkheatResult<Vec<ChunkInteractions>> {
        let rows = sqlx::query(
            "SELECT id, page_number, chunk_index, interactions FROM chunks \
             WHERE document_id = ? ORDER BY page_number, chunk_index",
        )
        .bind(document_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChunkheatError::database("load chunk counters", e))?;

        rows.iter()
            .map(|row| {
                Ok(ChunkInteractions {
                    chunk_id: decode_uuid(&row.try_get::<String, _>("id")?)?,
                    page_number: decode_u32(row.try_get("page_number")?)?,
                    chunk_index: decode_u32(row.try_get("chunk_index")?)?,
                    interactions: row.try_get("interactions")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| ChunkheatError::database("decode chunk counters", e))
    }

    /// Heat scores for every chunk of the document, computed from the
    /// counters as they are right now. An unknown document has no chunks
    /// and yields an empty list.
    pub async fn heatmap(
        &self,
        document_id: Uuid,
        hot_zone_threshold: f64,
    ) -> ChunkheatResult<Vec<HeatmapEntry>> {
        let counts = self.chunk_interactions(document_id).await?;
        Ok(analyzer::compute_heatmap(&counts, hot_zone_threshold))
    }

    pub async fn hot_zones(
        &self,
        document_id: Uuid,
        hot_zone_threshold: f64,
    ) -> ChunkheatResult<Vec<HeatmapEntry>> {
        let counts = self.chunk_interactions(document_id).await?;
        Ok(analyzer::hot_zones(&counts, hot_zone_threshold))
    }
}
