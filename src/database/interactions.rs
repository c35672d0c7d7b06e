use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::{decode_timestamp, decode_u32, decode_uuid, ChunkStore};
use crate::analyzer::{self, ClickPoint, DensityCluster};
use crate::config::ClusteringConfig;
use crate::error::{ChunkheatError, ChunkheatResult};

/// One click on a chunk. Only `chunk_id` is required; an event row is
/// written only when `user_id` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub chunk_id: Uuid,
    pub user_id: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Defaults to the chunk's own page
    pub page_number: Option<u32>,
}

impl ClickRecord {
    pub fn new(chunk_id: Uuid) -> Self {
        Self {
            chunk_id,
            user_id: None,
            x: None,
            y: None,
            page_number: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn on_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    fn validate(&self) -> ChunkheatResult<()> {
        let finite = |v: Option<f64>| v.map_or(true, f64::is_finite);
        if !finite(self.x) || !finite(self.y) {
            return Err(ChunkheatError::invalid_input("click coordinates must be finite"));
        }
        if self.page_number == Some(0) {
            return Err(ChunkheatError::invalid_input("page numbers start at 1"));
        }
        Ok(())
    }
}

/// Immutable record of a click made by an identified user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: Uuid,
    pub chunk_id: Uuid,
    pub user_id: Option<String>,
    pub x_coord: Option<f64>,
    pub y_coord: Option<f64>,
    pub page_number: u32,
    pub created_at: DateTime<Utc>,
}

/// Columns returned by the `RETURNING` clause of the chunk increment
fn incremented_chunk(row: &SqliteRow) -> Result<(i64, String, i64), sqlx::Error> {
    Ok((
        row.try_get("interactions")?,
        row.try_get("document_id")?,
        row.try_get("page_number")?,
    ))
}

impl ChunkStore {
    /// Count one click and return the chunk's new total.
    ///
    /// The chunk counter, the document counter and the optional event are
    /// written in a single transaction with in-place increments, so
    /// concurrent clicks on the same chunk never lose an update. An unknown
    /// chunk fails with `NotFound` and changes nothing.
    pub async fn record_interaction(&self, click: ClickRecord) -> ChunkheatResult<i64> {
        click.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ChunkheatError::database("begin interaction", e))?;

        let row = sqlx::query(
            "UPDATE chunks SET interactions = interactions + 1 WHERE id = ? \
             RETURNING interactions, document_id, page_number",
        )
        .bind(click.chunk_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ChunkheatError::database("increment chunk interactions", e))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| ChunkheatError::database("roll back interaction", e))?;
            return Err(ChunkheatError::not_found("chunk", click.chunk_id));
        };

        let (interactions, document_id, chunk_page) = incremented_chunk(&row)
            .map_err(|e| ChunkheatError::database("decode incremented chunk", e))?;

        sqlx::query("UPDATE documents SET total_clicks = total_clicks + 1 WHERE id = ?")
            .bind(&document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ChunkheatError::database("increment document clicks", e))?;

        if let Some(user_id) = &click.user_id {
            let page_number = click.page_number.map(i64::from).unwrap_or(chunk_page);
            sqlx::query(
                "INSERT INTO interaction_events \
                 (id, chunk_id, user_id, x_coord, y_coord, page_number, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(click.chunk_id.to_string())
            .bind(user_id)
            .bind(click.x)
            .bind(click.y)
            .bind(page_number)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| ChunkheatError::database("insert interaction event", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| ChunkheatError::database("commit interaction", e))?;

        debug!(chunk_id = %click.chunk_id, interactions, "Interaction recorded");
        Ok(interactions)
    }

    /// Events for one chunk in the order they were recorded
    pub async fn list_events(&self, chunk_id: Uuid) -> ChunkheatResult<Vec<InteractionEvent>> {
        let rows = sqlx::query(
            "SELECT id, chunk_id, user_id, x_coord, y_coord, page_number, created_at \
             FROM interaction_events WHERE chunk_id = ? ORDER BY rowid",
        )
        .bind(chunk_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChunkheatError::database("load interaction events", e))?;

        rows.iter()
            .map(|row| {
                Ok(InteractionEvent {
                    id: decode_uuid(&row.try_get::<String, _>("id")?)?,
                    chunk_id: decode_uuid(&row.try_get::<String, _>("chunk_id")?)?,
                    user_id: row.try_get("user_id")?,
                    x_coord: row.try_get("x_coord")?,
                    y_coord: row.try_get("y_coord")?,
                    page_number: decode_u32(row.try_get("page_number")?)?,
                    created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| ChunkheatError::database("decode interaction event", e))
    }

    /// Raw click coordinates recorded on one page of a document, oldest
    /// first. Events without coordinates are skipped.
    pub async fn page_click_points(
        &self,
        document_id: Uuid,
        page_number: u32,
    ) -> ChunkheatResult<Vec<ClickPoint>> {
        let rows = sqlx::query(
            "SELECT e.x_coord, e.y_coord FROM interaction_events e \
             JOIN chunks c ON c.id = e.chunk_id \
             WHERE c.document_id = ? AND e.page_number = ? \
               AND e.x_coord IS NOT NULL AND e.y_coord IS NOT NULL \
             ORDER BY e.rowid",
        )
        .bind(document_id.to_string())
        .bind(i64::from(page_number))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChunkheatError::database("load click points", e))?;

        rows.iter()
            .map(|row| Ok(ClickPoint::new(row.try_get("x_coord")?, row.try_get("y_coord")?)))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| ChunkheatError::database("decode click point", e))
    }

    pub async fn page_clusters(
        &self,
        document_id: Uuid,
        page_number: u32,
        config: &ClusteringConfig,
    ) -> ChunkheatResult<Vec<DensityCluster>> {
        let points = self.page_click_points(document_id, page_number).await?;
        let clusters = analyzer::cluster_points(&points, config);
        debug!(
            %document_id,
            page_number,
            points = points.len(),
            clusters = clusters.len(),
            "Clustered clicks"
        );
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{sample_chunks, test_store};

    #[tokio::test]
    async fn test_record_increments_both_counters() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();
        let chunk = store.load_chunks(document.id).await.unwrap().remove(0);

        assert_eq!(store.record_interaction(ClickRecord::new(chunk.id)).await.unwrap(), 1);
        assert_eq!(store.record_interaction(ClickRecord::new(chunk.id)).await.unwrap(), 2);

        assert_eq!(store.get_chunk(chunk.id).await.unwrap().interactions, 2);
        assert_eq!(store.get_document(document.id).await.unwrap().total_clicks, 2);
        // no user, no event
        assert!(store.list_events(chunk.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_written_only_with_user() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();
        let chunk = store.load_chunks(document.id).await.unwrap().remove(2);

        store
            .record_interaction(ClickRecord::new(chunk.id).with_user("student-1").at(80.0, 75.5))
            .await
            .unwrap();
        store.record_interaction(ClickRecord::new(chunk.id).at(1.0, 1.0)).await.unwrap();

        let events = store.list_events(chunk.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id.as_deref(), Some("student-1"));
        assert_eq!(events[0].x_coord, Some(80.0));
        assert_eq!(events[0].y_coord, Some(75.5));
        // page defaults to the chunk's page
        assert_eq!(events[0].page_number, 2);
    }

    #[tokio::test]
    async fn test_unknown_chunk_changes_nothing() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();

        let err = store
            .record_interaction(ClickRecord::new(Uuid::new_v4()).with_user("student-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChunkheatError::NotFound { .. }));
        assert_eq!(store.get_document(document.id).await.unwrap().total_clicks, 0);
        assert!(store.load_chunks(document.id).await.unwrap().iter().all(|c| c.interactions == 0));
    }

    #[tokio::test]
    async fn test_invalid_click_rejected_before_write() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();
        let chunk = store.load_chunks(document.id).await.unwrap().remove(0);

        let err = store
            .record_interaction(ClickRecord::new(chunk.id).at(f64::NAN, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ChunkheatError::InvalidInput { .. }));
        assert_eq!(store.get_chunk(chunk.id).await.unwrap().interactions, 0);
    }

    #[tokio::test]
    async fn test_click_points_and_clusters_per_page() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();
        let chunks = store.load_chunks(document.id).await.unwrap();

        for (x, y) in [(10.0, 10.0), (15.0, 12.0), (100.0, 100.0)] {
            store
                .record_interaction(ClickRecord::new(chunks[0].id).with_user("u").at(x, y))
                .await
                .unwrap();
        }
        // page 2 and coordinate-less clicks stay out of page 1's points
        store
            .record_interaction(ClickRecord::new(chunks[2].id).with_user("u").at(10.0, 10.0))
            .await
            .unwrap();
        store
            .record_interaction(ClickRecord::new(chunks[1].id).with_user("u"))
            .await
            .unwrap();

        let points = store.page_click_points(document.id, 1).await.unwrap();
        assert_eq!(
            points,
            vec![
                ClickPoint::new(10.0, 10.0),
                ClickPoint::new(15.0, 12.0),
                ClickPoint::new(100.0, 100.0)
            ]
        );

        let clusters = store
            .page_clusters(document.id, 1, &ClusteringConfig::default())
            .await
            .unwrap();
        let mut counts: Vec<usize> = clusters.iter().map(|c| c.count).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_events() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();
        let chunk = store.load_chunks(document.id).await.unwrap().remove(0);
        store
            .record_interaction(ClickRecord::new(chunk.id).with_user("u").at(5.0, 5.0))
            .await
            .unwrap();

        store.delete_document(document.id).await.unwrap();

        assert!(store.load_chunks(document.id).await.unwrap().is_empty());
        assert!(store.list_events(chunk.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_event_insert_rolls_back_counters() {
        let (_dir, store) = test_store().await;
        let document = store.save_document("biology.pdf", &sample_chunks()).await.unwrap();
        let chunk = store.load_chunks(document.id).await.unwrap().remove(0);

        sqlx::query(
            "CREATE TRIGGER reject_events BEFORE INSERT ON interaction_events \
             BEGIN SELECT RAISE(ABORT, 'events rejected'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store
            .record_interaction(ClickRecord::new(chunk.id).with_user("student-1").at(1.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ChunkheatError::Database { .. }));

        assert_eq!(store.get_chunk(chunk.id).await.unwrap().interactions, 0);
        assert_eq!(store.get_document(document.id).await.unwrap().total_clicks, 0);
        assert!(store.list_events(chunk.id).await.unwrap().is_empty());

        // anonymous clicks skip the event table and still count
        assert_eq!(store.record_interaction(ClickRecord::new(chunk.id)).await.unwrap(), 1);
        assert_eq!(store.get_document(document.id).await.unwrap().total_clicks, 1);
    }
}
