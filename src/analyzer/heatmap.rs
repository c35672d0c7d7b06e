use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored counter for one chunk, as read from the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInteractions {
    pub chunk_id: Uuid,
    pub page_number: u32,
    pub chunk_index: u32,
    pub interactions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapEntry {
    pub chunk_id: Uuid,
    pub page_number: u32,
    pub chunk_index: u32,
    pub interactions: i64,
    /// `interactions / max_interactions`, in `[0, 1]`
    pub heat_score: f64,
    pub is_hot_zone: bool,
}

/// Normalise every chunk's count against the busiest chunk.
///
/// The divisor is never below 1, so a document with no clicks scores all
/// zeros and has no hot zones. Entries come back ordered by page, then
/// chunk index.
pub fn compute_heatmap(counts: &[ChunkInteractions], hot_zone_threshold: f64) -> Vec<HeatmapEntry> {
    let max_interactions = counts
        .iter()
        .map(|c| c.interactions)
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let mut entries: Vec<HeatmapEntry> = counts
        .iter()
        .map(|c| {
            let interactions = c.interactions.max(0);
            let heat_score = interactions as f64 / max_interactions;
            HeatmapEntry {
                chunk_id: c.chunk_id,
                page_number: c.page_number,
                chunk_index: c.chunk_index,
                interactions,
                heat_score,
                is_hot_zone: heat_score >= hot_zone_threshold,
            }
        })
        .collect();

    entries.sort_by_key(|e| (e.page_number, e.chunk_index));
    entries
}

/// Only the entries at or above `hot_zone_threshold`
pub fn hot_zones(counts: &[ChunkInteractions], hot_zone_threshold: f64) -> Vec<HeatmapEntry> {
    compute_heatmap(counts, hot_zone_threshold)
        .into_iter()
        .filter(|e| e.is_hot_zone)
        .collect()
}
