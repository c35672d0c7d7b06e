//! Turns positioned fragments into clickable chunks.
//!
//! Per page: fragments are grouped into lines, lines are merged into
//! semantic text chunks, images become their own chunks, and the two are
//! interleaved in reading order. Pages are independent and chunked in
//! parallel; the final list is ordered by `(page_number, chunk_index)`.

pub mod boundaries;
pub mod images;
pub mod lines;
pub mod reading_order;
pub mod semantic;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ChunkingConfig;
use crate::fragment::{partition_by_page, Fragment, FragmentStats, PageFragments};
use crate::logging::PerformanceTimer;

pub use images::build_image_chunks;
pub use lines::{group_into_lines, Line};
pub use reading_order::merge_in_reading_order;
pub use semantic::{build_semantic_chunks, split_oversized};

/// Axis-aligned box in page layout units (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, x + width, y, y + height)
    }

    /// The empty box: extending it by any box yields that box
    pub fn empty() -> Self {
        Self::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY)
    }

    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max || self.y_min > self.y_max
    }

    pub fn extend(&mut self, other: &BoundingBox) {
        self.x_min = self.x_min.min(other.x_min);
        self.x_max = self.x_max.max(other.x_max);
        self.y_min = self.y_min.min(other.y_min);
        self.y_max = self.y_max.max(other.y_max);
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// A chunk ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticChunk {
    pub content: String,
    pub page_number: u32,
    pub bbox: BoundingBox,
    pub chunk_index: u32,
    pub is_image: bool,
}

impl SemanticChunk {
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkingResult {
    pub pages_processed: usize,
    pub text_fragments: usize,
    pub image_fragments: usize,
    pub dropped_fragments: usize,
    pub chunks: Vec<SemanticChunk>,
}

impl ChunkingResult {
    pub fn chunks_created(&self) -> usize {
        self.chunks.len()
    }
}

/// Chunk one page: text lines, images, then reading-order merge
pub fn chunk_page(page: &PageFragments, config: &ChunkingConfig) -> Vec<SemanticChunk> {
    let lines = group_into_lines(page.text.clone(), config.line_tolerance);
    let text_chunks = build_semantic_chunks(&lines, page.page, config);
    let image_chunks = build_image_chunks(
        &page.images,
        page.page,
        text_chunks.len() as u32,
        config.image_dedup_tolerance,
    );
    merge_in_reading_order(text_chunks, image_chunks)
}

/// Chunk a whole document.
///
/// Empty input yields an empty result, never an error.
pub fn chunk_document(fragments: Vec<Fragment>, config: &ChunkingConfig) -> ChunkingResult {
    let timer = PerformanceTimer::start("chunking document");
    let (pages, stats): (Vec<PageFragments>, FragmentStats) = partition_by_page(fragments);

    let mut per_page: Vec<(u32, Vec<SemanticChunk>)> = pages
        .par_iter()
        .map(|page| (page.page, chunk_page(page, config)))
        .collect();
    timer.checkpoint("pages chunked");

    // Global order is (page_number, chunk_index); each page is already indexed
    per_page.sort_by_key(|(page, _)| *page);
    let chunks: Vec<SemanticChunk> = per_page.into_iter().flat_map(|(_, c)| c).collect();

    info!(
        "🧩 Chunked {} pages into {} chunks ({} text / {} image fragments)",
        pages.len(),
        chunks.len(),
        stats.text_fragments,
        stats.image_fragments
    );

    ChunkingResult {
        pages_processed: pages.len(),
        text_fragments: stats.text_fragments,
        image_fragments: stats.image_fragments,
        dropped_fragments: stats.dropped,
        chunks,
    }
}
