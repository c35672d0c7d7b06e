//! Turns positioned PDF fragments into clickable chunks, records reader
//! clicks on them, and derives heatmaps and click-density clusters.

pub mod analyzer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod fragment;
pub mod logging;

pub use analyzer::{ClickPoint, DensityCluster, HeatmapEntry};
pub use chunking::{chunk_document, ChunkingResult, SemanticChunk};
pub use config::ChunkheatConfig;
pub use database::{Chunk, ChunkContext, ChunkStore, ClickRecord, Document};
pub use error::{ChunkheatError, ChunkheatResult};
