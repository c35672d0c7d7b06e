//! Read-only analytics over recorded interactions

pub mod clusters;
pub mod heatmap;

pub use clusters::{cluster_points, ClickPoint, DensityCluster, RgbColor};
pub use heatmap::{compute_heatmap, hot_zones, ChunkInteractions, HeatmapEntry};
