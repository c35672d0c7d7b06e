use tracing::debug;

use crate::fragment::ImageFragment;
use crate::log_chunk_created;

use super::{BoundingBox, SemanticChunk};

/// Identifying label stored as an image chunk's content until a description
/// is attached
pub fn image_label(image: &ImageFragment, ordinal: usize) -> String {
    let name = image
        .name
        .clone()
        .unwrap_or_else(|| format!("Image{}", ordinal));
    format!(
        "[Image: {} at position ({}, {}) with dimensions {}x{}]",
        name, image.x as i64, image.y as i64, image.width as i64, image.height as i64
    )
}

/// The same picture placed twice lands with (almost) the same center
fn is_duplicate(kept: &ImageFragment, image: &ImageFragment, tolerance: f64) -> bool {
    let (kx, ky) = kept.center();
    let (ix, iy) = image.center();
    (kx - ix).abs() < tolerance && (ky - iy).abs() < tolerance
}

/// One chunk per distinct image on the page.
///
/// Indices start at `first_index` so they never collide with the page's
/// text chunks before the reading-order merge.
pub fn build_image_chunks(
    images: &[ImageFragment],
    page_number: u32,
    first_index: u32,
    dedup_tolerance: f64,
) -> Vec<SemanticChunk> {
    let mut sorted: Vec<&ImageFragment> = images.iter().collect();
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut kept: Vec<&ImageFragment> = Vec::new();
    for image in sorted {
        if kept.iter().any(|k| is_duplicate(k, image, dedup_tolerance)) {
            debug!(page = page_number, name = ?image.name, "Skipping duplicate image");
            continue;
        }
        kept.push(image);
    }

    kept.into_iter()
        .enumerate()
        .map(|(ordinal, image)| {
            let chunk = SemanticChunk {
                content: image_label(image, ordinal),
                page_number,
                bbox: BoundingBox::from_rect(image.x, image.y, image.width, image.height),
                chunk_index: first_index + ordinal as u32,
                is_image: true,
            };
            log_chunk_created!(page_number, chunk.chunk_index, 0usize, true);
            chunk
        })
        .collect()
}
