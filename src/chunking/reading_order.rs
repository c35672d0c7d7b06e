use super::SemanticChunk;

/// Interleave one page's text and image chunks top to bottom, then left to
/// right, and renumber them from 0.
///
/// The sort is stable, so re-running the merge on its own output keeps
/// every index where it is.
pub fn merge_in_reading_order(
    text: Vec<SemanticChunk>,
    images: Vec<SemanticChunk>,
) -> Vec<SemanticChunk> {
    let mut chunks = text;
    chunks.extend(images);

    chunks.sort_by(|a, b| {
        a.page_number
            .cmp(&b.page_number)
            .then(a.bbox.y_min.total_cmp(&b.bbox.y_min))
            .then(a.bbox.x_min.total_cmp(&b.bbox.x_min))
    });

    reindex(&mut chunks);
    chunks
}

/// Assign sequential `chunk_index` values per page in list order
pub fn reindex(chunks: &mut [SemanticChunk]) {
    let mut current_page = None;
    let mut next = 0u32;
    for chunk in chunks.iter_mut() {
        if current_page != Some(chunk.page_number) {
            current_page = Some(chunk.page_number);
            next = 0;
        }
        chunk.chunk_index = next;
        next += 1;
    }
}
