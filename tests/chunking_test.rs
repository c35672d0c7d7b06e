use chunkheat::chunking::{
    build_semantic_chunks, chunk_document, group_into_lines, merge_in_reading_order,
};
use chunkheat::config::ChunkingConfig;
use chunkheat::fragment::{Fragment, ImageFragment, TextFragment};

fn text_line(text: &str, y: f64) -> TextFragment {
    TextFragment::new(text, 72.0, y, 6.0 * text.len() as f64, 10.0, 1)
}

#[test]
fn test_short_unbroken_lines_form_one_chunk() {
    let fragments = vec![
        text_line("the mitochondria is the powerhouse", 100.0),
        text_line("of the cell and it converts", 112.0),
        text_line("nutrients into usable energy", 124.0),
    ];
    let lines = group_into_lines(fragments.clone(), 5.0);
    assert_eq!(lines.len(), 3);

    let chunks = build_semantic_chunks(&lines, 1, &ChunkingConfig::default());
    assert_eq!(chunks.len(), 1);
    assert_eq!(
        chunks[0].content,
        "the mitochondria is the powerhouse of the cell and it converts \
         nutrients into usable energy"
    );
    for fragment in &fragments {
        assert!(chunks[0].bbox.contains(fragment.x, fragment.y));
        assert!(chunks[0].bbox.contains(fragment.right(), fragment.bottom()));
    }
}

#[test]
fn test_long_run_without_breaks_is_forced_apart() {
    let fragments: Vec<TextFragment> = (0..10)
        .map(|i| text_line("alpha beta gamma delta epsilon zeta eta", 100.0 + 12.0 * i as f64))
        .collect();
    let lines = group_into_lines(fragments, 5.0);

    let chunks = build_semantic_chunks(&lines, 1, &ChunkingConfig::default());
    assert!(chunks.len() >= 2);
    assert!(chunks.iter().all(|c| c.char_count() <= 200));
    assert_eq!(
        chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
        (0..chunks.len() as u32).collect::<Vec<_>>()
    );
}

#[test]
fn test_single_overlong_line_is_split_below_cap() {
    let long = "lorem ipsum dolor sit amet ".repeat(20);
    let lines = group_into_lines(vec![text_line(long.trim(), 100.0)], 5.0);

    let chunks = build_semantic_chunks(&lines, 1, &ChunkingConfig::default());
    assert!(chunks.len() >= 2);
    assert!(chunks.iter().all(|c| c.char_count() <= 200));
}

#[test]
fn test_merging_merged_output_keeps_indices() {
    let mut fragments = Vec::new();
    for page in 1..=3u32 {
        for i in 0..6 {
            let text = if i % 2 == 0 { "Cells divide." } else { "Membranes protect them." };
            fragments.push(Fragment::Text(TextFragment::new(
                text,
                72.0 + 10.0 * (i % 3) as f64,
                100.0 + 40.0 * i as f64,
                150.0,
                10.0,
                page,
            )));
        }
        fragments.push(Fragment::Image(ImageFragment::new(None, 300.0, 150.0, 120.0, 90.0, page)));
    }

    let result = chunk_document(fragments, &ChunkingConfig::default());
    assert_eq!(result.pages_processed, 3);

    for page in 1..=3u32 {
        let merged: Vec<_> = result
            .chunks
            .iter()
            .filter(|c| c.page_number == page)
            .cloned()
            .collect();
        assert!(merged.iter().any(|c| c.is_image));

        let again = merge_in_reading_order(merged.clone(), Vec::new());
        assert_eq!(again, merged);
        assert_eq!(
            merged.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            (0..merged.len() as u32).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_malformed_pages_yield_no_chunks() {
    let fragments = vec![
        Fragment::Text(TextFragment::new("   ", 10.0, 10.0, 5.0, 5.0, 1)),
        Fragment::Text(TextFragment::new("floating", f64::NAN, 10.0, 5.0, 5.0, 1)),
        Fragment::Image(ImageFragment::new(Some("Im0"), 10.0, 10.0, 0.0, 40.0, 1)),
        Fragment::Text(TextFragment::new("no page", 10.0, 10.0, 5.0, 5.0, 0)),
    ];

    let result = chunk_document(fragments, &ChunkingConfig::default());
    assert!(result.chunks.is_empty());
    assert_eq!(result.dropped_fragments, 4);
}
