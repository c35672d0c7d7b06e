use tracing::debug;

use crate::config::ChunkingConfig;
use crate::log_chunk_created;

use super::boundaries::{BoundaryCheck, SENTENCE_TERMINATED};
use super::lines::Line;
use super::{BoundingBox, SemanticChunk};

/// Chunk being accumulated line by line
struct OpenChunk {
    text: String,
    bbox: BoundingBox,
    fragment_count: usize,
}

impl OpenChunk {
    fn new() -> Self {
        Self {
            text: String::new(),
            bbox: BoundingBox::empty(),
            fragment_count: 0,
        }
    }

    fn push_line(&mut self, line: &Line, line_text: &str) {
        if !line_text.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(line_text);
        }
        self.bbox.extend(&line.bbox());
        self.fragment_count += line.fragments.len();
    }

    /// Emit the open chunk (if it has any text) and start over
    fn flush_into(&mut self, chunks: &mut Vec<SemanticChunk>, page_number: u32) {
        let content = std::mem::take(&mut self.text);
        if !content.trim().is_empty() {
            debug!(page = page_number, fragments = self.fragment_count, "Emitting text chunk");
            chunks.push(SemanticChunk {
                content,
                page_number,
                bbox: self.bbox,
                chunk_index: chunks.len() as u32,
                is_image: false,
            });
        }
        *self = Self::new();
    }
}

/// Merge a page's lines into text chunks.
///
/// Chunks close before a line that opens a list item, starts a new
/// sentence, sits below a paragraph gap, or would push the chunk over the
/// length cap. Anything still over the cap afterwards is split by sentence.
pub fn build_semantic_chunks(
    lines: &[Line],
    page_number: u32,
    config: &ChunkingConfig,
) -> Vec<SemanticChunk> {
    let mut chunks = Vec::new();
    let mut open = OpenChunk::new();
    let mut previous: Option<&Line> = None;

    for line in lines {
        let line_text = line.text();
        let combined = if open.text.is_empty() {
            line_text.clone()
        } else {
            format!("{} {}", open.text, line_text)
        };

        let check = BoundaryCheck {
            open_text: &open.text,
            line_text: &line_text,
            combined_text: &combined,
            previous_line: previous,
            line,
            max_chars: config.max_chunk_chars,
            paragraph_gap_factor: config.paragraph_gap_factor,
        };
        if let Some(boundary) = check.boundary() {
            debug!(?boundary, page = page_number, "Closing chunk");
            open.flush_into(&mut chunks, page_number);
        }

        open.push_line(line, &line_text);
        previous = Some(line);
    }
    open.flush_into(&mut chunks, page_number);

    let mut chunks = split_oversized(chunks, config.max_chunk_chars, config.sub_chunk_target_chars);
    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.chunk_index = index as u32;
        log_chunk_created!(page_number, chunk.chunk_index, chunk.char_count(), false);
    }
    chunks
}

/// Break chunks longer than `max_chars` into sentence groups of roughly
/// `target_chars`.
///
/// Pieces keep the parent's horizontal extent; their vertical extent is the
/// parent's span interpolated by character offset. Indices are left for the
/// caller to reassign.
pub fn split_oversized(
    chunks: Vec<SemanticChunk>,
    max_chars: usize,
    target_chars: usize,
) -> Vec<SemanticChunk> {
    let mut out = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if chunk.char_count() <= max_chars {
            out.push(chunk);
            continue;
        }

        let pieces = pack_sentences(&split_sentences(&chunk.content), max_chars, target_chars);
        debug!(
            page = chunk.page_number,
            chars = chunk.char_count(),
            pieces = pieces.len(),
            "Splitting oversized chunk"
        );

        // Pieces are rejoined with single spaces when measuring offsets
        let total: usize = pieces.iter().map(|p| p.chars().count()).sum::<usize>()
            + pieces.len().saturating_sub(1);
        let span = chunk.bbox.height();
        let mut offset = 0usize;

        for piece in pieces {
            let len = piece.chars().count();
            let start = offset as f64 / total as f64;
            let end = (offset + len) as f64 / total as f64;
            offset += len + 1;

            out.push(SemanticChunk {
                content: piece,
                page_number: chunk.page_number,
                bbox: BoundingBox::new(
                    chunk.bbox.x_min,
                    chunk.bbox.x_max,
                    chunk.bbox.y_min + span * start,
                    chunk.bbox.y_min + span * end,
                ),
                chunk_index: chunk.chunk_index,
                is_image: false,
            });
        }
    }

    out
}

/// Split on whitespace following terminal punctuation
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for token in text.split_whitespace() {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(token);
        if SENTENCE_TERMINATED.is_match(token) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Greedily group sentences into pieces of at least `target` characters,
/// never letting a piece exceed `max`
fn pack_sentences(sentences: &[String], max: usize, target: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for sentence in sentences {
        let len = sentence.chars().count();

        if len > max {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            pieces.extend(wrap_words(sentence, target.min(max), max));
            continue;
        }

        if !buf.is_empty() && buf.chars().count() + 1 + len > max {
            pieces.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(sentence);

        if buf.chars().count() >= target {
            pieces.push(std::mem::take(&mut buf));
        }
    }
    if !buf.is_empty() {
        pieces.push(buf);
    }
    pieces
}

/// Word-wrap a run with no usable sentence break. Words longer than `max`
/// are cut by character.
fn wrap_words(text: &str, width: usize, max: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut buf = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max {
            if !buf.is_empty() {
                lines.push(std::mem::take(&mut buf));
            }
            let chars: Vec<char> = word.chars().collect();
            lines.extend(chars.chunks(max).map(|c| c.iter().collect::<String>()));
            continue;
        }

        if !buf.is_empty() && buf.chars().count() + 1 + word_len > width {
            lines.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(word);
    }
    if !buf.is_empty() {
        lines.push(buf);
    }
    lines
}
