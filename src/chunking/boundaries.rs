//! Rules deciding where one text chunk ends and the next begins.
//!
//! Each rule is evaluated before a line is appended to the open chunk. Any
//! single rule firing closes the open chunk.

use lazy_static::lazy_static;
use regex::Regex;

use super::lines::Line;

lazy_static! {
    /// Bullets, dashes, `1.` / `12)` numbering and `a.` / `b)` lettering
    static ref LIST_ITEM: Regex =
        Regex::new(r"^\s*(?:[•◦▪‣●○■\-–—\*]\s|\d{1,3}[.)]\s|[A-Za-z][.)]\s)").unwrap();

    /// Terminal punctuation, optionally followed by closing quotes/brackets
    pub(crate) static ref SENTENCE_TERMINATED: Regex = Regex::new(r#"[.!?]["'”’)\]]*$"#).unwrap();
}

/// Which rule closed a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    ListItem,
    SentenceEnd,
    ParagraphGap,
    LengthCap,
}

/// The line opens a bullet or numbered list item
pub fn starts_list_item(line_text: &str) -> bool {
    LIST_ITEM.is_match(line_text)
}

/// Appending `line_text` to `open_text` would join a finished sentence to
/// one starting with a capital letter
pub fn crosses_sentence_boundary(open_text: &str, line_text: &str) -> bool {
    let open = open_text.trim_end();
    if open.is_empty() || !SENTENCE_TERMINATED.is_match(open) {
        return false;
    }
    line_text
        .trim_start()
        .chars()
        .next()
        .map(char::is_uppercase)
        .unwrap_or(false)
}

/// The gap above `line` is more than `factor` times the height of `previous`
pub fn is_paragraph_break(previous: &Line, line: &Line, factor: f64) -> bool {
    let gap = line.top() - previous.bottom();
    gap > previous.height() * factor
}

/// The combined text would be longer than `max_chars` characters
pub fn exceeds_length_cap(combined_text: &str, max_chars: usize) -> bool {
    combined_text.chars().count() > max_chars
}

/// Inputs for deciding whether to close the open chunk before a line
pub struct BoundaryCheck<'a> {
    pub open_text: &'a str,
    pub line_text: &'a str,
    pub combined_text: &'a str,
    pub previous_line: Option<&'a Line>,
    pub line: &'a Line,
    pub max_chars: usize,
    pub paragraph_gap_factor: f64,
}

impl BoundaryCheck<'_> {
    /// First rule that fires, if the open chunk has content
    pub fn boundary(&self) -> Option<Boundary> {
        if self.open_text.trim().is_empty() {
            return None;
        }
        if starts_list_item(self.line_text) {
            return Some(Boundary::ListItem);
        }
        if crosses_sentence_boundary(self.open_text, self.line_text) {
            return Some(Boundary::SentenceEnd);
        }
        if let Some(previous) = self.previous_line {
            if is_paragraph_break(previous, self.line, self.paragraph_gap_factor) {
                return Some(Boundary::ParagraphGap);
            }
        }
        if exceeds_length_cap(self.combined_text, self.max_chars) {
            return Some(Boundary::LengthCap);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::TextFragment;

    fn line_at(y: f64, height: f64) -> Line {
        Line {
            fragments: vec![TextFragment::new("x", 0.0, y, 10.0, height, 1)],
        }
    }

    #[test]
    fn test_list_items() {
        for text in [
            "• first",
            "- dash",
            "* star",
            "1. one",
            "12) twelve",
            "a) alpha",
            "B. beta",
            "  – en dash",
        ] {
            assert!(starts_list_item(text), "{}", text);
        }
        for text in [
            "Plain text",
            "-dash without space",
            "1.5 is a number",
            "e.g. example",
            "Mr. Smith",
        ] {
            assert!(!starts_list_item(text), "{}", text);
        }
    }

    #[test]
    fn test_sentence_boundary() {
        assert!(crosses_sentence_boundary("It ended.", "Then more"));
        assert!(crosses_sentence_boundary("Really?", "Yes"));
        assert!(crosses_sentence_boundary("He said \"stop.\"", "Nobody did"));
        assert!(!crosses_sentence_boundary("It ended.", "then lowercase"));
        assert!(!crosses_sentence_boundary("No terminator", "Capital"));
        assert!(!crosses_sentence_boundary("", "Capital"));
    }

    #[test]
    fn test_paragraph_gap_uses_previous_line_height() {
        let previous = line_at(100.0, 10.0); // bottom at 110
        assert!(!is_paragraph_break(&previous, &line_at(130.0, 30.0), 2.0)); // gap 20
        assert!(is_paragraph_break(&previous, &line_at(130.5, 5.0), 2.0)); // gap 20.5
    }

    #[test]
    fn test_length_cap_counts_chars() {
        assert!(!exceeds_length_cap(&"a".repeat(200), 200));
        assert!(exceeds_length_cap(&"a".repeat(201), 200));
        // Multi-byte characters count once
        assert!(!exceeds_length_cap(&"é".repeat(200), 200));
    }

    #[test]
    fn test_empty_open_chunk_never_closes() {
        let line = line_at(100.0, 10.0);
        let check = BoundaryCheck {
            open_text: "",
            line_text: "• bullet",
            combined_text: "• bullet",
            previous_line: None,
            line: &line,
            max_chars: 200,
            paragraph_gap_factor: 2.0,
        };
        assert_eq!(check.boundary(), None);
    }
}
