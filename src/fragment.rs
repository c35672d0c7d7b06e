//! Positioned fragments produced by the extraction step.
//!
//! Coordinates are top-left anchored layout units; pages are 1-based.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ChunkheatError, ChunkheatResult, IoContext};

/// A run of text with its box on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page: u32,
}

/// An image placement on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFragment {
    /// Identifier from the source document, when the extractor has one
    #[serde(default)]
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fragment {
    Text(TextFragment),
    Image(ImageFragment),
}

impl TextFragment {
    pub fn new(
        text: impl Into<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        page: u32,
    ) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            page,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    fn is_usable(&self) -> bool {
        self.page > 0
            && !self.text.trim().is_empty()
            && [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite())
    }
}

impl ImageFragment {
    pub fn new(name: Option<&str>, x: f64, y: f64, width: f64, height: f64, page: u32) -> Self {
        Self {
            name: name.map(str::to_string),
            x,
            y,
            width,
            height,
            page,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    fn is_usable(&self) -> bool {
        self.page > 0
            && [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

impl Fragment {
    pub fn page(&self) -> u32 {
        match self {
            Fragment::Text(t) => t.page,
            Fragment::Image(i) => i.page,
        }
    }
}

/// All fragments of one page, split by kind
#[derive(Debug, Clone, Default)]
pub struct PageFragments {
    pub page: u32,
    pub text: Vec<TextFragment>,
    pub images: Vec<ImageFragment>,
}

/// Fragment counts after validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FragmentStats {
    pub text_fragments: usize,
    pub image_fragments: usize,
    pub dropped: usize,
}

/// Group fragments by page, dropping the ones the chunker cannot place.
///
/// Malformed fragments are skipped with a warning rather than failing the
/// whole document.
pub fn partition_by_page(fragments: Vec<Fragment>) -> (Vec<PageFragments>, FragmentStats) {
    let mut pages: BTreeMap<u32, PageFragments> = BTreeMap::new();
    let mut stats = FragmentStats::default();

    for fragment in fragments {
        let page = fragment.page();
        match fragment {
            Fragment::Text(t) if t.is_usable() => {
                stats.text_fragments += 1;
                pages.entry(page).or_insert_with(|| empty_page(page)).text.push(t);
            }
            Fragment::Image(i) if i.is_usable() => {
                stats.image_fragments += 1;
                pages.entry(page).or_insert_with(|| empty_page(page)).images.push(i);
            }
            other => {
                stats.dropped += 1;
                debug!("Dropping unusable fragment: {:?}", other);
            }
        }
    }

    if stats.dropped > 0 {
        warn!("⚠️  Dropped {} malformed or empty fragments", stats.dropped);
    }

    (pages.into_values().collect(), stats)
}

fn empty_page(page: u32) -> PageFragments {
    PageFragments {
        page,
        ..PageFragments::default()
    }
}

pub fn parse_fragments(json: &str) -> ChunkheatResult<Vec<Fragment>> {
    serde_json::from_str(json).map_err(|e| ChunkheatError::json("parsing fragments", e))
}

pub fn load_fragments(path: &Path) -> ChunkheatResult<Vec<Fragment>> {
    let content = std::fs::read_to_string(path).with_path(path)?;
    parse_fragments(&content)
}
