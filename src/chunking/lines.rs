use std::cmp::Ordering;

use crate::fragment::TextFragment;

use super::BoundingBox;

/// Fragments sharing a baseline band, ordered left to right
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub fragments: Vec<TextFragment>,
}

impl Line {
    pub fn text(&self) -> String {
        join_text(&self.fragments)
    }

    pub fn top(&self) -> f64 {
        self.fragments.iter().map(|f| f.y).fold(f64::INFINITY, f64::min)
    }

    pub fn bottom(&self) -> f64 {
        self.fragments.iter().map(|f| f.bottom()).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Tallest fragment on the line
    pub fn height(&self) -> f64 {
        self.fragments.iter().map(|f| f.height).fold(0.0, f64::max)
    }

    pub fn bbox(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for f in &self.fragments {
            bbox.extend(&BoundingBox::from_rect(f.x, f.y, f.width, f.height));
        }
        bbox
    }
}

/// Space-joined, trimmed text of a run of fragments
pub fn join_text(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn reading_cmp(a: &TextFragment, b: &TextFragment) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Group a page's fragments into lines.
///
/// Fragments are visited top to bottom; one starts a new line when its `y`
/// is more than `tolerance` away from the `y` of the fragment that opened
/// the current line.
pub fn group_into_lines(mut fragments: Vec<TextFragment>, tolerance: f64) -> Vec<Line> {
    fragments.sort_by(reading_cmp);

    let mut lines = Vec::new();
    let mut current: Vec<TextFragment> = Vec::new();
    let mut reference_y = 0.0;

    for fragment in fragments {
        if current.is_empty() {
            reference_y = fragment.y;
            current.push(fragment);
        } else if (fragment.y - reference_y).abs() > tolerance {
            lines.push(std::mem::take(&mut current));
            reference_y = fragment.y;
            current.push(fragment);
        } else {
            current.push(fragment);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
        .into_iter()
        .map(|mut fragments| {
            fragments.sort_by(|a, b| a.x.total_cmp(&b.x));
            Line { fragments }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f64, y: f64) -> TextFragment {
        TextFragment::new(text, x, y, 20.0, 10.0, 1)
    }

    #[test]
    fn test_empty_page_has_no_lines() {
        assert!(group_into_lines(Vec::new(), 5.0).is_empty());
    }

    #[test]
    fn test_groups_within_tolerance_and_orders_by_x() {
        let fragments = vec![
            frag("world", 60.0, 101.0),
            frag("next", 10.0, 130.0),
            frag("Hello", 10.0, 100.0),
            frag("again", 110.0, 104.5),
        ];

        let lines = group_into_lines(fragments, 5.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello world again");
        assert_eq!(lines[1].text(), "next");
    }

    #[test]
    fn test_reference_is_line_opener_not_last_fragment() {
        // 100 -> 104 -> 108: the third is 8 away from the opener, so it
        // starts a new line even though it is close to its neighbour
        let fragments = vec![frag("a", 0.0, 100.0), frag("b", 30.0, 104.0), frag("c", 60.0, 108.0)];
        let lines = group_into_lines(fragments, 5.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "a b");
        assert_eq!(lines[1].text(), "c");
    }

    #[test]
    fn test_line_geometry() {
        let lines = group_into_lines(vec![frag("a", 5.0, 100.0), frag("b", 40.0, 102.0)], 5.0);
        let line = &lines[0];
        assert_eq!(line.top(), 100.0);
        assert_eq!(line.bottom(), 112.0);
        assert_eq!(line.height(), 10.0);
        assert_eq!(line.bbox(), BoundingBox::new(5.0, 60.0, 100.0, 112.0));
    }
}
