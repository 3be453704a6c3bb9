//! Page text model
//!
//! Positioned text items and horizontal rules of one page, plus filtered
//! views over them (crop to a rectangle, exclude a rectangle) and grouping
//! of items into text lines.
//!
//! All coordinates are in PDF points with the origin at the top-left corner
//! of the page (y grows downwards), the convention the calendar template
//! constants are measured in.

use std::fmt;
use std::str::FromStr;

use crate::ExtractError;

/// Axis-aligned rectangle `(x0, top, x1, bottom)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    /// True when the two rectangles share a region of positive area
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.top < other.bottom && other.top < self.bottom
    }

    /// Overlapping region, or a zero-height box at the top of `self` when
    /// the rectangles are disjoint
    pub fn intersection(&self, other: &BBox) -> BBox {
        let x0 = self.x0.max(other.x0);
        let top = self.top.max(other.top);
        let x1 = self.x1.min(other.x1).max(x0);
        let bottom = self.bottom.min(other.bottom).max(top);
        BBox::new(x0, top, x1, bottom)
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.x0.min(other.x0),
            self.top.min(other.top),
            self.x1.max(other.x1),
            self.bottom.max(other.bottom),
        )
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} {:.2} {:.2} {:.2}",
            self.x0, self.top, self.x1, self.bottom
        )
    }
}

impl FromStr for BBox {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ExtractError::InvalidInput(format!("bad bbox '{}': {}", s, e)))?;

        match parts.as_slice() {
            [x0, top, x1, bottom] => Ok(BBox::new(*x0, *top, *x1, *bottom)),
            _ => Err(ExtractError::InvalidInput(format!(
                "bad bbox '{}': expected 4 numbers",
                s
            ))),
        }
    }
}

/// A text item with position information
#[derive(Debug, Clone)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// Left edge
    pub x: f32,
    /// Top edge
    pub top: f32,
    /// Width of text
    pub width: f32,
    /// Height (approximated from font size)
    pub height: f32,
    /// Rendered font size
    pub font_size: f32,
}

impl TextItem {
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x, self.top, self.x + self.width, self.top + self.height)
    }
}

/// A horizontal ruling segment (table row border)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub x0: f32,
    pub x1: f32,
    pub y: f32,
}

/// Everything the pipeline needs to know about one page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page index (0-based)
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub items: Vec<TextItem>,
    pub rules: Vec<Rule>,
}

impl PageContent {
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            items: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// 1-based page number as printed in the document
    pub fn number(&self) -> u32 {
        self.index as u32 + 1
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }

    /// Unfiltered view of the whole page
    pub fn view(&self) -> PageView<'_> {
        PageView {
            page: self,
            clip: self.bbox(),
            exclusions: Vec::new(),
        }
    }
}

/// One line of text on a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageLine {
    /// Page index (0-based)
    pub page: usize,
    pub bbox: BBox,
    pub text: String,
}

/// A spatially filtered view of a page.
///
/// Items belong to the view when their centre lies inside the clip
/// rectangle and they overlap none of the excluded rectangles.
#[derive(Debug, Clone)]
pub struct PageView<'a> {
    page: &'a PageContent,
    clip: BBox,
    exclusions: Vec<BBox>,
}

impl<'a> PageView<'a> {
    pub fn page(&self) -> &'a PageContent {
        self.page
    }

    /// The clip rectangle of this view
    pub fn bbox(&self) -> BBox {
        self.clip
    }

    pub fn height(&self) -> f32 {
        self.clip.height()
    }

    /// Restrict the view to `bbox` (intersected with the current clip)
    pub fn crop(mut self, bbox: BBox) -> Self {
        self.clip = self.clip.intersection(&bbox);
        self
    }

    /// Drop everything overlapping `bbox`
    pub fn outside_bbox(mut self, bbox: BBox) -> Self {
        self.exclusions.push(bbox);
        self
    }

    fn is_excluded(&self, bbox: &BBox) -> bool {
        self.exclusions.iter().any(|ex| ex.intersects(bbox))
    }

    pub fn items(&self) -> impl Iterator<Item = &'a TextItem> + '_ {
        self.page.items.iter().filter(move |item| {
            let bbox = item.bbox();
            let (cx, cy) = bbox.center();
            self.clip.contains_point(cx, cy) && !self.is_excluded(&bbox)
        })
    }

    /// Horizontal rules inside the clip, clipped horizontally
    pub fn rules(&self) -> Vec<Rule> {
        self.page
            .rules
            .iter()
            .filter(|rule| rule.y >= self.clip.top && rule.y <= self.clip.bottom)
            .filter(|rule| rule.x0 < self.clip.x1 && rule.x1 > self.clip.x0)
            .filter(|rule| {
                !self
                    .exclusions
                    .iter()
                    .any(|ex| rule.y > ex.top && rule.y < ex.bottom && rule.x0 >= ex.x0 && rule.x1 <= ex.x1)
            })
            .map(|rule| Rule {
                x0: rule.x0.max(self.clip.x0),
                x1: rule.x1.min(self.clip.x1),
                y: rule.y,
            })
            .collect()
    }

    /// Text lines of the view, sorted top to bottom
    pub fn text_lines(&self, y_tolerance: f32) -> Vec<PageLine> {
        let items: Vec<&TextItem> = self.items().collect();
        group_into_lines(items, y_tolerance)
            .into_iter()
            .filter_map(|line| {
                let bbox = line
                    .iter()
                    .map(|item| item.bbox())
                    .reduce(|a, b| a.union(&b))?;
                Some(PageLine {
                    page: self.page.index,
                    bbox,
                    text: join_line_text(&line),
                })
            })
            .collect()
    }
}

/// Group items into lines.
///
/// Items are ordered top to bottom; an item joins the current line when its
/// top is within `y_tolerance` of the line's first item. Items within a
/// line are sorted left to right.
pub fn group_into_lines(mut items: Vec<&TextItem>, y_tolerance: f32) -> Vec<Vec<&TextItem>> {
    items.sort_by(|a, b| {
        a.top
            .partial_cmp(&b.top)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<Vec<&TextItem>> = Vec::new();
    for item in items {
        match lines.last_mut() {
            Some(line) if (line[0].top - item.top).abs() < y_tolerance => line.push(item),
            _ => lines.push(vec![item]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    lines
}

/// Join the items of one line with single spaces
pub fn join_line_text(items: &[&TextItem]) -> String {
    items
        .iter()
        .map(|i| i.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(text: &str, x: f32, top: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            top,
            width: text.chars().count() as f32 * 4.0,
            height: 8.0,
            font_size: 8.0,
        }
    }

    fn make_page() -> PageContent {
        let mut page = PageContent::new(0, 842.0, 595.0);
        page.items = vec![
            make_item("World", 160.0, 101.0),
            make_item("Hello", 100.0, 100.0),
            make_item("Next line", 100.0, 120.0),
            make_item("12", 420.0, 560.0),
        ];
        page
    }

    #[test]
    fn test_text_lines_sorted_and_merged() {
        let page = make_page();
        let lines = page.view().text_lines(3.0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "Hello World");
        assert_eq!(lines[1].text, "Next line");
        assert_eq!(lines[0].page, 0);
    }

    #[test]
    fn test_outside_bbox_drops_overlapping_items() {
        let page = make_page();
        let footer = BBox::new(385.0, 555.0, 460.0, 570.0);
        let lines = page.view().outside_bbox(footer).text_lines(3.0);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.text != "12"));
    }

    #[test]
    fn test_crop_keeps_items_by_centre() {
        let page = make_page();
        let view = page.view().crop(BBox::new(0.0, 110.0, page.width, page.height));
        let texts: Vec<_> = view.items().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Next line", "12"]);
        assert!((view.height() - 485.0).abs() < 0.01);
    }

    #[test]
    fn test_disjoint_crop_has_zero_height() {
        let page = make_page();
        let view = page
            .view()
            .crop(BBox::new(0.0, 300.0, page.width, page.height))
            .crop(BBox::new(0.0, 0.0, page.width, 100.0));
        assert_eq!(view.height(), 0.0);
        assert_eq!(view.items().count(), 0);
    }

    #[test]
    fn test_bbox_parse_and_display() {
        let bbox: BBox = "(51.02, 231.52, 212.44, 243.52)".parse().unwrap();
        assert_eq!(bbox, BBox::new(51.02, 231.52, 212.44, 243.52));
        assert_eq!(bbox.to_string(), "51.02 231.52 212.44 243.52");
        assert!("1 2 3".parse::<BBox>().is_err());
    }
}
