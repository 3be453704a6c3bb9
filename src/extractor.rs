//! Text extraction from PDF using lopdf
//!
//! This module turns every page of a document into a [`PageContent`]:
//! positioned text items plus the horizontal rules drawn by table grids.
//! PDF coordinates (origin bottom-left) are flipped to the top-left origin
//! used by the rest of the crate.

use crate::page::{PageContent, Rule, TextItem};
use crate::tounicode::{font_cmap, ToUnicodeCMap};
use crate::ExtractError;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::path::Path;

/// Average glyph advance as a fraction of the font size
const GLYPH_WIDTH_RATIO: f32 = 0.5;
/// Ascent above the baseline as a fraction of the font size
const ASCENT_RATIO: f32 = 0.8;
/// TJ adjustments below this (in thousandths of an em) read as word gaps
const TJ_SPACE_THRESHOLD: f32 = -250.0;

/// Extract all pages of a PDF file
pub fn extract_pages<P: AsRef<Path>>(path: P) -> Result<Vec<PageContent>, ExtractError> {
    let doc = Document::load(path)?;
    extract_pages_from_doc(&doc)
}

/// Extract all pages from a PDF memory buffer
pub fn extract_pages_mem(buffer: &[u8]) -> Result<Vec<PageContent>, ExtractError> {
    let doc = Document::load_mem(buffer)?;
    extract_pages_from_doc(&doc)
}

fn extract_pages_from_doc(doc: &Document) -> Result<Vec<PageContent>, ExtractError> {
    let pages = doc.get_pages();
    let mut out = Vec::with_capacity(pages.len());

    for (index, (&page_num, &page_id)) in pages.iter().enumerate() {
        let page = extract_page(doc, page_id, index)?;
        log::debug!(
            "page {}: {} text items, {} rules",
            page_num,
            page.items.len(),
            page.rules.len()
        );
        out.push(page);
    }

    log::info!("extracted text from {} pages", out.len());
    Ok(out)
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn transform_point(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// MediaBox of a page, following the Parent chain for inherited values
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Ok(Object::Array(values)) = dict.get(b"MediaBox") {
            let nums: Vec<f32> = values.iter().filter_map(get_number).collect();
            if nums.len() == 4 {
                return [nums[0], nums[1], nums[2], nums[3]];
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    // A4 landscape, the calendar's page format
    [0.0, 0.0, 842.0, 595.0]
}

/// Per-font decoding state
struct FontDecoder {
    cmap: Option<ToUnicodeCMap>,
}

impl FontDecoder {
    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(cmap) = &self.cmap {
            return cmap.decode(bytes);
        }

        // Fallback: try UTF-16BE then Latin-1
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return String::from_utf16_lossy(&utf16);
        }

        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Text and path state while walking one content stream
struct PageState {
    page_height: f32,
    origin: (f32, f32),
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: Vec<u8>,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
    current_point: (f32, f32),
    pending: Vec<Rule>,
    items: Vec<TextItem>,
    rules: Vec<Rule>,
}

impl PageState {
    fn new(media: [f32; 4]) -> Self {
        Self {
            page_height: media[3] - media[1],
            origin: (media[0], media[1]),
            ctm: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            ctm_stack: Vec::new(),
            font: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            line_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            in_text_block: false,
            current_point: (0.0, 0.0),
            pending: Vec::new(),
            items: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading > 0.0 {
            self.leading
        } else {
            self.font_size * 1.2 // Approximate line height
        };
        self.line_matrix[5] -= leading;
        self.text_matrix = self.line_matrix;
    }

    /// Record a shown string and advance the text matrix past it
    fn show_text(&mut self, text: String) {
        let advance = text.chars().count() as f32 * self.font_size * GLYPH_WIDTH_RATIO;

        if !text.trim().is_empty() {
            let combined = multiply_matrices(&self.text_matrix, &self.ctm);
            let scale_x = (combined[0].powi(2) + combined[1].powi(2)).sqrt();
            let scale_y = (combined[2].powi(2) + combined[3].powi(2)).sqrt();
            let rendered_size = self.font_size * scale_x.max(scale_y);
            let x = combined[4] - self.origin.0;
            let baseline = combined[5] - self.origin.1;

            self.items.push(TextItem {
                text,
                x,
                top: self.page_height - baseline - rendered_size * ASCENT_RATIO,
                width: advance * scale_x,
                height: rendered_size,
                font_size: rendered_size,
            });
        }

        self.text_matrix[4] += advance * self.text_matrix[0];
        self.text_matrix[5] += advance * self.text_matrix[1];
    }

    fn add_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (x0, y0) = transform_point(&self.ctm, from.0, from.1);
        let (x1, y1) = transform_point(&self.ctm, to.0, to.1);
        if (y0 - y1).abs() < 1.0 && (x0 - x1).abs() > 1.0 {
            self.pending.push(Rule {
                x0: x0.min(x1) - self.origin.0,
                x1: x0.max(x1) - self.origin.0,
                y: self.page_height - ((y0 + y1) / 2.0 - self.origin.1),
            });
        }
    }

    fn add_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        if h.abs() <= 2.0 {
            // Thin filled bar drawn as a rule
            let mid = y + h / 2.0;
            self.add_segment((x, mid), (x + w, mid));
        } else {
            self.add_segment((x, y), (x + w, y));
            self.add_segment((x, y + h), (x + w, y + h));
        }
    }
}

/// Extract text items and rules from a single page
fn extract_page(doc: &Document, page_id: ObjectId, index: usize) -> Result<PageContent, ExtractError> {
    let media = media_box(doc, page_id);
    let mut state = PageState::new(media);

    let fonts: HashMap<Vec<u8>, FontDecoder> = doc
        .get_page_fonts(page_id)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, dict)| (name, FontDecoder { cmap: font_cmap(doc, dict) }))
        .collect();
    let fallback = FontDecoder { cmap: None };

    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    for op in &content.operations {
        let nums: Vec<f32> = op.operands.iter().filter_map(get_number).collect();
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" if nums.len() >= 6 => {
                let m = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                state.ctm = multiply_matrices(&m, &state.ctm);
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                state.line_matrix = state.text_matrix;
            }
            "ET" => state.in_text_block = false,
            "Tf" if op.operands.len() >= 2 => {
                if let Ok(name) = op.operands[0].as_name() {
                    state.font = name.to_vec();
                }
                if let Some(size) = get_number(&op.operands[1]) {
                    state.font_size = size;
                }
            }
            "TL" if !nums.is_empty() => state.leading = nums[0],
            "Td" | "TD" if nums.len() >= 2 => {
                if op.operator == "TD" {
                    state.leading = -nums[1];
                }
                let translate = [1.0, 0.0, 0.0, 1.0, nums[0], nums[1]];
                state.line_matrix = multiply_matrices(&translate, &state.line_matrix);
                state.text_matrix = state.line_matrix;
            }
            "Tm" if nums.len() >= 6 => {
                state.text_matrix = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                state.line_matrix = state.text_matrix;
            }
            "T*" => state.next_line(),
            "Tj" | "'" | "\"" => {
                if op.operator != "Tj" {
                    state.next_line();
                }
                let decoder = fonts.get(&state.font).unwrap_or(&fallback);
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    if state.in_text_block {
                        state.show_text(decoder.decode(bytes));
                    }
                }
            }
            "TJ" if state.in_text_block => {
                let decoder = fonts.get(&state.font).unwrap_or(&fallback);
                if let Some(Ok(array)) = op.operands.first().map(Object::as_array) {
                    let mut combined_text = String::new();
                    for element in array {
                        match element {
                            Object::String(bytes, _) => combined_text.push_str(&decoder.decode(bytes)),
                            other => {
                                if get_number(other).is_some_and(|n| n < TJ_SPACE_THRESHOLD) {
                                    combined_text.push(' ');
                                }
                            }
                        }
                    }
                    state.show_text(combined_text);
                }
            }
            "m" if nums.len() >= 2 => state.current_point = (nums[0], nums[1]),
            "l" if nums.len() >= 2 => {
                let to = (nums[0], nums[1]);
                state.add_segment(state.current_point, to);
                state.current_point = to;
            }
            "re" if nums.len() >= 4 => state.add_rect(nums[0], nums[1], nums[2], nums[3]),
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                let pending = std::mem::take(&mut state.pending);
                state.rules.extend(pending);
            }
            "n" => state.pending.clear(),
            _ => {}
        }
    }

    Ok(PageContent {
        index,
        width: media[2] - media[0],
        height: media[3] - media[1],
        items: state.items,
        rules: state.rules,
    })
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// Build a one-page PDF with a Helvetica text line and a ruled line
    fn build_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![100.into(), 500.into()]),
                Operation::new("Tj", vec![Object::string_literal("Hello")]),
                Operation::new("ET", vec![]),
                Operation::new("m", vec![26.into(), 400.into()]),
                Operation::new("l", vec![816.into(), 400.into()]),
                Operation::new("S", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 842.into(), 595.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_extract_text_and_rules() {
        let pages = extract_pages_mem(&build_pdf()).unwrap();
        assert_eq!(pages.len(), 1);

        let page = &pages[0];
        assert_eq!(page.index, 0);
        assert!((page.height - 595.0).abs() < 0.01);

        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert_eq!(item.text, "Hello");
        assert!((item.x - 100.0).abs() < 0.01);
        // baseline 500 from the bottom, ascent 8 => top at 595 - 508
        assert!((item.top - 87.0).abs() < 0.01);

        assert_eq!(page.rules.len(), 1);
        assert!((page.rules[0].y - 195.0).abs() < 0.01);
        assert!((page.rules[0].x0 - 26.0).abs() < 0.01);
    }

    #[test]
    fn test_multiply_identity() {
        let identity = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let m = [2.0, 0.0, 0.0, 2.0, 10.0, 20.0];
        assert_eq!(multiply_matrices(&m, &identity), m);
        assert_eq!(transform_point(&m, 1.0, 1.0), (12.0, 22.0));
    }
}
