//! Debug annotations
//!
//! [`Diagnostics`] collects the rectangles the pipeline relied on (anchor
//! lines, table cells) when the caller asks for it, and can draw them onto
//! a copy of the source PDF for visual checking.

use std::path::Path;

use lopdf::{dictionary, Document, Object};

use crate::anchors::SportAnchor;
use crate::extractor::media_box;
use crate::page::BBox;
use crate::tables::Table;
use crate::ExtractError;

/// Red, green, blue; neighbouring sports get different colours
const COLORS: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// A rectangle to draw
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Page index (0-based)
    pub page: usize,
    pub bbox: BBox,
    /// Sport index, picks the colour
    pub sport: usize,
}

/// Collector of debug rectangles
#[derive(Debug, Default)]
pub struct Diagnostics {
    markers: Vec<Marker>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Record the title, main and youth rectangles of every sport
    pub fn record_anchors(&mut self, sports: &[SportAnchor]) {
        for (sport_index, sport) in sports.iter().enumerate() {
            for (page, bbox) in sport.regions() {
                self.markers.push(Marker {
                    page,
                    bbox,
                    sport: sport_index,
                });
            }
        }
    }

    /// Record every cell of a table extracted on `page`
    pub fn record_table(&mut self, page: usize, sport: usize, table: &Table) {
        for bbox in table.cell_bboxes.iter().flatten() {
            self.markers.push(Marker {
                page,
                bbox: *bbox,
                sport,
            });
        }
    }

    /// Write a copy of `input` with one square annotation per marker.
    ///
    /// Returns the number of annotations drawn.
    pub fn write_annotated_pdf(&self, input: &Path, output: &Path) -> Result<usize, ExtractError> {
        let mut doc = Document::load(input)?;
        let page_ids: Vec<_> = doc.get_pages().values().copied().collect();
        let mut drawn = 0;

        for marker in &self.markers {
            let Some(&page_id) = page_ids.get(marker.page) else {
                log::warn!("debug marker on missing page {}", marker.page + 1);
                continue;
            };

            // Flip back to PDF coordinates
            let [mx0, my0, _, my1] = media_box(&doc, page_id);
            let height = my1 - my0;
            let rect: Vec<Object> = [
                mx0 + marker.bbox.x0,
                my0 + height - marker.bbox.bottom,
                mx0 + marker.bbox.x1,
                my0 + height - marker.bbox.top,
            ]
            .into_iter()
            .map(Object::Real)
            .collect();
            let color: Vec<Object> = COLORS[marker.sport % COLORS.len()]
                .into_iter()
                .map(Object::Real)
                .collect();

            let annotation_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Square",
                "Rect" => rect,
                "C" => color,
                "Border" => vec![0.into(), 0.into(), 1.into()],
                "F" => 4,
            });

            let mut annots = match doc.get_dictionary(page_id)?.get(b"Annots") {
                Ok(existing) => doc
                    .dereference(existing)
                    .ok()
                    .and_then(|(_, object)| object.as_array().ok().cloned())
                    .unwrap_or_default(),
                Err(_) => Vec::new(),
            };
            annots.push(annotation_id.into());
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .set("Annots", annots);
            drawn += 1;
        }

        doc.save(output)?;
        log::info!("wrote {} debug annotations to {}", drawn, output.display());
        Ok(drawn)
    }
}
