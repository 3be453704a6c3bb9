//! Template constants of the calendar document

use crate::page::BBox;
use crate::tables::TableSettings;

pub const ANCHORS_CSV: &str = "anchors.csv";
pub const EVENTS_CSV: &str = "events.csv";
pub const EVENTS_JSON: &str = "events.json";
pub const DEBUG_PDF: &str = "debugged_output.pdf";

/// Configuration for the extraction pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Line that opens a sport's main roster table
    pub main_roster_marker: String,
    /// Line that opens a sport's youth (reserve) roster table
    pub youth_roster_marker: String,
    /// Page-number footer, masked on every page
    pub footer_bbox: BBox,
    /// Vertical table borders, left to right
    pub column_lines: Vec<f32>,
    /// Crops shorter than this hold no usable table content
    pub min_crop_height: f32,
    /// Items whose tops differ by less than this share a text line
    pub line_tolerance: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            main_roster_marker: "Основной состав".to_string(),
            youth_roster_marker: "Молодежный (резервный) состав".to_string(),
            footer_bbox: BBox::new(385.0, 555.0, 460.0, 570.0),
            column_lines: vec![26.0, 109.0, 392.0, 476.0, 734.0, 816.0],
            min_crop_height: 5.0,
            line_tolerance: 3.0,
        }
    }
}

impl PipelineConfig {
    /// Table settings for the fixed column grid, with the given explicit
    /// horizontal border
    pub fn table_settings(&self, top_line: f32) -> TableSettings {
        TableSettings {
            vertical_lines: self.column_lines.clone(),
            horizontal_lines: vec![top_line],
            line_tolerance: self.line_tolerance,
            ..TableSettings::default()
        }
    }
}
