//! Table stitching across pages
//!
//! A sport's table starts right below its main-roster marker and runs until
//! the title of the next sport, possibly over many pages. For each sport the
//! pages in that range are cropped, stripped of every anchor line and fed to
//! the grid table extractor; the per-page rows are concatenated in page
//! order.
//!
//! ```text
//!       Name 1
//!     Main
//!     +---------+
//!     | Table   |
//!     +---------+
//!       Name 2
//!     Main
//!     +---------+
//!     | Table   |
//!
//!      > page break
//!
//!     | Same    |
//!     | Table   |
//!     +---------+
//!       Name 3
//! ```

use std::collections::{HashMap, HashSet};

use crate::anchors::SportAnchor;
use crate::config::PipelineConfig;
use crate::diagnostics::Diagnostics;
use crate::page::{BBox, PageContent};
use crate::tables::extract_table;
use crate::ExtractError;

/// One event row of a sport table, cells as extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTableRow {
    /// Row number printed in the first column, unique within a sport
    pub row_number: u64,
    pub title_cell: String,
    pub dates_cell: String,
    pub place_cell: String,
    pub participant_count_cell: String,
    /// 1-based page number the row was found on
    pub source_page: u32,
    pub sport_name: String,
}

impl RawTableRow {
    /// Build a row from the five grid cells.
    ///
    /// Returns `None` when the first cell is not a row number.
    pub fn from_cells(cells: &[String], source_page: u32, sport_name: &str) -> Option<Self> {
        let [number, title, dates, place, count] = cells else {
            return None;
        };
        let row_number = parse_row_number(number)?;

        Some(RawTableRow {
            row_number,
            title_cell: title.clone(),
            dates_cell: dates.clone(),
            place_cell: place.clone(),
            participant_count_cell: count.clone(),
            source_page,
            sport_name: sport_name.to_string(),
        })
    }
}

fn parse_row_number(cell: &str) -> Option<u64> {
    let digits: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Extract the table rows of every sport.
///
/// Sports are processed in main-roster page order. Rows come back grouped
/// by sport, each group in page order.
pub fn stitch_tables(
    pages: &[PageContent],
    sports: &[SportAnchor],
    config: &PipelineConfig,
    mut diagnostics: Option<&mut Diagnostics>,
) -> Result<Vec<RawTableRow>, ExtractError> {
    let Some(last_index) = pages.len().checked_sub(1) else {
        return Ok(Vec::new());
    };

    // Anchor lines never belong to a table
    let mut exclusions: HashMap<usize, Vec<BBox>> = HashMap::new();
    for sport in sports {
        for (page, bbox) in sport.regions() {
            exclusions.entry(page).or_default().push(bbox);
        }
    }

    let mut order: Vec<(usize, &SportAnchor)> = sports.iter().enumerate().collect();
    order.sort_by_key(|(_, sport)| sport.main_page);

    let mut rows = Vec::new();

    for (position, &(sport_index, sport)) in order.iter().enumerate() {
        let next = order.get(position + 1).map(|(_, next)| *next);

        sport.validate()?;
        if let Some(next) = next {
            if sport.main_page > next.name_page {
                return Err(ExtractError::structure(
                    next.name_page as u32 + 1,
                    format!(
                        "sport '{}' starts before the table of '{}' ends",
                        next.name_text, sport.name_text
                    ),
                ));
            }
        }

        let first_page = sport.main_page;
        let last_page = next.map_or(last_index, |next| next.name_page);
        if last_page > last_index {
            return Err(ExtractError::structure(
                last_page as u32 + 1,
                format!("anchor of '{}' is past the end of the document", sport.name_text),
            ));
        }

        let mut sport_rows: Vec<RawTableRow> = Vec::new();

        for page_index in first_page..=last_page {
            let page = &pages[page_index];
            let mut view = page.view().outside_bbox(config.footer_bbox);
            for bbox in exclusions.get(&page_index).into_iter().flatten() {
                view = view.outside_bbox(*bbox);
            }

            let top_line = if page_index == first_page {
                // Table starts below the marker
                view = view.crop(BBox::new(0.0, sport.main_bbox.bottom, page.width, page.height));
                sport.main_bbox.bottom
            } else {
                view.bbox().top
            };

            if let Some(next) = next {
                if page_index == next.name_page {
                    // Table ends above the next title
                    view = view.crop(BBox::new(0.0, 0.0, page.width, next.name_bbox.top));
                }
            }

            if view.height() < config.min_crop_height {
                log::warn!(
                    "page crop {} for {} is too small ({:.1}pt), skipping",
                    page.number(),
                    sport.name_text,
                    view.height()
                );
                continue;
            }

            let Some(table) = extract_table(&view, &config.table_settings(top_line)) else {
                log::warn!(
                    "page {}: no table rows for {} (possible extraction miss)",
                    page.number(),
                    sport.name_text
                );
                continue;
            };

            if let Some(diagnostics) = diagnostics.as_deref_mut() {
                diagnostics.record_table(page_index, sport_index, &table);
            }

            for cells in &table.cells {
                match RawTableRow::from_cells(cells, page.number(), &sport.name_text) {
                    Some(row) => sport_rows.push(row),
                    None if cells.first().is_some_and(|c| c.trim().is_empty()) => log::warn!(
                        "page {}: row without number in {} (split across a page break?)",
                        page.number(),
                        sport.name_text
                    ),
                    None => log::debug!(
                        "page {}: skipping non-event row {:?}",
                        page.number(),
                        cells.first()
                    ),
                }
            }
        }

        let mut seen = HashSet::new();
        for row in &sport_rows {
            if !seen.insert(row.row_number) {
                log::warn!(
                    "{}: row number {} appears twice (page {})",
                    sport.name_text,
                    row.row_number,
                    row.source_page
                );
            }
        }

        log::info!(
            "{}: {} rows on pages {}-{}",
            sport.name_text,
            sport_rows.len(),
            first_page + 1,
            last_page + 1
        );
        rows.extend(sport_rows);
    }

    Ok(rows)
}
