//! Table extraction on an explicit column grid
//!
//! The calendar tables have fixed column positions, so column borders are
//! given by the caller. Row borders come from the horizontal rules drawn on
//! the page (plus any explicit lines); when a region carries no rules at all,
//! rows are cut at each text line of the first column instead.

use crate::page::{group_into_lines, join_line_text, BBox, PageView, TextItem};

/// Settings for [`extract_table`]
#[derive(Debug, Clone)]
pub struct TableSettings {
    /// Explicit vertical lines (x positions)
    pub vertical_lines: Vec<f32>,
    /// Explicit horizontal lines (y positions) merged with the drawn rules
    pub horizontal_lines: Vec<f32>,
    /// Horizontal borders closer than this are one border
    pub snap_tolerance: f32,
    /// Items whose tops differ by less than this share a text line
    pub line_tolerance: f32,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            vertical_lines: Vec::new(),
            horizontal_lines: Vec::new(),
            snap_tolerance: 3.0,
            line_tolerance: 3.0,
        }
    }
}

/// An extracted table
#[derive(Debug, Clone)]
pub struct Table {
    /// Column boundaries (x positions)
    pub columns: Vec<f32>,
    /// Row boundaries (y positions, top to bottom)
    pub rows: Vec<f32>,
    /// Cell contents indexed by (row, col); lines inside a cell are joined
    /// with `\n`
    pub cells: Vec<Vec<String>>,
    /// Cell rectangles indexed by (row, col)
    pub cell_bboxes: Vec<Vec<BBox>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.cells.len()
    }
}

/// Extract a table from the view using the explicit column grid.
///
/// Returns `None` when the grid is degenerate or no row holds any text.
pub fn extract_table(view: &PageView<'_>, settings: &TableSettings) -> Option<Table> {
    let mut columns = settings.vertical_lines.clone();
    columns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if columns.len() < 2 {
        return None;
    }

    let items: Vec<&TextItem> = view.items().collect();
    if items.is_empty() {
        return None;
    }

    let rows = match find_row_boundaries(view, &columns, settings) {
        Some(rows) => rows,
        None => find_text_row_boundaries(view, &items, &columns, settings)?,
    };

    let mut cells = Vec::new();
    let mut cell_bboxes = Vec::new();

    for row in rows.windows(2) {
        let (top, bottom) = (row[0], row[1]);
        let mut row_cells = Vec::with_capacity(columns.len() - 1);
        let mut row_bboxes = Vec::with_capacity(columns.len() - 1);

        for col in columns.windows(2) {
            let bbox = BBox::new(col[0], top, col[1], bottom);
            let cell_items: Vec<&TextItem> = items
                .iter()
                .copied()
                .filter(|item| {
                    let (cx, cy) = item.bbox().center();
                    bbox.contains_point(cx, cy)
                })
                .collect();
            row_cells.push(join_cell_items(cell_items, settings.line_tolerance));
            row_bboxes.push(bbox);
        }

        if row_cells.iter().any(|c| !c.is_empty()) {
            cells.push(row_cells);
            cell_bboxes.push(row_bboxes);
        }
    }

    if cells.is_empty() {
        return None;
    }

    Some(Table {
        columns,
        rows,
        cells,
        cell_bboxes,
    })
}

/// Row borders from drawn rules crossing the grid plus explicit lines.
///
/// `None` when the region has no drawn rules.
fn find_row_boundaries(view: &PageView<'_>, columns: &[f32], settings: &TableSettings) -> Option<Vec<f32>> {
    let (left, right) = (columns[0], columns[columns.len() - 1]);
    let clip = view.bbox();

    let drawn: Vec<f32> = view
        .rules()
        .iter()
        .filter(|rule| rule.x0 < right && rule.x1 > left)
        .map(|rule| rule.y)
        .collect();
    if drawn.is_empty() {
        return None;
    }

    let mut ys: Vec<f32> = drawn
        .into_iter()
        .chain(
            settings
                .horizontal_lines
                .iter()
                .copied()
                .filter(|y| *y >= clip.top && *y <= clip.bottom),
        )
        .collect();
    ys.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut rows: Vec<f32> = Vec::new();
    for y in ys {
        match rows.last() {
            Some(&last) if y - last < settings.snap_tolerance => {}
            _ => rows.push(y),
        }
    }

    if rows.len() < 2 {
        return None;
    }
    Some(rows)
}

/// Row borders at the top of every text line in the first column
fn find_text_row_boundaries(
    view: &PageView<'_>,
    items: &[&TextItem],
    columns: &[f32],
    settings: &TableSettings,
) -> Option<Vec<f32>> {
    let first_column: Vec<&TextItem> = items
        .iter()
        .copied()
        .filter(|item| find_column_index(columns, item.bbox().center().0) == Some(0))
        .collect();

    let mut rows: Vec<f32> = group_into_lines(first_column, settings.line_tolerance)
        .iter()
        .map(|line| line.iter().map(|i| i.top).fold(f32::INFINITY, f32::min) - settings.snap_tolerance / 2.0)
        .collect();
    if rows.is_empty() {
        return None;
    }

    rows.push(view.bbox().bottom);
    Some(rows)
}

/// Find which column an x position falls into
fn find_column_index(columns: &[f32], x: f32) -> Option<usize> {
    columns.windows(2).position(|w| x >= w[0] && x < w[1])
}

/// Join the items of one cell: words of a line with spaces, lines with `\n`
fn join_cell_items(items: Vec<&TextItem>, line_tolerance: f32) -> String {
    group_into_lines(items, line_tolerance)
        .iter()
        .map(|line| join_line_text(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageContent, Rule};

    const COLUMNS: [f32; 6] = [26.0, 109.0, 392.0, 476.0, 734.0, 816.0];

    fn make_item(text: &str, x: f32, top: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            top,
            width: 10.0,
            height: 8.0,
            font_size: 8.0,
        }
    }

    fn rule(y: f32) -> Rule {
        Rule {
            x0: 26.0,
            x1: 816.0,
            y,
        }
    }

    fn settings() -> TableSettings {
        TableSettings {
            vertical_lines: COLUMNS.to_vec(),
            ..TableSettings::default()
        }
    }

    fn ruled_page() -> PageContent {
        let mut page = PageContent::new(3, 842.0, 595.0);
        page.items = vec![
            make_item("101", 30.0, 102.0),
            make_item("ЧЕМПИОНАТ РОССИИ", 112.0, 102.0),
            make_item("мужчины", 112.0, 112.0),
            make_item("01.02.2024", 395.0, 102.0),
            make_item("03.02.2024", 395.0, 112.0),
            make_item("РОССИЯ", 480.0, 102.0),
            make_item("40", 740.0, 102.0),
            make_item("102", 30.0, 132.0),
            make_item("КУБОК РОССИИ", 112.0, 132.0),
        ];
        page.rules = vec![rule(100.0), rule(130.0), rule(150.0)];
        page
    }

    #[test]
    fn test_ruled_table_cells() {
        let page = ruled_page();
        let table = extract_table(&page.view(), &settings()).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cells[0][0], "101");
        assert_eq!(table.cells[0][1], "ЧЕМПИОНАТ РОССИИ\nмужчины");
        assert_eq!(table.cells[0][2], "01.02.2024\n03.02.2024");
        assert_eq!(table.cells[0][4], "40");
        assert_eq!(table.cells[1][1], "КУБОК РОССИИ");
        assert_eq!(table.cells[1][3], "");
        assert_eq!(table.cell_bboxes[1][0], BBox::new(26.0, 130.0, 109.0, 150.0));
    }

    #[test]
    fn test_explicit_line_closes_first_row() {
        let mut page = ruled_page();
        page.rules = vec![rule(130.0), rule(150.0)];
        let with_top = TableSettings {
            horizontal_lines: vec![95.0],
            ..settings()
        };

        let table = extract_table(&page.view(), &with_top).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cells[0][0], "101");

        let table = extract_table(&page.view(), &settings()).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cells[0][0], "102");
    }

    #[test]
    fn test_text_rows_without_rules() {
        let mut page = ruled_page();
        page.rules.clear();

        let table = extract_table(&page.view(), &settings()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cells[0][1], "ЧЕМПИОНАТ РОССИИ\nмужчины");
        assert_eq!(table.cells[1][0], "102");
    }

    #[test]
    fn test_empty_region_has_no_table() {
        let page = PageContent::new(0, 842.0, 595.0);
        assert!(extract_table(&page.view(), &settings()).is_none());
    }

    #[test]
    fn test_find_column_index() {
        assert_eq!(find_column_index(&COLUMNS, 30.0), Some(0));
        assert_eq!(find_column_index(&COLUMNS, 500.0), Some(3));
        assert_eq!(find_column_index(&COLUMNS, 900.0), None);
    }
}
