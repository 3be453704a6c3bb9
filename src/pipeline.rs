//! Stage orchestration
//!
//! Stage one reads the PDF and writes the anchor and row checkpoints; stage
//! two reads the row checkpoint and writes the event JSON. Lookup tables are
//! built once per run and passed down by reference.

use std::fs;
use std::path::{Path, PathBuf};

use crate::anchors::{consolidate, detect_anchors, SportAnchor};
use crate::assemble::{assemble_events, write_events_json, StructuredEvent};
use crate::attributes::DisciplineVocabulary;
use crate::checkpoint::{read_rows, write_anchors, write_rows};
use crate::config::{PipelineConfig, ANCHORS_CSV, DEBUG_PDF, EVENTS_CSV};
use crate::diagnostics::Diagnostics;
use crate::extractor::extract_pages;
use crate::location::CountryIndex;
use crate::page::PageContent;
use crate::stitcher::{stitch_tables, RawTableRow};
use crate::ExtractError;

/// What stage one produced
#[derive(Debug)]
pub struct StageOneOutput {
    pub sports: Vec<SportAnchor>,
    pub rows: Vec<RawTableRow>,
    pub anchors_csv: PathBuf,
    pub events_csv: PathBuf,
    /// Annotated copy of the input, in debug mode
    pub debug_pdf: Option<PathBuf>,
}

/// Options for stage two
#[derive(Debug, Clone, Default)]
pub struct StageTwoOptions {
    /// Keep only these sports; empty keeps all
    pub sports: Vec<String>,
    /// Country list replacing the built-in one
    pub countries: Option<PathBuf>,
    /// Discipline list replacing the built-in one
    pub disciplines: Option<PathBuf>,
}

/// Anchor detection, consolidation and stitching over extracted pages
pub fn process_pages(
    pages: &[PageContent],
    config: &PipelineConfig,
    mut diagnostics: Option<&mut Diagnostics>,
) -> Result<(Vec<SportAnchor>, Vec<RawTableRow>), ExtractError> {
    let events = detect_anchors(pages, config)?;
    let sports = consolidate(&events)?;

    if let Some(diagnostics) = diagnostics.as_deref_mut() {
        diagnostics.record_anchors(&sports);
    }

    let rows = stitch_tables(pages, &sports, config, diagnostics)?;
    Ok((sports, rows))
}

/// Run stage one on `pdf_path`, writing checkpoints into `out_dir`
pub fn run_stage_one(
    pdf_path: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
    debug: bool,
) -> Result<StageOneOutput, ExtractError> {
    fs::create_dir_all(out_dir)?;

    let pages = extract_pages(pdf_path)?;
    log::info!("{}: {} pages", pdf_path.display(), pages.len());

    let mut diagnostics = debug.then(Diagnostics::new);
    let (sports, rows) = process_pages(&pages, config, diagnostics.as_mut())?;

    let anchors_csv = out_dir.join(ANCHORS_CSV);
    let events_csv = out_dir.join(EVENTS_CSV);
    write_anchors(&anchors_csv, &sports)?;
    write_rows(&events_csv, &rows)?;

    let debug_pdf = match diagnostics {
        Some(diagnostics) => {
            let path = out_dir.join(DEBUG_PDF);
            diagnostics.write_annotated_pdf(pdf_path, &path)?;
            Some(path)
        }
        None => None,
    };

    Ok(StageOneOutput {
        sports,
        rows,
        anchors_csv,
        events_csv,
        debug_pdf,
    })
}

/// Run stage two on a stage-one row checkpoint, writing `out_json`
pub fn run_stage_two(
    events_csv: &Path,
    out_json: &Path,
    options: &StageTwoOptions,
) -> Result<Vec<StructuredEvent>, ExtractError> {
    let countries = match &options.countries {
        Some(path) => CountryIndex::from_csv(path)?,
        None => CountryIndex::builtin()?,
    };
    let vocabulary = match &options.disciplines {
        Some(path) => DisciplineVocabulary::from_csv(path)?,
        None => DisciplineVocabulary::builtin()?,
    };

    let rows = read_rows(events_csv)?;
    let events = assemble_events(&rows, &vocabulary, &countries, &options.sports);

    if let Some(parent) = out_json.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_events_json(out_json, &events)?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_stage_two_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("events.csv");
        let json_path = dir.path().join("out").join("events.json");

        let rows = vec![RawTableRow {
            row_number: 42,
            title_cell: "ПЕРВЕНСТВО РОССИИ\nюниоры 14-17 лет".into(),
            dates_cell: "01.03.2024\n05.03.2024".into(),
            place_cell: "ПО НАЗНАЧЕНИЮ\nРОССИЯ".into(),
            participant_count_cell: "300".into(),
            source_page: 12,
            sport_name: "ШАХМАТЫ".into(),
        }];
        write_rows(&csv_path, &rows).unwrap();

        let events = run_stage_two(&csv_path, &json_path, &StageTwoOptions::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].age_min, Some(14));
        assert_eq!(events[0].location[0].country, "Россия");

        let written: Vec<StructuredEvent> =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(written, events);
    }

    #[test]
    fn test_custom_country_list() {
        let dir = tempfile::tempdir().unwrap();
        let countries = dir.path().join("country.csv");
        let mut file = fs::File::create(&countries).unwrap();
        writeln!(file, "id;name\n1;Россия\n2;ЮАР").unwrap();

        let index = CountryIndex::from_csv(&countries).unwrap();
        assert_eq!(index.id("ЮЖНАЯ АФРИКА"), Some(2));
        assert_eq!(index.id("СЕРБИЯ"), Some(3));
    }

    #[test]
    fn test_missing_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_stage_one(
            &dir.path().join("missing.pdf"),
            dir.path(),
            &PipelineConfig::default(),
            false,
        );
        assert!(result.is_err());
    }
}
