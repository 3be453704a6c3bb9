//! CSV checkpoints between stages
//!
//! Stage one writes the consolidated anchors and the raw table rows so that
//! stage two (or a human) can pick up from there without rescanning the
//! document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anchors::SportAnchor;
use crate::page::BBox;
use crate::stitcher::RawTableRow;
use crate::ExtractError;

#[derive(Debug, Serialize, Deserialize)]
struct AnchorRecord {
    name_page: usize,
    name_text: String,
    main_page: usize,
    youth_page: Option<usize>,
    name_bbox: String,
    main_bbox: String,
    youth_bbox: Option<String>,
}

impl From<&SportAnchor> for AnchorRecord {
    fn from(sport: &SportAnchor) -> Self {
        AnchorRecord {
            name_page: sport.name_page,
            name_text: sport.name_text.clone(),
            main_page: sport.main_page,
            youth_page: sport.youth_page,
            name_bbox: sport.name_bbox.to_string(),
            main_bbox: sport.main_bbox.to_string(),
            youth_bbox: sport.youth_bbox.map(|b| b.to_string()),
        }
    }
}

impl TryFrom<AnchorRecord> for SportAnchor {
    type Error = ExtractError;

    fn try_from(record: AnchorRecord) -> Result<Self, Self::Error> {
        let youth_bbox = record
            .youth_bbox
            .filter(|b| !b.trim().is_empty())
            .map(|b| b.parse::<BBox>())
            .transpose()?;

        Ok(SportAnchor {
            name_page: record.name_page,
            name_bbox: record.name_bbox.parse()?,
            name_text: record.name_text,
            main_page: record.main_page,
            main_bbox: record.main_bbox.parse()?,
            youth_page: record.youth_page,
            youth_bbox,
        })
    }
}

/// Stage-one row in the column layout of the calendar table
#[derive(Debug, Serialize, Deserialize)]
struct EventRecord {
    #[serde(rename = "№")]
    row_number: u64,
    #[serde(rename = "Наименование")]
    title: String,
    #[serde(rename = "Сроки")]
    dates: String,
    #[serde(rename = "Место")]
    place: String,
    #[serde(rename = "Количество участников")]
    participant_count: String,
    #[serde(rename = "Страница")]
    page: u32,
    #[serde(rename = "Спорт")]
    sport: String,
}

impl From<&RawTableRow> for EventRecord {
    fn from(row: &RawTableRow) -> Self {
        EventRecord {
            row_number: row.row_number,
            title: row.title_cell.clone(),
            dates: row.dates_cell.clone(),
            place: row.place_cell.clone(),
            participant_count: row.participant_count_cell.clone(),
            page: row.source_page,
            sport: row.sport_name.clone(),
        }
    }
}

impl From<EventRecord> for RawTableRow {
    fn from(record: EventRecord) -> Self {
        RawTableRow {
            row_number: record.row_number,
            title_cell: record.title,
            dates_cell: record.dates,
            place_cell: record.place,
            participant_count_cell: record.participant_count,
            source_page: record.page,
            sport_name: record.sport,
        }
    }
}

pub fn write_anchors<P: AsRef<Path>>(path: P, sports: &[SportAnchor]) -> Result<(), ExtractError> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for sport in sports {
        writer.serialize(AnchorRecord::from(sport))?;
    }
    writer.flush()?;
    log::info!("wrote {} sports to {}", sports.len(), path.as_ref().display());
    Ok(())
}

pub fn read_anchors<P: AsRef<Path>>(path: P) -> Result<Vec<SportAnchor>, ExtractError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    reader
        .deserialize::<AnchorRecord>()
        .map(|record| SportAnchor::try_from(record?))
        .collect()
}

pub fn write_rows<P: AsRef<Path>>(path: P, rows: &[RawTableRow]) -> Result<(), ExtractError> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for row in rows {
        writer.serialize(EventRecord::from(row))?;
    }
    writer.flush()?;
    log::info!("wrote {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<RawTableRow>, ExtractError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let rows = reader
        .deserialize::<EventRecord>()
        .map(|record| record.map(RawTableRow::from))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("read {} rows from {}", rows.len(), path.as_ref().display());
    Ok(rows)
}
