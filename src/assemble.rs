//! Event assembly
//!
//! Combines the parsed title attributes, locations, dates and participant
//! count of every stage-one row into the [`StructuredEvent`] records the
//! backend's bulk import accepts.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::attributes::{parse_attributes, DisciplineVocabulary, Gender};
use crate::location::{parse_location, CountryIndex, Location};
use crate::stitcher::RawTableRow;
use crate::ExtractError;

static UNASSIGNED_PLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ПО НАЗНАЧЕНИЮ\s*").unwrap());

const DATE_FORMAT: &str = "%d.%m.%Y";

/// One calendar event ready for import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredEvent {
    /// Row number from the calendar
    pub ekp_id: u64,
    pub title: String,
    pub description: String,
    pub gender: Option<Gender>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub discipline: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: Vec<Location>,
    pub participant_count: u32,
    /// 1-based page the row was found on
    pub page: u32,
}

/// Build events from stage-one rows.
///
/// When `sports` is non-empty only rows of those sports (case-insensitive)
/// are kept. Rows with unreadable dates or participant counts are dropped
/// with a warning.
pub fn assemble_events(
    rows: &[RawTableRow],
    vocabulary: &DisciplineVocabulary,
    countries: &CountryIndex,
    sports: &[String],
) -> Vec<StructuredEvent> {
    let wanted: HashSet<String> = sports.iter().map(|s| s.trim().to_uppercase()).collect();
    let selected: Vec<&RawTableRow> = rows
        .iter()
        .filter(|row| wanted.is_empty() || wanted.contains(&row.sport_name.trim().to_uppercase()))
        .collect();
    if !wanted.is_empty() {
        log::info!("{} of {} rows belong to the selected sports", selected.len(), rows.len());
    }

    for sport in sports_without_disciplines(&selected, vocabulary) {
        log::info!("no disciplines known for '{}', discipline lists stay empty", sport);
    }

    let events: Vec<StructuredEvent> = selected
        .into_iter()
        .filter_map(|row| assemble_event(row, vocabulary, countries))
        .collect();

    warn_duplicate_ids(&events);
    log::info!("assembled {} events", events.len());
    events
}

/// Sports of `rows` missing from the vocabulary, each once
fn sports_without_disciplines<'a>(
    rows: &[&'a RawTableRow],
    vocabulary: &DisciplineVocabulary,
) -> BTreeSet<&'a str> {
    rows.iter()
        .map(|row| row.sport_name.as_str())
        .filter(|sport| vocabulary.disciplines(sport).is_none())
        .collect()
}

/// Build one event, or `None` when the row is unusable
pub fn assemble_event(
    row: &RawTableRow,
    vocabulary: &DisciplineVocabulary,
    countries: &CountryIndex,
) -> Option<StructuredEvent> {
    let (start_date, end_date) = match parse_dates(&row.dates_cell) {
        Ok((start, end)) if end < start => {
            log::warn!(
                "row {} (page {}): end date {} before start date {}, swapping",
                row.row_number,
                row.source_page,
                end,
                start
            );
            (end, start)
        }
        Ok(dates) => dates,
        Err(e) => {
            log::warn!("row {} (page {}): {}", row.row_number, row.source_page, e);
            return None;
        }
    };

    let participant_count = match parse_participant_count(&row.participant_count_cell) {
        Some(count) => count,
        None => {
            log::warn!(
                "row {} (page {}): bad participant count {:?}",
                row.row_number,
                row.source_page,
                row.participant_count_cell
            );
            return None;
        }
    };

    let place = clean_place(&row.place_cell);
    let location = parse_location(&place, countries);
    if location.is_empty() && !place.is_empty() {
        log::warn!(
            "row {} (page {}): no location parsed from {:?}",
            row.row_number,
            row.source_page,
            place
        );
    }

    let attributes = parse_attributes(row.title_cell.trim(), &row.sport_name, vocabulary);

    Some(StructuredEvent {
        ekp_id: row.row_number,
        title: attributes.title,
        description: attributes.description,
        gender: attributes.gender,
        age_min: attributes.age_min,
        age_max: attributes.age_max,
        discipline: attributes.disciplines,
        start_date,
        end_date,
        location,
        participant_count,
        page: row.source_page,
    })
}

/// Start and end date from a `dd.mm.yyyy` cell with one or two lines
fn parse_dates(cell: &str) -> Result<(NaiveDate, NaiveDate), String> {
    let dates = cell
        .split_whitespace()
        .map(|d| {
            NaiveDate::parse_from_str(d, DATE_FORMAT).map_err(|e| format!("bad date {:?}: {}", d, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match dates.as_slice() {
        [day] => Ok((*day, *day)),
        [start, end] => Ok((*start, *end)),
        _ => Err(format!("expected one or two dates, got {:?}", cell)),
    }
}

fn parse_participant_count(cell: &str) -> Option<u32> {
    let digits: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
    digits.parse().ok()
}

/// Place cell without the `ПО НАЗНАЧЕНИЮ` placeholder
pub fn clean_place(cell: &str) -> String {
    UNASSIGNED_PLACE_RE.replace_all(cell, "").trim().to_string()
}

fn warn_duplicate_ids(events: &[StructuredEvent]) {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for event in events {
        *counts.entry(event.ekp_id).or_default() += 1;
    }
    let duplicates: Vec<u64> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    if !duplicates.is_empty() {
        log::warn!("{} ekp_id values are not unique: {:?}", duplicates.len(), duplicates);
    }
}

/// Write events as a JSON array indented with four spaces
pub fn write_events<W: Write>(writer: W, events: &[StructuredEvent]) -> Result<(), ExtractError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    events.serialize(&mut serializer)?;
    Ok(())
}

pub fn write_events_json<P: AsRef<Path>>(path: P, events: &[StructuredEvent]) -> Result<(), ExtractError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_events(&mut writer, events)?;
    writer.flush()?;
    log::info!("wrote {} events to {}", events.len(), path.as_ref().display());
    Ok(())
}
