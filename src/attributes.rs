//! Attribute parsing for the title cell
//!
//! The title cell of an event row is laid out as
//!
//! ```text
//! ЧЕМПИОНАТ РОССИИ          <- uppercase lines: title
//! мужчины от 16 лет         <- lowercase lines: gender and age
//! ПРОГРАММИРОВАНИЕ ...      <- the rest: disciplines
//! ```
//!
//! Gender and age come from keyword regexes over the lowercase block;
//! disciplines are matched against a per-sport [`DisciplineVocabulary`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::text::{canonical_key, is_lower, is_upper};
use crate::ExtractError;

static FEMALE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(женщины|юниорки|девушки|девочки)").unwrap());
static MALE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(мужчины|юниоры|юноши|мальчики)").unwrap());
static AGE_FROM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)от ([0-9]+) лет").unwrap());
static AGE_TO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)до ([0-9]+) лет").unwrap());
static AGE_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]+)-([0-9]+) лет").unwrap());

const BUILTIN_DISCIPLINES: &str = include_str!("../data/disciplines.csv");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Fields derived from one title cell
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedAttributes {
    pub title: String,
    pub description: String,
    pub gender: Option<Gender>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub disciplines: Vec<String>,
}

/// Known disciplines per sport.
///
/// Sports are keyed by their uppercase name. Within a sport, disciplines
/// keep file order and are matched on their canonical key.
#[derive(Debug, Clone, Default)]
pub struct DisciplineVocabulary {
    sports: HashMap<String, Vec<(String, String)>>,
}

impl DisciplineVocabulary {
    /// Vocabulary compiled into the binary
    pub fn builtin() -> Result<Self, ExtractError> {
        Self::from_reader(BUILTIN_DISCIPLINES.as_bytes())
    }

    /// Load a headerless `sport,discipline` CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ExtractError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut vocabulary = Self::default();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            match (record.get(0), record.get(1)) {
                (Some(sport), Some(discipline)) if !sport.is_empty() && !discipline.is_empty() => {
                    vocabulary.insert(sport, discipline)
                }
                _ => {
                    return Err(ExtractError::InvalidInput(format!(
                        "discipline list line {}: expected 'sport,discipline'",
                        line + 1
                    )))
                }
            }
        }

        log::debug!("discipline vocabulary: {} sports", vocabulary.sports.len());
        Ok(vocabulary)
    }

    pub fn insert(&mut self, sport: &str, discipline: &str) {
        let key = canonical_key(discipline);
        let entries = self.sports.entry(sport.to_uppercase()).or_default();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = discipline.to_string(),
            None => entries.push((key, discipline.to_string())),
        }
    }

    /// `(canonical key, discipline)` pairs of a sport, if it is known
    pub fn disciplines(&self, sport: &str) -> Option<&[(String, String)]> {
        self.sports.get(&sport.to_uppercase()).map(Vec::as_slice)
    }

    pub fn sport_count(&self) -> usize {
        self.sports.len()
    }
}

/// Parse a (trimmed) title cell of a row belonging to `sport`.
pub fn parse_attributes(
    title_cell: &str,
    sport: &str,
    vocabulary: &DisciplineVocabulary,
) -> ParsedAttributes {
    let lines: Vec<&str> = title_cell.lines().collect();

    let title_len = lines
        .iter()
        .take_while(|line| is_upper(line) || line.trim() == ")")
        .count();
    let gender_len = lines[title_len..]
        .iter()
        .take_while(|line| is_lower(line))
        .count();

    let title = join_words(&lines[..title_len]);
    let description = lines[title_len..].join("\n");
    let gender_age = join_words(&lines[title_len..title_len + gender_len]);
    let discipline_text = join_words(&lines[title_len + gender_len..]);

    let (age_min, age_max) = parse_age(&gender_age);

    ParsedAttributes {
        title,
        description,
        gender: parse_gender(&gender_age),
        age_min,
        age_max,
        disciplines: match_disciplines(&discipline_text, sport, vocabulary),
    }
}

fn join_words(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn parse_gender(text: &str) -> Option<Gender> {
    match (MALE_RE.is_match(text), FEMALE_RE.is_match(text)) {
        (true, false) => Some(Gender::Male),
        (false, true) => Some(Gender::Female),
        _ => None,
    }
}

/// Combine every age expression in `text`.
///
/// A bound is only reported when every matched expression states it.
fn parse_age(text: &str) -> (Option<u32>, Option<u32>) {
    let mut ranges: Vec<(Option<u32>, Option<u32>)> = Vec::new();
    ranges.extend(AGE_FROM_RE.captures_iter(text).map(|c| (group_number(&c, 1), None)));
    ranges.extend(AGE_TO_RE.captures_iter(text).map(|c| (None, group_number(&c, 1))));
    ranges.extend(
        AGE_RANGE_RE
            .captures_iter(text)
            .map(|c| (group_number(&c, 1), group_number(&c, 2))),
    );

    if ranges.is_empty() {
        return (None, None);
    }

    let age_min = ranges
        .iter()
        .map(|(min, _)| *min)
        .collect::<Option<Vec<u32>>>()
        .and_then(|mins| mins.into_iter().min());
    let age_max = ranges
        .iter()
        .map(|(_, max)| *max)
        .collect::<Option<Vec<u32>>>()
        .and_then(|maxs| maxs.into_iter().max());
    (age_min, age_max)
}

fn group_number(captures: &Captures<'_>, group: usize) -> Option<u32> {
    captures.get(group)?.as_str().parse().ok()
}

fn match_disciplines(text: &str, sport: &str, vocabulary: &DisciplineVocabulary) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let Some(known) = vocabulary.disciplines(sport) else {
        log::debug!("no disciplines known for sport '{}'", sport);
        return Vec::new();
    };

    let key = canonical_key(text);
    known
        .iter()
        .filter(|(k, _)| key.contains(k.as_str()))
        .map(|(_, discipline)| discipline.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPORT: &str = "СПОРТИВНОЕ ПРОГРАММИРОВАНИЕ";

    fn vocabulary() -> DisciplineVocabulary {
        DisciplineVocabulary::builtin().unwrap()
    }

    #[test]
    fn test_gender_and_open_age() {
        let parsed = parse_attributes(
            "мужчины от 16 лет\nпрограммирование алгоритмическое",
            SPORT,
            &vocabulary(),
        );
        assert_eq!(parsed.gender, Some(Gender::Male));
        assert_eq!(parsed.age_min, Some(16));
        assert_eq!(parsed.age_max, None);
        assert_eq!(parsed.title, "");
    }

    #[test]
    fn test_explicit_age_range() {
        let parsed = parse_attributes("16-25 лет\n", SPORT, &vocabulary());
        assert_eq!(parsed.age_min, Some(16));
        assert_eq!(parsed.age_max, Some(25));
        assert_eq!(parsed.gender, None);
    }

    #[test]
    fn test_full_cell() {
        let cell = "ЧЕМПИОНАТ РОССИИ\n(1 ЭТАП\n)\nмужчины, женщины\n14-17 лет, 18-25 лет\nПРОГРАММИРОВАНИЕ АЛГОРИТМИЧЕСКОЕ,\nпрограммирование – «продуктовое»";
        let parsed = parse_attributes(cell, SPORT, &vocabulary());

        assert_eq!(parsed.title, "ЧЕМПИОНАТ РОССИИ (1 ЭТАП )");
        assert_eq!(
            parsed.description,
            "мужчины, женщины\n14-17 лет, 18-25 лет\nПРОГРАММИРОВАНИЕ АЛГОРИТМИЧЕСКОЕ,\nпрограммирование – «продуктовое»"
        );
        assert_eq!(parsed.gender, None);
        assert_eq!(parsed.age_min, Some(14));
        assert_eq!(parsed.age_max, Some(25));
        assert_eq!(
            parsed.disciplines,
            vec!["программирование алгоритмическое", "программирование продуктовое"]
        );
    }

    #[test]
    fn test_open_bound_nullifies_max() {
        assert_eq!(parse_age("юноши до 18 лет"), (None, Some(18)));
        assert_eq!(parse_age("от 10 лет, 12-14 лет"), (Some(10), None));
        assert_eq!(parse_age("без ограничений"), (None, None));
    }

    #[test]
    fn test_female_keywords() {
        assert_eq!(parse_gender("девушки 14-15 лет"), Some(Gender::Female));
        assert_eq!(parse_gender("Юниорки"), Some(Gender::Female));
        assert_eq!(parse_gender("юноши, девушки"), None);
    }

    #[test]
    fn test_unknown_sport_has_no_disciplines() {
        let parsed = parse_attributes("КУБОК\nмужчины\nпрограммирование алгоритмическое", "ПЛАВАНИЕ", &vocabulary());
        assert!(parsed.disciplines.is_empty());
        assert_eq!(parsed.title, "КУБОК");
    }

    #[test]
    fn test_vocabulary_rejects_short_lines() {
        let err = DisciplineVocabulary::from_reader("СПОРТ\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidInput(_)));
    }

    #[test]
    fn test_vocabulary_lookup_is_case_insensitive() {
        let vocabulary = vocabulary();
        assert!(vocabulary.disciplines("спортивное программирование").is_some());
        assert_eq!(vocabulary.disciplines(SPORT).unwrap().len(), 5);
    }
}
