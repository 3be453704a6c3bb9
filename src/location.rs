//! Place cell parsing
//!
//! A place cell lists one or more countries, each optionally followed by
//! lines naming regions and cities. Countries are recognised by exact match
//! against a [`CountryIndex`]; Russian places additionally encode
//! `REGION, city` pairs on one line, told apart by letter case.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::text::{capitalize, is_upper};
use crate::ExtractError;

const BUILTIN_COUNTRIES: &str = include_str!("../data/countries.csv");

const RUSSIA: &str = "РОССИЯ";

/// Names used in the calendar mapped to the name in the country list
const ALIASES: &[(&str, &str)] = &[
    ("ОБЪЕДИНЕННЫЕ АРАБСКИЕ ЭМИРАТЫ", "О.А.Э."),
    ("КОРЕЯ, РЕСПУБЛИКА", "Южная Корея"),
    ("ИРАН (ИСЛАМСКАЯ РЕСПУБЛИКА)", "Иран"),
    ("СОЕДИНЕННОЕ КОРОЛЕВСТВО", "Великобритания"),
    ("ТАЙВАНЬ (КИТАЙ)", "Тайвань"),
    ("ТАИЛАНД", "Тайланд"),
    ("МАРОККО", "Морокко"),
    ("ЮЖНАЯ АФРИКА", "ЮАР"),
    ("СЕВЕРНАЯ МАКЕДОНИЯ", "Македония"),
    ("СОЕДИНЕННЫЕ ШТАТЫ", "США"),
    ("КИРГИЗИЯ", "Киргызстан"),
    ("ЧЕРНОГОРИЯ", "Югославия"),
];

/// Countries that appear in the calendar but not in the country list
const EXTRA_COUNTRIES: &[&str] = &[
    "СЕРБИЯ",
    "БОСНИЯ И ГЕРЦЕГОВИНА",
    "ВЕНЕСУЭЛА (БОЛИВАРИАНСКАЯ РЕСПУБЛИКА)",
    "САУДОВСКАЯ АРАВИЯ",
    "КЕНИЯ",
    "ФИЛИППИНЫ",
    "АБХАЗИЯ",
    "АЛБАНИЯ",
    "КАТАР",
    "БАХРЕЙН",
    "УРУГВАЙ",
    "ОМАН",
    "ШРИ-ЛАНКА",
    "ЮЖНАЯ ОСЕТИЯ",
    "БАНГЛАДЕШ",
    "АЛЖИР",
];

/// One place an event is held at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl Location {
    fn new(country: &str, region: Option<&str>, city: Option<&str>) -> Self {
        let clean = |s: &str| s.trim().trim_matches(',').trim().to_string();
        Location {
            country: capitalize(country.trim()),
            region: region.map(|r| capitalize(&clean(r))),
            city: city.map(clean),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    id: u32,
    name: String,
}

/// Uppercase country name to numeric id
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    ids: HashMap<String, u32>,
}

impl CountryIndex {
    /// Index over the country list compiled into the binary
    pub fn builtin() -> Result<Self, ExtractError> {
        Self::from_reader(BUILTIN_COUNTRIES.as_bytes())
    }

    /// Load a `;`-delimited `id;name` country list
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ExtractError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut ids = HashMap::new();
        for record in reader.deserialize() {
            let record: CountryRecord = record?;
            ids.insert(record.name.to_uppercase(), record.id);
        }
        if ids.is_empty() {
            return Err(ExtractError::InvalidInput("country list is empty".into()));
        }

        for (alias, listed) in ALIASES {
            match ids.get(&listed.to_uppercase()).copied() {
                Some(id) => {
                    ids.insert(alias.to_string(), id);
                }
                None => log::debug!("alias target '{}' not in country list", listed),
            }
        }

        // Each unlisted country gets its own id past the list
        let mut next_id = ids.values().copied().max().unwrap_or(0) + 1;
        for name in EXTRA_COUNTRIES {
            if !ids.contains_key(*name) {
                ids.insert(name.to_string(), next_id);
                next_id += 1;
            }
        }

        log::debug!("country index: {} names", ids.len());
        Ok(CountryIndex { ids })
    }

    /// Id of a country by name, case-insensitive
    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(&name.trim().to_uppercase()).copied()
    }

    /// True when `line` is exactly a known country name in capitals
    pub fn is_country_line(&self, line: &str) -> bool {
        is_upper(line) && self.ids.contains_key(line.trim())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Split a cleaned place cell into locations.
///
/// Problems are logged and yield fewer (possibly zero) locations; this
/// never fails.
pub fn parse_location(place_cell: &str, index: &CountryIndex) -> Vec<Location> {
    let lines: Vec<&str> = place_cell
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let countries: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| index.is_country_line(line))
        .map(|(position, _)| position)
        .collect();

    match countries.as_slice() {
        [] => {
            log::warn!("no known country in place {:?}", place_cell);
            Vec::new()
        }
        [0] if lines[0] == RUSSIA => parse_russia(&lines[1..], place_cell),
        [position] => {
            let country = lines[*position];
            let cities: Vec<&str> = lines
                .iter()
                .enumerate()
                .filter(|(i, _)| i != position)
                .map(|(_, line)| *line)
                .collect();
            if cities.is_empty() {
                vec![Location::new(country, None, None)]
            } else {
                cities
                    .into_iter()
                    .map(|city| Location::new(country, None, Some(city)))
                    .collect()
            }
        }
        _ => parse_country_groups(&lines, &countries, place_cell),
    }
}

/// `[COUNTRY, city, COUNTRY, city, ...]`: one group per country line
fn parse_country_groups(lines: &[&str], countries: &[usize], place_cell: &str) -> Vec<Location> {
    if countries[0] > 0 {
        log::warn!(
            "place lines before the first country ignored: {:?}",
            &lines[..countries[0]]
        );
    }

    let mut locations = Vec::new();
    let ends = countries.iter().skip(1).copied().chain([lines.len()]);
    for (&start, end) in countries.iter().zip(ends) {
        let country = lines[start];
        if end - start == 1 {
            locations.push(Location::new(country, None, None));
        } else {
            locations.extend(
                lines[start + 1..end]
                    .iter()
                    .map(|city| Location::new(country, None, Some(*city))),
            );
        }
    }

    log::debug!("{} locations in multi-country place {:?}", locations.len(), place_cell);
    locations
}

/// Lines following `РОССИЯ`, each `REGION, city, ...`
fn parse_russia(lines: &[&str], place_cell: &str) -> Vec<Location> {
    let lines = join_wrapped_lines(lines);
    if lines.is_empty() {
        return vec![Location::new(RUSSIA, None, None)];
    }

    let mut locations = Vec::new();
    for line in &lines {
        let segments: Vec<&str> = line
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => {}
            [single] if is_upper(single) => locations.push(Location::new(RUSSIA, Some(*single), None)),
            [single] => locations.push(Location::new(RUSSIA, None, Some(*single))),
            [region, city] => locations.push(Location::new(RUSSIA, Some(*region), Some(*city))),
            [first, rest @ ..] => {
                if segments.iter().all(|s| is_upper(s)) {
                    locations.extend(segments.iter().map(|r| Location::new(RUSSIA, Some(*r), None)));
                } else if segments.iter().all(|s| !is_upper(s)) {
                    locations.extend(segments.iter().map(|c| Location::new(RUSSIA, None, Some(*c))));
                } else if is_upper(first) && rest.iter().all(|s| !is_upper(s)) {
                    locations.extend(
                        rest.iter()
                            .map(|c| Location::new(RUSSIA, Some(*first), Some(*c))),
                    );
                } else {
                    log::warn!("unparseable place line {:?} in {:?}", line, place_cell);
                }
            }
        }
    }
    locations
}

/// Re-join lines the table layout wrapped inside `поселок городского типа`
fn join_wrapped_lines(lines: &[&str]) -> Vec<String> {
    let mut joined: Vec<String> = Vec::with_capacity(lines.len());
    let mut iter = lines.iter().peekable();

    while let Some(line) = iter.next() {
        let mut line = line.to_string();
        if let Some(next) = iter.peek() {
            let wrapped = (line.ends_with("городского") && next.starts_with("типа"))
                || (line.ends_with("поселок") && next.starts_with("городского типа"));
            if wrapped {
                line.push(' ');
                line.push_str(next);
                iter.next();
            }
        }
        joined.push(line);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> CountryIndex {
        CountryIndex::builtin().unwrap()
    }

    fn loc(country: &str, region: Option<&str>, city: Option<&str>) -> Location {
        Location {
            country: country.into(),
            region: region.map(String::from),
            city: city.map(String::from),
        }
    }

    #[test]
    fn test_region_and_city() {
        let locations = parse_location("РОССИЯ\nКРАСНОЯРСКИЙ КРАЙ, г. Красноярск", &index());
        assert_eq!(
            locations,
            vec![loc("Россия", Some("Красноярский край"), Some("г. Красноярск"))]
        );
    }

    #[test]
    fn test_country_only() {
        assert_eq!(parse_location("РОССИЯ", &index()), vec![loc("Россия", None, None)]);
        assert_eq!(parse_location("КАТАР", &index()), vec![loc("Катар", None, None)]);
    }

    #[test]
    fn test_several_russian_lines() {
        let locations = parse_location(
            "РОССИЯ\nГ. САНКТ-ПЕТЕРБУРГ, Город Санкт-Петербург\nМОСКОВСКАЯ ОБЛАСТЬ",
            &index(),
        );
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].city.as_deref(), Some("Город Санкт-Петербург"));
        assert_eq!(locations[1], loc("Россия", Some("Московская область"), None));
    }

    #[test]
    fn test_wrapped_settlement_type() {
        let locations = parse_location(
            "РОССИЯ\nКЕМЕРОВСКАЯ ОБЛАСТЬ, Журавлево село, поселок городского\nтипа Шерегеш",
            &index(),
        );
        assert_eq!(
            locations,
            vec![
                loc("Россия", Some("Кемеровская область"), Some("Журавлево село")),
                loc("Россия", Some("Кемеровская область"), Some("поселок городского типа Шерегеш")),
            ]
        );
    }

    #[test]
    fn test_many_cities_and_regions() {
        let cities = parse_location("РОССИЯ\nг. Казань, г. Уфа, г. Пермь", &index());
        assert_eq!(cities.len(), 3);
        assert!(cities.iter().all(|l| l.region.is_none()));

        let regions = parse_location("РОССИЯ\nТВЕРСКАЯ ОБЛАСТЬ, ПЕРМСКИЙ КРАЙ, РЕСПУБЛИКА КОМИ", &index());
        assert_eq!(regions.len(), 3);
        assert!(regions.iter().all(|l| l.city.is_none()));
    }

    #[test]
    fn test_mixed_segments_are_dropped() {
        let locations = parse_location("РОССИЯ\nг. Тверь, ТВЕРСКАЯ ОБЛАСТЬ, г. Ржев", &index());
        assert!(locations.is_empty());
    }

    #[test]
    fn test_foreign_country_with_city() {
        let locations = parse_location("БЕЛАРУСЬ\nг. Минск,", &index());
        assert_eq!(locations, vec![loc("Беларусь", None, Some("г. Минск"))]);
    }

    #[test]
    fn test_several_countries() {
        let locations = parse_location("РОССИЯ\nг. Москва\nБЕЛАРУСЬ\nЮЖНАЯ АФРИКА\nг. Кейптаун", &index());
        assert_eq!(
            locations,
            vec![
                loc("Россия", None, Some("г. Москва")),
                loc("Беларусь", None, None),
                loc("Южная африка", None, Some("г. Кейптаун")),
            ]
        );
    }

    #[test]
    fn test_empty_and_unknown() {
        assert!(parse_location("", &index()).is_empty());
        assert!(parse_location("\n", &index()).is_empty());
        assert!(parse_location("ГДЕ-ТО", &index()).is_empty());
    }

    #[test]
    fn test_countries_outside_cis() {
        assert_eq!(
            parse_location("ЛЮКСЕМБУРГ\nг. Люксембург", &index()),
            vec![loc("Люксембург", None, Some("г. Люксембург"))]
        );

        let places = parse_location("КОЛУМБИЯ\nНОВАЯ ЗЕЛАНДИЯ\nПАКИСТАН\nКУВЕЙТ", &index());
        let countries: Vec<_> = places.iter().map(|l| l.country.as_str()).collect();
        assert_eq!(countries, vec!["Колумбия", "Новая зеландия", "Пакистан", "Кувейт"]);

        let index = index();
        assert!(index.id("КОТ-Д'ИВУАР").is_some());
        assert!(index.len() > 180);
    }

    #[test]
    fn test_alias_shares_id() {
        let index = index();
        assert!(index.id("ЮАР").is_some());
        assert_eq!(index.id("ЮЖНАЯ АФРИКА"), index.id("ЮАР"));
        assert_eq!(index.id("СОЕДИНЕННЫЕ ШТАТЫ"), index.id("США"));
    }

    #[test]
    fn test_extra_countries_get_distinct_ids() {
        let index = index();
        let serbia = index.id("СЕРБИЯ").unwrap();
        let qatar = index.id("КАТАР").unwrap();
        assert_ne!(serbia, qatar);
        assert!(serbia > index.id("ЯПОНИЯ").unwrap());
    }

    #[test]
    fn test_location_serializes_nulls() {
        let json = serde_json::to_string(&loc("Россия", None, None)).unwrap();
        assert_eq!(json, r#"{"country":"Россия","region":null,"city":null}"#);
    }
}
