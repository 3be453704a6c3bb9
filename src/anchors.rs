//! Anchor detection and consolidation
//!
//! Every sport section of the calendar opens with a title line followed by
//! the main-roster marker; a youth-roster marker may follow further down.
//! [`detect_anchors`] finds these lines page by page and [`consolidate`]
//! folds the resulting event stream into one [`SportAnchor`] per sport.

use crate::config::PipelineConfig;
use crate::page::{BBox, PageContent, PageLine};
use crate::ExtractError;

/// Kind of a detected marker line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    /// Sport title, the line right before a main-roster marker
    Title,
    MainRosterStart,
    YouthRosterStart,
}

impl AnchorKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnchorKind::Title => "title",
            AnchorKind::MainRosterStart => "main",
            AnchorKind::YouthRosterStart => "youth",
        }
    }
}

/// A detected marker line
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorEvent {
    /// Page index (0-based)
    pub page: usize,
    pub bbox: BBox,
    pub kind: AnchorKind,
    /// Line text, kept for titles only
    pub text: Option<String>,
}

/// Geometry of one sport section
#[derive(Debug, Clone, PartialEq)]
pub struct SportAnchor {
    pub name_page: usize,
    pub name_bbox: BBox,
    pub name_text: String,
    pub main_page: usize,
    pub main_bbox: BBox,
    pub youth_page: Option<usize>,
    pub youth_bbox: Option<BBox>,
}

impl SportAnchor {
    /// All anchor rectangles of this sport with their page indices
    pub fn regions(&self) -> Vec<(usize, BBox)> {
        let mut regions = vec![
            (self.name_page, self.name_bbox),
            (self.main_page, self.main_bbox),
        ];
        if let (Some(page), Some(bbox)) = (self.youth_page, self.youth_bbox) {
            regions.push((page, bbox));
        }
        regions
    }

    /// Check page ordering: name, then main roster, then youth roster
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.name_page > self.main_page {
            return Err(ExtractError::structure(
                self.main_page as u32 + 1,
                format!(
                    "sport '{}' has its main roster before its title (page {})",
                    self.name_text,
                    self.name_page + 1
                ),
            ));
        }
        if let Some(youth_page) = self.youth_page {
            if self.main_page > youth_page {
                return Err(ExtractError::structure(
                    youth_page as u32 + 1,
                    format!(
                        "sport '{}' has its youth roster before its main roster",
                        self.name_text
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Look-back buffer holding the single most recent text line, across page
/// boundaries
#[derive(Debug, Default)]
struct LineLookback {
    last: Option<PageLine>,
}

impl LineLookback {
    /// The buffered line, if it is on `page` or is the last line of the
    /// page before it
    fn previous(&self, page: usize) -> Option<&PageLine> {
        self.last
            .as_ref()
            .filter(|line| line.page == page || line.page + 1 == page)
    }

    fn push(&mut self, line: PageLine) {
        self.last = Some(line);
    }
}

/// Scan all pages for marker lines.
///
/// Events come out in page order, top to bottom within a page. A
/// main-roster marker with no line right before it is a structural error.
pub fn detect_anchors(
    pages: &[PageContent],
    config: &PipelineConfig,
) -> Result<Vec<AnchorEvent>, ExtractError> {
    let mut events = Vec::new();
    let mut lookback = LineLookback::default();

    for page in pages {
        let lines = page
            .view()
            .outside_bbox(config.footer_bbox)
            .text_lines(config.line_tolerance);

        for line in lines {
            let text = line.text.trim();

            if text == config.main_roster_marker {
                let title = lookback.previous(page.index).ok_or_else(|| {
                    ExtractError::structure(
                        page.number(),
                        "main roster marker has no title line before it",
                    )
                })?;
                log::debug!(
                    "page {}: sport '{}' (title on page {})",
                    page.number(),
                    title.text,
                    title.page + 1
                );
                events.push(AnchorEvent {
                    page: title.page,
                    bbox: title.bbox,
                    kind: AnchorKind::Title,
                    text: Some(title.text.trim().to_string()),
                });
                events.push(AnchorEvent {
                    page: page.index,
                    bbox: line.bbox,
                    kind: AnchorKind::MainRosterStart,
                    text: None,
                });
            } else if text == config.youth_roster_marker {
                events.push(AnchorEvent {
                    page: page.index,
                    bbox: line.bbox,
                    kind: AnchorKind::YouthRosterStart,
                    text: None,
                });
            }

            lookback.push(line);
        }
    }

    log::info!(
        "anchoring: {} markers on {} pages",
        events.len(),
        pages.len()
    );
    Ok(events)
}

#[derive(Debug, Default)]
struct PartialSport {
    name: Option<(usize, BBox, String)>,
    main: Option<(usize, BBox)>,
    youth: Option<(usize, BBox)>,
}

impl PartialSport {
    fn finish(self) -> Result<Option<SportAnchor>, ExtractError> {
        let Some((name_page, name_bbox, name_text)) = self.name else {
            return Ok(None);
        };
        let Some((main_page, main_bbox)) = self.main else {
            return Err(ExtractError::structure(
                name_page as u32 + 1,
                format!("sport '{}' has no main roster marker", name_text),
            ));
        };

        let sport = SportAnchor {
            name_page,
            name_bbox,
            name_text,
            main_page,
            main_bbox,
            youth_page: self.youth.map(|(page, _)| page),
            youth_bbox: self.youth.map(|(_, bbox)| bbox),
        };
        sport.validate()?;
        Ok(Some(sport))
    }
}

/// Fold the anchor stream into one record per sport, in title order.
///
/// A roster marker arriving before any title means the stream is malformed.
pub fn consolidate(events: &[AnchorEvent]) -> Result<Vec<SportAnchor>, ExtractError> {
    let mut sports = Vec::new();
    let mut current = PartialSport::default();

    for event in events {
        match event.kind {
            AnchorKind::Title => {
                if let Some(sport) = std::mem::take(&mut current).finish()? {
                    sports.push(sport);
                }
                current.name = Some((
                    event.page,
                    event.bbox,
                    event.text.clone().unwrap_or_default(),
                ));
            }
            AnchorKind::MainRosterStart | AnchorKind::YouthRosterStart => {
                let Some((_, _, name)) = &current.name else {
                    return Err(ExtractError::structure(
                        event.page as u32 + 1,
                        format!("{} roster marker before any sport title", event.kind.label()),
                    ));
                };
                if event.kind == AnchorKind::MainRosterStart {
                    current.main = Some((event.page, event.bbox));
                } else {
                    if current.youth.is_some() {
                        log::warn!(
                            "page {}: second youth roster marker for '{}'",
                            event.page + 1,
                            name
                        );
                    }
                    current.youth = Some((event.page, event.bbox));
                }
            }
        }
    }

    if let Some(sport) = current.finish()? {
        sports.push(sport);
    }

    log::info!("consolidated {} sports", sports.len());
    Ok(sports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::TextItem;

    fn make_item(text: &str, x: f32, top: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            top,
            width: 80.0,
            height: 9.0,
            font_size: 9.0,
        }
    }

    fn make_page(index: usize, lines: &[(&str, f32)]) -> PageContent {
        let mut page = PageContent::new(index, 842.0, 595.0);
        page.items = lines.iter().map(|(t, top)| make_item(t, 51.0, *top)).collect();
        page
    }

    fn event(page: usize, kind: AnchorKind, text: Option<&str>) -> AnchorEvent {
        AnchorEvent {
            page,
            bbox: BBox::new(22.0, 100.0, 100.0, 110.0),
            kind,
            text: text.map(String::from),
        }
    }

    #[test]
    fn test_detect_title_on_same_page() {
        let pages = vec![make_page(
            0,
            &[
                ("АВИАМОДЕЛЬНЫЙ СПОРТ", 231.0),
                ("Основной состав", 251.0),
                ("1", 300.0),
            ],
        )];
        let events = detect_anchors(&pages, &PipelineConfig::default()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AnchorKind::Title);
        assert_eq!(events[0].text.as_deref(), Some("АВИАМОДЕЛЬНЫЙ СПОРТ"));
        assert_eq!(events[1].kind, AnchorKind::MainRosterStart);
        assert_eq!(events[1].text, None);
    }

    #[test]
    fn test_detect_title_on_previous_page() {
        let pages = vec![
            make_page(0, &[("1", 100.0), ("АВИАЦИОННЫЕ ГОНКИ", 520.0)]),
            make_page(1, &[("Основной состав", 40.0)]),
        ];
        let events = detect_anchors(&pages, &PipelineConfig::default()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].page, 0);
        assert_eq!(events[0].text.as_deref(), Some("АВИАЦИОННЫЕ ГОНКИ"));
        assert_eq!(events[1].page, 1);
    }

    #[test]
    fn test_footer_is_not_a_title() {
        let mut first = make_page(0, &[("ГОНКИ", 500.0)]);
        first.items.push(make_item("15", 400.0, 558.0));
        let pages = vec![first, make_page(1, &[("Основной состав", 40.0)])];
        let events = detect_anchors(&pages, &PipelineConfig::default()).unwrap();
        assert_eq!(events[0].text.as_deref(), Some("ГОНКИ"));
    }

    #[test]
    fn test_marker_without_title_is_structural() {
        let pages = vec![make_page(0, &[("Основной состав", 40.0)])];
        let err = detect_anchors(&pages, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Structure { page: 1, .. }));
    }

    #[test]
    fn test_lookback_does_not_skip_empty_page() {
        let pages = vec![
            make_page(0, &[("СПОРТ", 100.0)]),
            make_page(1, &[]),
            make_page(2, &[("Основной состав", 40.0)]),
        ];
        assert!(detect_anchors(&pages, &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_youth_marker_detected() {
        let pages = vec![make_page(0, &[("Молодежный (резервный) состав", 178.0)])];
        let events = detect_anchors(&pages, &PipelineConfig::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AnchorKind::YouthRosterStart);
    }

    #[test]
    fn test_consolidate_groups_by_title() {
        let events = vec![
            event(0, AnchorKind::Title, Some("АВИАМОДЕЛЬНЫЙ СПОРТ")),
            event(0, AnchorKind::MainRosterStart, None),
            event(11, AnchorKind::YouthRosterStart, None),
            event(15, AnchorKind::Title, Some("АВИАЦИОННЫЕ ГОНКИ")),
            event(15, AnchorKind::MainRosterStart, None),
            event(16, AnchorKind::Title, Some("АВТОМОБИЛЬНЫЙ СПОРТ")),
            event(16, AnchorKind::MainRosterStart, None),
            event(40, AnchorKind::YouthRosterStart, None),
        ];
        let sports = consolidate(&events).unwrap();

        assert_eq!(sports.len(), 3);
        assert_eq!(sports[0].name_text, "АВИАМОДЕЛЬНЫЙ СПОРТ");
        assert_eq!(sports[0].youth_page, Some(11));
        assert_eq!(sports[1].youth_page, None);
        assert_eq!(sports[2].main_page, 16);
        assert_eq!(sports[2].youth_page, Some(40));
        for sport in &sports {
            assert!(sport.name_page <= sport.main_page);
            if let Some(youth) = sport.youth_page {
                assert!(sport.main_page <= youth);
            }
        }
    }

    #[test]
    fn test_marker_before_title_is_fatal() {
        let events = vec![
            event(0, AnchorKind::MainRosterStart, None),
            event(0, AnchorKind::Title, Some("СПОРТ")),
        ];
        assert!(matches!(
            consolidate(&events),
            Err(ExtractError::Structure { .. })
        ));
    }

    #[test]
    fn test_youth_before_main_is_fatal() {
        let events = vec![
            event(3, AnchorKind::Title, Some("СПОРТ")),
            event(3, AnchorKind::MainRosterStart, None),
            event(2, AnchorKind::YouthRosterStart, None),
        ];
        assert!(consolidate(&events).is_err());
    }

    #[test]
    fn test_empty_stream() {
        assert!(consolidate(&[]).unwrap().is_empty());
    }
}
