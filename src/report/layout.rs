//! Report layout planning
//!
//! [`plan`] turns a submission into a list of drawing items per page. It is
//! pure and deterministic so the layout can be inspected in tests; the PDF
//! backend only paints what it is given.
//!
//! All coordinates are PDF points with the origin at the top-left of the
//! page and y growing downwards.

use chrono::NaiveDate;

use crate::config::{self, PROBLEM_LABELS, ShapeColor};
use crate::domain::{PatientInfo, Recommendations, SlotId, Submission};

/// A4 width in points
pub const PAGE_WIDTH: f32 = 595.28;
/// A4 height in points
pub const PAGE_HEIGHT: f32 = 841.89;
/// Margin used for overflow pages
pub const PAGE_MARGIN: f32 = 40.0;

pub const HEADER_HEIGHT: f32 = 120.0;
pub const HEADER_COLOR: &str = "#A084E8";

pub const PATIENT_BOX_Y: f32 = 140.0;
pub const PATIENT_BOX_HEIGHT: f32 = 50.0;

pub const PANEL_Y: f32 = PATIENT_BOX_Y + 80.0;
pub const PANEL_HEIGHT: f32 = 340.0;

pub const CELL_WIDTH: f32 = 160.0;
pub const CELL_HEIGHT: f32 = 140.0;
pub const CELL_SPACING: f32 = 20.0;
pub const CELL_Y: f32 = PANEL_Y + 60.0;
/// Gap between the cell border and the picture
pub const CELL_INSET: f32 = 4.0;

pub const PILL_WIDTH: f32 = 90.0;
pub const PILL_HEIGHT: f32 = 22.0;
pub const PILL_COLOR: &str = "#EF4444";

pub const LEGEND_Y: f32 = CELL_Y + CELL_HEIGHT + 70.0;
pub const LEGEND_COLUMNS: usize = 3;
pub const LEGEND_ROW_HEIGHT: f32 = 25.0;

pub const RECOMMENDATIONS_Y: f32 = PANEL_Y + 370.0;
const RECOMMENDATION_TEXT_X: f32 = 200.0;
const RECOMMENDATION_MIN_HEIGHT: f32 = 30.0;
const BODY_SIZE: f32 = 12.0;
const LINE_HEIGHT: f32 = BODY_SIZE * 1.25;

/// Average glyph advance of Helvetica as a fraction of the font size
const AVG_GLYPH_WIDTH: f32 = 0.5;
const AVG_BOLD_GLYPH_WIDTH: f32 = 0.56;

/// An axis-aligned box on the page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Frame {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn inset(&self, by: f32) -> Frame {
        Frame::new(
            self.x + by,
            self.y + by,
            (self.width - by * 2.0).max(0.0),
            (self.height - by * 2.0).max(0.0),
        )
    }
}

/// Which stored image a report cell shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSource {
    Annotated,
    Original,
}

/// One thing to paint
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    /// Filled box, optionally with rounded corners and an outline
    Box {
        frame: Frame,
        radius: f32,
        fill: Option<ShapeColor>,
        stroke: Option<(ShapeColor, f32)>,
    },
    /// Single line of text; `y` is the top of the line
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: ShapeColor,
    },
    /// Photo of one slot, fitted into `frame`
    Image {
        slot: SlotId,
        frame: Frame,
        source: ImageSource,
    },
}

/// Whether each slot's image could be fetched and decoded
pub type Availability = [bool; 3];

/// Everything on every page, in paint order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportLayout {
    pub pages: Vec<Vec<Item>>,
}

impl ReportLayout {
    /// All items across pages
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.pages.iter().flatten()
    }

    /// Text of every text item, in paint order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items().filter_map(|item| match item {
            Item::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

fn hex(color: &str) -> ShapeColor {
    ShapeColor::from_hex(color).unwrap_or(config::FALLBACK_COLOR)
}

fn white() -> ShapeColor {
    hex("#FFFFFF")
}

/// Rough rendered width of a line of Helvetica text
pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let glyph = if bold {
        AVG_BOLD_GLYPH_WIDTH
    } else {
        AVG_GLYPH_WIDTH
    };
    text.chars().count() as f32 * size * glyph
}

/// Greedy word wrap to at most `max_chars` per line
///
/// Explicit newlines start a new line; words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let current_len = current.chars().count();
            if current_len + word.chars().count() + 1 > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Which image a slot's cell shows: annotated if present, else original
pub fn cell_source(submission: &Submission, slot: SlotId) -> ImageSource {
    if submission.slot(slot).annotated.is_some() {
        ImageSource::Annotated
    } else {
        ImageSource::Original
    }
}

/// Non-blank recommendations: fixed labels in legend order, then others alphabetically
pub fn ordered_recommendations(recommendations: &Recommendations) -> Vec<(&str, &str)> {
    let mut ordered: Vec<(&str, &str)> = PROBLEM_LABELS
        .iter()
        .filter_map(|(label, _)| {
            recommendations
                .get_key_value(*label)
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
        .collect();
    ordered.extend(
        recommendations
            .iter()
            .filter(|(label, _)| !config::is_known_label(label))
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );
    ordered.retain(|(_, text)| !text.trim().is_empty());
    ordered
}

struct Builder {
    pages: Vec<Vec<Item>>,
}

impl Builder {
    fn push(&mut self, item: Item) {
        if let Some(page) = self.pages.last_mut() {
            page.push(item);
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, bold: bool, color: ShapeColor) {
        self.push(Item::Text {
            text: text.into(),
            x,
            y,
            size,
            bold,
            color,
        });
    }

    /// Text centered horizontally within [x, x + width]
    fn centered(&mut self, text: &str, x: f32, width: f32, y: f32, size: f32, bold: bool, color: ShapeColor) {
        let w = text_width(text, size, bold);
        self.text(text, x + ((width - w) / 2.0).max(0.0), y, size, bold, color);
    }

    fn square(&mut self, x: f32, y: f32, color: ShapeColor) {
        self.push(Item::Box {
            frame: Frame::new(x, y, 16.0, 16.0),
            radius: 0.0,
            fill: Some(color),
            stroke: None,
        });
    }
}

/// Lay out the report
pub fn plan(
    submission: &Submission,
    recommendations: &Recommendations,
    date: NaiveDate,
    title: &str,
    available: Availability,
) -> ReportLayout {
    let mut b = Builder { pages: Vec::new() };
    b.new_page();

    header(&mut b, title);
    patient_box(&mut b, &submission.patient, date);
    screening_panel(&mut b, submission, available);
    legend(&mut b);
    recommendations_section(&mut b, recommendations);

    ReportLayout { pages: b.pages }
}

fn header(b: &mut Builder, title: &str) {
    b.push(Item::Box {
        frame: Frame::new(0.0, 0.0, PAGE_WIDTH, HEADER_HEIGHT),
        radius: 0.0,
        fill: Some(hex(HEADER_COLOR)),
        stroke: None,
    });
    // Two centered lines at 30pt
    let mut y = 25.0;
    for line in wrap_text(title, 22).into_iter().take(2) {
        b.centered(&line, 0.0, PAGE_WIDTH, y, 30.0, true, white());
        y += 40.0;
    }
}

fn patient_box(b: &mut Builder, patient: &PatientInfo, date: NaiveDate) {
    b.push(Item::Box {
        frame: Frame::new(40.0, PATIENT_BOX_Y, PAGE_WIDTH - 80.0, PATIENT_BOX_HEIGHT),
        radius: 8.0,
        fill: Some(white()),
        stroke: Some((hex("#E5E7EB"), 1.0)),
    });
    let y = PATIENT_BOX_Y + 20.0;
    let black = hex("#000000");
    b.text(format!("Name: {}", ellipsize(&patient.name, 22)), 60.0, y, 13.0, true, black);
    b.text(format!("Email: {}", ellipsize(&patient.email, 26)), 240.0, y, 13.0, true, black);
    b.text(format!("Date: {}", date.format("%d/%m/%Y")), 450.0, y, 13.0, true, black);
}

fn screening_panel(b: &mut Builder, submission: &Submission, available: Availability) {
    b.push(Item::Box {
        frame: Frame::new(20.0, PANEL_Y, PAGE_WIDTH - 40.0, PANEL_HEIGHT),
        radius: 12.0,
        fill: Some(hex("#F3F0FF")),
        stroke: Some((hex("#E0E7FF"), 1.0)),
    });
    b.text("SCREENING REPORT:", 60.0, PANEL_Y + 20.0, 16.0, true, hex("#222222"));

    let total = CELL_WIDTH * 3.0 + CELL_SPACING * 2.0;
    let mut x = (PAGE_WIDTH - total) / 2.0;
    for slot in SlotId::ALL {
        let cell = Frame::new(x, CELL_Y, CELL_WIDTH, CELL_HEIGHT);
        if available[slot.index()] {
            b.push(Item::Image {
                slot,
                frame: cell.inset(CELL_INSET),
                source: cell_source(submission, slot),
            });
        } else {
            b.centered(
                "Image not available",
                x,
                CELL_WIDTH,
                CELL_Y + CELL_HEIGHT / 2.0 - 6.0,
                12.0,
                false,
                hex("#6B7280"),
            );
        }
        b.push(Item::Box {
            frame: cell,
            radius: 8.0,
            fill: None,
            stroke: Some((hex("#D1D5DB"), 2.0)),
        });

        let pill = Frame::new(
            x + (CELL_WIDTH - PILL_WIDTH) / 2.0,
            CELL_Y + CELL_HEIGHT + 15.0,
            PILL_WIDTH,
            PILL_HEIGHT,
        );
        b.push(Item::Box {
            frame: pill,
            radius: PILL_HEIGHT / 2.0,
            fill: Some(hex(PILL_COLOR)),
            stroke: None,
        });
        b.centered(slot.label(), pill.x, pill.width, pill.y + 5.0, 11.0, true, white());

        x += CELL_WIDTH + CELL_SPACING;
    }
}

fn legend(b: &mut Builder) {
    let column_width = (PAGE_WIDTH - 160.0) / LEGEND_COLUMNS as f32;
    for (idx, (label, color)) in PROBLEM_LABELS.iter().enumerate() {
        let row = idx / LEGEND_COLUMNS;
        let col = idx % LEGEND_COLUMNS;
        let lx = 80.0 + col as f32 * column_width;
        let ly = LEGEND_Y + row as f32 * LEGEND_ROW_HEIGHT;
        b.square(lx, ly + 4.0, hex(color));
        b.text(*label, lx + 25.0, ly + 6.0, 10.0, false, hex("#222222"));
    }
}

/// Start an overflow page with the continued heading; returns the next free y
fn continued_page(b: &mut Builder, heading: ShapeColor) -> f32 {
    b.new_page();
    b.text(
        "TREATMENT RECOMMENDATIONS (continued):",
        40.0,
        PAGE_MARGIN,
        16.0,
        true,
        heading,
    );
    PAGE_MARGIN + 35.0
}

fn recommendations_section(b: &mut Builder, recommendations: &Recommendations) {
    let heading = hex("#1E40AF");
    let ink = hex("#222222");
    let bottom = PAGE_HEIGHT - PAGE_MARGIN;
    let page_room = bottom - (PAGE_MARGIN + 35.0);
    let text_width_pts = PAGE_WIDTH - 240.0;
    let max_chars = (text_width_pts / (BODY_SIZE * AVG_GLYPH_WIDTH)) as usize;

    let mut y = RECOMMENDATIONS_Y;
    b.text("TREATMENT RECOMMENDATIONS:", 40.0, y, 16.0, true, heading);
    y += 35.0;

    for (label, text) in ordered_recommendations(recommendations) {
        let lines = wrap_text(text, max_chars);
        let height = (lines.len() as f32 * LINE_HEIGHT + 15.0).max(RECOMMENDATION_MIN_HEIGHT);

        // Entries that fit on one page move whole; longer ones split by line
        let fits_here = y + height <= bottom;
        let first_line_fits = y + 4.0 + LINE_HEIGHT <= bottom;
        if (!fits_here && height <= page_room) || !first_line_fits {
            y = continued_page(b, heading);
        }

        let start = y;
        let mut split = false;
        b.square(40.0, y + 2.0, config::label_color(label));
        b.text(format!("{label}:"), 65.0, y + 4.0, BODY_SIZE, true, ink);
        let mut line_y = y + 4.0;
        for line in lines {
            if line_y + LINE_HEIGHT > bottom {
                line_y = continued_page(b, heading);
                split = true;
            }
            b.text(line, RECOMMENDATION_TEXT_X, line_y, BODY_SIZE, false, ink);
            line_y += LINE_HEIGHT;
        }
        y = if split {
            line_y + 11.0
        } else {
            (line_y + 11.0).max(start + RECOMMENDATION_MIN_HEIGHT)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetRef, SlotImages};
    use chrono::{TimeZone, Utc};

    fn asset(id: &str) -> AssetRef {
        AssetRef {
            url: format!("memory://images/{id}"),
            id: id.to_string(),
        }
    }

    fn submission() -> Submission {
        let mut submission = Submission::new(
            "s1",
            PatientInfo {
                name: "Meera Nair".to_string(),
                email: "meera@example.com".to_string(),
                note: None,
            },
            SlotImages::new(asset("u"), asset("f"), asset("l")),
            Utc.with_ymd_and_hms(2025, 9, 9, 10, 0, 0).unwrap(),
        );
        submission.images.get_mut(SlotId::FrontTeeth).annotated = Some(asset("fa"));
        submission
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 9).unwrap()
    }

    fn recs(entries: &[(&str, &str)]) -> Recommendations {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_cells_prefer_annotated_image() {
        let layout = plan(&submission(), &recs(&[]), date(), "Oral Health Screening Report", [true; 3]);
        let cells: Vec<(SlotId, ImageSource)> = layout
            .items()
            .filter_map(|item| match item {
                Item::Image { slot, source, .. } => Some((*slot, *source)),
                _ => None,
            })
            .collect();
        assert_eq!(
            cells,
            vec![
                (SlotId::UpperTeeth, ImageSource::Original),
                (SlotId::FrontTeeth, ImageSource::Annotated),
                (SlotId::LowerTeeth, ImageSource::Original),
            ]
        );
    }

    #[test]
    fn test_cells_are_centered_as_a_group() {
        let layout = plan(&submission(), &recs(&[]), date(), "T", [true; 3]);
        let frames: Vec<Frame> = layout
            .items()
            .filter_map(|item| match item {
                Item::Image { frame, .. } => Some(*frame),
                _ => None,
            })
            .collect();
        let left = frames[0].x - CELL_INSET;
        let right = frames[2].x + frames[2].width + CELL_INSET;
        assert!((left - (PAGE_WIDTH - right)).abs() < 1e-3);
        assert!((frames[1].x - frames[0].x - (CELL_WIDTH + CELL_SPACING)).abs() < 1e-3);
    }

    #[test]
    fn test_unavailable_cell_shows_placeholder() {
        let layout = plan(&submission(), &recs(&[]), date(), "T", [true, false, true]);
        assert_eq!(
            layout.texts().filter(|t| *t == "Image not available").count(),
            1
        );
        assert_eq!(
            layout
                .items()
                .filter(|item| matches!(item, Item::Image { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_legend_has_six_entries() {
        let layout = plan(&submission(), &recs(&[]), date(), "T", [true; 3]);
        let texts: Vec<&str> = layout.texts().collect();
        for (label, _) in PROBLEM_LABELS {
            assert_eq!(texts.iter().filter(|t| **t == label).count(), 1);
        }
    }

    #[test]
    fn test_patient_box_and_title() {
        let layout = plan(&submission(), &recs(&[]), date(), "Oral Health Screening Report", [true; 3]);
        let texts: Vec<&str> = layout.texts().collect();
        assert_eq!(texts[0], "Oral Health Screening");
        assert_eq!(texts[1], "Report");
        assert!(texts.contains(&"Name: Meera Nair"));
        assert!(texts.contains(&"Email: meera@example.com"));
        assert!(texts.contains(&"Date: 09/09/2025"));
    }

    #[test]
    fn test_recommendation_order_and_blank_skipped() {
        let r = recs(&[
            ("Zebra stripes", "custom"),
            ("Crowns", "Replace crown"),
            ("Stains", "Polish"),
            ("Attrition", "   "),
            ("Alpha", "first custom"),
        ]);
        let ordered: Vec<&str> = ordered_recommendations(&r).into_iter().map(|(l, _)| l).collect();
        assert_eq!(ordered, vec!["Stains", "Crowns", "Alpha", "Zebra stripes"]);
    }

    #[test]
    fn test_recommendations_paginate() {
        let long = "Brush twice daily with fluoride toothpaste and floss every evening. ".repeat(6);
        let entries: Vec<(String, String)> = (0..12)
            .map(|i| (format!("Finding {i:02}"), long.clone()))
            .collect();
        let r: Recommendations = entries.into_iter().collect();
        let layout = plan(&submission(), &r, date(), "T", [true; 3]);

        assert!(layout.pages.len() > 1);
        assert!(
            layout
                .texts()
                .any(|t| t == "TREATMENT RECOMMENDATIONS (continued):")
        );
        for page in &layout.pages {
            for item in page {
                if let Item::Text { y, size, .. } = item {
                    assert!(y + size <= PAGE_HEIGHT - PAGE_MARGIN + 1e-3);
                }
            }
        }
        assert_eq!(layout.texts().filter(|t| t.starts_with("Finding")).count(), 12);
    }

    #[test]
    fn test_oversized_entry_splits_across_pages() {
        let essay = "Rinse with chlorhexidine after meals and review in two weeks. ".repeat(80);
        let r = recs(&[("Stains", essay.as_str())]);
        let layout = plan(&submission(), &r, date(), "T", [true; 3]);

        assert!(layout.pages.len() > 2);
        for page in &layout.pages[1..] {
            assert!(page.iter().any(|item| matches!(
                item,
                Item::Text { text, .. } if text == "TREATMENT RECOMMENDATIONS (continued):"
            )));
        }
        for page in &layout.pages {
            for item in page {
                if let Item::Text { y, size, .. } = item {
                    assert!(y + size <= PAGE_HEIGHT - PAGE_MARGIN + 1e-3);
                }
            }
        }
        // Every wrapped line is placed exactly once
        let max_chars = ((PAGE_WIDTH - 240.0) / (BODY_SIZE * AVG_GLYPH_WIDTH)) as usize;
        let expected = wrap_text(&essay, max_chars).len();
        let placed = layout
            .pages
            .iter()
            .flatten()
            .filter(|item| matches!(item, Item::Text { x, .. } if *x == RECOMMENDATION_TEXT_X))
            .count();
        assert_eq!(placed, expected);
        assert_eq!(layout.texts().filter(|t| *t == "Stains:").count(), 1);
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
        assert_eq!(wrap_text("line one\nline two", 40), vec!["line one", "line two"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }
}
