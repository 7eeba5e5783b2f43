//! PDF report of a finished interview.
//!
//! [`layout_report`] arranges the case overview, the four-box table (two rows
//! of balanced columns), the discussion points and the tensions into pages;
//! [`generate_report`] renders those pages with `printpdf`.

/// Page model and column balancer.
pub mod layout;
mod pdf;

pub use layout::{ColumnSection, Layout, Page, PageDecor, Segment};
pub use pdf::render_pdf;

use chrono::NaiveDate;

use crate::config::ReportConfig;
use crate::error::ReportResult;
use crate::interview::{SynthesisResult, TopicKey};

/// Title printed in every page header.
pub const REPORT_TITLE: &str = "EthicsNavi Clinical Ethics Four-Box Report";
/// Disclaimer printed in every page footer.
pub const DISCLAIMER: &str =
    "This tool supports decision-making only; final judgments rest with the care team.";

const BODY_SIZE: f32 = 10.0;
const BODY_LINE_HEIGHT: f32 = 6.0;

/// Lay out the report pages.
pub fn layout_report(case_overview: &str, synthesis: &SynthesisResult, created: NaiveDate) -> Layout {
    let mut layout = Layout::new(PageDecor {
        title: REPORT_TITLE.to_string(),
        date_line: format!("Created: {}", created.format("%Y-%m-%d")),
        footer: DISCLAIMER.to_string(),
    });

    layout.heading("Case Overview");
    layout.paragraph(case_overview, BODY_SIZE, BODY_LINE_HEIGHT);
    layout.gap(6.0);

    layout.heading("Jonsen's Four-Box Table");
    layout.gap(2.0);
    layout.columns(&[
        section(synthesis, TopicKey::MedicalIndications),
        section(synthesis, TopicKey::PatientPreferences),
    ]);
    layout.gap(layout::ROW_GAP);
    layout.columns(&[
        section(synthesis, TopicKey::Qol),
        section(synthesis, TopicKey::ContextualFeatures),
    ]);

    layout.add_page();
    layout.heading("Points for Discussion");
    for (i, point) in synthesis.discussion_points.iter().enumerate() {
        layout.paragraph(&format!("{}. {}", i + 1, point), BODY_SIZE, BODY_LINE_HEIGHT);
        layout.gap(2.0);
    }

    if !synthesis.tensions.is_empty() {
        layout.gap(4.0);
        layout.heading("Tensions Between Quadrants");
        for tension in &synthesis.tensions {
            layout.paragraph(&format!("\u{2022} {}", tension), BODY_SIZE, BODY_LINE_HEIGHT);
            layout.gap(2.0);
        }
    }

    layout
}

/// Render the report as PDF bytes.
pub fn generate_report(
    case_overview: &str,
    synthesis: &SynthesisResult,
    created: NaiveDate,
    config: &ReportConfig,
) -> ReportResult<Vec<u8>> {
    let layout = layout_report(case_overview, synthesis, created);
    render_pdf(REPORT_TITLE, layout.pages(), config.font_path.as_deref())
}

fn section(synthesis: &SynthesisResult, key: TopicKey) -> ColumnSection {
    let topic = key.topic();
    ColumnSection {
        title: format!("{}. {}", key.index().get() + 1, topic.short_title),
        fields: synthesis.entry(key).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn all_text(layout: &Layout) -> Vec<String> {
        layout
            .pages()
            .iter()
            .flat_map(|p| p.texts().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_column_titles_are_numbered() {
        let text = all_text(&layout_report("case", &SynthesisResult::default(), date()));
        for title in [
            "1. Medical Indications",
            "2. Patient Preferences",
            "3. QOL",
            "4. Contextual Features",
        ] {
            assert!(text.iter().any(|t| t == title), "missing {title}");
        }
    }

    #[test]
    fn test_discussion_points_start_on_new_page() {
        let mut synthesis = SynthesisResult::default();
        synthesis.discussion_points = vec!["First".to_string(), "Second".to_string()];
        let layout = layout_report("case", &synthesis, date());

        assert_eq!(layout.pages().len(), 2);
        let second: Vec<&str> = layout.pages()[1].texts().collect();
        assert!(second.contains(&"Points for Discussion"));
        assert!(second.contains(&"1. First"));
        assert!(second.contains(&"2. Second"));
        assert!(!second.contains(&"Tensions Between Quadrants"));
    }

    #[test]
    fn test_header_date_format() {
        let text = all_text(&layout_report("case", &SynthesisResult::default(), date()));
        assert!(text.iter().any(|t| t == "Created: 2026-10-16"));
    }
}
