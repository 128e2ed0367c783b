//! OverlayProjector: Match list -> renderable line segments
//!
//! Splits each line into plain and annotated runs. Concatenating the segment
//! texts of a line always gives back the line, so an overlay drawn from the
//! segments stays aligned char-for-char with the raw text underneath.
//!
//! Annotated segments carry an [`AnnotationView`]: everything the styling
//! layer needs (severity, treatment, affordance, tooltip, options) computed
//! from the rule, never looked up at render time.

use serde::Serialize;

use crate::scanner::matcher::{ColumnMap, Match};
use crate::scanner::rules::{
    Affordance, HandlerKind, Link, OptionSpec, RuleId, RulePayload, Severity, TriggerIndex,
    TriggerRule,
};

// =============================================================================
// Types
// =============================================================================

/// Render-facing description of one annotated match
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AnnotationView {
    pub match_index: usize,
    pub rule_id: RuleId,
    pub match_text: String,
    pub severity: Severity,
    pub handler: HandlerKind,
    pub affordance: Affordance,
    /// Styling token, e.g. `warn-warning` or `not-allowed`
    pub treatment: String,
    pub tooltip_text: Option<String>,
    pub tooltip_detail: Option<String>,
    /// Shown above the options of a menu
    pub menu_header: Option<String>,
    pub options: Vec<OptionSpec>,
    pub filterable: bool,
    pub link: Option<Link>,
    pub resolution: Option<String>,
}

/// A contiguous run of one line
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Plain {
        text: String,
    },
    Annotated {
        text: String,
        annotation: AnnotationView,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain { text } | Segment::Annotated { text, .. } => text,
        }
    }

    pub fn annotation(&self) -> Option<&AnnotationView> {
        match self {
            Segment::Plain { .. } => None,
            Segment::Annotated { annotation, .. } => Some(annotation),
        }
    }
}

// =============================================================================
// Render data per handler variant
// =============================================================================

impl HandlerKind {
    /// Build the render data of a match for this handler variant
    pub fn render_data(&self, rule: &TriggerRule, m: &Match, match_index: usize) -> AnnotationView {
        let payload = rule.payload();
        let view = AnnotationView::base(payload, rule.id, m, match_index);
        match self {
            HandlerKind::NotAllowed => not_allowed_view(view),
            HandlerKind::Warn => warn_view(view),
            HandlerKind::SelectOne => select_one_view(view),
            HandlerKind::SelectOneAndWarn => select_one_and_warn_view(view, payload),
            HandlerKind::MenuOnly => menu_only_view(view),
            HandlerKind::MenuWithLink => menu_with_link_view(view, payload),
        }
    }
}

impl AnnotationView {
    fn base(payload: &RulePayload, rule_id: RuleId, m: &Match, match_index: usize) -> Self {
        let affordance = payload.affordance();
        let options = match affordance {
            Affordance::Menu => payload.options.to_vec(),
            _ => Vec::new(),
        };
        let tooltip_text = match affordance {
            Affordance::Tooltip => Some(payload.description.clone()),
            _ => None,
        };
        Self {
            match_index,
            rule_id,
            match_text: m.matched_text.clone(),
            severity: payload.severity,
            handler: payload.handler,
            affordance,
            treatment: payload.severity.as_str().to_string(),
            tooltip_detail: tooltip_text.as_ref().and(payload.detail.clone()),
            tooltip_text,
            menu_header: None,
            options,
            filterable: payload.filterable,
            link: None,
            resolution: m.resolution.clone(),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

fn not_allowed_view(mut view: AnnotationView) -> AnnotationView {
    view.treatment = "not-allowed".to_string();
    view
}

fn warn_view(mut view: AnnotationView) -> AnnotationView {
    view.treatment = format!("warn-{}", view.severity.as_str());
    view
}

fn select_one_view(mut view: AnnotationView) -> AnnotationView {
    view.treatment = format!("select-{}", view.severity.as_str());
    view
}

fn select_one_and_warn_view(mut view: AnnotationView, payload: &RulePayload) -> AnnotationView {
    view.treatment = format!("select-warn-{}", view.severity.as_str());
    if view.affordance == Affordance::Menu {
        view.menu_header = non_empty(&payload.description);
    }
    view
}

fn menu_only_view(mut view: AnnotationView) -> AnnotationView {
    view.treatment = "menu".to_string();
    view
}

fn menu_with_link_view(mut view: AnnotationView, payload: &RulePayload) -> AnnotationView {
    view.treatment = format!("menu-link-{}", view.severity.as_str());
    if view.affordance == Affordance::Menu {
        view.menu_header = non_empty(&payload.description);
        view.link = payload.link.clone();
    }
    view
}

// =============================================================================
// OverlayProjector
// =============================================================================

#[derive(Clone, Copy)]
pub struct OverlayProjector<'a> {
    index: &'a TriggerIndex,
}

impl<'a> OverlayProjector<'a> {
    pub fn new(index: &'a TriggerIndex) -> Self {
        Self { index }
    }

    /// One segment list per line of `text`
    pub fn project(&self, text: &str, matches: &[Match]) -> Vec<Vec<Segment>> {
        let mut cursor = 0;
        text.split('\n')
            .enumerate()
            .map(|(line_index, line)| {
                while cursor < matches.len() && matches[cursor].line_index < line_index {
                    cursor += 1;
                }
                let start = cursor;
                while cursor < matches.len() && matches[cursor].line_index == line_index {
                    cursor += 1;
                }
                self.project_line(line, &matches[start..cursor], start)
            })
            .collect()
    }

    fn project_line(&self, line: &str, line_matches: &[Match], first_index: usize) -> Vec<Segment> {
        if line.is_empty() {
            return vec![Segment::Plain {
                text: String::new(),
            }];
        }

        let columns = ColumnMap::new(line);
        let mut segments = Vec::new();
        let mut col = 0;

        for (offset, m) in line_matches.iter().enumerate() {
            // Stale or out-of-order matches cannot be placed without breaking alignment
            if m.start_col < col || m.end_col > columns.char_len() || m.start_col >= m.end_col {
                continue;
            }
            let Some(rule) = self.index.rule(m.rule_id) else {
                continue;
            };

            if m.start_col > col {
                segments.push(Segment::Plain {
                    text: line[columns.byte(col)..columns.byte(m.start_col)].to_string(),
                });
            }
            let annotation = rule.payload().handler.render_data(rule, m, first_index + offset);
            segments.push(Segment::Annotated {
                text: line[columns.byte(m.start_col)..columns.byte(m.end_col)].to_string(),
                annotation,
            });
            col = m.end_col;
        }

        if col < columns.char_len() {
            segments.push(Segment::Plain {
                text: line[columns.byte(col)..].to_string(),
            });
        }
        segments
    }
}

/// Project with the index a scan was produced from
pub fn project(index: &TriggerIndex, text: &str, matches: &[Match]) -> Vec<Vec<Segment>> {
    OverlayProjector::new(index).project(text, matches)
}

// =============================================================================
// HTML rendering
// =============================================================================

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

/// Render projected lines as HTML for a mirror element behind the textarea.
///
/// One `<div>` per line; an empty line holds a `<br>` so it keeps its height.
pub fn render_html(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    for segments in lines {
        out.push_str("<div class=\"tl-line\">");
        if segments.iter().all(|s| s.text().is_empty()) {
            out.push_str("<br>");
        }
        for segment in segments {
            match segment {
                Segment::Plain { text } => escape_html(text, &mut out),
                Segment::Annotated { text, annotation } => {
                    out.push_str(&format!(
                        "<span class=\"tl-trigger tl-{}\" data-match=\"{}\" data-severity=\"{}\" data-affordance=\"{}\">",
                        annotation.treatment,
                        annotation.match_index,
                        annotation.severity.as_str(),
                        annotation.affordance.as_str(),
                    ));
                    escape_html(text, &mut out);
                    out.push_str("</span>");
                }
            }
        }
        out.push_str("</div>");
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
