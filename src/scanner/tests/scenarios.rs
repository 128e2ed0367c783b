//! End-to-end behaviour of a surface driven like a host would drive it

use instant::Instant;
use serde_json::json;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::scanner::interaction::{Key, KeyOutcome};
use crate::scanner::matcher::scan;
use crate::scanner::overlay::{render_html, Segment};
use crate::scanner::rules::{Affordance, Severity, TriggerIndex};
use crate::scanner::surface::{SurfaceEvent, TriggerSurface};

fn surface_with(doc: serde_json::Value) -> TriggerSurface {
    let mut surface = TriggerSurface::default();
    assert!(surface.load_configuration(&doc).is_empty());
    surface.drain_events();
    surface
}

fn validation_events(events: &[SurfaceEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SurfaceEvent::ValidationChange { .. }))
        .count()
}

fn client_doc() -> serde_json::Value {
    json!({
        "info": [{ "type": "match", "match": ["@client"], "handler": { "filter": true, "options": [
            { "label": "Blackrock", "on-select": { "display": "Blackrock" } },
            { "label": "Vanguard", "on-select": { "display": "Vanguard" } },
            { "label": "Someone else", "user-input": true, "placeholder": "Client name" }
        ] } }]
    })
}

// =============================================================================
// Scenario A: regex error rule
// =============================================================================

#[test]
fn test_email_regex_blocks_submit() {
    let mut surface = surface_with(json!({
        "error": [{ "type": "regex", "regex": ["[a-z]+@[a-z]+\\.[a-z]{2,}"],
                    "handler": { "message": "No emails", "block-submit": true } }]
    }));
    surface.set_text("email me at a@b.com please");

    let matches = surface.matches();
    assert_eq!(matches.len(), 1);
    assert_eq!((matches[0].start_col, matches[0].end_col), (12, 19));
    assert_eq!(matches[0].matched_text, "a@b.com");

    let summary = surface.summary().unwrap();
    assert!(summary.has_blocking_error);
    assert_eq!(summary.counts(), (true, 1, 0, 0));

    let segments = surface.segments();
    let annotation = segments[0][1].annotation().unwrap();
    assert_eq!(annotation.severity, Severity::Error);
    assert_eq!(annotation.affordance, Affordance::Tooltip);
    assert_eq!(annotation.tooltip_text.as_deref(), Some("No emails"));
}

// =============================================================================
// Scenario B: replace vs append commits
// =============================================================================

#[test]
fn test_display_option_replaces_trigger() {
    let mut surface = surface_with(client_doc());
    surface.set_text("ping @client now");
    assert_eq!(surface.matches().len(), 1);

    // Auto-opened with the first option highlighted
    assert_eq!(surface.session().active_affordance, Affordance::Menu);
    assert!(matches!(surface.key(Key::Enter), KeyOutcome::Commit(_)));
    assert_eq!(surface.text(), "ping Blackrock now");
}

#[test]
fn test_user_input_option_appends_with_separator() {
    let mut surface = surface_with(client_doc());
    surface.set_text("ping @client now");

    surface.set_filter("someone");
    surface.set_freeform_text("Blackrock");
    assert!(matches!(surface.key(Key::Enter), KeyOutcome::Commit(_)));
    assert_eq!(surface.text(), "ping @client/Blackrock now");

    // The resolved trigger still highlights but does not reopen its menu
    assert_eq!(surface.matches().len(), 1);
    assert!(surface.matches()[0].is_resolved());
    assert_eq!(surface.session().active_affordance, Affordance::None);
}

#[test]
fn test_enter_in_freeform_input_appends_typed_value() {
    let mut surface = surface_with(client_doc());
    surface.set_text("ping @client now");

    surface.set_freeform_text("Acme");
    assert!(matches!(surface.key(Key::Enter), KeyOutcome::Commit(_)));
    assert_eq!(surface.text(), "ping @client/Acme now");
}

#[test]
fn test_custom_separator() {
    let mut surface = TriggerSurface::new(EngineConfig {
        separator: ':',
        ..EngineConfig::default()
    });
    surface.load_configuration(&client_doc());
    surface.set_text("@client");
    surface.set_freeform_text("Acme");
    surface.choose(2);

    assert_eq!(surface.text(), "@client:Acme");
    assert_eq!(surface.matches()[0].resolution.as_deref(), Some("Acme"));
}

// =============================================================================
// Scenario C: count-based validation reporting
// =============================================================================

#[test]
fn test_same_count_substitution_not_reported() {
    let mut surface = surface_with(json!({
        "error": [{ "type": "match", "match": ["foo", "bar"] }]
    }));

    surface.set_text("foo");
    assert_eq!(validation_events(&surface.drain_events()), 1);

    surface.set_text("bar");
    assert_eq!(validation_events(&surface.drain_events()), 0);

    surface.set_text("nothing");
    let events = surface.drain_events();
    assert_eq!(validation_events(&events), 1);
    assert!(matches!(
        &events[0],
        SurfaceEvent::ValidationChange { summary } if summary.errors.is_empty()
    ));
}

#[test]
fn test_identity_mode_reports_substitution() {
    let mut surface = TriggerSurface::new(EngineConfig {
        change_detection: crate::config::ChangeDetection::Identity,
        ..EngineConfig::default()
    });
    surface.load_configuration(&json!({
        "error": [{ "type": "match", "match": ["foo", "bar"] }]
    }));
    surface.set_text("foo");
    surface.drain_events();

    surface.set_text("bar");
    assert_eq!(validation_events(&surface.drain_events()), 1);
}

// =============================================================================
// Scenario D: empty filter result
// =============================================================================

#[test]
fn test_enter_on_empty_filter_is_noop() {
    let mut surface = surface_with(client_doc());
    surface.set_text("ping @client now");
    surface.drain_events();

    surface.set_filter("zzz");
    assert!(surface.session().option_list.is_empty());
    assert_eq!(surface.key(Key::Enter), KeyOutcome::Consumed);

    assert_eq!(surface.text(), "ping @client now");
    assert_eq!(surface.session().active_affordance, Affordance::Menu);
    assert!(!surface.has_events());
}

// =============================================================================
// Scenario E: edits cancel pending tooltips
// =============================================================================

#[test]
fn test_text_change_cancels_pending_tooltip() {
    let mut surface = surface_with(json!({
        "warning": [{ "type": "match", "match": ["maybe"], "handler": { "message": "Be precise" } }]
    }));
    let delay = surface.config().tooltip_delay();
    let t0 = Instant::now();

    surface.set_text("maybe");
    assert!(surface.pointer_enter(0, t0).is_some());

    surface.set_text("maybe ");
    surface.set_text("maybe n");
    assert!(surface.next_timer_due().is_none());
    assert_eq!(surface.tick(t0 + delay + Duration::from_millis(1)), None);
    assert_eq!(surface.session().active_affordance, Affordance::None);

    // A fresh hover after the edits still works
    let t1 = t0 + delay * 2;
    let due = surface.pointer_enter(0, t1).unwrap();
    assert_eq!(surface.tick(due), Some(0));
}

// =============================================================================
// Scanner behaviour
// =============================================================================

#[test]
fn test_longer_rule_wins_overlap() {
    let index = TriggerIndex::compile(&json!({
        "info": [{ "type": "match", "match": ["york"] }],
        "warning": [{ "type": "match", "match": ["new york"] }]
    }))
    .index;

    let matches = scan(&index, "I love New York");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].matched_text, "New York");
    assert_eq!(index.rule(matches[0].rule_id).unwrap().severity(), Severity::Warning);
}

#[test]
fn test_word_boundaries() {
    let index = TriggerIndex::compile(&json!({ "info": [{ "type": "match", "match": ["test"] }] })).index;

    assert!(scan(&index, "testing").is_empty());
    assert_eq!(scan(&index, "a test").len(), 1);
    assert_eq!(scan(&index, "test/ok").len(), 1);
    assert!(scan(&index, "ok/test").is_empty());
}

#[test]
fn test_multiline_render() {
    let mut surface = surface_with(json!({
        "warning": [{ "type": "match", "match": ["<b>"] }]
    }));
    surface.set_text("a <b> & c\n\nend");

    let segments = surface.segments();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1], vec![Segment::Plain { text: String::new() }]);
    assert_eq!(surface.render_html(), render_html(&segments));

    let html = surface.render_html();
    assert!(html.contains("&lt;b&gt;</span> &amp; c"));
    assert!(html.contains("<div class=\"tl-line\"><br></div>"));
}

#[test]
fn test_reload_replaces_rules() {
    let mut surface = surface_with(json!({ "info": [{ "type": "match", "match": ["alpha"] }] }));
    surface.set_text("alpha beta");
    assert_eq!(surface.matches()[0].matched_text, "alpha");

    surface.load_configuration(&json!({ "info": [{ "type": "match", "match": ["beta"] }] }));
    assert_eq!(surface.matches().len(), 1);
    assert_eq!(surface.matches()[0].matched_text, "beta");
    assert_eq!(validation_events(&surface.drain_events()), 2);
}
