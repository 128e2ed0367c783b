//! TriggerSurface: One annotated editing surface
//!
//! # Design Principles
//! 1. Explicit instance: the host constructs it, owns it and tears it down
//! 2. Every text change is a full rescan; the match list is replaced, never patched
//! 3. Configuration gating: Pending -> Loaded. Scans yield nothing while Pending
//! 4. Host notifications are queued as [`SurfaceEvent`]s and drained by the host
//!
//! # Usage
//! ```rust
//! use textlens::scanner::TriggerSurface;
//!
//! let mut surface = TriggerSurface::default();
//! surface.load_configuration_str(r#"{"info":[{"type":"match","match":["@client"]}]}"#).unwrap();
//! surface.set_text("ping @client now");
//! assert_eq!(surface.matches().len(), 1);
//! ```

use instant::Instant;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::scanner::edit::{Selection, TextEdit};
use crate::scanner::interaction::{
    Commit, InteractionSession, InteractionStateMachine, Key, KeyOutcome, MenuFocus,
};
use crate::scanner::matcher::{Match, Scanner};
use crate::scanner::overlay::{render_html, OverlayProjector, Segment};
use crate::scanner::placement::{place_affordance, Placement, Rect, Size};
use crate::scanner::rules::{
    Affordance, ConfigError, IndexStats, OptionSpec, RuleId, Severity, TriggerIndex,
};
use crate::scanner::validation::{ValidationAggregator, ValidationSummary};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigState {
    /// No configuration resolved yet
    Pending,
    Loaded,
}

/// Host-facing view of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_index: usize,
    pub rule_id: RuleId,
    pub line_index: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub match_text: String,
    pub severity: Severity,
    pub description: String,
    pub affordance: Affordance,
    pub category: Option<String>,
    pub resolution: Option<String>,
}

/// Notifications for the host, in the order they happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// Pointer entered an annotated segment
    Hover { snapshot: MatchSnapshot },
    /// An option was committed for a match
    Select {
        snapshot: MatchSnapshot,
        option: Option<OptionSpec>,
    },
    /// The validation summary changed
    ValidationChange { summary: ValidationSummary },
    /// A commit rewrote the text; the host must write it back to its field
    TextReplaced { text: String, selection: Selection },
}

/// What a commit did to the text
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Applied(TextEdit),
    /// The option carries no replacement
    NoEdit,
    /// The anchor span no longer holds the matched text
    Discarded,
}

/// Menu trigger already seen: rule and whole-text char span, carried across edits
type MenuKey = (RuleId, usize, usize);

// =============================================================================
// TriggerSurface
// =============================================================================

pub struct TriggerSurface {
    config: EngineConfig,
    state: ConfigState,
    index: Arc<TriggerIndex>,
    text: String,
    selection: Selection,
    matches: Vec<Match>,
    interaction: InteractionStateMachine,
    aggregator: ValidationAggregator,
    menu_keys: HashSet<MenuKey>,
    events: VecDeque<SurfaceEvent>,
}

impl Default for TriggerSurface {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TriggerSurface {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            interaction: InteractionStateMachine::new(config.tooltip_delay()),
            aggregator: ValidationAggregator::new(config.change_detection),
            config,
            state: ConfigState::Pending,
            index: Arc::new(TriggerIndex::empty()),
            text: String::new(),
            selection: Selection::default(),
            matches: Vec::new(),
            menu_keys: HashSet::new(),
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True once a configuration has been loaded
    pub fn is_ready(&self) -> bool {
        self.state == ConfigState::Loaded
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            ConfigState::Pending => "pending",
            ConfigState::Loaded => "loaded",
        }
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    /// Swap in a compiled index and rescan. Returns the absorbed problems.
    pub fn load_configuration(&mut self, doc: &Value) -> Vec<ConfigError> {
        let report = TriggerIndex::compile(doc);
        self.install(report.index);
        report.warnings
    }

    /// Parse and load a JSON document. Invalid JSON keeps the current configuration.
    pub fn load_configuration_str(&mut self, json: &str) -> Result<Vec<ConfigError>, ConfigError> {
        let report = TriggerIndex::from_json_str(json)?;
        self.install(report.index);
        Ok(report.warnings)
    }

    fn install(&mut self, index: TriggerIndex) {
        self.index = Arc::new(index);
        self.state = ConfigState::Loaded;
        self.aggregator.reset();
        self.menu_keys.clear();
        self.rescan();
    }

    pub fn index(&self) -> &Arc<TriggerIndex> {
        &self.index
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    // ---------------------------------------------------------------------
    // Text
    // ---------------------------------------------------------------------

    /// Text-change event from the field. Closes any open affordance.
    pub fn set_text(&mut self, text: &str) {
        self.set_text_at(text, None);
    }

    /// Text-change event with the caret the field reports after the change
    pub fn set_text_at(&mut self, text: &str, caret: Option<usize>) {
        let Some(edit) = TextEdit::between(&self.text, text, caret) else {
            return;
        };
        self.text = text.to_string();
        self.selection = caret
            .map(Selection::caret)
            .unwrap_or(self.selection)
            .clamp(self.char_len());
        self.carry_menu_keys(&edit);
        self.rescan();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn set_selection(&mut self, start: usize, end: usize) {
        self.selection = Selection::new(start, end).clamp(self.char_len());
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn segments(&self) -> Vec<Vec<Segment>> {
        OverlayProjector::new(&self.index).project(&self.text, &self.matches)
    }

    pub fn render_html(&self) -> String {
        render_html(&self.segments())
    }

    /// Last summary reported to the host
    pub fn summary(&self) -> Option<&ValidationSummary> {
        self.aggregator.last_reported()
    }

    /// Summary of the current matches, whether or not it was reported
    pub fn current_summary(&self) -> ValidationSummary {
        ValidationSummary::from_matches(&self.matches, &self.index)
    }

    fn rescan(&mut self) {
        self.interaction.reset();
        if self.state != ConfigState::Loaded {
            self.matches.clear();
            return;
        }

        self.matches = Scanner::new(&self.index)
            .with_separator(self.config.separator)
            .scan(&self.text);
        log::debug!(
            "[TriggerSurface] rescan: {} matches over {} rules",
            self.matches.len(),
            self.index.len()
        );

        if let Some(summary) = self.aggregator.update(&self.matches, &self.index) {
            self.events.push_back(SurfaceEvent::ValidationChange { summary });
        }
        self.auto_open_menu();
    }

    /// Keep the known menu triggers the edit left intact, at their new offsets
    fn carry_menu_keys(&mut self, edit: &TextEdit) {
        self.menu_keys = self
            .menu_keys
            .drain()
            .filter_map(|(rule_id, start, end)| {
                edit.map_span(start, end).map(|(start, end)| (rule_id, start, end))
            })
            .collect();
    }

    /// Open the first unresolved menu trigger whose text was not seen before the last edit
    fn auto_open_menu(&mut self) {
        let line_starts = line_starts(&self.text);
        let mut seen = Vec::new();
        let mut fresh = None;

        for (match_index, m) in self.matches.iter().enumerate() {
            let Some(rule) = self.index.rule(m.rule_id) else {
                continue;
            };
            if rule.affordance() != Affordance::Menu || m.is_resolved() {
                continue;
            }
            let base = line_starts.get(m.line_index).copied().unwrap_or(0);
            let key = (m.rule_id, base + m.start_col, base + m.end_col);

            if fresh.is_none() && !self.menu_keys.contains(&key) {
                fresh = Some(match_index);
            }
            seen.push(key);
        }
        self.menu_keys.extend(seen);

        if !self.config.auto_open_menus {
            return;
        }
        if let Some(match_index) = fresh {
            self.open_menu(match_index);
        }
    }

    // ---------------------------------------------------------------------
    // Gestures
    // ---------------------------------------------------------------------

    pub fn session(&self) -> InteractionSession {
        self.interaction.session()
    }

    fn snapshot(&self, match_index: usize, m: &Match) -> Option<MatchSnapshot> {
        let rule = self.index.rule(m.rule_id)?;
        let payload = rule.payload();
        Some(MatchSnapshot {
            match_index,
            rule_id: m.rule_id,
            line_index: m.line_index,
            start_col: m.start_col,
            end_col: m.end_col,
            match_text: m.matched_text.clone(),
            severity: payload.severity,
            description: payload.description.clone(),
            affordance: payload.affordance(),
            category: payload.category.clone(),
            resolution: m.resolution.clone(),
        })
    }

    /// Pointer entered the annotated segment of `match_index`. Returns the tooltip deadline, if scheduled.
    pub fn pointer_enter(&mut self, match_index: usize, now: Instant) -> Option<Instant> {
        let m = self.matches.get(match_index)?.clone();
        let snapshot = self.snapshot(match_index, &m)?;
        let affordance = snapshot.affordance;
        self.events.push_back(SurfaceEvent::Hover { snapshot });
        self.interaction.pointer_enter(match_index, &m, affordance, now)
    }

    pub fn pointer_leave(&mut self, match_index: usize) {
        self.interaction.pointer_leave(match_index);
    }

    pub fn tooltip_pointer_leave(&mut self) {
        self.interaction.tooltip_pointer_leave();
    }

    /// Timer callback. Returns the match whose tooltip opened.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        self.interaction.poll(now)
    }

    pub fn next_timer_due(&self) -> Option<Instant> {
        self.interaction.next_due()
    }

    /// Click on an annotated segment. True when a menu opened.
    pub fn click(&mut self, match_index: usize) -> bool {
        self.open_menu(match_index)
    }

    pub fn open_menu(&mut self, match_index: usize) -> bool {
        let Some(m) = self.matches.get(match_index) else {
            return false;
        };
        let Some(rule) = self.index.rule(m.rule_id) else {
            return false;
        };
        self.interaction.open_menu(match_index, m, rule)
    }

    /// Key press while the surface or its menu has focus
    ///
    /// A commit discarded as stale reports `Consumed`.
    pub fn key(&mut self, key: Key) -> KeyOutcome {
        match self.interaction.key(key) {
            KeyOutcome::Commit(commit) => match self.commit(commit.clone()) {
                CommitOutcome::Discarded => KeyOutcome::Consumed,
                CommitOutcome::Applied(_) | CommitOutcome::NoEdit => KeyOutcome::Commit(commit),
            },
            outcome => outcome,
        }
    }

    pub fn set_filter(&mut self, filter_text: &str) {
        self.interaction.set_filter(filter_text);
    }

    pub fn set_freeform_text(&mut self, text: &str) {
        self.interaction.set_freeform_text(text);
    }

    pub fn focus_menu(&mut self, focus: MenuFocus) {
        self.interaction.focus(focus);
    }

    pub fn highlight(&mut self, visible_pos: usize) {
        self.interaction.highlight(visible_pos);
    }

    /// Click on a visible menu option
    pub fn choose(&mut self, visible_pos: usize) -> Option<CommitOutcome> {
        let commit = self.interaction.choose(visible_pos)?;
        Some(self.commit(commit))
    }

    pub fn dismiss(&mut self) {
        self.interaction.dismiss();
    }

    pub fn outside_click(&mut self) {
        self.interaction.outside_click();
    }

    pub fn blur(&mut self, focus_in_menu: bool) {
        self.interaction.blur(focus_in_menu);
    }

    fn commit(&mut self, commit: Commit) -> CommitOutcome {
        let Some(replacement) = commit.replacement(self.config.separator) else {
            if let Some(snapshot) = self.snapshot(commit.match_index, &commit.anchor) {
                self.events.push_back(SurfaceEvent::Select {
                    snapshot,
                    option: Some(commit.option),
                });
            }
            return CommitOutcome::NoEdit;
        };

        let Some(edit) = TextEdit::for_match(&self.text, &commit.anchor, replacement) else {
            log::debug!(
                "[TriggerSurface] discarded stale commit for `{}` at {}:{}",
                commit.anchor.matched_text,
                commit.anchor.line_index,
                commit.anchor.start_col
            );
            self.interaction.reset();
            return CommitOutcome::Discarded;
        };

        if let Some(snapshot) = self.snapshot(commit.match_index, &commit.anchor) {
            self.events.push_back(SurfaceEvent::Select {
                snapshot,
                option: Some(commit.option),
            });
        }

        self.text = edit.apply(&self.text);
        self.selection = self.selection.map(&edit).clamp(self.char_len());
        self.carry_menu_keys(&edit);
        self.events.push_back(SurfaceEvent::TextReplaced {
            text: self.text.clone(),
            selection: self.selection,
        });
        self.rescan();
        CommitOutcome::Applied(edit)
    }

    // ---------------------------------------------------------------------
    // Host plumbing
    // ---------------------------------------------------------------------

    /// Position the open affordance next to its anchor rectangle
    pub fn place(&self, anchor: Rect, popup: Size, viewport: Size) -> Placement {
        let mut placement = place_affordance(anchor, popup, viewport, self.config.affordance_margin);
        if self.interaction.is_menu_open() {
            placement.max_height = placement.max_height.min(self.config.max_menu_height);
        }
        placement
    }

    pub fn drain_events(&mut self) -> Vec<SurfaceEvent> {
        self.events.drain(..).collect()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Drop text, matches, session, timers and queued events. The configuration stays.
    pub fn teardown(&mut self) {
        self.interaction.reset();
        self.text.clear();
        self.selection = Selection::default();
        self.matches.clear();
        self.menu_keys.clear();
        self.events.clear();
        self.aggregator.reset();
    }
}

/// Char offset at which each line starts
fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        text.chars()
            .enumerate()
            .filter(|&(_, c)| c == '\n')
            .map(|(i, _)| i + 1),
    );
    starts
}

// =============================================================================
// Tests
// =============================================================================
