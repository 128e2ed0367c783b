//! InteractionStateMachine: Tooltip and menu session for one surface
//!
//! # States
//! Idle -> TooltipOpen -> Idle
//! Idle | TooltipOpen -> MenuOpen -> Idle
//!
//! Tooltips open after a hover delay; the pending open is a deadline checked
//! by [`InteractionStateMachine::poll`], so a newer event cancels it simply
//! by clearing it. Menus open on click (or automatically, driven by the
//! surface) and own keyboard navigation, filtering and commits.
//!
//! The machine never edits text. A commit yields a [`Commit`] and returns
//! to Idle; the surface applies the edit and rescans.

use instant::Instant;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::scanner::matcher::Match;
use crate::scanner::rules::{Affordance, CommitMode, OptionSpec, TriggerRule};

// =============================================================================
// Types
// =============================================================================

/// Keys the machine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
    Other,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom(key: &str) -> Self {
        match key {
            "ArrowDown" | "Down" => Key::ArrowDown,
            "ArrowUp" | "Up" => Key::ArrowUp,
            "Enter" => Key::Enter,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// Which element inside an open menu has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuFocus {
    #[default]
    List,
    Filter,
    Freeform,
}

/// An option chosen for a match
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub match_index: usize,
    pub anchor: Match,
    pub option: OptionSpec,
}

impl Commit {
    /// Text that replaces the trigger span, `None` when the option edits nothing
    pub fn replacement(&self, separator: char) -> Option<String> {
        let on_select = self.option.on_select.as_ref()?;
        Some(match self.option.commit_mode() {
            CommitMode::Replace => on_select.replacement_text.clone(),
            CommitMode::Append => format!(
                "{}{}{}",
                self.anchor.matched_text, separator, on_select.replacement_text
            ),
        })
    }
}

/// Result of a key press
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Not handled; let the text field have it
    Ignored,
    /// Handled; the host should prevent the default action
    Consumed,
    /// An option was committed
    Commit(Commit),
}

#[derive(Debug, Clone)]
struct PendingTooltip {
    match_index: usize,
    anchor: Match,
    due: Instant,
}

#[derive(Debug, Clone)]
struct MenuState {
    match_index: usize,
    anchor: Match,
    options: Arc<[OptionSpec]>,
    filterable: bool,
    filter_text: String,
    /// Indices into `options` passing the filter
    visible: Vec<usize>,
    /// Position within `visible`
    highlighted: Option<usize>,
    focus: MenuFocus,
    freeform_text: String,
}

impl MenuState {
    fn refilter(&mut self) {
        let needle = self.filter_text.to_lowercase();
        self.visible = self
            .options
            .iter()
            .enumerate()
            .filter(|(_, o)| needle.is_empty() || o.label.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();
        self.highlighted = if self.visible.is_empty() { None } else { Some(0) };
    }

    fn step(&mut self, forward: bool) {
        let n = self.visible.len();
        if n == 0 {
            self.highlighted = None;
            return;
        }
        self.highlighted = Some(match (self.highlighted, forward) {
            (None, true) => 0,
            (None, false) => n - 1,
            (Some(h), true) => (h + 1) % n,
            (Some(h), false) => (h + n - 1) % n,
        });
    }

    /// Highlight the visible free-form option, if any
    fn highlight_freeform(&mut self) {
        if let Some(pos) = self
            .visible
            .iter()
            .position(|&i| self.options.get(i).is_some_and(|o| o.is_freeform_input))
        {
            self.highlighted = Some(pos);
        }
    }

    fn highlighted_option(&self) -> Option<&OptionSpec> {
        let pos = self.highlighted?;
        self.visible.get(pos).and_then(|&i| self.options.get(i))
    }

    fn commit_option(&self, option: OptionSpec) -> Commit {
        Commit {
            match_index: self.match_index,
            anchor: self.anchor.clone(),
            option,
        }
    }
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Idle,
    TooltipOpen {
        match_index: usize,
        anchor: Match,
    },
    MenuOpen(MenuState),
}

/// Read-only view of the session for renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSession {
    pub active_affordance: Affordance,
    pub match_index: Option<usize>,
    pub anchor_match: Option<Match>,
    /// Visible (filter-passing) options, in menu order
    pub option_list: Vec<OptionSpec>,
    pub filterable: bool,
    pub filter_text: String,
    /// Index into `option_list`
    pub highlighted_index: Option<usize>,
    pub focus: MenuFocus,
    pub freeform_text: String,
}

// =============================================================================
// InteractionStateMachine
// =============================================================================

#[derive(Debug, Clone)]
pub struct InteractionStateMachine {
    state: State,
    pending: Option<PendingTooltip>,
    tooltip_delay: Duration,
}

impl InteractionStateMachine {
    pub fn new(tooltip_delay: Duration) -> Self {
        Self {
            state: State::Idle,
            pending: None,
            tooltip_delay,
        }
    }

    pub fn affordance(&self) -> Affordance {
        match self.state {
            State::Idle => Affordance::None,
            State::TooltipOpen { .. } => Affordance::Tooltip,
            State::MenuOpen(_) => Affordance::Menu,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn is_menu_open(&self) -> bool {
        matches!(self.state, State::MenuOpen(_))
    }

    /// Deadline of the pending tooltip, if any
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Back to Idle and cancel any pending tooltip
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.pending = None;
    }

    // ---------------------------------------------------------------------
    // Tooltips
    // ---------------------------------------------------------------------

    /// Pointer entered an annotated segment. Returns the tooltip deadline when one was scheduled.
    pub fn pointer_enter(
        &mut self,
        match_index: usize,
        anchor: &Match,
        affordance: Affordance,
        now: Instant,
    ) -> Option<Instant> {
        if affordance != Affordance::Tooltip || self.is_menu_open() {
            return None;
        }
        if let State::TooltipOpen { match_index: open, .. } = self.state {
            if open == match_index {
                return None;
            }
        }
        let due = now + self.tooltip_delay;
        self.pending = Some(PendingTooltip {
            match_index,
            anchor: anchor.clone(),
            due,
        });
        Some(due)
    }

    /// Pointer left an annotated segment. Cancels its pending tooltip; an open tooltip stays.
    pub fn pointer_leave(&mut self, match_index: usize) {
        if self.pending.as_ref().map(|p| p.match_index) == Some(match_index) {
            self.pending = None;
        }
    }

    /// Pointer left the tooltip's own region
    pub fn tooltip_pointer_leave(&mut self) {
        if matches!(self.state, State::TooltipOpen { .. }) {
            self.state = State::Idle;
        }
    }

    /// Fire the pending tooltip if its deadline passed. Returns the opened match index.
    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        let due = self.pending.as_ref()?.due;
        if now < due {
            return None;
        }
        let pending = self.pending.take()?;
        if self.is_menu_open() {
            return None;
        }
        self.state = State::TooltipOpen {
            match_index: pending.match_index,
            anchor: pending.anchor,
        };
        Some(pending.match_index)
    }

    // ---------------------------------------------------------------------
    // Menus
    // ---------------------------------------------------------------------

    /// Open the menu of a menu-affordance match. Returns false for other matches.
    pub fn open_menu(&mut self, match_index: usize, anchor: &Match, rule: &TriggerRule) -> bool {
        if rule.affordance() != Affordance::Menu {
            return false;
        }
        let payload = rule.payload();
        let mut menu = MenuState {
            match_index,
            anchor: anchor.clone(),
            options: Arc::clone(&payload.options),
            filterable: payload.filterable,
            filter_text: String::new(),
            visible: Vec::new(),
            highlighted: None,
            focus: if payload.filterable {
                MenuFocus::Filter
            } else {
                MenuFocus::List
            },
            freeform_text: String::new(),
        };
        menu.refilter();
        self.pending = None;
        self.state = State::MenuOpen(menu);
        true
    }

    /// Filter text typed into a filterable menu
    pub fn set_filter(&mut self, filter_text: &str) {
        if let State::MenuOpen(menu) = &mut self.state {
            if !menu.filterable {
                return;
            }
            menu.filter_text = filter_text.to_string();
            menu.refilter();
        }
    }

    /// Text typed into the free-form option's input
    pub fn set_freeform_text(&mut self, text: &str) {
        if let State::MenuOpen(menu) = &mut self.state {
            menu.freeform_text = text.to_string();
            menu.focus = MenuFocus::Freeform;
            menu.highlight_freeform();
        }
    }

    pub fn focus(&mut self, focus: MenuFocus) {
        if let State::MenuOpen(menu) = &mut self.state {
            if focus == MenuFocus::Filter && !menu.filterable {
                return;
            }
            menu.focus = focus;
            if focus == MenuFocus::Freeform {
                menu.highlight_freeform();
            }
        }
    }

    /// Highlight a visible option, e.g. on pointer hover
    pub fn highlight(&mut self, visible_pos: usize) {
        if let State::MenuOpen(menu) = &mut self.state {
            if visible_pos < menu.visible.len() {
                menu.highlighted = Some(visible_pos);
            }
        }
    }

    /// Click on a visible option
    pub fn choose(&mut self, visible_pos: usize) -> Option<Commit> {
        self.highlight(visible_pos);
        self.commit_highlighted()
    }

    pub fn key(&mut self, key: Key) -> KeyOutcome {
        if matches!(self.state, State::TooltipOpen { .. }) {
            if key == Key::Escape {
                self.state = State::Idle;
                return KeyOutcome::Consumed;
            }
            return KeyOutcome::Ignored;
        }

        let State::MenuOpen(menu) = &mut self.state else {
            return KeyOutcome::Ignored;
        };
        match key {
            Key::ArrowDown => {
                menu.step(true);
                KeyOutcome::Consumed
            }
            Key::ArrowUp => {
                menu.step(false);
                KeyOutcome::Consumed
            }
            Key::Escape => {
                self.state = State::Idle;
                KeyOutcome::Consumed
            }
            Key::Enter => match self.commit_highlighted() {
                Some(commit) => KeyOutcome::Commit(commit),
                None => KeyOutcome::Consumed,
            },
            Key::Other => KeyOutcome::Ignored,
        }
    }

    /// Commit the highlighted option. No-op (menu stays open) when nothing is highlighted.
    fn commit_highlighted(&mut self) -> Option<Commit> {
        let State::MenuOpen(menu) = &mut self.state else {
            return None;
        };
        let option = menu.highlighted_option()?.clone();

        let commit = if option.is_freeform_input {
            let typed = menu.freeform_text.trim();
            if typed.is_empty() {
                menu.focus = MenuFocus::Freeform;
                return None;
            }
            menu.commit_option(option.freeform_value(typed))
        } else {
            menu.commit_option(option)
        };
        self.state = State::Idle;
        Some(commit)
    }

    // ---------------------------------------------------------------------
    // Dismissal
    // ---------------------------------------------------------------------

    pub fn dismiss(&mut self) {
        self.reset();
    }

    /// Pointer down outside the surface and its affordances
    pub fn outside_click(&mut self) {
        self.reset();
    }

    /// Surface lost focus. A menu survives when focus moved into it.
    pub fn blur(&mut self, focus_in_menu: bool) {
        if focus_in_menu && self.is_menu_open() {
            return;
        }
        self.reset();
    }

    pub fn session(&self) -> InteractionSession {
        let mut session = InteractionSession {
            active_affordance: self.affordance(),
            match_index: None,
            anchor_match: None,
            option_list: Vec::new(),
            filterable: false,
            filter_text: String::new(),
            highlighted_index: None,
            focus: MenuFocus::List,
            freeform_text: String::new(),
        };
        match &self.state {
            State::Idle => {}
            State::TooltipOpen { match_index, anchor } => {
                session.match_index = Some(*match_index);
                session.anchor_match = Some(anchor.clone());
            }
            State::MenuOpen(menu) => {
                session.match_index = Some(menu.match_index);
                session.anchor_match = Some(menu.anchor.clone());
                session.option_list = menu.visible.iter().map(|&i| menu.options[i].clone()).collect();
                session.filterable = menu.filterable;
                session.filter_text = menu.filter_text.clone();
                session.highlighted_index = menu.highlighted;
                session.focus = menu.focus;
                session.freeform_text = menu.freeform_text.clone();
            }
        }
        session
    }
}

// =============================================================================
// Tests
// =============================================================================
