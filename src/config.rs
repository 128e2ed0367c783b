//! Engine configuration types and defaults
//!
//! Options for one editing surface. Trigger definitions are a separate
//! document, compiled by [`crate::scanner::TriggerIndex`].

use serde::{Deserialize, Serialize};

use crate::scanner::matcher::DEFAULT_SEPARATOR;

/// How the validation aggregator decides that a summary changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDetection {
    /// Compare (blocking, errors, warnings, info) counts only
    #[default]
    Counts,
    /// Also compare which matches are in each bucket
    Identity,
}

/// Per-surface engine options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hover time before a tooltip opens. Default: 300
    pub tooltip_delay_ms: u64,
    /// Open the menu of a newly appeared menu trigger without a click. Default: true
    pub auto_open_menus: bool,
    /// Joins a trigger and an appended resolution. Default: '/'
    pub separator: char,
    /// Validation change detection. Default: counts
    pub change_detection: ChangeDetection,
    /// Gap between an anchor and its affordance, in px. Default: 4.0
    pub affordance_margin: f64,
    /// Upper bound for menu height, in px. Default: 240.0
    pub max_menu_height: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tooltip_delay_ms: 300,
            auto_open_menus: true,
            separator: DEFAULT_SEPARATOR,
            change_detection: ChangeDetection::Counts,
            affordance_margin: 4.0,
            max_menu_height: 240.0,
        }
    }
}

impl EngineConfig {
    pub fn tooltip_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tooltip_delay_ms)
    }
}
