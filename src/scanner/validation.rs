//! ValidationAggregator: Change-only validation summaries
//!
//! Buckets the matches of every scan by severity and reports the summary
//! only when it differs from the last reported one. The first update always
//! reports.
//!
//! In `Counts` mode (the default) "differs" means one of
//! (has_blocking_error, errors, warnings, info) counts changed. A same-count
//! substitution, one error replaced by another, is not reported. `Identity`
//! mode also compares which matches sit in each bucket.

use serde::{Deserialize, Serialize};

use crate::config::ChangeDetection;
use crate::scanner::matcher::Match;
use crate::scanner::rules::{RuleId, Severity, TriggerIndex};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub has_blocking_error: bool,
    pub errors: Vec<Match>,
    pub warnings: Vec<Match>,
    pub info: Vec<Match>,
}

impl ValidationSummary {
    /// Bucket matches by their rule's severity
    pub fn from_matches(matches: &[Match], index: &TriggerIndex) -> Self {
        let mut summary = Self::default();
        for m in matches {
            let Some(rule) = index.rule(m.rule_id) else {
                continue;
            };
            if rule.payload().block_submit {
                summary.has_blocking_error = true;
            }
            match rule.severity() {
                Severity::Error => summary.errors.push(m.clone()),
                Severity::Warning => summary.warnings.push(m.clone()),
                Severity::Info => summary.info.push(m.clone()),
            }
        }
        summary
    }

    /// The tracked tuple in `Counts` mode
    pub fn counts(&self) -> (bool, usize, usize, usize) {
        (
            self.has_blocking_error,
            self.errors.len(),
            self.warnings.len(),
            self.info.len(),
        )
    }

    fn identity(&self) -> [Vec<(RuleId, usize, usize, usize)>; 3] {
        let keys = |bucket: &[Match]| {
            bucket
                .iter()
                .map(|m| (m.rule_id, m.line_index, m.start_col, m.end_col))
                .collect()
        };
        [keys(&self.errors), keys(&self.warnings), keys(&self.info)]
    }
}

// =============================================================================
// ValidationAggregator
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ValidationAggregator {
    mode: ChangeDetection,
    last_reported: Option<ValidationSummary>,
}

impl ValidationAggregator {
    pub fn new(mode: ChangeDetection) -> Self {
        Self {
            mode,
            last_reported: None,
        }
    }

    /// New summary if it changed since the last report, otherwise `None`
    pub fn update(&mut self, matches: &[Match], index: &TriggerIndex) -> Option<ValidationSummary> {
        let summary = ValidationSummary::from_matches(matches, index);

        let changed = match &self.last_reported {
            None => true,
            Some(prev) => match self.mode {
                ChangeDetection::Counts => prev.counts() != summary.counts(),
                ChangeDetection::Identity => {
                    prev.counts() != summary.counts() || prev.identity() != summary.identity()
                }
            },
        };

        if !changed {
            return None;
        }
        self.last_reported = Some(summary.clone());
        Some(summary)
    }

    pub fn last_reported(&self) -> Option<&ValidationSummary> {
        self.last_reported.as_ref()
    }

    /// Forget the last report, so the next update reports again
    pub fn reset(&mut self) {
        self.last_reported = None;
    }
}

// =============================================================================
// Tests
// =============================================================================
