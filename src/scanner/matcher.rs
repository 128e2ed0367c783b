//! Scanner: Line-addressed trigger matching
//!
//! Runs every rule of a [`TriggerIndex`] against each line of the text, in
//! index order (longest pattern first). A candidate overlapping any match
//! already accepted on its line is discarded, so the first accepted match
//! wins. Accepted matches are sorted by start column per line.
//!
//! Columns count Unicode scalar values (chars), not bytes.
//!
//! # Boundaries
//! Literal rules need a non-word character (or line edge) on both sides.
//! The separator (`/` by default) is a valid boundary on the right only, so
//! `word/resolution` still matches `word`, while `/word` does not.

use serde::{Deserialize, Serialize};

use crate::scanner::rules::{PatternKind, RuleId, TriggerIndex, TriggerRule};

/// Default separator between a trigger and its appended resolution
pub const DEFAULT_SEPARATOR: char = '/';

// =============================================================================
// Types
// =============================================================================

/// A located occurrence of a rule
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Match {
    pub rule_id: RuleId,
    pub line_index: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub matched_text: String,
    /// Text appended after the separator, if the trigger was already resolved
    pub resolution: Option<String>,
}

impl Match {
    fn overlaps(&self, start_col: usize, end_col: usize) -> bool {
        self.start_col < end_col && start_col < self.end_col
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// Byte offset of every char in a line, plus the line length as the last entry
pub(crate) struct ColumnMap {
    byte_offsets: Vec<usize>,
}

impl ColumnMap {
    pub(crate) fn new(line: &str) -> Self {
        let mut byte_offsets: Vec<usize> = line.char_indices().map(|(i, _)| i).collect();
        byte_offsets.push(line.len());
        Self { byte_offsets }
    }

    /// Char column of a byte offset on a char boundary
    pub(crate) fn col(&self, byte: usize) -> usize {
        self.byte_offsets
            .binary_search(&byte)
            .unwrap_or_else(|insert_at| insert_at)
    }

    /// Byte offset of a char column, clamped to the line end
    pub(crate) fn byte(&self, col: usize) -> usize {
        let last = self.byte_offsets.len() - 1;
        self.byte_offsets[col.min(last)]
    }

    pub(crate) fn char_len(&self) -> usize {
        self.byte_offsets.len() - 1
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// =============================================================================
// Scanner
// =============================================================================

/// Stateless matcher over a borrowed index
#[derive(Clone, Copy)]
pub struct Scanner<'a> {
    index: &'a TriggerIndex,
    separator: char,
}

impl<'a> Scanner<'a> {
    pub fn new(index: &'a TriggerIndex) -> Self {
        Self {
            index,
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Scan the whole text. Pure: same text and index give the same list.
    pub fn scan(&self, text: &str) -> Vec<Match> {
        let mut matches = Vec::new();
        if self.index.is_empty() {
            return matches;
        }
        for (line_index, line) in text.split('\n').enumerate() {
            self.scan_line(line_index, line, &mut matches);
        }
        matches
    }

    fn scan_line(&self, line_index: usize, line: &str, out: &mut Vec<Match>) {
        if line.is_empty() {
            return;
        }

        let columns = ColumnMap::new(line);
        let mut accepted: Vec<Match> = Vec::new();

        for rule in self.index.rules() {
            match rule.kind {
                PatternKind::Literal => {
                    self.literal_candidates(rule, line, line_index, &columns, &mut accepted)
                }
                PatternKind::Regex => {
                    self.regex_candidates(rule, line, line_index, &columns, &mut accepted)
                }
            }
        }

        accepted.sort_by_key(|m| m.start_col);
        out.extend(accepted);
    }

    /// Case-insensitive search, retrying one char later when a candidate is rejected
    fn literal_candidates(
        &self,
        rule: &TriggerRule,
        line: &str,
        line_index: usize,
        columns: &ColumnMap,
        accepted: &mut Vec<Match>,
    ) {
        let mut from = 0;
        while from <= line.len() {
            let Some(found) = rule.matcher().find_at(line, from) else {
                break;
            };
            if found.is_empty() {
                break;
            }

            let taken = self.is_whole_word(line, found.start(), found.end())
                && self.offer(rule, line, line_index, columns, found.start(), found.end(), accepted);
            from = if taken {
                found.end()
            } else {
                next_char_boundary(line, found.start())
            };
        }
    }

    /// Every non-empty match of the pattern, inside words or not
    fn regex_candidates(
        &self,
        rule: &TriggerRule,
        line: &str,
        line_index: usize,
        columns: &ColumnMap,
        accepted: &mut Vec<Match>,
    ) {
        for found in rule.matcher().find_iter(line) {
            if found.is_empty() {
                continue;
            }
            self.offer(rule, line, line_index, columns, found.start(), found.end(), accepted);
        }
    }

    /// Pushes the match unless it overlaps an accepted one
    #[allow(clippy::too_many_arguments)]
    fn offer(
        &self,
        rule: &TriggerRule,
        line: &str,
        line_index: usize,
        columns: &ColumnMap,
        start: usize,
        end: usize,
        accepted: &mut Vec<Match>,
    ) -> bool {
        let start_col = columns.col(start);
        let end_col = columns.col(end);
        if accepted.iter().any(|m| m.overlaps(start_col, end_col)) {
            return false;
        }

        accepted.push(Match {
            rule_id: rule.id,
            line_index,
            start_col,
            end_col,
            matched_text: line[start..end].to_string(),
            resolution: self.resolution_after(line, end),
        });
        true
    }

    fn is_whole_word(&self, line: &str, start: usize, end: usize) -> bool {
        let left_ok = match line[..start].chars().next_back() {
            None => true,
            Some(c) => !is_word_char(c) && c != DEFAULT_SEPARATOR && c != self.separator,
        };
        let right_ok = match line[end..].chars().next() {
            None => true,
            Some(c) => !is_word_char(c) || c == self.separator,
        };
        left_ok && right_ok
    }

    /// `trigger/suffix` -> `Some("suffix")`
    fn resolution_after(&self, line: &str, end: usize) -> Option<String> {
        let rest = line[end..].strip_prefix(self.separator)?;
        let suffix: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
        if suffix.is_empty() {
            None
        } else {
            Some(suffix)
        }
    }
}

fn next_char_boundary(line: &str, byte: usize) -> usize {
    line[byte..]
        .chars()
        .next()
        .map(|c| byte + c.len_utf8())
        .unwrap_or(line.len() + 1)
}

/// Scan with the default separator
pub fn scan(index: &TriggerIndex, text: &str) -> Vec<Match> {
    Scanner::new(index).scan(text)
}

// =============================================================================
// Tests
// =============================================================================
