//! Text edits for committed selections, with caret/selection mapping
//!
//! Offsets here are char offsets into the whole text (newlines count as one
//! char), matching how a textarea reports `selectionStart`/`selectionEnd`
//! for BMP text.

use serde::{Deserialize, Serialize};

use crate::scanner::matcher::Match;

/// Replace chars `[start, end)` of the text with `replacement`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    /// Edit over a match's span, if that span still holds the matched text
    pub fn for_match(text: &str, m: &Match, replacement: String) -> Option<TextEdit> {
        let mut line_start = 0;
        let mut found_line = None;
        for (line_index, line) in text.split('\n').enumerate() {
            if line_index == m.line_index {
                found_line = Some(line);
                break;
            }
            line_start += line.chars().count() + 1;
        }
        let line = found_line?;

        let span: String = line
            .chars()
            .skip(m.start_col)
            .take(m.end_col.saturating_sub(m.start_col))
            .collect();
        if m.end_col > line.chars().count() || span != m.matched_text {
            return None;
        }

        Some(TextEdit {
            start: line_start + m.start_col,
            end: line_start + m.end_col,
            replacement,
        })
    }

    /// Smallest single edit turning `old` into `new`, or `None` when equal
    ///
    /// `caret` is the caret after the change. When the inserted text could
    /// sit at several places (typing `ab ` in front of `ab x`), the edit that
    /// ends at the caret wins.
    pub fn between(old: &str, new: &str, caret: Option<usize>) -> Option<TextEdit> {
        if old == new {
            return None;
        }
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();
        let shortest = old.len().min(new.len());

        let caret_suffix = caret
            .filter(|&c| c <= new.len())
            .map(|c| new.len() - c)
            .filter(|&s| s <= old.len() && old[old.len() - s..] == new[new.len() - s..]);

        let (prefix, suffix) = match caret_suffix {
            Some(suffix) => {
                let limit = (old.len() - suffix).min(new.len() - suffix);
                (common_prefix(&old, &new, limit), suffix)
            }
            None => {
                let prefix = common_prefix(&old, &new, shortest);
                let suffix = old[prefix..]
                    .iter()
                    .rev()
                    .zip(new[prefix..].iter().rev())
                    .take_while(|(a, b)| a == b)
                    .count();
                (prefix, suffix)
            }
        };

        Some(TextEdit {
            start: prefix,
            end: old.len() - suffix,
            replacement: new[prefix..new.len() - suffix].iter().collect(),
        })
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.replacement.len());
        out.extend(text.chars().take(self.start));
        out.push_str(&self.replacement);
        out.extend(text.chars().skip(self.end));
        out
    }

    fn replacement_len(&self) -> usize {
        self.replacement.chars().count()
    }

    /// Where an offset lands after the edit
    ///
    /// Before the span: unchanged. After it: shifted by the length delta.
    /// Inside it: end of the replacement.
    pub fn map_offset(&self, offset: usize) -> usize {
        if offset <= self.start {
            offset
        } else if offset >= self.end {
            offset - (self.end - self.start) + self.replacement_len()
        } else {
            self.start + self.replacement_len()
        }
    }

    /// Where a span lands after the edit, or `None` when the edit touched it
    ///
    /// Insertions at either end of the span leave it intact.
    pub fn map_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let removed = self.end - self.start;
        let inserted = self.replacement_len();
        if start >= self.end {
            Some((start - removed + inserted, end - removed + inserted))
        } else if end <= self.start {
            Some((start, end))
        } else {
            None
        }
    }
}

fn common_prefix(a: &[char], b: &[char], limit: usize) -> usize {
    a.iter().zip(b).take(limit).take_while(|(x, y)| x == y).count()
}

/// Text selection; `start == end` is a caret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn caret(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn map(&self, edit: &TextEdit) -> Self {
        Self::new(edit.map_offset(self.start), edit.map_offset(self.end))
    }

    pub fn clamp(&self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}
