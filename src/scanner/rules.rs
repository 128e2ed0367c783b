//! TriggerIndex: Compiled trigger rules
//!
//! Compiles a trigger configuration document into an ordered list of
//! matchable rules. The document is a JSON object keyed by severity bucket:
//!
//! ```json
//! {
//!   "error":   [{ "type": "regex", "regex": ["[a-z]+@[a-z]+\\.[a-z]{2,}"],
//!                 "handler": { "message": "No emails", "block-submit": true } }],
//!   "info":    [{ "type": "match", "match": ["@client"],
//!                 "handler": { "options": [{ "label": "Blackrock", "on-select": { "display": "Blackrock" } }] } }]
//! }
//! ```
//!
//! One entry with N phrases yields N rules sharing a single payload. Literal
//! rules are case-insensitive whole-word matches, regex rules are
//! case-sensitive and may match inside words. Rules are ordered longest
//! pattern first so specific phrases win over their substrings.
//!
//! Compilation is forgiving: malformed buckets, entries and regexes are
//! dropped and reported as [`ConfigError`]s, everything else still compiles.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Rule identifier, assigned in document order (error, warning, info)
pub type RuleId = u32;

// =============================================================================
// Types
// =============================================================================

/// Severity bucket of a rule
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Buckets in compile order
    pub const ALL: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn from_bucket(key: &str) -> Option<Self> {
        match key {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Literal,
    Regex,
}

/// Interaction attached to a match
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Affordance {
    None,
    Tooltip,
    Menu,
}

impl Affordance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Affordance::None => "none",
            Affordance::Tooltip => "tooltip",
            Affordance::Menu => "menu",
        }
    }
}

/// Handler variant, resolved once per entry at compile time
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    NotAllowed,
    Warn,
    SelectOne,
    SelectOneAndWarn,
    MenuOnly,
    MenuWithLink,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::NotAllowed => "not-allowed",
            HandlerKind::Warn => "warn",
            HandlerKind::SelectOne => "select-one",
            HandlerKind::SelectOneAndWarn => "select-one-and-warn",
            HandlerKind::MenuOnly => "menu-only",
            HandlerKind::MenuWithLink => "menu-with-link",
        }
    }

    /// Variant implied by the handler's shape when it does not name one
    fn infer(severity: Severity, has_options: bool, has_message: bool, has_link: bool) -> Self {
        match (has_options, has_link, has_message) {
            (true, true, _) => HandlerKind::MenuWithLink,
            (true, false, true) => HandlerKind::SelectOneAndWarn,
            (true, false, false) => HandlerKind::SelectOne,
            (false, _, _) if severity == Severity::Error => HandlerKind::NotAllowed,
            (false, _, _) => HandlerKind::Warn,
        }
    }
}

/// How a committed option rewrites the trigger text
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// The trigger span becomes the replacement text
    Replace,
    /// The trigger span becomes `trigger` + separator + replacement text
    Append,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OnSelect {
    pub replacement_text: String,
}

/// One entry of a rule's option menu
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OptionSpec {
    pub label: String,
    pub value: String,
    pub on_select: Option<OnSelect>,
    pub is_freeform_input: bool,
    pub placeholder: Option<String>,
}

impl OptionSpec {
    /// `on-select.display` options replace the trigger, free-form input appends to it
    pub fn commit_mode(&self) -> CommitMode {
        if self.is_freeform_input {
            CommitMode::Append
        } else {
            CommitMode::Replace
        }
    }

    /// Ad hoc option carrying the value typed into a free-form field
    pub fn freeform_value(&self, typed: &str) -> OptionSpec {
        OptionSpec {
            label: typed.to_string(),
            value: typed.to_string(),
            on_select: Some(OnSelect {
                replacement_text: typed.to_string(),
            }),
            is_freeform_input: true,
            placeholder: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub label: String,
    pub href: String,
}

/// Payload shared by every rule expanded from one configuration entry
#[derive(Clone, Debug, PartialEq)]
pub struct RulePayload {
    pub severity: Severity,
    pub description: String,
    /// Longer tooltip body (`message-content`)
    pub detail: Option<String>,
    pub block_submit: bool,
    pub options: Arc<[OptionSpec]>,
    pub filterable: bool,
    pub handler: HandlerKind,
    pub link: Option<Link>,
    pub category: Option<String>,
}

impl RulePayload {
    /// Menu when there are options, tooltip when there is a description
    pub fn affordance(&self) -> Affordance {
        if !self.options.is_empty() {
            Affordance::Menu
        } else if !self.description.is_empty() {
            Affordance::Tooltip
        } else {
            Affordance::None
        }
    }
}

/// A compiled literal or regex rule
#[derive(Clone, Debug)]
pub struct TriggerRule {
    pub id: RuleId,
    pub pattern: String,
    pub kind: PatternKind,
    pub case_sensitive: bool,
    pub whole_word: bool,
    matcher: Regex,
    payload: Arc<RulePayload>,
}

impl TriggerRule {
    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn payload(&self) -> &RulePayload {
        &self.payload
    }

    pub fn severity(&self) -> Severity {
        self.payload.severity
    }

    pub fn options(&self) -> &Arc<[OptionSpec]> {
        &self.payload.options
    }

    pub fn affordance(&self) -> Affordance {
        self.payload.affordance()
    }

    /// Ordering key: literal length in chars, regex source length in chars
    fn pattern_len(&self) -> usize {
        self.pattern.chars().count()
    }
}

/// Configuration problems absorbed during compilation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid trigger document JSON: {0}")]
    InvalidJson(String),
    #[error("trigger document must be an object keyed by severity")]
    NotAnObject,
    #[error("unknown severity bucket `{0}`")]
    UnknownBucket(String),
    #[error("bucket `{bucket}` is malformed: {reason}")]
    MalformedBucket { bucket: String, reason: String },
    #[error("entry {entry} in `{bucket}` is malformed: {reason}")]
    MalformedEntry {
        bucket: String,
        entry: usize,
        reason: String,
    },
    #[error("entry {entry} in `{bucket}` has no patterns")]
    EmptyEntry { bucket: String, entry: usize },
    #[error("entry {entry} in `{bucket}` contains an empty pattern")]
    EmptyPattern { bucket: String, entry: usize },
    #[error("entry {entry} in `{bucket}` has invalid regex `{pattern}`: {reason}")]
    InvalidRegex {
        bucket: String,
        entry: usize,
        pattern: String,
        reason: String,
    },
}

/// Rule counts for diagnostics
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub rule_count: usize,
    pub literal_count: usize,
    pub regex_count: usize,
    pub error_rules: usize,
    pub warning_rules: usize,
    pub info_rules: usize,
    pub menu_rules: usize,
}

/// Result of compiling a document: the index plus everything that was dropped
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub index: TriggerIndex,
    pub warnings: Vec<ConfigError>,
}

// =============================================================================
// Document shape
// =============================================================================

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum RawEntryKind {
    Match,
    Regex,
}

#[derive(Deserialize, Debug)]
struct RawEntry {
    #[serde(rename = "type")]
    kind: RawEntryKind,
    #[serde(rename = "match", default)]
    phrases: Vec<String>,
    #[serde(default)]
    regex: Vec<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    handler: RawHandler,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct RawHandler {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    message_content: Option<String>,
    /// Assigned by the loader; accepted and ignored
    #[serde(default)]
    #[allow(dead_code)]
    message_state: Option<Value>,
    #[serde(default)]
    block_submit: bool,
    #[serde(default)]
    filter: bool,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    kind: Option<HandlerKind>,
    #[serde(default)]
    link: Option<Link>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct RawOption {
    label: String,
    #[serde(default)]
    on_select: Option<RawOnSelect>,
    #[serde(default)]
    user_input: bool,
    #[serde(default)]
    placeholder: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawOnSelect {
    display: String,
}

impl RawOption {
    fn into_spec(self) -> OptionSpec {
        let on_select = self.on_select.map(|s| OnSelect {
            replacement_text: s.display,
        });
        let value = on_select
            .as_ref()
            .map(|s| s.replacement_text.clone())
            .unwrap_or_else(|| self.label.clone());
        OptionSpec {
            label: self.label,
            value,
            on_select,
            is_freeform_input: self.user_input,
            placeholder: self.placeholder,
        }
    }
}

// =============================================================================
// TriggerIndex
// =============================================================================

/// Ordered, immutable set of compiled rules
#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    /// Longest pattern first
    rules: Vec<TriggerRule>,
    /// Position in `rules` for each rule id
    positions: Vec<usize>,
}

impl TriggerIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse JSON text, then compile. Only a JSON syntax error is an `Err`.
    pub fn from_json_str(json: &str) -> Result<CompileReport, ConfigError> {
        let doc: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidJson(e.to_string()))?;
        Ok(Self::compile(&doc))
    }

    /// Compile a trigger document, dropping whatever does not compile
    pub fn compile(doc: &Value) -> CompileReport {
        let mut warnings = Vec::new();

        let Some(buckets) = doc.as_object() else {
            warnings.push(ConfigError::NotAnObject);
            return CompileReport {
                index: Self::empty(),
                warnings,
            };
        };

        for key in buckets.keys() {
            if !key.starts_with('$') && Severity::from_bucket(key).is_none() {
                warnings.push(ConfigError::UnknownBucket(key.clone()));
            }
        }

        let mut rules = Vec::new();
        for severity in Severity::ALL {
            let Some(bucket) = buckets.get(severity.as_str()) else {
                continue;
            };
            compile_bucket(severity, bucket, &mut rules, &mut warnings);
        }

        // Stable: equal lengths keep document order
        rules.sort_by(|a: &TriggerRule, b: &TriggerRule| b.pattern_len().cmp(&a.pattern_len()));

        let mut positions = vec![0; rules.len()];
        for (pos, rule) in rules.iter().enumerate() {
            positions[rule.id as usize] = pos;
        }

        for warning in &warnings {
            log::warn!("[TriggerIndex] {}", warning);
        }
        log::info!(
            "[TriggerIndex] compiled {} rules ({} dropped)",
            rules.len(),
            warnings.len()
        );

        CompileReport {
            index: Self { rules, positions },
            warnings,
        }
    }

    /// Rules in scan order
    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> Option<&TriggerRule> {
        self.positions
            .get(id as usize)
            .and_then(|&pos| self.rules.get(pos))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            rule_count: self.rules.len(),
            ..IndexStats::default()
        };
        for rule in &self.rules {
            match rule.kind {
                PatternKind::Literal => stats.literal_count += 1,
                PatternKind::Regex => stats.regex_count += 1,
            }
            match rule.severity() {
                Severity::Error => stats.error_rules += 1,
                Severity::Warning => stats.warning_rules += 1,
                Severity::Info => stats.info_rules += 1,
            }
            if rule.affordance() == Affordance::Menu {
                stats.menu_rules += 1;
            }
        }
        stats
    }
}

fn compile_bucket(
    severity: Severity,
    bucket: &Value,
    rules: &mut Vec<TriggerRule>,
    warnings: &mut Vec<ConfigError>,
) {
    let bucket_name = severity.as_str().to_string();
    let Some(entries) = bucket.as_array() else {
        warnings.push(ConfigError::MalformedBucket {
            bucket: bucket_name,
            reason: "expected an array of entries".to_string(),
        });
        return;
    };

    for (entry_idx, raw) in entries.iter().enumerate() {
        let entry: RawEntry = match serde_json::from_value(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warnings.push(ConfigError::MalformedEntry {
                    bucket: bucket_name.clone(),
                    entry: entry_idx,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        compile_entry(severity, &bucket_name, entry_idx, entry, rules, warnings);
    }
}

fn compile_entry(
    severity: Severity,
    bucket: &str,
    entry_idx: usize,
    entry: RawEntry,
    rules: &mut Vec<TriggerRule>,
    warnings: &mut Vec<ConfigError>,
) {
    let (kind, patterns) = match entry.kind {
        RawEntryKind::Match => (PatternKind::Literal, entry.phrases),
        RawEntryKind::Regex => (PatternKind::Regex, entry.regex),
    };
    if patterns.is_empty() {
        warnings.push(ConfigError::EmptyEntry {
            bucket: bucket.to_string(),
            entry: entry_idx,
        });
        return;
    }

    let handler = entry.handler;
    let options: Arc<[OptionSpec]> = handler
        .options
        .into_iter()
        .map(RawOption::into_spec)
        .collect::<Vec<_>>()
        .into();
    let description = handler.message.unwrap_or_default();
    let handler_kind = handler.kind.unwrap_or_else(|| {
        HandlerKind::infer(
            severity,
            !options.is_empty(),
            !description.is_empty(),
            handler.link.is_some(),
        )
    });
    let payload = Arc::new(RulePayload {
        severity,
        description,
        detail: handler.message_content,
        block_submit: handler.block_submit,
        options,
        filterable: handler.filter,
        handler: handler_kind,
        link: handler.link,
        category: entry.category,
    });

    for pattern in patterns {
        if pattern.trim().is_empty() {
            warnings.push(ConfigError::EmptyPattern {
                bucket: bucket.to_string(),
                entry: entry_idx,
            });
            continue;
        }

        let built = match kind {
            PatternKind::Literal => RegexBuilder::new(&regex::escape(&pattern))
                .case_insensitive(true)
                .build(),
            PatternKind::Regex => Regex::new(&pattern),
        };
        let matcher = match built {
            Ok(re) => re,
            Err(e) => {
                warnings.push(ConfigError::InvalidRegex {
                    bucket: bucket.to_string(),
                    entry: entry_idx,
                    pattern,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        rules.push(TriggerRule {
            id: rules.len() as RuleId,
            pattern,
            kind,
            case_sensitive: kind == PatternKind::Regex,
            whole_word: kind == PatternKind::Literal,
            matcher,
            payload: Arc::clone(&payload),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_expands_to_one_rule_per_phrase() {
        let report = TriggerIndex::compile(&json!({
            "warning": [{ "type": "match", "match": ["foo", "bar", "baz"],
                          "handler": { "message": "careful" } }]
        }));

        assert!(report.warnings.is_empty());
        assert_eq!(report.index.len(), 3);
        for rule in report.index.rules() {
            assert_eq!(rule.kind, PatternKind::Literal);
            assert!(rule.whole_word);
            assert!(!rule.case_sensitive);
            assert_eq!(rule.payload().description, "careful");
        }
    }

    #[test]
    fn test_rules_sorted_longest_first() {
        let report = TriggerIndex::compile(&json!({
            "info": [{ "type": "match", "match": ["new", "new york city", "new york"] }]
        }));

        let patterns: Vec<&str> = report.index.rules().iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["new york city", "new york", "new"]);
    }

    #[test]
    fn test_equal_length_keeps_document_order() {
        let report = TriggerIndex::compile(&json!({
            "info": [{ "type": "match", "match": ["bbb"] }],
            "error": [{ "type": "match", "match": ["aaa"] }]
        }));

        // Error bucket compiles first, so it wins the tie
        let patterns: Vec<&str> = report.index.rules().iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["aaa", "bbb"]);
    }

    #[test]
    fn test_invalid_regex_dropped_with_warning() {
        let report = TriggerIndex::compile(&json!({
            "error": [{ "type": "regex", "regex": ["(unclosed", "ok+"] }]
        }));

        assert_eq!(report.index.len(), 1);
        assert_eq!(report.index.rules()[0].pattern, "ok+");
        assert!(matches!(report.warnings[0], ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_reserved_and_unknown_buckets() {
        let report = TriggerIndex::compile(&json!({
            "$schema": "ignored",
            "critical": [],
            "info": [{ "type": "match", "match": ["x"] }]
        }));

        assert_eq!(report.index.len(), 1);
        assert_eq!(report.warnings, vec![ConfigError::UnknownBucket("critical".to_string())]);
    }

    #[test]
    fn test_malformed_bucket_and_entry_skipped() {
        let report = TriggerIndex::compile(&json!({
            "error": "not an array",
            "warning": [
                { "type": "unknown", "match": ["a"] },
                { "type": "match", "match": ["kept"] }
            ]
        }));

        assert_eq!(report.index.len(), 1);
        assert_eq!(report.index.rules()[0].pattern, "kept");
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_not_an_object() {
        let report = TriggerIndex::compile(&json!(["error"]));
        assert!(report.index.is_empty());
        assert_eq!(report.warnings, vec![ConfigError::NotAnObject]);
    }

    #[test]
    fn test_invalid_json_is_err() {
        assert!(matches!(
            TriggerIndex::from_json_str("{ nope"),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_option_shapes() {
        let report = TriggerIndex::compile(&json!({
            "info": [{ "type": "match", "match": ["@client"], "handler": { "filter": true, "options": [
                { "label": "Blackrock", "on-select": { "display": "Blackrock Inc" } },
                { "label": "Other", "user-input": true, "placeholder": "Type a name" }
            ] } }]
        }));

        let rule = &report.index.rules()[0];
        assert!(rule.payload().filterable);
        assert_eq!(rule.affordance(), Affordance::Menu);
        let options = rule.options();
        assert_eq!(options[0].value, "Blackrock Inc");
        assert_eq!(options[0].commit_mode(), CommitMode::Replace);
        assert!(options[1].is_freeform_input);
        assert_eq!(options[1].placeholder.as_deref(), Some("Type a name"));
        assert_eq!(options[1].commit_mode(), CommitMode::Append);
    }

    #[test]
    fn test_handler_kind_inference() {
        let report = TriggerIndex::compile(&json!({
            "error": [{ "type": "match", "match": ["banned"] }],
            "warning": [
                { "type": "match", "match": ["hmm"], "handler": { "message": "?" } },
                { "type": "match", "match": ["pick"], "handler": { "options": [{ "label": "a" }] } },
                { "type": "match", "match": ["pickwarn"], "handler": { "message": "m", "options": [{ "label": "a" }] } },
                { "type": "match", "match": ["linked"], "handler": {
                    "options": [{ "label": "a" }], "link": { "label": "docs", "href": "https://example.com" } } },
                { "type": "match", "match": ["explicit"], "handler": { "kind": "menu-only", "options": [{ "label": "a" }] } }
            ]
        }));

        let kind_of = |p: &str| {
            report.index.rules().iter().find(|r| r.pattern == p).map(|r| r.payload().handler)
        };
        assert_eq!(kind_of("banned"), Some(HandlerKind::NotAllowed));
        assert_eq!(kind_of("hmm"), Some(HandlerKind::Warn));
        assert_eq!(kind_of("pick"), Some(HandlerKind::SelectOne));
        assert_eq!(kind_of("pickwarn"), Some(HandlerKind::SelectOneAndWarn));
        assert_eq!(kind_of("linked"), Some(HandlerKind::MenuWithLink));
        assert_eq!(kind_of("explicit"), Some(HandlerKind::MenuOnly));
    }

    #[test]
    fn test_rule_lookup_by_id() {
        let report = TriggerIndex::compile(&json!({
            "info": [{ "type": "match", "match": ["a", "longer"] }]
        }));
        let index = report.index;

        assert_eq!(index.rule(0).map(|r| r.pattern.as_str()), Some("a"));
        assert_eq!(index.rule(1).map(|r| r.pattern.as_str()), Some("longer"));
        assert!(index.rule(2).is_none());
    }

    #[test]
    fn test_stats() {
        let report = TriggerIndex::compile(&json!({
            "error": [{ "type": "regex", "regex": ["\\d+"] }],
            "info": [{ "type": "match", "match": ["x", "y"], "handler": { "options": [{ "label": "z" }] } }]
        }));
        let stats = report.index.stats();

        assert_eq!(stats.rule_count, 3);
        assert_eq!(stats.regex_count, 1);
        assert_eq!(stats.literal_count, 2);
        assert_eq!(stats.error_rules, 1);
        assert_eq!(stats.info_rules, 2);
        assert_eq!(stats.menu_rules, 2);
    }
}
