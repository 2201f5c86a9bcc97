//! Import path remapping
//!
//! Rules come from a plain-text file with one `find=replace` pair per line.
//! During preprocessing each source line that is an import statement has the
//! first `"<find>` occurrence of every rule swapped for `"<replace>`, rules
//! applied in file order. Every other line is passed through untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

use crate::error::ConfigError;

/// Default rules file, relative to the project root.
pub const DEFAULT_REMAPPINGS_FILE: &str = "remappings.txt";

/// Matches lines that start (after indentation) with the `import` keyword.
static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*import\s").unwrap());

/// One find/replace pair for import rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemappingRule {
    pub find: String,
    pub replace: String,
}

impl RemappingRule {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }
}

/// Parse the contents of a rules file.
///
/// Lines are split on their first `=`, both halves trimmed. Blank lines are
/// skipped and file order is kept.
///
/// # Errors
///
/// `MalformedRule` for a non-blank line without `=`, or with nothing before
/// it.
pub fn load_rules(text: &str) -> Result<Vec<RemappingRule>, ConfigError> {
    let mut rules = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let malformed = || ConfigError::MalformedRule {
            line_number: index + 1,
            line: line.to_string(),
        };

        let (find, replace) = line.split_once('=').ok_or_else(malformed)?;
        let find = find.trim();
        if find.is_empty() {
            return Err(malformed());
        }

        rules.push(RemappingRule::new(find, replace.trim()));
    }

    tracing::debug!(count = rules.len(), "loaded remapping rules");
    Ok(rules)
}

/// Read and parse a rules file from disk.
pub fn load_rules_file(path: &Path) -> Result<Vec<RemappingRule>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_rules(&content)
}

/// Whether `line` is an import statement eligible for rewriting.
pub fn is_import_line(line: &str) -> bool {
    IMPORT_LINE.is_match(line)
}

/// Rewrite the import paths of a single line.
///
/// Lines that are not import statements, or that no rule applies to, are
/// returned borrowed and unchanged.
pub fn transform_line<'a>(line: &'a str, rules: &[RemappingRule]) -> Cow<'a, str> {
    if !is_import_line(line) {
        return Cow::Borrowed(line);
    }

    let mut out = Cow::Borrowed(line);
    for rule in rules {
        let needle = format!("\"{}", rule.find);
        if out.contains(&needle) {
            let rewritten = out.replacen(&needle, &format!("\"{}", rule.replace), 1);
            tracing::trace!(find = %rule.find, replace = %rule.replace, "rewrote import");
            out = Cow::Owned(rewritten);
        }
    }
    out
}

/// An ordered rule set applied to whole source texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remapper {
    rules: Vec<RemappingRule>,
}

impl Remapper {
    pub fn new(rules: Vec<RemappingRule>) -> Self {
        Self { rules }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(load_rules_file(path)?))
    }

    pub fn rules(&self) -> &[RemappingRule] {
        &self.rules
    }

    pub fn transform_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        transform_line(line, &self.rules)
    }

    /// Transform every line of `source`. Line order, line endings and a
    /// trailing newline are preserved.
    pub fn transform_source(&self, source: &str) -> String {
        let lines: Vec<Cow<'_, str>> = source
            .split('\n')
            .map(|line| self.transform_line(line))
            .collect();
        lines.join("\n")
    }
}
