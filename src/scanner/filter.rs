//! Exclusion predicates consulted by the walker.
//!
//! Rule-file semantics belong to the configuration layer; the scan only
//! depends on this predicate interface. [`RuleFilter`] offers a small
//! rule-based implementation for embedding and tests.

use std::path::Path;

use regex::Regex;

use crate::core::errors::{PdError, Result};

/// Exclusion decisions for one scan. Every method returns `true` when
/// the entry must be skipped.
pub trait FilterSet {
    /// Exclude a regular file or link observation.
    fn filter_path(&self, disk_name: &str, sub: &str) -> bool;

    /// Exclude a directory (its whole subtree is skipped).
    fn filter_dir(&self, disk_name: &str, sub: &str) -> bool;

    /// Exclude an inventory/content file, checked before any stat.
    fn filter_content(&self, path: &Path) -> bool;

    /// Exclude a hidden entry by name, checked before any stat.
    fn filter_hidden(&self, name: &str) -> bool;
}

/// Filter that excludes nothing.
#[derive(Debug, Default)]
pub struct NoFilters;

impl FilterSet for NoFilters {
    fn filter_path(&self, _disk_name: &str, _sub: &str) -> bool {
        false
    }

    fn filter_dir(&self, _disk_name: &str, _sub: &str) -> bool {
        false
    }

    fn filter_content(&self, _path: &Path) -> bool {
        false
    }

    fn filter_hidden(&self, _name: &str) -> bool {
        false
    }
}

/// Compiled shell-style glob.
#[derive(Debug, Clone)]
struct GlobPattern {
    compiled: Regex,
}

/// Rule-based filter: exclude globs matched against sub-paths,
/// content-file names, and an optional hidden-entry toggle.
///
/// Globs use shell syntax: `*` matches within a path component, `**`
/// across components, `?` a single character.
#[derive(Debug, Default)]
pub struct RuleFilter {
    exclude: Vec<GlobPattern>,
    content_names: Vec<String>,
    exclude_hidden: bool,
}

impl RuleFilter {
    /// Compile exclusion globs and content-file names.
    pub fn new(
        exclude_patterns: &[String],
        content_names: &[String],
        exclude_hidden: bool,
    ) -> Result<Self> {
        let exclude = exclude_patterns
            .iter()
            .map(|pattern| {
                let compiled =
                    Regex::new(&glob_to_regex(pattern)).map_err(|err| PdError::InvalidConfig {
                        details: format!("invalid exclude pattern '{pattern}': {err}"),
                    })?;
                Ok(GlobPattern { compiled })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            exclude,
            content_names: content_names.to_vec(),
            exclude_hidden,
        })
    }

    fn matches_exclude(&self, sub: &str) -> bool {
        self.exclude.iter().any(|pattern| pattern.compiled.is_match(sub))
    }
}

impl FilterSet for RuleFilter {
    fn filter_path(&self, _disk_name: &str, sub: &str) -> bool {
        self.matches_exclude(sub)
    }

    fn filter_dir(&self, _disk_name: &str, sub: &str) -> bool {
        self.matches_exclude(sub)
    }

    fn filter_content(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.content_names.iter().any(|c| c == name))
    }

    fn filter_hidden(&self, name: &str) -> bool {
        self.exclude_hidden && name.starts_with('.')
    }
}

/// Translate a shell glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            c if "\\.+()[]{}^$|".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');
    regex
}
