//! Literal-or-regex pattern lists used by scope rules

use regex::{Regex, RegexBuilder};

/// Characters that mark a scope entry as a regular expression
///
/// `.` is deliberately absent: host names and file names are full of dots.
const REGEX_METACHARACTERS: &[char] = &['^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '\\'];

/// How a literal entry (one without metacharacters) is anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralMode {
    /// The whole candidate must equal the entry (host names, IPs)
    Exact,
    /// The candidate must start with the entry (paths, URLs)
    Prefix,
}

/// A single compiled scope entry
#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    regex: Regex,
    literal: bool,
}

/// An ordered list of compiled scope entries
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    /// Compiles configuration lines into a pattern list
    ///
    /// Blank lines are skipped. A line with regex metacharacters is compiled
    /// as written; if it does not compile it falls back to a literal match
    /// and a warning is logged.
    ///
    /// # Arguments
    ///
    /// * `lines` - The configured entries
    /// * `mode` - Anchoring used for literal entries
    /// * `case_insensitive` - Match ignoring ASCII case
    pub fn compile(lines: &[String], mode: LiteralMode, case_insensitive: bool) -> Self {
        let patterns = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                if is_literal(line) {
                    return literal_pattern(line, mode, case_insensitive);
                }
                match RegexBuilder::new(line)
                    .case_insensitive(case_insensitive)
                    .build()
                {
                    Ok(regex) => Some(Pattern {
                        source: line.to_string(),
                        regex,
                        literal: false,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            "Scope pattern '{}' does not compile ({}), matching it literally",
                            line,
                            e
                        );
                        literal_pattern(line, mode, case_insensitive)
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    /// Returns true if any entry matches the candidate
    pub fn is_match(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(candidate))
    }

    /// Returns the source text of the first entry matching the candidate
    pub fn first_match(&self, candidate: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(candidate))
            .map(|p| p.source.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Lists entries with a marker telling literal and regex entries apart
    pub fn describe(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|p| {
                if p.literal {
                    format!("literal {}", p.source)
                } else {
                    format!("regex   {}", p.source)
                }
            })
            .collect()
    }
}

/// Returns true if the entry contains no regex metacharacters
fn is_literal(line: &str) -> bool {
    !line.contains(REGEX_METACHARACTERS)
}

fn literal_pattern(line: &str, mode: LiteralMode, case_insensitive: bool) -> Option<Pattern> {
    let escaped = regex::escape(line);
    let anchored = match mode {
        LiteralMode::Exact => format!("^{}$", escaped),
        LiteralMode::Prefix => format!("^{}", escaped),
    };
    // An escaped literal always compiles; a failure here would mean a size limit.
    match RegexBuilder::new(&anchored)
        .case_insensitive(case_insensitive)
        .build()
    {
        Ok(regex) => Some(Pattern {
            source: line.to_string(),
            regex,
            literal: true,
        }),
        Err(e) => {
            tracing::warn!("Dropping scope pattern '{}': {}", line, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_literal_host_is_exact() {
        let list = PatternList::compile(&lines(&["example.com"]), LiteralMode::Exact, true);
        assert!(list.is_match("example.com"));
        assert!(list.is_match("EXAMPLE.com"));
        assert!(!list.is_match("sub.example.com"));
        assert!(!list.is_match("exampleXcom"));
    }

    #[test]
    fn test_literal_path_is_prefix() {
        let list = PatternList::compile(&lines(&["/admin"]), LiteralMode::Prefix, false);
        assert!(list.is_match("/admin"));
        assert!(list.is_match("/admin/users"));
        assert!(!list.is_match("/public/admin"));
    }

    #[test]
    fn test_regex_entry() {
        let list = PatternList::compile(&lines(&[r".*\.example\.com$"]), LiteralMode::Exact, true);
        assert!(list.is_match("api.example.com"));
        assert!(!list.is_match("example.org"));
        assert_eq!(list.describe(), vec![r"regex   .*\.example\.com$".to_string()]);
    }

    #[test]
    fn test_invalid_regex_falls_back_to_literal() {
        let list = PatternList::compile(&lines(&["/cart(old"]), LiteralMode::Prefix, false);
        assert_eq!(list.len(), 1);
        assert!(list.is_match("/cart(old/items"));
        assert!(!list.is_match("/cartold"));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let list = PatternList::compile(&lines(&["", "   "]), LiteralMode::Exact, true);
        assert!(list.is_empty());
        assert!(!list.is_match(""));
    }

    #[test]
    fn test_first_match_reports_source() {
        let list = PatternList::compile(&lines(&["/a", "/b"]), LiteralMode::Prefix, false);
        assert_eq!(list.first_match("/b/c"), Some("/b"));
        assert_eq!(list.first_match("/c"), None);
    }
}
