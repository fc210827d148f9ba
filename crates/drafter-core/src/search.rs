//! Bounded search and replace over the draft buffer.
//!
//! Match enumeration is capped so pathological patterns on large drafts stay
//! cheap, and invalid regex syntax is reported as state rather than raised.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Default upper bound on enumerated matches.
pub const DEFAULT_MAX_MATCHES: usize = 500;

/// What to search for and how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub match_case: bool,
    #[serde(default)]
    pub use_regex: bool,
}

impl SearchQuery {
    pub fn plain(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn regex(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            use_regex: true,
            ..Default::default()
        }
    }

    pub fn case_sensitive(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    fn compile(&self) -> Result<Regex, regex::Error> {
        let pattern = if self.use_regex {
            self.query.clone()
        } else {
            regex::escape(&self.query)
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(!self.match_case)
            .build()
    }
}

/// Byte spans of the matches found in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchSet {
    pub spans: Vec<Range<usize>>,
    /// Set when the pattern failed to compile.
    pub error: Option<String>,
    /// True when more matches existed beyond the cap.
    pub truncated: bool,
}

/// Enumerates non-overlapping matches of `query` in `text`, at most `limit`.
///
/// A zero-length match advances the scan by one character so every pattern
/// terminates.
pub fn find_matches(text: &str, query: &SearchQuery, limit: usize) -> MatchSet {
    if query.query.is_empty() {
        return MatchSet::default();
    }

    let regex = match query.compile() {
        Ok(regex) => regex,
        Err(err) => {
            return MatchSet {
                error: Some(err.to_string()),
                ..Default::default()
            };
        }
    };

    let mut spans = Vec::new();
    let mut pos = 0;
    while pos <= text.len() && spans.len() < limit {
        let Some(found) = regex.find_at(text, pos) else {
            break;
        };
        pos = if found.is_empty() {
            found.end()
                + text[found.end()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8)
        } else {
            found.end()
        };
        spans.push(found.range());
    }

    let truncated = spans.len() >= limit && pos <= text.len() && regex.find_at(text, pos).is_some();

    MatchSet {
        spans,
        error: None,
        truncated,
    }
}

/// The buffer after a replace operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    /// Cursor position (byte offset) right after the last inserted text.
    pub cursor: usize,
    pub replaced: usize,
}

/// Search state for a find/replace panel bound to one buffer.
///
/// Holds the match list for the last refreshed text and the index of the
/// current match. Callers refresh after every edit to the buffer.
#[derive(Debug, Clone)]
pub struct SearchState {
    query: SearchQuery,
    limit: usize,
    matches: MatchSet,
    current: Option<usize>,
}

impl SearchState {
    pub fn new(query: SearchQuery) -> Self {
        Self::with_limit(query, DEFAULT_MAX_MATCHES)
    }

    pub fn with_limit(query: SearchQuery, limit: usize) -> Self {
        Self {
            query,
            limit,
            matches: MatchSet::default(),
            current: None,
        }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// Replaces the query and recomputes matches against `text`.
    pub fn set_query(&mut self, query: SearchQuery, text: &str) {
        self.query = query;
        self.current = None;
        self.refresh(text);
    }

    /// Recomputes matches, keeping the current index when it is still valid.
    pub fn refresh(&mut self, text: &str) {
        self.matches = find_matches(text, &self.query, self.limit);
        self.current = match self.current {
            _ if self.matches.spans.is_empty() => None,
            Some(idx) if idx < self.matches.spans.len() => Some(idx),
            _ => Some(0),
        };
    }

    pub fn matches(&self) -> &[Range<usize>] {
        &self.matches.spans
    }

    pub fn error(&self) -> Option<&str> {
        self.matches.error.as_deref()
    }

    pub fn is_truncated(&self) -> bool {
        self.matches.truncated
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_match(&self) -> Option<Range<usize>> {
        self.current.map(|idx| self.matches.spans[idx].clone())
    }

    /// Moves to the next match, wrapping to the first.
    pub fn next(&mut self) -> Option<Range<usize>> {
        let len = self.matches.spans.len();
        if len == 0 {
            return None;
        }
        self.current = Some(self.current.map_or(0, |idx| (idx + 1) % len));
        self.current_match()
    }

    /// Moves to the previous match, wrapping to the last.
    pub fn previous(&mut self) -> Option<Range<usize>> {
        let len = self.matches.spans.len();
        if len == 0 {
            return None;
        }
        self.current = Some(self.current.map_or(len - 1, |idx| (idx + len - 1) % len));
        self.current_match()
    }

    /// Replaces the current match in `text` and advances to the first match
    /// at or after the cursor.
    pub fn replace_current(&mut self, text: &str, replacement: &str) -> Option<Replacement> {
        let span = self.current_match()?;

        let mut updated = String::with_capacity(text.len() + replacement.len());
        updated.push_str(&text[..span.start]);
        updated.push_str(replacement);
        updated.push_str(&text[span.end..]);
        let cursor = span.start + replacement.len();

        self.matches = find_matches(&updated, &self.query, self.limit);
        self.current = if self.matches.spans.is_empty() {
            None
        } else {
            Some(
                self.matches
                    .spans
                    .iter()
                    .position(|m| m.start >= cursor)
                    .unwrap_or(0),
            )
        };

        Some(Replacement {
            text: updated,
            cursor,
            replaced: 1,
        })
    }

    /// Replaces every enumerated match in one pass over `text`.
    pub fn replace_all(&mut self, text: &str, replacement: &str) -> Option<Replacement> {
        if self.matches.spans.is_empty() {
            return None;
        }

        let mut updated = String::with_capacity(text.len());
        let mut last = 0;
        let mut cursor = 0;
        for span in &self.matches.spans {
            updated.push_str(&text[last..span.start]);
            updated.push_str(replacement);
            cursor = updated.len();
            last = span.end;
        }
        updated.push_str(&text[last..]);
        let replaced = self.matches.spans.len();

        self.current = None;
        self.refresh(&updated);

        Some(Replacement {
            text: updated,
            cursor,
            replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_search_ignores_case_by_default() {
        let set = find_matches("Rain, rain, RAIN", &SearchQuery::plain("rain"), 500);
        assert_eq!(set.spans, vec![0..4, 6..10, 12..16]);

        let set = find_matches(
            "Rain, rain, RAIN",
            &SearchQuery::plain("rain").case_sensitive(true),
            500,
        );
        assert_eq!(set.spans, vec![6..10]);
    }

    #[test]
    fn test_plain_query_escapes_regex_syntax() {
        let set = find_matches("a.b axb", &SearchQuery::plain("a.b"), 500);
        assert_eq!(set.spans, vec![0..3]);
    }

    #[test]
    fn test_invalid_regex_reports_error() {
        let set = find_matches("(text)", &SearchQuery::regex("(unclosed"), 500);
        assert!(set.spans.is_empty());
        assert!(set.error.is_some());
    }

    #[test]
    fn test_zero_length_matches_terminate() {
        let set = find_matches("héllo", &SearchQuery::regex("x*"), 500);
        // One empty match at every char boundary, including the end.
        assert_eq!(set.spans.len(), "héllo".chars().count() + 1);
        assert!(set.spans.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_match_count_is_capped() {
        let text = "a".repeat(20);
        let set = find_matches(&text, &SearchQuery::plain("a"), 5);
        assert_eq!(set.spans.len(), 5);
        assert!(set.truncated);

        let set = find_matches("aaaaa", &SearchQuery::plain("a"), 5);
        assert!(!set.truncated);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut state = SearchState::new(SearchQuery::plain("o"));
        state.refresh("foo bo");
        assert_eq!(state.current_match(), Some(1..2));
        assert_eq!(state.next(), Some(2..3));
        assert_eq!(state.next(), Some(5..6));
        assert_eq!(state.next(), Some(1..2));
        assert_eq!(state.previous(), Some(5..6));
    }

    #[test]
    fn test_replace_current_repositions_cursor() {
        let text = "cat hat cat";
        let mut state = SearchState::new(SearchQuery::plain("cat"));
        state.refresh(text);
        state.next();
        assert_eq!(state.current_match(), Some(8..11));

        let result = state.replace_current(text, "dog").unwrap();
        assert_eq!(result.text, "cat hat dog");
        assert_eq!(result.cursor, 11);
        // Only the first "cat" remains, and navigation wrapped onto it.
        assert_eq!(state.matches(), &[0..3]);
        assert_eq!(state.current_index(), Some(0));
    }

    #[test]
    fn test_replace_all_is_literal() {
        let text = "one two one";
        let mut state = SearchState::new(SearchQuery::regex("(o)ne"));
        state.refresh(text);
        let result = state.replace_all(text, "$1!").unwrap();
        assert_eq!(result.text, "$1! two $1!");
        assert_eq!(result.replaced, 2);
        assert_eq!(result.cursor, "$1! two $1!".len());
        assert!(state.matches().is_empty());
    }

    #[test]
    fn test_no_matches_means_no_replacement() {
        let mut state = SearchState::new(SearchQuery::plain("zzz"));
        state.refresh("abc");
        assert!(state.replace_current("abc", "x").is_none());
        assert!(state.replace_all("abc", "x").is_none());
        assert_eq!(state.next(), None);
    }
}
