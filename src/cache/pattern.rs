//! Purge glob patterns.
//!
//! Patterns use Redis `SCAN MATCH` syntax: `*`, `?`, `[abc]`, `[^abc]`,
//! `[a-z]` and `\` to escape the next character. The namespace part is always
//! literal; only the suffix may carry glob syntax.

use std::fmt;

use super::error::CacheError;
use super::keys::{DELIMITER, EntityKind};

const GLOB_META: &[char] = &['*', '?', '[', ']', '\\'];

/// A validated glob pattern over cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern(String);

impl KeyPattern {
    /// Build `<namespace>:<suffix_glob>`.
    ///
    /// The namespace must be a non-empty literal; the suffix must be a
    /// well-formed glob.
    pub fn new(namespace: &str, suffix_glob: &str) -> Result<Self, CacheError> {
        let pattern = format!("{namespace}{DELIMITER}{suffix_glob}");
        if namespace.is_empty() {
            return Err(malformed(&pattern, "namespace is empty"));
        }
        if namespace.contains(GLOB_META) {
            return Err(malformed(&pattern, "namespace contains glob metacharacters"));
        }
        if suffix_glob.is_empty() {
            return Err(malformed(&pattern, "glob suffix is empty"));
        }
        validate_glob(&pattern)?;
        Ok(Self(pattern))
    }

    /// Parse a complete pattern such as `album:song_count:*`.
    pub fn parse(pattern: &str) -> Result<Self, CacheError> {
        match pattern.split_once(DELIMITER) {
            Some((namespace, suffix)) => Self::new(namespace, suffix),
            None => Err(malformed(pattern, "pattern has no namespace segment")),
        }
    }

    /// Every key of one entity kind: `<entity>:*`.
    pub fn entity(kind: EntityKind) -> Self {
        Self(format!("{kind}{DELIMITER}*"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Redis glob semantics.
    pub fn matches(&self, key: &str) -> bool {
        glob_match(self.0.as_bytes(), key.as_bytes())
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn malformed(pattern: &str, reason: &'static str) -> CacheError {
    CacheError::MalformedPattern {
        pattern: pattern.to_string(),
        reason,
    }
}

fn validate_glob(pattern: &str) -> Result<(), CacheError> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 >= bytes.len() {
                    return Err(malformed(pattern, "trailing escape"));
                }
                i += 2;
            }
            b'[' => {
                let mut j = i + 1;
                if j < bytes.len() && bytes[j] == b'^' {
                    j += 1;
                }
                let start = j;
                loop {
                    if j >= bytes.len() {
                        return Err(malformed(pattern, "unterminated character class"));
                    }
                    match bytes[j] {
                        b'\\' => {
                            if j + 1 >= bytes.len() {
                                return Err(malformed(pattern, "trailing escape"));
                            }
                            j += 2;
                        }
                        b']' if j > start => break,
                        b']' => return Err(malformed(pattern, "empty character class")),
                        _ => j += 1,
                    }
                }
                i = j + 1;
            }
            b']' => return Err(malformed(pattern, "unbalanced ']'")),
            _ => i += 1,
        }
    }
    Ok(())
}

/// Match `text` against a Redis-style glob. Assumes `pattern` was validated.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    // Backtrack point for the most recent `*`: (pattern index after it, text index).
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p + 1, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t])
                        && matched
                    {
                        p = next;
                        t += 1;
                        continue;
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Evaluate a `[...]` class starting at `open`. Returns whether `c` matched
/// and the index just past the closing bracket.
fn match_class(pattern: &[u8], open: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }
    let start = i;
    let mut matched = false;

    while i < pattern.len() {
        match pattern[i] {
            b']' if i > start => return Some((matched != negate, i + 1)),
            b'\\' if i + 1 < pattern.len() => {
                matched |= pattern[i + 1] == c;
                i += 2;
            }
            lo if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' => {
                let hi = pattern[i + 2];
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                matched |= (lo..=hi).contains(&c);
                i += 3;
            }
            other => {
                matched |= other == c;
                i += 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> KeyPattern {
        KeyPattern::parse(s).unwrap()
    }

    #[test]
    fn builds_namespaced_pattern() {
        let p = KeyPattern::new("album:song_count", "*").unwrap();
        assert_eq!(p.as_str(), "album:song_count:*");
        assert_eq!(KeyPattern::entity(EntityKind::Playlist).as_str(), "playlist:*");
    }

    #[test]
    fn star_matches_any_suffix() {
        let p = pattern("playlist:*");
        assert!(p.matches("playlist:songs:1"));
        assert!(p.matches("playlist:aggregation:1"));
        assert!(p.matches("playlist:"));
        assert!(!p.matches("list:playlists"));
        assert!(!p.matches("playlists:1"));
    }

    #[test]
    fn question_mark_and_classes() {
        assert!(pattern("song:?1").matches("song:A1"));
        assert!(!pattern("song:?1").matches("song:AA1"));
        assert!(pattern("song:[ab]*").matches("song:b42"));
        assert!(!pattern("song:[ab]*").matches("song:c42"));
        assert!(pattern("song:[^ab]*").matches("song:c42"));
        assert!(pattern("song:[0-9]").matches("song:7"));
        assert!(!pattern("song:[0-9]").matches("song:x"));
    }

    #[test]
    fn escapes_are_literal() {
        let p = pattern("song:a\\*b");
        assert!(p.matches("song:a*b"));
        assert!(!p.matches("song:axb"));
    }

    #[test]
    fn star_backtracks() {
        let p = pattern("album:*:A1");
        assert!(p.matches("album:song_count:A1"));
        assert!(!p.matches("album:song_count:A2"));
    }

    #[test]
    fn rejects_malformed_globs() {
        for bad in [
            "song:[ab",
            "song:a\\",
            "song:]",
            "song:[]",
            "nocolon",
            ":x",
            "so*ng:x",
            "song:",
        ] {
            let err = KeyPattern::parse(bad).unwrap_err();
            assert!(matches!(err, CacheError::MalformedPattern { .. }), "{bad:?}");
        }
    }
}
