use crate::error::{PipelineError, Result};
use std::path::Path;

/// A glob-style pattern, compiled once and matched many times.
///
/// Supports `*` (any run of characters), `?` (any single character) and
/// character classes `[abc]`, `[a-z]`, `[!abc]`. A path matches when either
/// its file name or its full string form matches the pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
    Class { negated: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

impl PathMatcher {
    /// Compile a pattern. Fails on an unterminated character class.
    pub fn new(pattern: &str) -> Result<Self> {
        let tokens = compile(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a path: the file name is tried first, then the full path
    /// string.
    pub fn matches(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.matches_str(name) {
                return true;
            }
        }
        path.to_str().is_some_and(|full| self.matches_str(full))
    }

    /// Match a bare string against the pattern.
    pub fn matches_str(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        match_tokens(&self.tokens, &chars)
    }
}

fn compile(pattern: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Collapse runs of consecutive stars
                if tokens.last() != Some(&Token::AnyRun) {
                    tokens.push(Token::AnyRun);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '[' => {
                let (token, next) = compile_class(pattern, &chars, i)?;
                tokens.push(token);
                i = next;
            }
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn compile_class(pattern: &str, chars: &[char], start: usize) -> Result<(Token, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut items = Vec::new();
    let mut first = true;
    while i < chars.len() {
        let c = chars[i];
        if c == ']' && !first {
            return Ok((Token::Class { negated, items }, i + 1));
        }
        first = false;
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|c| *c != ']') {
            items.push(ClassItem::Range(c, chars[i + 2]));
            i += 3;
        } else {
            items.push(ClassItem::Char(c));
            i += 1;
        }
    }
    Err(PipelineError::ConfigError(format!(
        "unterminated character class in pattern '{pattern}'"
    )))
}

fn class_matches(negated: bool, items: &[ClassItem], c: char) -> bool {
    let hit = items.iter().any(|item| match item {
        ClassItem::Char(lit) => *lit == c,
        ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
    });
    hit != negated
}

/// Iterative wildcard match with single-star backtracking.
fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
    let mut t = 0;
    let mut i = 0;
    let mut star: Option<usize> = None;
    let mut star_i = 0;

    while i < text.len() {
        let consumed = match tokens.get(t) {
            Some(Token::Literal(c)) => *c == text[i],
            Some(Token::AnyChar) => true,
            Some(Token::Class { negated, items }) => class_matches(*negated, items, text[i]),
            Some(Token::AnyRun) => {
                star = Some(t);
                star_i = i;
                t += 1;
                continue;
            }
            None => false,
        };
        if consumed {
            t += 1;
            i += 1;
        } else if let Some(s) = star {
            // Backtrack: let the last star swallow one more character.
            t = s + 1;
            star_i += 1;
            i = star_i;
        } else {
            return false;
        }
    }

    while tokens.get(t) == Some(&Token::AnyRun) {
        t += 1;
    }
    t == tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn star_matches_suffixes() {
        let m = PathMatcher::new("*.txt").unwrap();
        assert!(m.matches_str("a.txt"));
        assert!(m.matches_str(".txt"));
        assert!(!m.matches_str("a.log"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        let m = PathMatcher::new("file?.rs").unwrap();
        assert!(m.matches_str("file1.rs"));
        assert!(!m.matches_str("file10.rs"));
    }

    #[test]
    fn character_classes() {
        let m = PathMatcher::new("[a-c]*.log").unwrap();
        assert!(m.matches_str("beta.log"));
        assert!(!m.matches_str("delta.log"));

        let m = PathMatcher::new("[!0-9]*").unwrap();
        assert!(m.matches_str("abc"));
        assert!(!m.matches_str("1abc"));
    }

    #[test]
    fn paths_match_on_file_name_or_full_path() {
        let m = PathMatcher::new("*.txt").unwrap();
        assert!(m.matches(&PathBuf::from("sub/c.txt")));
        assert!(m.matches(&PathBuf::from("/abs/root/a.txt")));
        assert!(!m.matches(&PathBuf::from("sub/c.log")));

        let m = PathMatcher::new("sub").unwrap();
        assert!(m.matches(&PathBuf::from("root/sub")));
    }

    #[test]
    fn backtracking_star_runs() {
        let m = PathMatcher::new("a*b*c").unwrap();
        assert!(m.matches_str("aXbYc"));
        assert!(m.matches_str("abbbc"));
        assert!(!m.matches_str("acb"));
    }

    #[test]
    fn unterminated_class_is_rejected() {
        assert!(PathMatcher::new("[abc").is_err());
    }
}
