//! Shell-style glob matching for single path components.
//!
//! Supported syntax:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from a set or range
//! - `[!abc]` / `[^abc]` match one character NOT in the set
//! - `{a,b}` brace alternatives (nested braces allowed)
//! - `\x` matches `x` literally
//!
//! Patterns and inputs are `OsStr`s, so names that are not valid UTF-8 can
//! still be matched. Each byte outside a valid UTF-8 sequence counts as one
//! character that only equals itself.

use std::ffi::OsStr;

/// Upper bound on matcher steps for a single pattern.
/// Keeps patterns like `*a*a*a*a*b` from backtracking forever.
const MAX_STEPS: usize = 100_000;

/// Check if a name contains glob metacharacters (`*`, `?`, `[`, `{`).
///
/// ```
/// use histfile_glob::contains_glob;
/// assert!(contains_glob("[0-9]*-notes.txt"));
/// assert!(contains_glob("{a,b}.txt"));
/// assert!(!contains_glob("1999.09.09-notes.txt"));
/// ```
pub fn contains_glob(s: impl AsRef<OsStr>) -> bool {
    s.as_ref()
        .as_encoded_bytes()
        .iter()
        .any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
}

/// Match a name against a glob pattern.
///
/// The whole input must match. Braces are expanded first and the input
/// matches if any alternative does.
///
/// ```
/// use histfile_glob::glob_match;
///
/// assert!(glob_match("[0-9][0-9][0-9][0-9].[0-9][0-9].[0-9][0-9]-f", "1983.02.01-f"));
/// assert!(glob_match("*.{txt,md}", "notes.md"));
/// assert!(!glob_match("?", ""));
/// ```
pub fn glob_match(pattern: impl AsRef<OsStr>, input: impl AsRef<OsStr>) -> bool {
    let input = units(input.as_ref().as_encoded_bytes());
    brace_alternatives(pattern.as_ref().as_encoded_bytes())
        .iter()
        .any(|alt| {
            let pat = units(alt);
            let mut budget = MAX_STEPS;
            Matcher { pat: &pat, input: &input, budget: &mut budget }.run(0, 0)
        })
}

/// Expand the brace groups of a pattern into every alternative.
///
/// Unbalanced braces are kept as literal text.
///
/// ```
/// use histfile_glob::expand_braces;
///
/// assert_eq!(expand_braces("plain"), vec!["plain"]);
/// assert_eq!(expand_braces("a{1,2}"), vec!["a1", "a2"]);
/// ```
pub fn expand_braces(pattern: &str) -> Vec<String> {
    brace_alternatives(pattern.as_bytes())
        .iter()
        .map(|alt| String::from_utf8_lossy(alt).into_owned())
        .collect()
}

/// Brace expansion over raw bytes. Braces and commas are ASCII, so cutting
/// there never splits a multi-byte character.
fn brace_alternatives(pattern: &[u8]) -> Vec<Vec<u8>> {
    let Some((open, close)) = first_brace_group(pattern) else {
        return vec![pattern.to_vec()];
    };

    let head = &pattern[..open];
    let tail = &pattern[close + 1..];
    split_alternatives(&pattern[open + 1..close])
        .into_iter()
        .flat_map(|alt| brace_alternatives(&[head, alt, tail].concat()))
        .collect()
}

/// Locate the first balanced top-level `{...}` group.
fn first_brace_group(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut open = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|o| (o, i));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split brace content on top-level commas.
fn split_alternatives(body: &[u8]) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, &b) in body.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// One matchable character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Char(char),
    /// A byte that is not part of valid UTF-8.
    Raw(u8),
}

fn units(bytes: &[u8]) -> Vec<Unit> {
    let mut out = Vec::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.extend(chunk.valid().chars().map(Unit::Char));
        out.extend(chunk.invalid().iter().copied().map(Unit::Raw));
    }
    out
}

const STAR: Unit = Unit::Char('*');
const DASH: Unit = Unit::Char('-');
const CLOSE: Unit = Unit::Char(']');

struct Matcher<'a> {
    pat: &'a [Unit],
    input: &'a [Unit],
    budget: &'a mut usize,
}

impl Matcher<'_> {
    fn run(&mut self, pi: usize, ii: usize) -> bool {
        if *self.budget == 0 {
            return false;
        }
        *self.budget -= 1;

        let Some(&p) = self.pat.get(pi) else {
            return ii == self.input.len();
        };

        match p {
            STAR => {
                let mut next = pi;
                while self.pat.get(next) == Some(&STAR) {
                    next += 1;
                }
                if next == self.pat.len() {
                    return true;
                }
                (ii..=self.input.len()).any(|start| self.run(next, start))
            }
            Unit::Char('?') => ii < self.input.len() && self.run(pi + 1, ii + 1),
            Unit::Char('[') => {
                let Some(&c) = self.input.get(ii) else {
                    return false;
                };
                match class_match(&self.pat[pi..], c) {
                    Some((true, width)) => self.run(pi + width, ii + 1),
                    Some((false, _)) => false,
                    // Unclosed class: `[` is literal.
                    None => c == Unit::Char('[') && self.run(pi + 1, ii + 1),
                }
            }
            Unit::Char('\\') if pi + 1 < self.pat.len() => {
                self.input.get(ii) == Some(&self.pat[pi + 1]) && self.run(pi + 2, ii + 1)
            }
            literal => self.input.get(ii) == Some(&literal) && self.run(pi + 1, ii + 1),
        }
    }
}

/// Evaluate a `[...]` class at the start of `pat` against `c`.
///
/// Returns `(matched, consumed)` or `None` when the class is never closed.
/// Ranges only span characters; a raw byte matches by equality.
fn class_match(pat: &[Unit], c: Unit) -> Option<(bool, usize)> {
    let mut i = 1;
    let negated = matches!(pat.get(i), Some(Unit::Char('!' | '^')));
    if negated {
        i += 1;
    }

    let body_start = i;
    let mut hit = false;
    loop {
        let &cur = pat.get(i)?;
        if cur == CLOSE && i > body_start {
            return Some((hit != negated, i + 1));
        }
        match (pat.get(i + 1), pat.get(i + 2)) {
            (Some(&DASH), Some(&hi)) if hi != CLOSE => {
                hit |= match (cur, hi, c) {
                    (Unit::Char(lo), Unit::Char(hi), Unit::Char(c)) => (lo..=hi).contains(&c),
                    _ => false,
                };
                i += 3;
            }
            _ => {
                hit |= cur == c;
                i += 1;
            }
        }
    }
}
