//! Canonical comparison form of source text.
//!
//! This is a lexical heuristic, not a lexer. It knows nothing about string
//! literals, so `"http://x"` loses everything after `//` and a `#` inside a
//! C string is treated as a comment start. Both sides of a comparison are
//! damaged the same way, which keeps the score meaningful.
//!
//! Passes, in order:
//! 1. `//` to end of line
//! 2. `/* ... */`, shortest match, across lines
//! 3. `#` to end of line
//! 4. whitespace runs to a single space
//! 5. trim and lowercase

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)//.*$").unwrap());
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static HASH_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)#.*$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(content: &str) -> String {
    let stripped = LINE_COMMENT.replace_all(content, "");
    let stripped = BLOCK_COMMENT.replace_all(&stripped, "");
    let stripped = HASH_COMMENT.replace_all(&stripped, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    collapsed.trim().to_lowercase()
}
