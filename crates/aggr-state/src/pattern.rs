//! Glob-style key patterns.
//!
//! Bulk deletes and index queries take the same pattern language as the
//! store's key scans: `*` matches any run of characters, `?` exactly one,
//! `[...]` a character class (`[^...]` / `[!...]` negated), and `\` escapes
//! the next character. Matching is case-sensitive and anchored at both ends.

use regex::Regex;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> StoreResult<Self> {
        let invalid = |reason: &str| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut re = String::with_capacity(pattern.len() + 8);
        re.push_str("(?s)^");
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| invalid("trailing escape"))?;
                    re.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
                '[' => {
                    re.push('[');
                    let mut first = true;
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            ']' if !first => {
                                closed = true;
                                break;
                            }
                            '^' | '!' if first => re.push('^'),
                            '\\' | '[' | ']' | '&' | '~' => {
                                re.push('\\');
                                re.push(c);
                            }
                            _ => re.push(c),
                        }
                        first = false;
                    }
                    if !closed {
                        return Err(invalid("unterminated character class"));
                    }
                    re.push(']');
                }
                _ => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Escape glob metacharacters so `literal` only matches itself.
    pub fn escape(literal: &str) -> String {
        let mut out = String::with_capacity(literal.len());
        for c in literal.chars() {
            if matches!(c, '*' | '?' | '[' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
