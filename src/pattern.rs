//! Wildcard file-name filter.
//!
//! `*` matches any run of characters, `?` exactly one; everything else is
//! literal. Matching is case-insensitive and covers the whole name.

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Translate a glob into an anchored regular expression.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut literal = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut literal))),
        }
    }

    out.push('$');
    out
}

/// Optional filter: `None` or a blank pattern keeps every name.
pub fn compile_filter(pattern: Option<&str>) -> Result<Option<GlobPattern>, regex::Error> {
    match pattern.map(str::trim) {
        Some(p) if !p.is_empty() => GlobPattern::new(p).map(Some),
        _ => Ok(None),
    }
}
