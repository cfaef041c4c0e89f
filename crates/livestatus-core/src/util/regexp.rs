//! Regular expressions with literal and case-insensitive modes.
//!
//! Filters use the same primitive for plain equality (literal syntax) and
//! pattern matching, so both paths share case handling.

use regex::{NoExpand, Regex, RegexBuilder};

/// Case sensitivity of a [`RegExp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Ignore,
    Respect,
}

/// How the pattern text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Regular expression syntax.
    Pattern,
    /// Every character stands for itself.
    Literal,
}

#[derive(Debug, Clone)]
pub struct RegExp {
    syntax: Syntax,
    /// Unanchored, used by `search` and `replace`.
    unanchored: Regex,
    /// Anchored at both ends, used by `matches`.
    anchored: Regex,
}

impl RegExp {
    pub fn new(pattern: &str, case: Case, syntax: Syntax) -> Result<Self, regex::Error> {
        let source = match syntax {
            Syntax::Pattern => pattern.to_string(),
            Syntax::Literal => regex::escape(pattern),
        };
        let build = |source: &str| {
            RegexBuilder::new(source)
                .case_insensitive(case == Case::Ignore)
                .build()
        };
        Ok(Self {
            syntax,
            unanchored: build(&source)?,
            anchored: build(&format!("^(?:{source})$"))?,
        })
    }

    /// True if the whole string matches.
    pub fn matches(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// True if any substring matches.
    pub fn search(&self, text: &str) -> bool {
        self.unanchored.is_match(text)
    }

    /// Replaces all matches. With literal syntax the replacement is literal too.
    pub fn replace(&self, text: &str, replacement: &str) -> String {
        match self.syntax {
            Syntax::Literal => self
                .unanchored
                .replace_all(text, NoExpand(replacement))
                .into_owned(),
            Syntax::Pattern => self.unanchored.replace_all(text, replacement).into_owned(),
        }
    }
}
