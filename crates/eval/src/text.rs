//! Text leaves: prefix, suffix, substring and regular expression.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::ConstructionError;

#[derive(Debug, Clone)]
pub enum TextPattern {
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    /// Compiled when the matcher is built, with case folding baked in.
    Regex(Regex),
}

#[derive(Debug, Clone)]
pub struct TextMatcher {
    pattern: TextPattern,
    ignore_case: bool,
}

impl TextMatcher {
    pub fn new(pattern: TextPattern) -> Self {
        TextMatcher {
            pattern,
            ignore_case: false,
        }
    }

    pub fn regex(pattern: &str) -> Result<Self, ConstructionError> {
        Ok(TextMatcher::new(TextPattern::Regex(compile(pattern, false)?)))
    }

    pub fn ignoring_case(&self) -> Result<Self, ConstructionError> {
        let pattern = match &self.pattern {
            TextPattern::Regex(re) => TextPattern::Regex(compile(re.as_str(), true)?),
            other => other.clone(),
        };
        Ok(TextMatcher {
            pattern,
            ignore_case: true,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        let fold = |s: &str| {
            if self.ignore_case {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        match &self.pattern {
            TextPattern::StartsWith(p) => fold(text).starts_with(&fold(p)),
            TextPattern::EndsWith(p) => fold(text).ends_with(&fold(p)),
            TextPattern::Contains(p) => fold(text).contains(&fold(p)),
            TextPattern::Regex(re) => re.is_match(text),
        }
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex, ConstructionError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| ConstructionError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

impl fmt::Display for TextMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            TextPattern::StartsWith(p) => write!(f, "starting with {:?}", p)?,
            TextPattern::EndsWith(p) => write!(f, "ending with {:?}", p)?,
            TextPattern::Contains(p) => write!(f, "containing {:?}", p)?,
            TextPattern::Regex(re) => write!(f, "matching /{}/", re.as_str())?,
        }
        if self.ignore_case {
            write!(f, " ignoring case")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "four score and seven years ago, the end";

    #[test]
    fn prefix_suffix_substring() {
        assert!(TextMatcher::new(TextPattern::StartsWith("four".into())).is_match(TEXT));
        assert!(TextMatcher::new(TextPattern::EndsWith("the end".into())).is_match(TEXT));
        assert!(TextMatcher::new(TextPattern::Contains("score".into())).is_match(TEXT));
        assert!(!TextMatcher::new(TextPattern::Contains("hen".into())).is_match(TEXT));
    }

    #[test]
    fn case_folding() {
        let m = TextMatcher::new(TextPattern::StartsWith("FouR".into()));
        assert!(!m.is_match(TEXT));
        let folded = m.ignoring_case().unwrap();
        assert!(folded.is_match(TEXT));
        assert_eq!(folded.to_string(), "starting with \"FouR\" ignoring case");
    }

    #[test]
    fn task_code_regex() {
        let m = TextMatcher::regex("^[A-Z]{1,3}[1-9][0-9]{2}$").unwrap();
        for ok in ["AB123", "ABC999", "P100"] {
            assert!(m.is_match(ok), "{}", ok);
        }
        for bad in ["100", "ABC", "ABC012", "ABC1234", "p100"] {
            assert!(!m.is_match(bad), "{}", bad);
        }
        assert!(m.ignoring_case().unwrap().is_match("p100"));
    }

    #[test]
    fn invalid_regex_fails_at_construction() {
        assert!(matches!(
            TextMatcher::regex("[unclosed"),
            Err(ConstructionError::InvalidRegex { .. })
        ));
    }
}
