//! Splitting rules for the recursive chunker
//!
//! A [`RuleSet`] is an ordered hierarchy of [`RuleLevel`]s, coarsest first. The
//! recursive chunker only descends to the next level for pieces that are still
//! over budget.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where a matched delimiter ends up after splitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeDelim {
    /// Keep the delimiter at the end of the preceding piece
    #[default]
    Prev,
    /// Keep the delimiter at the start of the following piece
    Next,
    /// Drop the delimiter; the level no longer reconstructs its input
    None,
}

impl std::str::FromStr for IncludeDelim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prev" => Ok(Self::Prev),
            "next" => Ok(Self::Next),
            "none" => Ok(Self::None),
            _ => Err(format!("Unknown delimiter inclusion: {}", s)),
        }
    }
}

/// A single splitting policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleLevel {
    /// Split at any of the delimiters
    Delimiters {
        delimiters: Vec<String>,
        include_delim: IncludeDelim,
    },
    /// Split on the literal space character
    Whitespace,
    /// Terminal level: fixed windows of raw tokens
    Token,
}

impl RuleLevel {
    /// Build a delimiter level
    pub fn delimiters<I, S>(delimiters: I, include_delim: IncludeDelim) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Delimiters {
            delimiters: delimiters.into_iter().map(Into::into).collect(),
            include_delim,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Token)
    }

    fn validate(&self, level: usize) -> Result<(), ConfigError> {
        let Self::Delimiters { delimiters, .. } = self else {
            return Ok(());
        };

        let invalid = |reason: &str| ConfigError::InvalidRuleLevel {
            level,
            reason: reason.to_string(),
        };

        if delimiters.is_empty() {
            return Err(invalid("delimiters must not be empty"));
        }
        if delimiters.iter().any(|d| d.is_empty()) {
            return Err(invalid("delimiters must not contain empty strings"));
        }
        if delimiters.iter().any(|d| d.chars().all(|c| c == ' ')) {
            return Err(invalid(
                "space-only delimiters are not allowed, use a whitespace level instead",
            ));
        }
        Ok(())
    }
}

/// Serialized form of a rule level, as written in config files
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleLevelSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiters: Option<Vec<String>>,

    #[serde(default)]
    pub whitespace: bool,

    #[serde(default)]
    pub include_delim: IncludeDelim,
}

impl RuleLevelSpec {
    fn into_level(self, level: usize) -> Result<RuleLevel, ConfigError> {
        match (self.delimiters, self.whitespace) {
            (Some(_), true) => Err(ConfigError::InvalidRuleLevel {
                level,
                reason: "cannot set both delimiters and whitespace".to_string(),
            }),
            (Some(delimiters), false) => Ok(RuleLevel::Delimiters {
                delimiters,
                include_delim: self.include_delim,
            }),
            (None, true) => Ok(RuleLevel::Whitespace),
            (None, false) => Ok(RuleLevel::Token),
        }
    }
}

/// Ordered hierarchy of rule levels with their compiled delimiter matchers
#[derive(Debug, Clone)]
pub struct RuleSet {
    levels: Vec<RuleLevel>,
    matchers: Vec<Option<Regex>>,
}

impl RuleSet {
    /// Validate the levels and compile one matcher per delimiter level
    pub fn new(levels: Vec<RuleLevel>) -> Result<Self, ConfigError> {
        if levels.is_empty() {
            return Err(ConfigError::EmptyRuleSet);
        }

        let mut matchers = Vec::with_capacity(levels.len());
        for (idx, level) in levels.iter().enumerate() {
            level.validate(idx)?;
            matchers.push(match level {
                RuleLevel::Delimiters { delimiters, .. } => Some(compile_matcher(delimiters, idx)?),
                _ => None,
            });
        }

        Ok(Self { levels, matchers })
    }

    /// Build a rule set from config-file level descriptions
    pub fn from_specs(specs: Vec<RuleLevelSpec>) -> Result<Self, ConfigError> {
        let levels = specs
            .into_iter()
            .enumerate()
            .map(|(idx, spec)| spec.into_level(idx))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(levels)
    }

    /// Look up a named preset: `default`, `markdown` or `token`
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "default" | "text" => Ok(Self::default()),
            "markdown" | "md" => Ok(Self::markdown()),
            "token" => Self::new(vec![RuleLevel::Token]),
            _ => Err(ConfigError::UnknownPreset(name.to_string())),
        }
    }

    /// Markdown headings → code fences → paragraphs → sentences → words → tokens
    pub fn markdown() -> Self {
        let levels = vec![
            RuleLevel::delimiters(["\n# ", "\n## ", "\n### ", "\n#### "], IncludeDelim::Next),
            RuleLevel::delimiters(["\n```"], IncludeDelim::Next),
            RuleLevel::delimiters(["\n\n", "\r\n", "\n", "\r"], IncludeDelim::Prev),
            RuleLevel::delimiters([". ", "! ", "? "], IncludeDelim::Prev),
            RuleLevel::Whitespace,
            RuleLevel::Token,
        ];
        Self::new(levels).unwrap_or_else(|e| unreachable!("markdown preset is valid: {}", e))
    }

    pub fn levels(&self) -> &[RuleLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, level: usize) -> Option<&RuleLevel> {
        self.levels.get(level)
    }

    pub(crate) fn matcher(&self, level: usize) -> Option<&Regex> {
        self.matchers.get(level).and_then(Option::as_ref)
    }
}

impl Default for RuleSet {
    /// Paragraphs → sentences → pauses → words → tokens
    fn default() -> Self {
        let levels = vec![
            RuleLevel::delimiters(["\n\n", "\r\n", "\n", "\r"], IncludeDelim::Prev),
            RuleLevel::delimiters([". ", "! ", "? "], IncludeDelim::Prev),
            RuleLevel::delimiters(
                [
                    "{", "}", "\"", "[", "]", "<", ">", "(", ")", ":", ";", ",", "—", "|", "~",
                    "-", "...", "`", "'",
                ],
                IncludeDelim::Prev,
            ),
            RuleLevel::Whitespace,
            RuleLevel::Token,
        ];
        Self::new(levels).unwrap_or_else(|e| unreachable!("default rule set is valid: {}", e))
    }
}

impl PartialEq for RuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.levels == other.levels
    }
}

// Leftmost-first alternation: at a given position the earlier delimiter wins.
fn compile_matcher(delimiters: &[String], level: usize) -> Result<Regex, ConfigError> {
    let pattern = delimiters
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&pattern).map_err(|e| ConfigError::InvalidRuleLevel {
        level,
        reason: e.to_string(),
    })
}
