//! Parser for `name=identifier` extension configuration.
//!
//! Everything from the first `#` to the end of a line is a comment. After
//! trimming, blank lines are ignored. A remaining line must split on `=`
//! into exactly two non-blank parts once trailing empty parts are dropped;
//! anything else is skipped and reported in [`ParsedBlock::skipped`] without
//! failing the block.

use std::collections::HashMap;
use std::fmt;

/// A well-formed `name=identifier` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub identifier: String,
    /// 1-based line number within the block.
    pub line: usize,
}

/// Why a line was not turned into a [`Registration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingSeparator,
    TooManySeparators,
    BlankName,
    BlankIdentifier,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingSeparator => "missing '=' separator",
            Self::TooManySeparators => "more than one '=' separator",
            Self::BlankName => "blank extension name",
            Self::BlankIdentifier => "blank implementation identifier",
        };
        f.write_str(text)
    }
}

/// A malformed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    /// Line content with the comment stripped and whitespace trimmed.
    pub content: String,
    pub reason: SkipReason,
}

/// Result of parsing one configuration block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBlock {
    /// Registrations in file order, duplicates included.
    pub entries: Vec<Registration>,
    pub skipped: Vec<SkippedLine>,
}

impl ParsedBlock {
    /// Name to identifier mapping where the first occurrence of a name wins.
    pub fn mapping(&self) -> HashMap<&str, &str> {
        let mut map = HashMap::new();
        for entry in &self.entries {
            map.entry(entry.name.as_str())
                .or_insert(entry.identifier.as_str());
        }
        map
    }
}

/// Parse one raw configuration block.
pub fn parse(text: &str) -> ParsedBlock {
    let mut parsed = ParsedBlock::default();

    for (idx, raw) in text.lines().enumerate() {
        let content = strip_comment(raw).trim();
        if content.is_empty() {
            continue;
        }

        let line = idx + 1;
        match split_line(content) {
            Ok((name, identifier)) => parsed.entries.push(Registration {
                name: name.to_string(),
                identifier: identifier.to_string(),
                line,
            }),
            Err(reason) => parsed.skipped.push(SkippedLine {
                line,
                content: content.to_string(),
                reason,
            }),
        }
    }

    parsed
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

fn split_line(line: &str) -> Result<(&str, &str), SkipReason> {
    let mut parts: Vec<&str> = line.split('=').collect();
    // Trailing separators are ignored: `a=b=` reads as `a=b`.
    while parts.len() > 2 && parts.last().is_some_and(|part| part.is_empty()) {
        parts.pop();
    }

    let (name, identifier) = match parts.as_slice() {
        [_] => return Err(SkipReason::MissingSeparator),
        [name, identifier] => (name.trim(), identifier.trim()),
        _ => return Err(SkipReason::TooManySeparators),
    };

    if name.is_empty() {
        return Err(SkipReason::BlankName);
    }
    if identifier.is_empty() {
        return Err(SkipReason::BlankIdentifier);
    }
    Ok((name, identifier))
}
