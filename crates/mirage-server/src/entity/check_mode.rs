//! Check modes: the named comparison relations an entity descriptor requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison relation requested by an entity descriptor.
///
/// Modes fall into four families: presence-only (`exists`, `notExists`),
/// any-value (`equals`, `notEquals`), string-shaped (`includes`, `startsWith`,
/// `endsWith` and their negations) and computed (`regExp`, `function`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckMode {
    Exists,
    NotExists,
    Equals,
    NotEquals,
    Includes,
    NotIncludes,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    RegExp,
    Function,
}

impl CheckMode {
    pub const ALL: [CheckMode; 12] = [
        CheckMode::Exists,
        CheckMode::NotExists,
        CheckMode::Equals,
        CheckMode::NotEquals,
        CheckMode::Includes,
        CheckMode::NotIncludes,
        CheckMode::StartsWith,
        CheckMode::NotStartsWith,
        CheckMode::EndsWith,
        CheckMode::NotEndsWith,
        CheckMode::RegExp,
        CheckMode::Function,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckMode::Exists => "exists",
            CheckMode::NotExists => "notExists",
            CheckMode::Equals => "equals",
            CheckMode::NotEquals => "notEquals",
            CheckMode::Includes => "includes",
            CheckMode::NotIncludes => "notIncludes",
            CheckMode::StartsWith => "startsWith",
            CheckMode::NotStartsWith => "notStartsWith",
            CheckMode::EndsWith => "endsWith",
            CheckMode::NotEndsWith => "notEndsWith",
            CheckMode::RegExp => "regExp",
            CheckMode::Function => "function",
        }
    }

    /// Negated modes pick `true` as their vacuous result.
    #[inline]
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            CheckMode::NotExists
                | CheckMode::NotEquals
                | CheckMode::NotIncludes
                | CheckMode::NotStartsWith
                | CheckMode::NotEndsWith
        )
    }

    /// Presence-only modes take no descriptor value.
    #[inline]
    pub fn is_presence(&self) -> bool {
        matches!(self, CheckMode::Exists | CheckMode::NotExists)
    }

    /// The fixed result of a structurally meaningless comparison.
    #[inline]
    pub fn vacuous(&self) -> bool {
        self.is_negated()
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no check mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown check mode '{0}'")]
pub struct UnknownCheckMode(pub String);

impl FromStr for CheckMode {
    type Err = UnknownCheckMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownCheckMode(s.to_string()))
    }
}
