//! Entity matching: the comparison algebra behind every route variant.
//!
//! - `compare` - the check-mode comparator, the only place raw comparison happens
//! - `flatten` - nested values to dotted-path leaves
//! - `resolve` - the shape-pair resolver deciding how many leaves to compare and how to combine them

mod compare;
mod flatten;
mod resolve;

pub use compare::{compare, string_cast};
pub use flatten::flatten;
pub use resolve::{resolve, ShapePair};

use crate::entity::EntityPredicate;
use regex::Regex;
use serde_json::Value;

/// Borrowed view of a descriptor's expected side.
#[derive(Clone, Copy)]
pub enum Expected<'a> {
    /// Presence-only modes carry no value.
    Absent,
    Json(&'a Value),
    Pattern(&'a Regex),
    /// A list of patterns; shaped like a list.
    Patterns(&'a [Regex]),
    Predicate(&'a dyn EntityPredicate),
}

impl<'a> Expected<'a> {
    /// Split a list-shaped value into its alternatives; anything else is its
    /// own single alternative.
    pub fn alternatives(self) -> Vec<Expected<'a>> {
        match self {
            Expected::Json(Value::Array(items)) => items.iter().map(Expected::Json).collect(),
            Expected::Patterns(regexes) => regexes.iter().map(Expected::Pattern).collect(),
            other => vec![other],
        }
    }
}

impl std::fmt::Debug for Expected<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Absent => f.write_str("Absent"),
            Expected::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Expected::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Expected::Patterns(regexes) => f.debug_tuple("Patterns").field(&regexes.len()).finish(),
            Expected::Predicate(_) => f.write_str("Predicate"),
        }
    }
}
