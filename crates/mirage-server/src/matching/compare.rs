//! Check-mode comparator for single leaves.

use super::Expected;
use crate::entity::{CheckMode, Checker};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

/// Compare one actual leaf against one expected leaf under `mode`.
///
/// `actual` is `None` when the value is missing. String-family modes cast both
/// operands with [`string_cast`], so lists are compared opaquely. A value
/// mode without an actual value resolves to the mode's vacuous result.
pub fn compare(mode: CheckMode, actual: Option<&Value>, expected: Expected<'_>) -> bool {
    match mode {
        CheckMode::Function => match expected {
            Expected::Predicate(predicate) => predicate.test(actual, &Checker),
            _ => false,
        },
        CheckMode::RegExp => {
            let Some(actual) = actual else {
                return false;
            };
            let text = string_cast(actual);
            match expected {
                Expected::Pattern(regex) => regex.is_match(&text),
                Expected::Json(Value::String(pattern)) => Regex::new(pattern)
                    .map(|regex| regex.is_match(&text))
                    .unwrap_or(false),
                _ => false,
            }
        }
        CheckMode::Exists => actual.is_some(),
        CheckMode::NotExists => actual.is_none(),
        _ => match (actual, expected) {
            (Some(actual), Expected::Json(expected)) => {
                relation(mode, &string_cast(actual), &string_cast(expected))
            }
            _ => mode.vacuous(),
        },
    }
}

fn relation(mode: CheckMode, actual: &str, expected: &str) -> bool {
    match mode {
        CheckMode::Equals => actual == expected,
        CheckMode::NotEquals => actual != expected,
        CheckMode::Includes => actual.contains(expected),
        CheckMode::NotIncludes => !actual.contains(expected),
        CheckMode::StartsWith => actual.starts_with(expected),
        CheckMode::NotStartsWith => !actual.starts_with(expected),
        CheckMode::EndsWith => actual.ends_with(expected),
        CheckMode::NotEndsWith => !actual.ends_with(expected),
        CheckMode::Exists | CheckMode::NotExists | CheckMode::RegExp | CheckMode::Function => false,
    }
}

/// String form used by every textual comparison.
///
/// Strings are taken verbatim, numbers and booleans use their display form,
/// `null` is `"null"`, list elements are cast and joined with `,`, and keyed
/// structures use their compact JSON text.
pub fn string_cast(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Null => Cow::Borrowed("null"),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| string_cast(item).into_owned())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Cow::Owned(value.to_string()),
    }
}
