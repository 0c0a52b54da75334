//! Entity descriptors: the canonical `{checkMode, value?, oneOf?}` form and its
//! compiled runtime counterpart.

use super::check_mode::CheckMode;
use super::predicate::EntityPredicate;
use crate::error::ConfigError;
use crate::matching::{flatten, resolve, Expected};
use crate::script::ScriptHost;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Canonical entity descriptor as written in declarations.
///
/// `value` is absent only for presence-only modes. With `oneOf: true`, `value`
/// is a list of acceptable alternatives.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    pub check_mode: CheckMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub one_of: bool,
}

impl EntityDescriptor {
    pub fn new(check_mode: CheckMode, value: impl Into<Value>) -> Self {
        Self {
            check_mode,
            value: Some(value.into()),
            one_of: false,
        }
    }

    pub fn equals(value: impl Into<Value>) -> Self {
        Self::new(CheckMode::Equals, value)
    }

    pub fn presence(check_mode: CheckMode) -> Self {
        Self {
            check_mode,
            value: None,
            one_of: false,
        }
    }
}

/// Turn any declared value into a canonical descriptor.
///
/// A keyed structure carrying a recognised `checkMode` in valid shape passes
/// through; anything else is shorthand for "must equal".
pub fn normalize(value: &Value) -> EntityDescriptor {
    match value {
        Value::Object(map) => recognize(map).unwrap_or_else(|| EntityDescriptor::equals(value.clone())),
        other => EntityDescriptor::equals(other.clone()),
    }
}

fn recognize(map: &Map<String, Value>) -> Option<EntityDescriptor> {
    let check_mode = CheckMode::from_str(map.get("checkMode")?.as_str()?).ok()?;
    let one_of = match map.get("oneOf") {
        None => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return None,
    };

    if check_mode.is_presence() {
        return Some(EntityDescriptor {
            check_mode,
            value: None,
            one_of: false,
        });
    }

    let value = map.get("value")?;
    if one_of && !value.is_array() {
        return None;
    }
    Some(EntityDescriptor {
        check_mode,
        value: Some(value.clone()),
        one_of,
    })
}

/// Expected side of a compiled descriptor.
#[derive(Clone)]
pub enum ExpectedValue {
    Absent,
    Json(Value),
    Pattern(Regex),
    Patterns(Vec<Regex>),
    Predicate(Arc<dyn EntityPredicate>),
}

impl fmt::Debug for ExpectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedValue::Absent => f.write_str("Absent"),
            ExpectedValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
            ExpectedValue::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            ExpectedValue::Patterns(regexes) => f
                .debug_tuple("Patterns")
                .field(&regexes.iter().map(Regex::as_str).collect::<Vec<_>>())
                .finish(),
            ExpectedValue::Predicate(_) => f.write_str("Predicate(<function>)"),
        }
    }
}

/// Compiled descriptor ready for per-request evaluation.
///
/// Regular expressions and scripts are compiled once; the specificity weight
/// of the descriptor is computed at construction.
#[derive(Debug, Clone)]
pub struct CompiledDescriptor {
    check_mode: CheckMode,
    expected: ExpectedValue,
    one_of: bool,
    weight: usize,
}

impl CompiledDescriptor {
    /// Compile a canonical descriptor. `function` values are Rhai scripts.
    pub fn compile(descriptor: &EntityDescriptor, scripts: &ScriptHost) -> Result<Self, ConfigError> {
        let value = descriptor.value.clone().unwrap_or(Value::Null);
        if descriptor.check_mode != CheckMode::Function {
            return Self::from_json(descriptor.check_mode, value, descriptor.one_of);
        }
        let Value::String(source) = value else {
            return Err(ConfigError::invalid(
                "checkMode 'function'",
                "value must be a script expression",
            ));
        };
        Ok(Self::shared_function(scripts.predicate(&source)?))
    }

    /// Build a descriptor from a JSON value. `regExp` values are compiled here.
    pub fn from_json(check_mode: CheckMode, value: Value, one_of: bool) -> Result<Self, ConfigError> {
        let expected = match check_mode {
            CheckMode::Exists | CheckMode::NotExists => ExpectedValue::Absent,
            CheckMode::RegExp => match value {
                Value::String(pattern) => ExpectedValue::Pattern(compile_pattern(&pattern)?),
                Value::Array(items) => ExpectedValue::Patterns(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(pattern) => compile_pattern(pattern),
                            other => Err(ConfigError::invalid(
                                "checkMode 'regExp'",
                                format!("expected a pattern string, found {other}"),
                            )),
                        })
                        .collect::<Result<_, _>>()?,
                ),
                other => {
                    return Err(ConfigError::invalid(
                        "checkMode 'regExp'",
                        format!("expected a pattern string, found {other}"),
                    ))
                }
            },
            CheckMode::Function => {
                return Err(ConfigError::invalid(
                    "checkMode 'function'",
                    "a predicate cannot be built from a plain value",
                ))
            }
            _ => ExpectedValue::Json(value),
        };
        Ok(Self::with_expected(check_mode, expected, one_of))
    }

    pub fn equals(value: impl Into<Value>) -> Self {
        Self::with_expected(CheckMode::Equals, ExpectedValue::Json(value.into()), false)
    }

    /// Compare with any non-computed mode.
    pub fn value(check_mode: CheckMode, value: impl Into<Value>) -> Self {
        debug_assert!(!matches!(check_mode, CheckMode::RegExp | CheckMode::Function));
        Self::with_expected(check_mode, ExpectedValue::Json(value.into()), false)
    }

    /// Accept any of `values` under `check_mode`.
    pub fn one_of(check_mode: CheckMode, values: Vec<Value>) -> Self {
        Self::with_expected(check_mode, ExpectedValue::Json(Value::Array(values)), true)
    }

    pub fn exists() -> Self {
        Self::with_expected(CheckMode::Exists, ExpectedValue::Absent, false)
    }

    pub fn not_exists() -> Self {
        Self::with_expected(CheckMode::NotExists, ExpectedValue::Absent, false)
    }

    pub fn pattern(regex: Regex) -> Self {
        Self::with_expected(CheckMode::RegExp, ExpectedValue::Pattern(regex), false)
    }

    pub fn function(predicate: impl EntityPredicate + 'static) -> Self {
        Self::shared_function(Arc::new(predicate))
    }

    pub fn shared_function(predicate: Arc<dyn EntityPredicate>) -> Self {
        Self::with_expected(CheckMode::Function, ExpectedValue::Predicate(predicate), false)
    }

    fn with_expected(check_mode: CheckMode, expected: ExpectedValue, one_of: bool) -> Self {
        let weight = match &expected {
            ExpectedValue::Json(value @ Value::Object(_)) if !one_of => flatten(value).len(),
            _ => 1,
        };
        Self {
            check_mode,
            expected,
            one_of,
            weight,
        }
    }

    /// Weight this descriptor contributes when it constrains a plain entity.
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn expected(&self) -> Expected<'_> {
        match &self.expected {
            ExpectedValue::Absent => Expected::Absent,
            ExpectedValue::Json(value) => Expected::Json(value),
            ExpectedValue::Pattern(regex) => Expected::Pattern(regex),
            ExpectedValue::Patterns(regexes) => Expected::Patterns(regexes),
            ExpectedValue::Predicate(predicate) => Expected::Predicate(predicate.as_ref()),
        }
    }

    /// Whether `actual` (`None` when missing) satisfies this descriptor.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let alternatives_apply = self.one_of
            && !matches!(self.check_mode, CheckMode::Exists | CheckMode::NotExists | CheckMode::Function);
        if !alternatives_apply {
            return resolve(self.check_mode, actual, self.expected());
        }

        let mut alternatives = self.expected().alternatives().into_iter();
        if self.check_mode.is_negated() {
            alternatives.all(|alternative| resolve(self.check_mode, actual, alternative))
        } else {
            alternatives.any(|alternative| resolve(self.check_mode, actual, alternative))
        }
    }

    /// Canonical form for inspection by producers and scripts.
    pub fn to_descriptor(&self) -> EntityDescriptor {
        let value = match &self.expected {
            ExpectedValue::Absent => None,
            ExpectedValue::Json(value) => Some(value.clone()),
            ExpectedValue::Pattern(regex) => Some(Value::String(regex.as_str().to_string())),
            ExpectedValue::Patterns(regexes) => Some(Value::Array(
                regexes
                    .iter()
                    .map(|regex| Value::String(regex.as_str().to_string()))
                    .collect(),
            )),
            ExpectedValue::Predicate(_) => Some(Value::Null),
        };
        EntityDescriptor {
            check_mode: self.check_mode,
            value,
            one_of: self.one_of,
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}
