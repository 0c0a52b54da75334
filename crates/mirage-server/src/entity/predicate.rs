//! The `function` check mode: arbitrary predicates with a recursion handle.

use super::check_mode::CheckMode;
use super::descriptor::CompiledDescriptor;
use serde_json::Value;

/// A user-supplied predicate over one live entity value.
///
/// The predicate receives the actual value (`None` when the entity or field is
/// missing) and a [`Checker`] that re-enters the resolver, so composite checks
/// can be written in terms of the built-in check modes.
pub trait EntityPredicate: Send + Sync {
    fn test(&self, actual: Option<&Value>, checker: &Checker) -> bool;
}

impl<F> EntityPredicate for F
where
    F: Fn(Option<&Value>, &Checker) -> bool + Send + Sync,
{
    fn test(&self, actual: Option<&Value>, checker: &Checker) -> bool {
        self(actual, checker)
    }
}

/// Recursion handle passed to predicates.
///
/// Stateless: every call builds a descriptor from its arguments and resolves it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checker;

impl Checker {
    /// Resolve `actual` against a JSON `expected` value under `mode`.
    ///
    /// For `regExp`, `expected` is a pattern string (or list of them); an
    /// invalid pattern never matches. `function` cannot be expressed as JSON
    /// and always yields `false`.
    pub fn check(&self, mode: CheckMode, actual: Option<&Value>, expected: &Value) -> bool {
        match CompiledDescriptor::from_json(mode, expected.clone(), false) {
            Ok(descriptor) => descriptor.matches(actual),
            Err(_) => false,
        }
    }

    /// Same as [`Checker::check`] but treats a list `expected` as alternatives.
    pub fn check_one_of(&self, mode: CheckMode, actual: Option<&Value>, expected: &Value) -> bool {
        match CompiledDescriptor::from_json(mode, expected.clone(), true) {
            Ok(descriptor) => descriptor.matches(actual),
            Err(_) => false,
        }
    }
}
