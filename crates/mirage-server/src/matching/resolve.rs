//! Entity value resolver: structural dispatch over actual/expected shapes.
//!
//! | actual         | expected  | rule                                                        |
//! |----------------|-----------|-------------------------------------------------------------|
//! | scalar         | scalar    | one comparison                                              |
//! | scalar         | list      | negated: every element; otherwise: any element              |
//! | scalar         | structure | `regExp` only; otherwise vacuous                            |
//! | list/structure | scalar    | vacuous                                                     |
//! | list           | list      | equal length and leaf count, then every leaf pair           |
//! | list           | structure | `regExp`: some element matches; otherwise vacuous           |
//! | structure      | list      | `regExp`: false; otherwise per-candidate structure check, combined every (negated) / any |
//! | structure      | structure | `regExp`: false; equal leaf count, then negated: some pair, otherwise every pair |
//!
//! The vacuous result is `true` for negated modes and `false` otherwise. A
//! compiled pattern is shaped like a structure; a pattern list like a list.

use super::compare::compare;
use super::flatten::flatten;
use super::Expected;
use crate::entity::CheckMode;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Scalar,
    List,
    Structure,
}

impl Shape {
    fn of_actual(actual: Option<&Value>) -> Self {
        match actual {
            Some(Value::Array(_)) => Shape::List,
            Some(Value::Object(_)) => Shape::Structure,
            _ => Shape::Scalar,
        }
    }

    fn of_expected(expected: Expected<'_>) -> Self {
        match expected {
            Expected::Json(Value::Array(_)) | Expected::Patterns(_) => Shape::List,
            Expected::Json(Value::Object(_)) | Expected::Pattern(_) => Shape::Structure,
            Expected::Json(_) | Expected::Absent | Expected::Predicate(_) => Shape::Scalar,
        }
    }
}

/// Shape combination selecting a resolver rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePair {
    ScalarScalar,
    ScalarList,
    ScalarStructure,
    /// List or structure against a scalar.
    CompositeScalar,
    ListList,
    ListStructure,
    StructureList,
    StructureStructure,
}

impl ShapePair {
    pub fn classify(actual: Option<&Value>, expected: Expected<'_>) -> Self {
        match (Shape::of_actual(actual), Shape::of_expected(expected)) {
            (Shape::Scalar, Shape::Scalar) => ShapePair::ScalarScalar,
            (Shape::Scalar, Shape::List) => ShapePair::ScalarList,
            (Shape::Scalar, Shape::Structure) => ShapePair::ScalarStructure,
            (Shape::List | Shape::Structure, Shape::Scalar) => ShapePair::CompositeScalar,
            (Shape::List, Shape::List) => ShapePair::ListList,
            (Shape::List, Shape::Structure) => ShapePair::ListStructure,
            (Shape::Structure, Shape::List) => ShapePair::StructureList,
            (Shape::Structure, Shape::Structure) => ShapePair::StructureStructure,
        }
    }
}

/// Resolve whether `actual` satisfies `expected` under `mode`.
///
/// `function` and presence modes go straight to the comparator. Everything
/// else is dispatched on the [`ShapePair`] of the operands.
pub fn resolve(mode: CheckMode, actual: Option<&Value>, expected: Expected<'_>) -> bool {
    if mode == CheckMode::Function || mode.is_presence() {
        return compare(mode, actual, expected);
    }

    let negated = mode.is_negated();
    let reg_exp = mode == CheckMode::RegExp;

    match ShapePair::classify(actual, expected) {
        ShapePair::ScalarScalar => compare(mode, actual, expected),
        ShapePair::ScalarList => {
            let mut elements = expected.alternatives().into_iter();
            if negated {
                elements.all(|element| compare(mode, actual, element))
            } else {
                elements.any(|element| compare(mode, actual, element))
            }
        }
        ShapePair::ScalarStructure => {
            if reg_exp {
                compare(mode, actual, expected)
            } else {
                mode.vacuous()
            }
        }
        ShapePair::CompositeScalar => mode.vacuous(),
        ShapePair::ListList => resolve_list_list(mode, actual, expected),
        ShapePair::ListStructure => match actual {
            Some(Value::Array(items)) if reg_exp => {
                items.iter().any(|item| compare(mode, Some(item), expected))
            }
            _ => mode.vacuous(),
        },
        ShapePair::StructureList => {
            if reg_exp {
                return false;
            }
            let Some(actual) = actual else {
                return mode.vacuous();
            };
            let actual_leaves = flatten(actual);
            let mut candidates = expected.alternatives().into_iter();
            if negated {
                candidates.all(|candidate| resolve_leaves(mode, &actual_leaves, candidate))
            } else {
                candidates.any(|candidate| resolve_leaves(mode, &actual_leaves, candidate))
            }
        }
        ShapePair::StructureStructure => {
            if reg_exp {
                return false;
            }
            match actual {
                Some(actual) => resolve_leaves(mode, &flatten(actual), expected),
                None => mode.vacuous(),
            }
        }
    }
}

/// Positional comparison of two lists, leaf by leaf.
fn resolve_list_list(mode: CheckMode, actual: Option<&Value>, expected: Expected<'_>) -> bool {
    let Some(actual) = actual else {
        return mode.vacuous();
    };
    let Value::Array(items) = actual else {
        return mode.vacuous();
    };
    let expected_leaves: BTreeMap<String, Expected<'_>> = match expected {
        Expected::Json(value) => {
            let Value::Array(expected_items) = value else {
                return mode.vacuous();
            };
            if items.len() != expected_items.len() {
                return mode.vacuous();
            }
            flatten(value)
                .into_iter()
                .map(|(path, leaf)| (path, Expected::Json(leaf)))
                .collect()
        }
        Expected::Patterns(regexes) => {
            if items.len() != regexes.len() {
                return mode.vacuous();
            }
            regexes
                .iter()
                .enumerate()
                .map(|(index, regex)| (index.to_string(), Expected::Pattern(regex)))
                .collect()
        }
        _ => return mode.vacuous(),
    };

    let actual_leaves = flatten(actual);
    if actual_leaves.len() != expected_leaves.len() {
        return mode.vacuous();
    }
    expected_leaves
        .iter()
        .all(|(path, leaf)| compare(mode, actual_leaves.get(path).copied(), *leaf))
}

/// Structure-against-structure comparison over flattened leaves.
///
/// Unequal leaf counts are vacuous. Negated modes need one satisfied pair,
/// other modes need all of them.
fn resolve_leaves(
    mode: CheckMode,
    actual_leaves: &BTreeMap<String, &Value>,
    candidate: Expected<'_>,
) -> bool {
    let Expected::Json(candidate) = candidate else {
        return mode.vacuous();
    };
    let expected_leaves = flatten(candidate);
    if actual_leaves.len() != expected_leaves.len() {
        return mode.vacuous();
    }

    let mut pairs = expected_leaves
        .iter()
        .map(|(path, leaf)| (actual_leaves.get(path).copied(), *leaf));
    if mode.is_negated() {
        pairs.any(|(actual, leaf)| compare(mode, actual, Expected::Json(leaf)))
    } else {
        pairs.all(|(actual, leaf)| compare(mode, actual, Expected::Json(leaf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::string_cast;
    use proptest::prelude::*;
    use regex::Regex;
    use serde_json::json;

    fn check(mode: CheckMode, actual: Value, expected: Value) -> bool {
        resolve(mode, Some(&actual), Expected::Json(&expected))
    }

    #[test]
    fn test_classify() {
        let regex = Regex::new("a").unwrap();
        let scalar = json!(1);
        let list = json!([1]);
        let structure = json!({"a": 1});
        let cases = [
            (&scalar, Expected::Json(&scalar), ShapePair::ScalarScalar),
            (&scalar, Expected::Json(&list), ShapePair::ScalarList),
            (&scalar, Expected::Pattern(&regex), ShapePair::ScalarStructure),
            (&list, Expected::Json(&scalar), ShapePair::CompositeScalar),
            (&structure, Expected::Json(&scalar), ShapePair::CompositeScalar),
            (&list, Expected::Json(&list), ShapePair::ListList),
            (&list, Expected::Pattern(&regex), ShapePair::ListStructure),
            (&structure, Expected::Json(&list), ShapePair::StructureList),
            (&structure, Expected::Json(&structure), ShapePair::StructureStructure),
        ];
        for (actual, expected, pair) in cases {
            assert_eq!(ShapePair::classify(Some(actual), expected), pair, "{actual}");
        }
        assert_eq!(
            ShapePair::classify(None, Expected::Json(&scalar)),
            ShapePair::ScalarScalar
        );
    }

    #[test]
    fn test_scalar_against_list() {
        assert!(check(CheckMode::Equals, json!("b"), json!(["a", "b"])));
        assert!(!check(CheckMode::Equals, json!("c"), json!(["a", "b"])));
        // Negated: every element must satisfy the negated relation
        assert!(check(CheckMode::NotEquals, json!("c"), json!(["a", "b"])));
        assert!(!check(CheckMode::NotEquals, json!("a"), json!(["a", "b"])));
        assert!(check(CheckMode::StartsWith, json!("application/json"), json!(["text/", "application/"])));
    }

    #[test]
    fn test_scalar_against_structure_is_vacuous() {
        assert!(!check(CheckMode::Includes, json!("42"), json!({"a": 1})));
        assert!(check(CheckMode::NotIncludes, json!("42"), json!({"a": 1})));
        assert!(!check(CheckMode::Equals, json!("42"), json!({"a": 1})));
        assert!(check(CheckMode::NotEquals, json!("42"), json!({"a": 1})));
    }

    #[test]
    fn test_scalar_against_pattern() {
        let regex = Regex::new(r"^\d{2}$").unwrap();
        assert!(resolve(CheckMode::RegExp, Some(&json!("42")), Expected::Pattern(&regex)));
        assert!(resolve(CheckMode::RegExp, Some(&json!(42)), Expected::Pattern(&regex)));
        assert!(!resolve(CheckMode::RegExp, Some(&json!("421")), Expected::Pattern(&regex)));
        assert!(!resolve(CheckMode::RegExp, None, Expected::Pattern(&regex)));
    }

    #[test]
    fn test_composite_against_scalar_is_vacuous() {
        assert!(!check(CheckMode::Equals, json!([1]), json!("1")));
        assert!(check(CheckMode::NotEquals, json!([1]), json!("1")));
        assert!(!check(CheckMode::Includes, json!({"a": "1"}), json!("1")));
        assert!(check(CheckMode::NotEndsWith, json!({"a": "1"}), json!("1")));
    }

    #[test]
    fn test_list_against_list() {
        assert!(check(CheckMode::Equals, json!([1, {"a": 2}]), json!(["1", {"a": "2"}])));
        assert!(!check(CheckMode::Equals, json!([1, 2]), json!([2, 1])));
        // Length mismatch is vacuous
        assert!(!check(CheckMode::Equals, json!([1, 2]), json!([1])));
        assert!(check(CheckMode::NotEquals, json!([1, 2]), json!([1])));
        // Same length, different leaf count is vacuous
        assert!(!check(CheckMode::Equals, json!([{"a": 1, "b": 2}]), json!([{"a": 1}])));
        // Every pair must satisfy, even for negated modes
        assert!(!check(CheckMode::NotEquals, json!([1, 2]), json!([1, 3])));
        assert!(check(CheckMode::NotEquals, json!([1, 2]), json!([3, 4])));
        assert!(check(CheckMode::Includes, json!(["abc", "def"]), json!(["b", "e"])));
    }

    #[test]
    fn test_list_against_pattern_list() {
        let regexes = vec![Regex::new("^a").unwrap(), Regex::new("^b").unwrap()];
        assert!(resolve(CheckMode::RegExp, Some(&json!(["ax", "bx"])), Expected::Patterns(&regexes)));
        assert!(!resolve(CheckMode::RegExp, Some(&json!(["bx", "ax"])), Expected::Patterns(&regexes)));
    }

    #[test]
    fn test_list_against_structure() {
        let regex = Regex::new("^admin$").unwrap();
        assert!(resolve(CheckMode::RegExp, Some(&json!(["user", "admin"])), Expected::Pattern(&regex)));
        assert!(!resolve(CheckMode::RegExp, Some(&json!(["user"])), Expected::Pattern(&regex)));
        assert!(!check(CheckMode::Equals, json!([1]), json!({"0": 1})));
        assert!(check(CheckMode::NotEquals, json!([1]), json!({"0": 1})));
    }

    #[test]
    fn test_structure_against_list() {
        let actual = json!({"name": "a", "age": 1});
        let expected = json!([{"name": "b", "age": 1}, {"age": 1, "name": "a"}]);
        assert!(check(CheckMode::Equals, actual.clone(), expected.clone()));
        assert!(!check(CheckMode::NotEquals, actual.clone(), expected));
        assert!(check(
            CheckMode::NotEquals,
            actual.clone(),
            json!([{"name": "b", "age": 2}, {"name": "c", "age": 3}])
        ));
        // Candidate with a different leaf count contributes its vacuous result
        assert!(!check(CheckMode::Equals, actual.clone(), json!([{"name": "a"}])));
        assert!(check(CheckMode::NotEquals, actual.clone(), json!([{"name": "a"}])));
        let regex = Regex::new("a").unwrap();
        assert!(!resolve(CheckMode::RegExp, Some(&actual), Expected::Patterns(std::slice::from_ref(&regex))));
    }

    #[test]
    fn test_structure_against_structure() {
        let actual = json!({"user": {"name": "Ada", "tags": ["x", "y"]}});
        assert!(check(
            CheckMode::Equals,
            actual.clone(),
            json!({"user": {"tags": ["x", "y"], "name": "Ada"}})
        ));
        assert!(check(
            CheckMode::Includes,
            actual.clone(),
            json!({"user": {"name": "d", "tags": ["x", ""]}})
        ));
        // Negated: one differing pair is enough
        assert!(check(
            CheckMode::NotEquals,
            actual.clone(),
            json!({"user": {"name": "Bob", "tags": ["x", "y"]}})
        ));
        assert!(!check(
            CheckMode::NotEquals,
            actual.clone(),
            json!({"user": {"name": "Ada", "tags": ["x", "y"]}})
        ));
        // Leaf count mismatch is vacuous
        assert!(!check(CheckMode::Equals, actual.clone(), json!({"user": {"name": "Ada"}})));
        assert!(check(CheckMode::NotEquals, actual.clone(), json!({"user": {"name": "Ada"}})));
        // Same count, different paths: missing leaves compare vacuously
        assert!(!check(CheckMode::Equals, json!({"a": 1}), json!({"b": 1})));
        let regex = Regex::new("Ada").unwrap();
        assert!(!resolve(CheckMode::RegExp, Some(&actual), Expected::Pattern(&regex)));
    }

    #[test]
    fn test_missing_actual() {
        assert!(!check_missing(CheckMode::Equals, json!("a")));
        assert!(check_missing(CheckMode::NotEquals, json!("a")));
        assert!(!check_missing(CheckMode::Equals, json!(["a", "b"])));
        assert!(check_missing(CheckMode::NotIncludes, json!(["a", "b"])));
        assert!(!check_missing(CheckMode::Equals, json!({"a": 1})));
    }

    fn check_missing(mode: CheckMode, expected: Value) -> bool {
        resolve(mode, None, Expected::Json(&expected))
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::from),
        ]
    }

    fn structure() -> impl Strategy<Value = Value> {
        let nested = scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 1..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        });
        prop::collection::btree_map("[a-z]{1,4}", nested, 1..4)
            .prop_map(|map| Value::Object(map.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_equals_is_string_equality(a in scalar(), b in scalar()) {
            let expected = string_cast(&a) == string_cast(&b);
            prop_assert_eq!(check(CheckMode::Equals, a.clone(), b.clone()), expected);
            prop_assert_eq!(check(CheckMode::NotEquals, a, b), !expected);
        }

        #[test]
        fn prop_equals_is_reflexive_for_structures(s in structure()) {
            let reordered: Value = serde_json::from_str(&s.to_string()).unwrap();
            prop_assert!(check(CheckMode::Equals, s, reordered));
        }

        #[test]
        fn prop_singleton_alternative_is_direct_check(x in scalar()) {
            for mode in [
                CheckMode::Equals,
                CheckMode::Includes,
                CheckMode::StartsWith,
                CheckMode::EndsWith,
                CheckMode::Exists,
            ] {
                prop_assert!(check(mode, x.clone(), json!([x.clone()])), "{}", mode);
            }
        }
    }
}
