use super::RouteVariant;
use std::cmp::Reverse;

/// Order variants by descending specificity weight.
///
/// The sort is stable: variants of equal weight keep their declaration order,
/// so the earlier declaration wins a tie.
pub fn rank(mut variants: Vec<RouteVariant>) -> Vec<RouteVariant> {
    variants.sort_by_key(|variant| Reverse(variant.weight()));
    variants
}
