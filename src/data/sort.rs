use std::cmp::Ordering;

use super::model::Region;

/// Ascending `lower`, ties broken by case-sensitive `name`.
///
/// `total_cmp` keeps the ordering total even for values like `-0.0`.
pub fn region_order<R: Region>(a: &R, b: &R) -> Ordering {
    a.lower()
        .total_cmp(&b.lower())
        .then_with(|| a.name().cmp(b.name()))
}

/// Return a sorted copy, leaving the input untouched.
pub fn sorted<R: Region + Clone>(items: &[R]) -> Vec<R> {
    let mut out = items.to_vec();
    out.sort_by(region_order);
    out
}

/// Sort in place; returns `true` if the order changed.
pub fn sort_regions<R: Region>(items: &mut [R]) -> bool {
    if is_sorted(items) {
        return false;
    }
    items.sort_by(region_order);
    true
}

pub fn is_sorted<R: Region>(items: &[R]) -> bool {
    items
        .windows(2)
        .all(|w| region_order(&w[0], &w[1]) != Ordering::Greater)
}
