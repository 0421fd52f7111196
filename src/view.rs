//! Derived views: pure functions over a slice of records.
//!
//! Nothing is cached; dashboards call these on every read. Collections are
//! small (tens to hundreds of records), so linear scans are fine.

use crate::core::{Lifecycle, Record, RecordId, Searchable};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub fn count_where<R, P>(items: &[R], pred: P) -> usize
where
    P: Fn(&R) -> bool,
{
    items.iter().filter(|item| pred(item)).count()
}

/// Sum of `amount` over matching records; `0.0` for no matches.
pub fn sum_where<R, P, A>(items: &[R], pred: P, amount: A) -> f64
where
    P: Fn(&R) -> bool,
    A: Fn(&R) -> f64,
{
    items
        .iter()
        .filter(|item| pred(item))
        .map(|item| amount(item))
        .sum()
}

pub fn sum<R, A>(items: &[R], amount: A) -> f64
where
    A: Fn(&R) -> f64,
{
    sum_where(items, |_| true, amount)
}

pub fn filter<'a, R, P>(items: &'a [R], pred: P) -> Vec<&'a R>
where
    P: Fn(&R) -> bool,
{
    items.iter().filter(|item| pred(item)).collect()
}

/// Records whose `value` is at or below their own `threshold` (low stock).
pub fn at_or_below<'a, R, N, V, T>(items: &'a [R], value: V, threshold: T) -> Vec<&'a R>
where
    N: PartialOrd,
    V: Fn(&R) -> N,
    T: Fn(&R) -> N,
{
    filter(items, |item| value(item) <= threshold(item))
}

/// Case-insensitive substring match over each record's searchable fields.
///
/// A blank query matches everything.
pub fn search<'a, R>(items: &'a [R], query: &str) -> Vec<&'a R>
where
    R: Searchable,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    filter(items, |item| {
        item.search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    })
}

/// Matching records in ascending `key` order. Stable; NaN keys sort last.
pub fn sorted_by<'a, R, P, K>(items: &'a [R], pred: P, key: K) -> Vec<&'a R>
where
    P: Fn(&R) -> bool,
    K: Fn(&R) -> f64,
{
    let mut matching = filter(items, pred);
    matching.sort_by(|a, b| compare_nan_last(key(a), key(b)));
    matching
}

fn compare_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(&b),
    }
}

/// Record count per lifecycle state; every state is present.
pub fn bucket_counts<R, S, F>(items: &[R], status: F) -> BTreeMap<&'static str, usize>
where
    S: Lifecycle,
    F: Fn(&R) -> S,
{
    let mut buckets: BTreeMap<&'static str, usize> =
        S::ALL.iter().map(|state| (state.label(), 0)).collect();
    for item in items {
        *buckets.entry(status(item).label()).or_default() += 1;
    }
    buckets
}

pub fn find<'a, R: Record>(items: &'a [R], id: &RecordId) -> Option<&'a R> {
    items.iter().find(|item| item.id() == id)
}

/// Value of the referenced record, or `0.0` when the id resolves to nothing.
pub fn lookup_or_zero<R, F>(items: &[R], id: &RecordId, value: F) -> f64
where
    R: Record,
    F: Fn(&R) -> f64,
{
    find(items, id).map(value).unwrap_or(0.0)
}
