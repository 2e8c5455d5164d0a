//! Collection primitives over sequences and key-value mappings.
//!
//! A [`Collection`] exposes its entries as `(key, &value)` pairs: indices for
//! sequences, keys for maps. The free functions work on either shape.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

/// A sequence or mapping whose entries can be visited as `(key, &value)`.
pub trait Collection {
    /// Index type for sequences, key type for maps.
    type Key;
    /// Element or value type.
    type Item;

    /// Visit every entry in iteration order.
    fn entries(&self) -> impl Iterator<Item = (Self::Key, &Self::Item)>;
}

impl<T> Collection for [T] {
    type Key = usize;
    type Item = T;

    fn entries(&self) -> impl Iterator<Item = (usize, &T)> {
        self.iter().enumerate()
    }
}

impl<T> Collection for Vec<T> {
    type Key = usize;
    type Item = T;

    fn entries(&self) -> impl Iterator<Item = (usize, &T)> {
        self.iter().enumerate()
    }
}

impl<K: Clone, V> Collection for BTreeMap<K, V> {
    type Key = K;
    type Item = V;

    fn entries(&self) -> impl Iterator<Item = (K, &V)> {
        self.iter().map(|(k, v)| (k.clone(), v))
    }
}

impl<K: Clone, V, S> Collection for HashMap<K, V, S> {
    type Key = K;
    type Item = V;

    fn entries(&self) -> impl Iterator<Item = (K, &V)> {
        self.iter().map(|(k, v)| (k.clone(), v))
    }
}

/// Call `f` on every entry.
pub fn each<C, F>(collection: &C, mut f: F)
where
    C: Collection + ?Sized,
    F: FnMut(&C::Item, C::Key),
{
    for (key, item) in collection.entries() {
        f(item, key);
    }
}

/// Collect `f(value, key)` for every entry, in iteration order.
pub fn map<C, U, F>(collection: &C, mut f: F) -> Vec<U>
where
    C: Collection + ?Sized,
    F: FnMut(&C::Item, C::Key) -> U,
{
    collection.entries().map(|(k, v)| f(v, k)).collect()
}

/// Values for which `predicate` holds, in iteration order.
pub fn filter<'a, C, F>(collection: &'a C, mut predicate: F) -> Vec<&'a C::Item>
where
    C: Collection + ?Sized,
    F: FnMut(&C::Item) -> bool,
{
    collection
        .entries()
        .map(|(_, v)| v)
        .filter(|v| predicate(v))
        .collect()
}

/// Fold every entry into `initial`.
pub fn reduce<C, A, F>(collection: &C, initial: A, mut f: F) -> A
where
    C: Collection + ?Sized,
    F: FnMut(A, &C::Item, C::Key) -> A,
{
    collection
        .entries()
        .fold(initial, |acc, (k, v)| f(acc, v, k))
}

/// Fold using the first value as the initial accumulator.
///
/// Returns `None` for an empty collection.
pub fn reduce_first<C, F>(collection: &C, mut f: F) -> Option<C::Item>
where
    C: Collection + ?Sized,
    C::Item: Clone,
    F: FnMut(C::Item, &C::Item) -> C::Item,
{
    let mut entries = collection.entries();
    let (_, first) = entries.next()?;
    Some(entries.fold(first.clone(), |acc, (_, v)| f(acc, v)))
}

/// Extract `field` from every record; missing fields yield `None`.
pub fn pluck<'a, V, S>(records: &'a [HashMap<String, V, S>], field: &str) -> Vec<Option<&'a V>>
where
    S: BuildHasher,
{
    records.iter().map(|r| r.get(field)).collect()
}

/// Distinct values of `first` that appear in every one of `others`.
///
/// Order follows `first`.
pub fn intersection<T>(first: &[T], others: &[&[T]]) -> Vec<T>
where
    T: Hash + Eq + Clone,
{
    let sets: Vec<HashSet<&T>> = others.iter().map(|o| o.iter().collect()).collect();
    let mut seen = HashSet::new();
    first
        .iter()
        .filter(|item| sets.iter().all(|s| s.contains(item)))
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

/// Values of `first` that appear in none of `others`, duplicates kept.
pub fn difference<T>(first: &[T], others: &[&[T]]) -> Vec<T>
where
    T: Hash + Eq + Clone,
{
    let excluded: HashSet<&T> = others.iter().flat_map(|o| o.iter()).collect();
    first
        .iter()
        .filter(|item| !excluded.contains(item))
        .cloned()
        .collect()
}

/// Stable sort of the values by the key computed with `key_fn`.
pub fn sort_by<C, K, F>(collection: &C, mut key_fn: F) -> Vec<&C::Item>
where
    C: Collection + ?Sized,
    K: Ord,
    F: FnMut(&C::Item) -> K,
{
    let mut keyed: Vec<(K, &C::Item)> = collection
        .entries()
        .map(|(_, v)| (key_fn(v), v))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, v)| v).collect()
}
