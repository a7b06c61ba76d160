//! Suffix-free refinement of a selected key set.

use ahash::AHashMap;

use super::select::IndexKeySet;

/// Remove every key that ends with a shorter retained key.
///
/// Keys are reversed and sorted, which puts a key directly after the shortest
/// retained key it ends with. Only removes keys, so a prefix-free set stays
/// prefix-free. Running it twice changes nothing.
pub fn suffix_free(keys: &mut IndexKeySet) {
    if keys.len() < 2 {
        return;
    }

    let mut reversed: AHashMap<Vec<u8>, Vec<u8>> = AHashMap::with_capacity(keys.len());
    for key in keys.iter() {
        reversed.insert(key.iter().rev().copied().collect(), key.clone());
    }
    let mut sorted: Vec<&Vec<u8>> = reversed.keys().collect();
    sorted.sort_unstable();

    let mut current: &[u8] = sorted[0];
    for rev in &sorted[1..] {
        if rev.len() > current.len() && rev.starts_with(current) {
            keys.remove(&reversed[*rev]);
        } else {
            current = rev;
        }
    }
}
