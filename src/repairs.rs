//! Reusable generic [`crate::repair::Repair`] constructors for the shapes
//! observed across Blizzard's API responses: unused sibling variants, partial
//! entries missing required identifiers, orphaned graph nodes, and secondary
//! taxonomies that duplicate members of a primary collection. Callers supply
//! field-extraction closures; none of these are hardcoded to a concrete
//! payload type, since the concrete domain types live outside this crate.

use std::collections::HashSet;
use std::hash::Hash;

use crate::errors::ScanError;

/// Keeps only the collection member whose key matches the active key,
/// discarding sibling variants. Leaves the collection untouched if no member
/// matches the active key.
pub fn drop_unused_variant<T, V, FItems, FActiveKey, FItemKey>(
    items: FItems,
    active_key: FActiveKey,
    item_key: FItemKey,
) -> impl Fn(&mut T) -> Result<(), ScanError> + Send + Sync
where
    T: Send + Sync,
    V: Send + Sync,
    FItems: Fn(&mut T) -> &mut Vec<V> + Send + Sync,
    FActiveKey: Fn(&T) -> String + Send + Sync,
    FItemKey: Fn(&V) -> String + Send + Sync,
{
    move |value: &mut T| {
        let active = active_key(value);
        let target = items(value);
        if let Some(pos) = target.iter().position(|item| item_key(item) == active) {
            let kept = target.remove(pos);
            target.clear();
            target.push(kept);
        }
        Ok(())
    }
}

/// Drops collection members for which `is_partial` reports true, e.g. an
/// entry whose required nested identifier is zero.
pub fn prune_partial_entries<T, V, FItems, FIsPartial>(
    items: FItems,
    is_partial: FIsPartial,
) -> impl Fn(&mut T) -> Result<(), ScanError> + Send + Sync
where
    T: Send + Sync,
    V: Send + Sync,
    FItems: Fn(&mut T) -> &mut Vec<V> + Send + Sync,
    FIsPartial: Fn(&V) -> bool + Send + Sync,
{
    move |value: &mut T| {
        let target = items(value);
        target.retain(|item| !is_partial(item));
        Ok(())
    }
}

/// Drops graph nodes whose `locked_by` chain does not reach a root (a node
/// with no predecessor). Idempotent: every node remaining after one
/// application is reachable, so a second application is a no-op.
pub fn remove_orphans<T, V, K, FItems, FKey, FLockedBy>(
    items: FItems,
    node_key: FKey,
    locked_by: FLockedBy,
) -> impl Fn(&mut T) -> Result<(), ScanError> + Send + Sync
where
    T: Send + Sync,
    V: Send + Sync,
    K: Eq + Hash + Clone,
    FItems: Fn(&mut T) -> &mut Vec<V> + Send + Sync,
    FKey: Fn(&V) -> K + Send + Sync,
    FLockedBy: Fn(&V) -> Option<K> + Send + Sync,
{
    move |value: &mut T| {
        let target = items(value);

        let mut reachable: HashSet<K> = target
            .iter()
            .filter(|node| locked_by(node).is_none())
            .map(&node_key)
            .collect();

        loop {
            let mut added_any = false;
            for node in target.iter() {
                let key = node_key(node);
                if reachable.contains(&key) {
                    continue;
                }
                if let Some(parent) = locked_by(node) {
                    if reachable.contains(&parent) {
                        reachable.insert(key);
                        added_any = true;
                    }
                }
            }
            if !added_any {
                break;
            }
        }

        target.retain(|node| reachable.contains(&node_key(node)));
        Ok(())
    }
}

/// Drops members of a primary collection that also appear (by key) in a
/// secondary taxonomy, e.g. class talent nodes that duplicate spec talent nodes.
pub fn extract_inherent_subset<T, V, K, FItems, FSecondaryKeys, FKey>(
    items: FItems,
    secondary_keys: FSecondaryKeys,
    key: FKey,
) -> impl Fn(&mut T) -> Result<(), ScanError> + Send + Sync
where
    T: Send + Sync,
    V: Send + Sync,
    K: Eq + Hash,
    FItems: Fn(&mut T) -> &mut Vec<V> + Send + Sync,
    FSecondaryKeys: Fn(&T) -> HashSet<K> + Send + Sync,
    FKey: Fn(&V) -> K + Send + Sync,
{
    move |value: &mut T| {
        let exclude = secondary_keys(value);
        let target = items(value);
        target.retain(|item| !exclude.contains(&key(item)));
        Ok(())
    }
}
