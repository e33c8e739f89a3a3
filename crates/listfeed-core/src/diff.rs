//! Keyed diff between two snapshots
//!
//! [`diff`] produces the [`Changeset`] that turns the rows of one snapshot
//! into the rows of another. Items are matched by identifier, never by
//! content. The changeset is built in five passes over a working copy of the
//! old rows, so every emitted path is valid when it is applied:
//!
//! 1. remove identifiers that are gone
//! 2. append sections that are new
//! 3. reorder surviving sections
//! 4. place items section by section (moves and inserts)
//! 5. drop sections that are gone, then emit updates for reloaded items
//!
//! An item counts as reloaded when `new` declares it so, or when its revision
//! in `new` is newer than the generation of `old`.
//!
//! In passes 3 and 4 the elements already in relative target order are found
//! with a longest-increasing-subsequence search and left alone, so only the
//! minimal set of elements moves. Everything else is moved to sit directly
//! after its target predecessor.

use std::collections::{HashMap, HashSet};

use crate::changeset::{Changeset, ListOp};
use crate::identity::{ItemKey, SectionKey};
use crate::snapshot::{ItemPath, Snapshot};

/// Compute the changeset from `old` to `new`.
///
/// Both snapshots must be valid (see [`Snapshot::validate`]); with duplicate
/// identifiers the result is well-formed but unspecified.
pub fn diff<S: SectionKey, I: ItemKey>(old: &Snapshot<S, I>, new: &Snapshot<S, I>) -> Changeset<S, I> {
    let mut work: Vec<(S, Vec<I>)> = old
        .sections()
        .iter()
        .map(|s| (s.key().clone(), s.items().to_vec()))
        .collect();
    let mut ops = Vec::new();

    let target_keys: Vec<&S> = new.section_keys().collect();
    let target_section: HashMap<&S, usize> = target_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (*k, i))
        .collect();
    let target_items: HashSet<&I> = new.item_ids().collect();

    // 1. vanished identifiers
    for s in (0..work.len()).rev() {
        for row in (0..work[s].1.len()).rev() {
            if !target_items.contains(&work[s].1[row]) {
                let item = work[s].1.remove(row);
                ops.push(ListOp::Remove {
                    item,
                    at: ItemPath::new(s, row),
                });
            }
        }
    }

    // 2. new sections, appended for now
    for key in &target_keys {
        if !work.iter().any(|(k, _)| k == *key) {
            let index = work.len();
            work.push(((*key).clone(), Vec::new()));
            ops.push(ListOp::InsertSection {
                key: (*key).clone(),
                index,
            });
        }
    }

    // 3. section order
    let current: Vec<usize> = work
        .iter()
        .filter_map(|(k, _)| target_section.get(k).copied())
        .collect();
    let stable: HashSet<usize> = longest_increasing_run(&current)
        .into_iter()
        .map(|i| current[i])
        .collect();
    for (t, key) in target_keys.iter().enumerate() {
        if stable.contains(&t) {
            continue;
        }
        let Some(from) = section_index(&work, key) else {
            continue;
        };
        let to = match t
            .checked_sub(1)
            .and_then(|prev| section_index(&work, target_keys[prev]))
        {
            Some(p) if from < p => p,
            Some(p) => p + 1,
            None => 0,
        };
        if from != to {
            let section = work.remove(from);
            work.insert(to, section);
            ops.push(ListOp::MoveSection {
                key: (*key).clone(),
                from,
                to,
            });
        }
    }

    // 4. items, section by section in target order
    let mut home: HashMap<I, usize> = HashMap::new();
    for (s, (_, rows)) in work.iter().enumerate() {
        for item in rows {
            home.insert(item.clone(), s);
        }
    }
    for section in new.sections() {
        let Some(s) = section_index(&work, section.key()) else {
            continue;
        };
        let targets = section.items();
        let target_row: HashMap<&I, usize> =
            targets.iter().enumerate().map(|(i, item)| (item, i)).collect();
        let current: Vec<usize> = work[s]
            .1
            .iter()
            .filter_map(|item| target_row.get(item).copied())
            .collect();
        let stable: HashSet<usize> = longest_increasing_run(&current)
            .into_iter()
            .map(|i| current[i])
            .collect();

        for (row, item) in targets.iter().enumerate() {
            if stable.contains(&row) {
                continue;
            }
            let mut to_row = row
                .checked_sub(1)
                .and_then(|prev| work[s].1.iter().position(|i| i == &targets[prev]))
                .map_or(0, |p| p + 1);

            let from = home.get(item).copied().and_then(|hs| {
                work[hs]
                    .1
                    .iter()
                    .position(|i| i == item)
                    .map(|r| ItemPath::new(hs, r))
            });

            match from {
                Some(from) => {
                    if from.section == s && from.row < to_row {
                        to_row -= 1;
                    }
                    let to = ItemPath::new(s, to_row);
                    if from == to {
                        continue;
                    }
                    let moved = work[from.section].1.remove(from.row);
                    work[s].1.insert(to_row, moved);
                    home.insert(item.clone(), s);
                    ops.push(ListOp::Move {
                        item: item.clone(),
                        from,
                        to,
                    });
                }
                None => {
                    work[s].1.insert(to_row, item.clone());
                    home.insert(item.clone(), s);
                    ops.push(ListOp::Insert {
                        item: item.clone(),
                        at: ItemPath::new(s, to_row),
                    });
                }
            }
        }
    }

    // 5. sections that are gone; they are empty by now
    for s in (0..work.len()).rev() {
        if !target_section.contains_key(&work[s].0) {
            let (key, _) = work.remove(s);
            ops.push(ListOp::RemoveSection { key, index: s });
        }
    }

    if new.has_reload_markers() {
        let old_items: HashSet<&I> = old.item_ids().collect();
        let since = old.generation();
        for (s, section) in new.sections().iter().enumerate() {
            for (row, item) in section.items().iter().enumerate() {
                if old_items.contains(item) && new.needs_reload(item, since) {
                    ops.push(ListOp::Update {
                        item: item.clone(),
                        at: ItemPath::new(s, row),
                    });
                }
            }
        }
    }

    Changeset::from_ops(ops)
}

fn section_index<S: SectionKey, I>(work: &[(S, Vec<I>)], key: &S) -> Option<usize> {
    work.iter().position(|(k, _)| k == key)
}

/// Indices into `seq` of one longest strictly increasing subsequence.
fn longest_increasing_run(seq: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < value);
        if k > 0 {
            prev[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }
    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        run.push(i);
        cursor = prev[i];
    }
    run.reverse();
    run
}
