use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, warn};

use rulemine_core::{CancellationToken, LimitKind, MiningError, Result};

use super::types::{AprioriConfig, Atom, FrequentItemsets, Itemset, Transaction};

/// Interned atom identifier. Ids follow atom order.
pub type AtomId = u32;

/// Transactions below this size are counted on the calling thread.
const SHARD_SIZE: usize = 1024;

/// Non-empty transactions interned against a sorted vocabulary.
#[derive(Debug, Clone, Default)]
pub struct TransactionDb {
    vocabulary: Vec<Atom>,
    /// Field index per atom id, used to skip same-field joins.
    field_ids: Vec<u32>,
    /// Sorted atom ids per non-empty transaction.
    rows: Vec<Vec<AtomId>>,
    /// Transactions dropped because they carried no atoms.
    empty: usize,
    /// Every transaction holds at most one atom per field.
    single_valued: bool,
}

impl TransactionDb {
    pub fn build(transactions: &[Transaction]) -> Self {
        let vocabulary: Vec<Atom> = transactions
            .iter()
            .flat_map(|t| t.atoms().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut field_ids = Vec::with_capacity(vocabulary.len());
        let mut field_id = 0u32;
        for (i, atom) in vocabulary.iter().enumerate() {
            if i > 0 && vocabulary[i - 1].field != atom.field {
                field_id += 1;
            }
            field_ids.push(field_id);
        }

        let mut empty = 0usize;
        let rows: Vec<Vec<AtomId>> = {
            let index: HashMap<&Atom, AtomId> = vocabulary
                .iter()
                .enumerate()
                .map(|(i, a)| (a, i as AtomId))
                .collect();
            transactions
                .iter()
                .filter_map(|t| {
                    if t.is_empty() {
                        empty += 1;
                        return None;
                    }
                    Some(t.atoms().filter_map(|a| index.get(a).copied()).collect())
                })
                .collect()
        };

        let single_valued = rows.iter().all(|row| {
            row.windows(2)
                .all(|w| field_ids[w[0] as usize] != field_ids[w[1] as usize])
        });

        Self {
            vocabulary,
            field_ids,
            rows,
            empty,
            single_valued,
        }
    }

    /// Transactions that count toward support.
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn empty_count(&self) -> usize {
        self.empty
    }

    fn atoms(&self, ids: &[AtomId]) -> Vec<Atom> {
        ids.iter().map(|&id| self.vocabulary[id as usize].clone()).collect()
    }
}

/// Mine frequent itemsets from raw transactions.
pub fn mine(transactions: &[Transaction], config: &AprioriConfig) -> Result<FrequentItemsets> {
    let db = TransactionDb::build(transactions);
    apriori(&db, config, &CancellationToken::new())
}

/// Run level-wise Apriori over an interned transaction database.
///
/// Level k candidates are joins of frequent (k-1)-itemsets sharing a
/// (k-2)-prefix, minus any candidate with an infrequent (k-1)-subset.
/// Support comparisons use the unrounded ratio. Cancellation is observed
/// after each completed level.
pub fn apriori(
    db: &TransactionDb,
    config: &AprioriConfig,
    cancel: &CancellationToken,
) -> Result<FrequentItemsets> {
    if !(config.min_support > 0.0 && config.min_support <= 1.0) {
        return Err(MiningError::Configuration(format!(
            "min_support must be in (0, 1], got {}",
            config.min_support
        )));
    }

    let total = db.total();
    if total == 0 {
        debug!(empty = db.empty_count(), "no non-empty transactions, nothing to mine");
        return Ok(FrequentItemsets::default());
    }

    let is_frequent = |count: usize| count as f64 / total as f64 >= config.min_support;

    let mut level = 1usize;
    let candidates: Vec<Vec<AtomId>> = (0..db.vocabulary.len() as AtomId)
        .map(|id| vec![id])
        .collect();
    check_candidate_limit(level, candidates.len(), config.max_candidates)?;
    let mut frequent = count_frequent(db, candidates, config.parallel, &is_frequent);

    let mut itemsets = Vec::new();
    let mut levels = 0usize;

    while !frequent.is_empty() {
        debug!(level, frequent = frequent.len(), "apriori level complete");
        levels = level;
        itemsets.extend(frequent.iter().map(|(ids, count)| Itemset {
            items: db.atoms(ids),
            count: *count,
            support: *count as f64 / total as f64,
        }));

        if cancel.is_cancelled() {
            warn!(level, itemsets = itemsets.len(), "apriori cancelled");
            return Err(MiningError::Cancelled { level });
        }

        let next = generate_candidates(db, &frequent, level + 1, config.max_candidates)?;
        if next.is_empty() {
            break;
        }
        let candidate_count = next.len();
        let next_frequent = count_frequent(db, next, config.parallel, &is_frequent);

        if let Some(max) = config.max_itemset_size {
            if level >= max && !next_frequent.is_empty() {
                warn!(
                    level = level + 1,
                    candidates = candidate_count,
                    frequent = next_frequent.len(),
                    max_itemset_size = max,
                    "frequent itemsets exceed configured maximum size"
                );
                return Err(MiningError::ResourceLimitExceeded {
                    level: level + 1,
                    kind: LimitKind::ItemsetSize,
                    count: candidate_count,
                    limit: max,
                });
            }
        }

        frequent = next_frequent;
        level += 1;
    }

    debug!(
        itemsets = itemsets.len(),
        levels,
        total_transactions = total,
        min_support = config.min_support,
        "Apriori mining complete"
    );

    Ok(FrequentItemsets {
        itemsets,
        total_transactions: total,
        levels,
    })
}

fn check_candidate_limit(level: usize, count: usize, limit: usize) -> Result<()> {
    if count > limit {
        warn!(level, candidates = count, limit, "candidate limit exceeded");
        return Err(MiningError::ResourceLimitExceeded {
            level,
            kind: LimitKind::Candidates,
            count,
            limit,
        });
    }
    Ok(())
}

/// Count candidates and keep the frequent ones, preserving candidate order.
fn count_frequent(
    db: &TransactionDb,
    candidates: Vec<Vec<AtomId>>,
    parallel: bool,
    is_frequent: &impl Fn(usize) -> bool,
) -> Vec<(Vec<AtomId>, usize)> {
    let counts = count_support(&db.rows, &candidates, parallel);
    candidates
        .into_iter()
        .zip(counts)
        .filter(|(_, count)| is_frequent(*count))
        .collect()
}

/// Join step plus subset pruning for level `k` (k >= 2).
///
/// `prev` is sorted lexicographically, so itemsets sharing a (k-2)-prefix are
/// contiguous and candidates come out sorted as well.
fn generate_candidates(
    db: &TransactionDb,
    prev: &[(Vec<AtomId>, usize)],
    k: usize,
    max_candidates: usize,
) -> Result<Vec<Vec<AtomId>>> {
    let prefix = k - 2;
    let known: HashSet<&[AtomId]> = prev.iter().map(|(ids, _)| ids.as_slice()).collect();
    let mut candidates = Vec::new();
    let mut subset = Vec::with_capacity(k - 1);

    for (i, (a, _)) in prev.iter().enumerate() {
        for (b, _) in &prev[i + 1..] {
            if a[..prefix] != b[..prefix] {
                break;
            }
            let last = b[prefix];
            // Two values of one field never share a transaction.
            if db.single_valued
                && db.field_ids[a[prefix] as usize] == db.field_ids[last as usize]
            {
                continue;
            }

            let mut candidate = Vec::with_capacity(k);
            candidate.extend_from_slice(a);
            candidate.push(last);

            if has_infrequent_subset(&candidate, &known, &mut subset) {
                continue;
            }
            candidates.push(candidate);
            check_candidate_limit(k, candidates.len(), max_candidates)?;
        }
    }

    Ok(candidates)
}

/// Whether any (k-1)-subset of `candidate` is missing from `known`.
///
/// Dropping either of the last two items yields the joined parents, which are
/// frequent by construction, so only the first k-2 drops are checked.
fn has_infrequent_subset(
    candidate: &[AtomId],
    known: &HashSet<&[AtomId]>,
    subset: &mut Vec<AtomId>,
) -> bool {
    let k = candidate.len();
    (0..k.saturating_sub(2)).any(|skip| {
        subset.clear();
        subset.extend(
            candidate
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, id)| *id),
        );
        !known.contains(subset.as_slice())
    })
}

/// Count, per candidate, the transactions containing it.
///
/// Large databases are split into shards counted on the rayon pool and summed.
fn count_support(rows: &[Vec<AtomId>], candidates: &[Vec<AtomId>], parallel: bool) -> Vec<usize> {
    let count_shard = |shard: &[Vec<AtomId>]| -> Vec<usize> {
        let mut counts = vec![0usize; candidates.len()];
        for row in shard {
            for (count, candidate) in counts.iter_mut().zip(candidates) {
                if is_subset(candidate, row) {
                    *count += 1;
                }
            }
        }
        counts
    };

    if parallel && rows.len() > SHARD_SIZE {
        rows.par_chunks(SHARD_SIZE)
            .map(&count_shard)
            .reduce(
                || vec![0usize; candidates.len()],
                |mut acc, shard| {
                    for (a, s) in acc.iter_mut().zip(shard) {
                        *a += s;
                    }
                    acc
                },
            )
    } else {
        count_shard(rows)
    }
}

/// Sorted-slice containment.
pub(crate) fn is_subset(needle: &[AtomId], haystack: &[AtomId]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    let mut rest = haystack.iter();
    needle.iter().all(|n| rest.by_ref().any(|h| h == n))
}
