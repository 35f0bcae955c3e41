use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A single `field=value` pair. Ordered by field, then value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Atom {
    pub field: String,
    pub value: String,
}

impl Atom {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Join atoms as `a=1 & b=2`.
pub fn format_atoms(atoms: &[Atom]) -> String {
    atoms
        .iter()
        .map(Atom::to_string)
        .collect::<Vec<_>>()
        .join(" & ")
}

/// The atoms of one record. Encoded records hold at most one atom per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    atoms: BTreeSet<Atom>,
}

impl Transaction {
    pub fn new(atoms: impl IntoIterator<Item = Atom>) -> Self {
        Self {
            atoms: atoms.into_iter().collect(),
        }
    }

    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.atoms.contains(atom)
    }

    /// True when every atom of `atoms` is present. Empty `atoms` never match.
    pub fn matches_all(&self, atoms: &[Atom]) -> bool {
        !atoms.is_empty() && atoms.iter().all(|a| self.atoms.contains(a))
    }

    /// Value this transaction carries for `field`, if any.
    pub fn value_of(&self, field: &str) -> Option<&str> {
        self.atoms
            .iter()
            .find(|a| a.field == field)
            .map(|a| a.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// A frequent itemset with its absolute count and support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itemset {
    /// Atoms in ascending order.
    pub items: Vec<Atom>,
    /// Transactions containing every item.
    pub count: usize,
    /// `count / total_transactions`.
    pub support: f64,
}

impl Itemset {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Output of one Apriori run, ordered by size then atom order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrequentItemsets {
    pub itemsets: Vec<Itemset>,
    /// Non-empty transactions used as the support denominator.
    pub total_transactions: usize,
    /// Deepest level that produced at least one frequent itemset.
    pub levels: usize,
}

impl FrequentItemsets {
    pub fn len(&self) -> usize {
        self.itemsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itemsets.is_empty()
    }

    /// Count lookup keyed by the sorted atom list.
    pub fn count_index(&self) -> HashMap<&[Atom], usize> {
        self.itemsets
            .iter()
            .map(|s| (s.items.as_slice(), s.count))
            .collect()
    }
}

/// Configuration for Apriori mining.
#[derive(Debug, Clone)]
pub struct AprioriConfig {
    /// Minimum fraction of transactions containing the itemset.
    pub min_support: f64,
    /// Largest itemset size to produce. Growth past it is an error.
    pub max_itemset_size: Option<usize>,
    /// Most candidates a single level may generate.
    pub max_candidates: usize,
    /// Count support across rayon workers.
    pub parallel: bool,
}

impl Default for AprioriConfig {
    fn default() -> Self {
        Self {
            min_support: 0.05,
            max_itemset_size: None,
            max_candidates: 100_000,
            parallel: true,
        }
    }
}

impl From<&rulemine_core::MiningConfig> for AprioriConfig {
    fn from(config: &rulemine_core::MiningConfig) -> Self {
        Self {
            min_support: config.min_support,
            max_itemset_size: config.max_itemset_size,
            max_candidates: config.max_candidates,
            parallel: config.parallel,
        }
    }
}
