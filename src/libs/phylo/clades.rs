//! Leaf-set bitsets over a shared taxon index.
//!
//! A clade is represented as a `FixedBitSet` of the leaves it subtends, so
//! clades from different trees over the same taxa can be counted and
//! compared directly. This drives both bootstrap support attribution and
//! majority-rule consensus.

use super::{NodeId, Tree, TreeError};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;

/// Assign each leaf name a bit, sorted by name so the indexing does not
/// depend on leaf order within any one tree.
pub fn leaf_index(tree: &Tree) -> Result<HashMap<String, usize>, TreeError> {
    let mut names = Vec::new();
    for id in tree.leaves() {
        match &tree.nodes[id].name {
            Some(name) => names.push(name.clone()),
            None => {
                return Err(TreeError::Logic(format!("leaf {} has no name", id)));
            }
        }
    }
    names.sort();
    names.dedup();

    Ok(names.into_iter().zip(0..).collect())
}

/// The leaf bitset subtended by every node. Leaves missing from the index
/// (stray tips in a replicate) contribute nothing.
pub fn bipartitions(
    tree: &Tree,
    index: &HashMap<String, usize>,
) -> Result<HashMap<NodeId, FixedBitSet>, TreeError> {
    let mut sets: HashMap<NodeId, FixedBitSet> = HashMap::new();
    let Some(root) = tree.root() else {
        return Ok(sets);
    };

    for id in tree.postorder(root) {
        let node = &tree.nodes[id];
        let mut bits = FixedBitSet::with_capacity(index.len());

        if node.is_leaf() {
            if let Some(&slot) = node.name.as_ref().and_then(|n| index.get(n)) {
                bits.insert(slot);
            }
        } else {
            for child in &node.children {
                if let Some(sub) = sets.get(child) {
                    bits.union_with(sub);
                }
            }
        }
        sets.insert(id, bits);
    }

    Ok(sets)
}

/// Count how many trees contain each non-trivial clade.
pub fn tally_clades(
    trees: &[Tree],
    index: &HashMap<String, usize>,
) -> Result<HashMap<FixedBitSet, usize>, TreeError> {
    let mut counts: HashMap<FixedBitSet, usize> = HashMap::new();

    for tree in trees {
        for (id, bits) in bipartitions(tree, index)? {
            if !tree.nodes[id].is_leaf() {
                *counts.entry(bits).or_default() += 1;
            }
        }
    }
    Ok(counts)
}

/// Label each internal node of `target` with the number (or percentage)
/// of replicate trees containing its clade.
pub fn attach_support(
    target: &mut Tree,
    replicates: &[Tree],
    percent: bool,
) -> Result<(), TreeError> {
    if replicates.is_empty() {
        return Err(TreeError::Logic("no replicate trees".to_string()));
    }

    let index = leaf_index(&replicates[0])?;
    let counts = tally_clades(replicates, &index)?;
    let total = replicates.len();

    for (id, bits) in bipartitions(target, &index)? {
        if target.nodes[id].is_leaf() {
            continue;
        }
        let hits = counts.get(&bits).copied().unwrap_or(0);
        let label = if percent {
            format!("{}", (hits * 100) / total)
        } else {
            format!("{}", hits)
        };
        target.nodes[id].name = Some(label);
    }
    Ok(())
}

/// Two clades are compatible when nested or disjoint.
pub fn compatible(a: &FixedBitSet, b: &FixedBitSet) -> bool {
    let overlap = a.intersection(b).count();
    overlap == 0 || overlap == a.count_ones(..) || overlap == b.count_ones(..)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(n: usize, on: &[usize]) -> FixedBitSet {
        let mut bs = FixedBitSet::with_capacity(n);
        for &i in on {
            bs.insert(i);
        }
        bs
    }

    #[test]
    fn index_is_name_sorted() {
        let tree = Tree::from_newick("((C,A),B);").unwrap();
        let index = leaf_index(&tree).unwrap();
        assert_eq!(index["A"], 0);
        assert_eq!(index["B"], 1);
        assert_eq!(index["C"], 2);
    }

    #[test]
    fn tally_counts_clades() {
        let trees = vec![
            Tree::from_newick("((A,B),C);").unwrap(),
            Tree::from_newick("((A,B),C);").unwrap(),
            Tree::from_newick("((A,C),B);").unwrap(),
        ];
        let index = leaf_index(&trees[0]).unwrap();
        let counts = tally_clades(&trees, &index).unwrap();

        assert_eq!(counts.get(&bits(3, &[0, 1])).copied().unwrap_or(0), 2);
        assert_eq!(counts.get(&bits(3, &[0, 2])).copied().unwrap_or(0), 1);
    }

    #[test]
    fn support_percentages() {
        let replicates = vec![
            Tree::from_newick("((A,B),C);").unwrap(),
            Tree::from_newick("((A,B),C);").unwrap(),
            Tree::from_newick("((A,C),B);").unwrap(),
        ];
        let mut target = Tree::from_newick("((A,B),C);").unwrap();
        attach_support(&mut target, &replicates, true).unwrap();

        let a = target.by_name("A").unwrap();
        let b = target.by_name("B").unwrap();
        let ab = target.mrca(&[a, b]).unwrap();
        assert_eq!(target.node(ab).unwrap().name.as_deref(), Some("66"));
    }

    #[test]
    fn compatibility() {
        assert!(compatible(&bits(4, &[0, 1]), &bits(4, &[0, 1, 2]))); // nested
        assert!(compatible(&bits(4, &[0, 1]), &bits(4, &[2, 3]))); // disjoint
        assert!(!compatible(&bits(4, &[0, 1, 2]), &bits(4, &[2, 3])));
    }
}
