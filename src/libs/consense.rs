use crate::libs::phylo::clades;
use crate::libs::phylo::Tree;
use fixedbitset::FixedBitSet;
use std::collections::HashMap;

/// Majority-rule extended consensus over a tree sample.
///
/// Clades at or above `limit` frequency are accepted greedily in frequency
/// order, keeping every accepted clade compatible with the ones before it,
/// so the consensus is as resolved as the sample supports. Internal node
/// labels carry the clade frequency (fraction, or integer percent); branch
/// lengths are averaged over the trees containing the clade.
pub fn majority_consensus(trees: &[Tree], limit: f64, percent: bool) -> anyhow::Result<Tree> {
    if trees.is_empty() {
        return Err(anyhow::anyhow!("No trees to build a consensus from"));
    }

    let total = trees.len();
    let leaf_map = clades::leaf_index(&trees[0])?;
    let num_leaves = leaf_map.len();

    // bitset -> (count, branch length sum); leaves tracked by index
    let mut clade_stats: HashMap<FixedBitSet, (usize, f64, usize)> = HashMap::new();
    let mut leaf_lengths: Vec<(f64, usize)> = vec![(0.0, 0); num_leaves];

    for tree in trees {
        let bitsets = clades::bipartitions(tree, &leaf_map)?;
        let root = tree.root();

        for (id, bs) in bitsets {
            let node = tree.node(id).unwrap();
            if node.is_leaf() {
                if let Some(name) = &node.name {
                    if let Some(&idx) = leaf_map.get(name) {
                        if let Some(len) = node.length {
                            leaf_lengths[idx].0 += len;
                            leaf_lengths[idx].1 += 1;
                        }
                    }
                }
            } else if Some(id) != root {
                let entry = clade_stats.entry(bs).or_insert((0, 0.0, 0));
                entry.0 += 1;
                if let Some(len) = node.length {
                    entry.1 += len;
                    entry.2 += 1;
                }
            }
        }
    }

    // Frequency order; size then bit pattern as deterministic tie-breaks
    let mut candidates: Vec<(FixedBitSet, usize, f64, usize)> = clade_stats
        .into_iter()
        .map(|(bs, (count, len_sum, len_n))| (bs, count, len_sum, len_n))
        .collect();
    candidates.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| a.0.count_ones(..).cmp(&b.0.count_ones(..)))
            .then_with(|| a.0.ones().cmp(b.0.ones()))
    });

    let mut accepted: Vec<(FixedBitSet, usize, f64, usize)> = Vec::new();
    for (bs, count, len_sum, len_n) in candidates {
        let freq = count as f64 / total as f64;
        if freq < limit {
            break;
        }
        // Skip trivial clades: the universe and single leaves
        let ones = bs.count_ones(..);
        if ones <= 1 || ones == num_leaves {
            continue;
        }
        if accepted.iter().all(|(acc, ..)| clades::compatible(acc, &bs)) {
            accepted.push((bs, count, len_sum, len_n));
        }
    }

    // Nesting order: big clades first, so parents exist before children
    accepted.sort_by(|a, b| {
        b.0.count_ones(..)
            .cmp(&a.0.count_ones(..))
            .then_with(|| a.0.ones().cmp(b.0.ones()))
    });

    // Build the consensus tree: universe root, then accepted clades, then
    // leaves, each attached to the smallest containing node
    let name_of: HashMap<usize, &String> = leaf_map.iter().map(|(n, &i)| (i, n)).collect();

    let mut tree = Tree::new();
    let root = tree.add_node();
    tree.set_root(root);

    let mut placed: Vec<(FixedBitSet, usize)> = Vec::new();
    let mut universe = FixedBitSet::with_capacity(num_leaves);
    universe.insert_range(..);
    placed.push((universe, root));

    for (bs, count, len_sum, len_n) in &accepted {
        let parent = smallest_container(&placed, bs).unwrap_or(root);
        let node = tree.add_node();
        tree.link(parent, node)?;

        let freq = *count as f64 / total as f64;
        let label = if percent {
            format!("{}", (freq * 100.0).round() as usize)
        } else {
            format!("{:.2}", freq)
        };
        if let Some(n) = tree.node_mut(node) {
            n.set_name(label);
            if *len_n > 0 {
                n.length = Some(len_sum / *len_n as f64);
            }
        }

        placed.push((bs.clone(), node));
    }

    for idx in 0..num_leaves {
        let mut bs = FixedBitSet::with_capacity(num_leaves);
        bs.set(idx, true);
        let parent = smallest_container(&placed, &bs).unwrap_or(root);

        let node = tree.add_node();
        tree.link(parent, node)?;
        if let Some(n) = tree.node_mut(node) {
            if let Some(name) = name_of.get(&idx) {
                n.set_name((*name).clone());
            }
            let (sum, count) = leaf_lengths[idx];
            if count > 0 {
                n.length = Some(sum / count as f64);
            }
        }
    }

    Ok(tree)
}

fn smallest_container(placed: &[(FixedBitSet, usize)], bs: &FixedBitSet) -> Option<usize> {
    placed
        .iter()
        .filter(|(p, _)| bs.is_subset(p) && p.count_ones(..) > bs.count_ones(..))
        .min_by_key(|(p, _)| p.count_ones(..))
        .map(|(_, id)| *id)
}

/// Drop the first `burnin` fraction of a posterior sample.
pub fn apply_burnin(trees: Vec<Tree>, burnin: f64) -> Vec<Tree> {
    let skip = (trees.len() as f64 * burnin).floor() as usize;
    trees.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Tree> {
        vec![
            Tree::from_newick("((A:1,B:1):1,(C:1,D:1):1);").unwrap(),
            Tree::from_newick("((A:2,B:2):2,(C:2,D:2):2);").unwrap(),
            Tree::from_newick("((A:3,C:3):3,(B:3,D:3):3);").unwrap(),
        ]
    }

    #[test]
    fn majority_clades_survive() {
        let tree = majority_consensus(&sample(), 0.5, false).unwrap();

        // AB appears in 2/3 trees, AC in 1/3
        let a = tree.by_name("A").unwrap();
        let b = tree.by_name("B").unwrap();
        let ab = tree.mrca(&[a, b]).unwrap();

        let node = tree.node(ab).unwrap();
        assert_eq!(node.name.as_deref(), Some("0.67"));

        // Leaf count preserved
        assert_eq!(tree.leaves().len(), 4);
    }

    #[test]
    fn branch_lengths_averaged() {
        let tree = majority_consensus(&sample(), 0.5, false).unwrap();
        let a = tree.by_name("A").unwrap();
        // A's edge averaged over all three trees: (1+2+3)/3
        approx::assert_relative_eq!(tree.node(a).unwrap().length.unwrap(), 2.0);
    }

    #[test]
    fn percent_labels() {
        let tree = majority_consensus(&sample(), 0.5, true).unwrap();
        let a = tree.by_name("A").unwrap();
        let b = tree.by_name("B").unwrap();
        let ab = tree.mrca(&[a, b]).unwrap();
        assert_eq!(tree.node(ab).unwrap().name.as_deref(), Some("67"));
    }

    #[test]
    fn limit_prunes_low_support() {
        let tree = majority_consensus(&sample(), 0.9, false).unwrap();
        // Nothing reaches 90%: the consensus is a star
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().children.len(), 4);
    }

    #[test]
    fn burnin_drops_head() {
        let trees = sample();
        let kept = apply_burnin(trees, 0.34);
        assert_eq!(kept.len(), 2);
    }
}
