//! Node ages and proportional rescaling on chronograms.

use super::{walk, NodeId, Tree, TreeError};
use std::collections::HashMap;

/// Age of a node: its distance to the furthest descendant tip. On an
/// ultrametric tree every tip sits at age zero and ages grow rootward.
pub fn age(tree: &Tree, id: NodeId) -> f64 {
    let mut height: HashMap<NodeId, f64> = HashMap::new();

    for n in walk::postorder(tree, id) {
        let h = tree.nodes[n]
            .children
            .iter()
            .map(|&c| {
                let edge = tree.nodes[c].length.unwrap_or(0.0);
                edge + height.get(&c).copied().unwrap_or(0.0)
            })
            .fold(0.0, f64::max);
        height.insert(n, h);
    }

    height.get(&id).copied().unwrap_or(0.0)
}

/// Whether every tip is equidistant from the root, within `tolerance`.
pub fn is_ultrametric(tree: &Tree, tolerance: f64) -> bool {
    let Some(root) = tree.root() else {
        return true;
    };

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut stack = vec![(root, 0.0)];
    while let Some((id, depth)) = stack.pop() {
        let node = &tree.nodes[id];
        if node.children.is_empty() {
            lo = lo.min(depth);
            hi = hi.max(depth);
        } else {
            for &child in &node.children {
                stack.push((child, depth + tree.nodes[child].length.unwrap_or(0.0)));
            }
        }
    }

    lo > hi || hi - lo <= tolerance
}

/// Rescale every branch proportionally so the root's height equals
/// `depth`. Returns the applied factor.
///
/// This is the grafting contract: a clade tree scaled to the age of its
/// attachment point cannot contain a node older than that point.
pub fn scale_to_depth(tree: &mut Tree, depth: f64) -> Result<f64, TreeError> {
    let root = tree
        .root()
        .ok_or_else(|| TreeError::Logic("tree has no root".to_string()))?;
    let height = age(tree, root);
    if height <= 0.0 {
        return Err(TreeError::Logic(
            "tree has no branch lengths to scale".to_string(),
        ));
    }

    let factor = depth / height;
    for node in tree.nodes.iter_mut().filter(|n| !n.deleted) {
        node.length = node.length.map(|l| l * factor);
    }
    Ok(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn age_and_scaling() {
        let mut tree = Tree::from_newick("((A:1,B:1):2,C:3);").unwrap();
        let root = tree.root().unwrap();

        assert_relative_eq!(age(&tree, root), 3.0);
        assert!(is_ultrametric(&tree, 1e-9));

        let factor = scale_to_depth(&mut tree, 12.0).unwrap();
        assert_relative_eq!(factor, 4.0);
        assert_relative_eq!(age(&tree, root), 12.0);
        assert!(is_ultrametric(&tree, 1e-9));
    }

    #[test]
    fn ragged_tips_are_not_ultrametric() {
        let tree = Tree::from_newick("((A:1,B:2):2,C:3);").unwrap();
        assert!(!is_ultrametric(&tree, 1e-9));
    }
}
