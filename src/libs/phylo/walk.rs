//! Traversals and read-only queries over the arena.

use super::{Node, NodeId, Tree, TreeError};
use std::collections::{BTreeMap, HashSet};

/// Parent-before-children order, children left to right.
pub fn preorder(tree: &Tree, top: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![top];

    while let Some(id) = stack.pop() {
        if let Some(node) = tree.node(id) {
            order.push(id);
            stack.extend(node.children.iter().rev());
        }
    }
    order
}

/// Children-before-parent order, children left to right.
pub fn postorder(tree: &Tree, top: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![top];

    while let Some(id) = stack.pop() {
        if let Some(node) = tree.node(id) {
            order.push(id);
            stack.extend(node.children.iter());
        }
    }
    order.reverse();
    order
}

/// The path from the root down to `id`, both inclusive.
pub fn ancestry(tree: &Tree, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
    if tree.node(id).is_none() {
        return Err(TreeError::Logic(format!("no such node: {}", id)));
    }

    let mut chain = vec![id];
    let mut cursor = id;
    while let Some(parent) = tree.nodes[cursor].parent {
        chain.push(parent);
        cursor = parent;
    }
    chain.reverse();

    if tree.root().is_some_and(|r| chain[0] != r) {
        return Err(TreeError::Logic(format!(
            "node {} is detached from the root",
            id
        )));
    }
    Ok(chain)
}

/// Most recent common ancestor of a node set: the deepest node on every
/// member's root path.
pub fn mrca(tree: &Tree, ids: &[NodeId]) -> Result<NodeId, TreeError> {
    let first = *ids
        .first()
        .ok_or_else(|| TreeError::Logic("mrca of an empty set".to_string()))?;

    let mut shared = ancestry(tree, first)?;
    for &id in &ids[1..] {
        let chain = ancestry(tree, id)?;
        let common = shared
            .iter()
            .zip(chain.iter())
            .take_while(|(a, b)| a == b)
            .count();
        shared.truncate(common);
    }

    shared
        .last()
        .copied()
        .ok_or_else(|| TreeError::Logic("nodes share no ancestor".to_string()))
}

/// A node set is monophyletic when its members' MRCA subtends no leaf
/// outside the set.
pub fn is_monophyletic(tree: &Tree, ids: &[NodeId]) -> bool {
    if ids.is_empty() {
        return false;
    }
    let Ok(ancestor) = mrca(tree, ids) else {
        return false;
    };

    let mut chosen: HashSet<NodeId> = HashSet::new();
    for &id in ids {
        chosen.extend(leaves_under(tree, id));
    }
    leaves_under(tree, ancestor)
        .into_iter()
        .all(|leaf| chosen.contains(&leaf))
}

/// Leaf ids under `top`, in left-to-right order.
pub fn leaves_under(tree: &Tree, top: NodeId) -> Vec<NodeId> {
    preorder(tree, top)
        .into_iter()
        .filter(|&id| tree.nodes[id].children.is_empty())
        .collect()
}

pub fn find_nodes<F>(tree: &Tree, predicate: F) -> Vec<NodeId>
where
    F: Fn(&Node) -> bool,
{
    tree.nodes
        .iter()
        .filter(|n| !n.deleted && predicate(n))
        .map(|n| n.id)
        .collect()
}

/// First live node carrying `name`.
pub fn by_name(tree: &Tree, name: &str) -> Option<NodeId> {
    tree.nodes
        .iter()
        .find(|n| !n.deleted && n.name.as_deref() == Some(name))
        .map(|n| n.id)
}

/// Map of every named live node to its id.
pub fn name_index(tree: &Tree) -> BTreeMap<String, NodeId> {
    tree.nodes
        .iter()
        .filter(|n| !n.deleted)
        .filter_map(|n| n.name.clone().map(|name| (name, n.id)))
        .collect()
}

/// The node whose parent edge is the longest.
pub fn longest_edge(tree: &Tree) -> Option<NodeId> {
    tree.nodes
        .iter()
        .filter(|n| !n.deleted && n.length.is_some())
        .max_by(|a, b| {
            a.length
                .partial_cmp(&b.length)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|n| n.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_orders() {
        let tree = Tree::from_newick("((A,B)ab,C)r;").unwrap();
        let root = tree.root().unwrap();

        let pre: Vec<_> = preorder(&tree, root)
            .into_iter()
            .filter_map(|id| tree.node(id).unwrap().name.clone())
            .collect();
        assert_eq!(pre, ["r", "ab", "A", "B", "C"]);

        let post: Vec<_> = postorder(&tree, root)
            .into_iter()
            .filter_map(|id| tree.node(id).unwrap().name.clone())
            .collect();
        assert_eq!(post, ["A", "B", "ab", "C", "r"]);
    }

    #[test]
    fn mrca_and_monophyly() {
        let tree = Tree::from_newick("(((A,B)ab,C)abc,(D,E)de);").unwrap();
        let a = tree.by_name("A").unwrap();
        let b = tree.by_name("B").unwrap();
        let c = tree.by_name("C").unwrap();
        let d = tree.by_name("D").unwrap();

        assert_eq!(tree.mrca(&[a, b]).unwrap(), tree.by_name("ab").unwrap());
        assert_eq!(tree.mrca(&[a, c]).unwrap(), tree.by_name("abc").unwrap());

        assert!(tree.is_monophyletic(&[a, b]));
        assert!(tree.is_monophyletic(&[a, b, c]));
        assert!(!tree.is_monophyletic(&[a, c]));
        assert!(!tree.is_monophyletic(&[b, d]));
    }

    #[test]
    fn longest_edge_found() {
        let tree = Tree::from_newick("(A:1,(B:2,C:9):3);").unwrap();
        let longest = longest_edge(&tree).unwrap();
        assert_eq!(tree.node(longest).unwrap().name.as_deref(), Some("C"));
    }
}
