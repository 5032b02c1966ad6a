//! Structural edits: linking, pruning, splicing, rerooting, grafting.

use super::{walk, NodeId, Tree, TreeError};

/// Attach `child` under `parent`. Both must exist and the child must be
/// detached.
pub fn link(tree: &mut Tree, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
    if parent == child {
        return Err(TreeError::Logic(format!("node {} cannot adopt itself", child)));
    }
    if tree.node(parent).is_none() {
        return Err(TreeError::Logic(format!("no such parent node: {}", parent)));
    }
    match tree.node(child) {
        None => return Err(TreeError::Logic(format!("no such child node: {}", child))),
        Some(n) => {
            if let Some(held) = n.parent {
                return Err(TreeError::Logic(format!(
                    "node {} is already attached under {}",
                    child, held
                )));
            }
        }
    }

    tree.nodes[child].parent = Some(parent);
    tree.nodes[parent].children.push(child);
    Ok(())
}

/// Soft-delete a node and its whole subtree.
pub fn prune(tree: &mut Tree, id: NodeId) {
    if tree.node(id).is_none() {
        return;
    }

    if let Some(parent) = tree.nodes[id].parent {
        tree.nodes[parent].children.retain(|&c| c != id);
    }

    let mut doomed = vec![id];
    while let Some(n) = doomed.pop() {
        doomed.append(&mut tree.nodes[n].children);
        tree.nodes[n].parent = None;
        tree.nodes[n].deleted = true;
    }

    if tree.root == Some(id) {
        tree.root = None;
    }
}

/// Remove a node, promoting its children to its parent in place. Edge
/// lengths add up, so tip-to-root distances are unchanged.
pub fn splice_out(tree: &mut Tree, id: NodeId) -> Result<(), TreeError> {
    let node = tree
        .node(id)
        .ok_or_else(|| TreeError::Logic(format!("no such node: {}", id)))?;
    let parent = node
        .parent
        .ok_or_else(|| TreeError::Logic("cannot splice out the root".to_string()))?;
    let base = node.length;

    let promoted = std::mem::take(&mut tree.nodes[id].children);
    for &child in &promoted {
        let kid = &mut tree.nodes[child];
        kid.parent = Some(parent);
        kid.length = match (base, kid.length) {
            (Some(b), Some(l)) => Some(b + l),
            (Some(b), None) => Some(b),
            (None, l) => l,
        };
    }

    // keep the promoted children at the removed node's position
    let siblings = &mut tree.nodes[parent].children;
    if let Some(slot) = siblings.iter().position(|&c| c == id) {
        siblings.splice(slot..slot + 1, promoted);
    }

    tree.nodes[id].parent = None;
    tree.nodes[id].deleted = true;
    Ok(())
}

/// Drop soft-deleted nodes and renumber the arena densely.
/// Invalidates every NodeId held outside.
pub fn compact(tree: &mut Tree) {
    let mut remap: Vec<Option<NodeId>> = vec![None; tree.nodes.len()];
    let mut kept: Vec<super::Node> = Vec::with_capacity(tree.nodes.len());

    for node in &tree.nodes {
        if !node.deleted {
            remap[node.id] = Some(kept.len());
            kept.push(node.clone());
        }
    }

    for node in kept.iter_mut() {
        if let Some(new_id) = remap[node.id] {
            node.id = new_id;
        }
        node.parent = node.parent.and_then(|p| remap[p]);
        node.children = node.children.iter().filter_map(|&c| remap[c]).collect();
    }

    tree.root = tree.root.and_then(|r| remap[r]);
    tree.nodes = kept;
}

/// Split the edge above `id` with a new node at its midpoint.
/// Returns the new node's id.
pub fn insert_parent(tree: &mut Tree, id: NodeId) -> Result<NodeId, TreeError> {
    let node = tree
        .node(id)
        .ok_or_else(|| TreeError::Logic(format!("no such node: {}", id)))?;
    let parent = node.parent.ok_or_else(|| {
        TreeError::Logic(format!("node {} has no parent edge to split", id))
    })?;
    let half = node.length.map(|l| 0.5 * l);

    let mid = tree.add_node();
    if let Some(slot) = tree.nodes[parent].children.iter().position(|&c| c == id) {
        tree.nodes[parent].children[slot] = mid;
    }
    tree.nodes[mid].parent = Some(parent);
    tree.nodes[mid].length = half;
    tree.nodes[mid].children.push(id);
    tree.nodes[id].parent = Some(mid);
    tree.nodes[id].length = half;

    Ok(mid)
}

/// Splice out every non-root node with a single child. Rerooting and
/// placeholder removal during grafting leave these behind.
pub fn suppress_unary(tree: &mut Tree) {
    loop {
        let unary = walk::find_nodes(tree, |n| n.parent.is_some() && n.children.len() == 1);
        if unary.is_empty() {
            break;
        }
        for id in unary {
            let still_unary = tree
                .node(id)
                .is_some_and(|n| n.parent.is_some() && n.children.len() == 1);
            if still_unary {
                let _ = splice_out(tree, id);
            }
        }
    }
}

/// Turn a bifurcating root into a multifurcation by dissolving the
/// heavier of its two children, so most of the topology keeps its edges.
pub fn deroot(tree: &mut Tree) -> Result<(), TreeError> {
    let root = tree
        .root
        .ok_or_else(|| TreeError::Logic("tree has no root".to_string()))?;
    let kids = tree.nodes[root].children.clone();
    if kids.len() != 2 {
        return Err(TreeError::Logic("root is not bifurcating".to_string()));
    }

    let (a, b) = (kids[0], kids[1]);
    let pick = if walk::preorder(tree, a).len() >= walk::preorder(tree, b).len() {
        a
    } else {
        b
    };
    splice_out(tree, pick)
}

/// Reroot at `target` by reversing the edges on the root-to-target path.
///
/// With `shift_support`, internal node labels are treated as edge support
/// values: when an edge flips direction its label moves to the node now
/// below it, so every value stays with its bipartition.
pub fn reroot_at(tree: &mut Tree, target: NodeId, shift_support: bool) -> Result<(), TreeError> {
    if tree.node(target).is_none() {
        return Err(TreeError::Logic(format!("no such node: {}", target)));
    }
    let old_root = tree
        .root
        .ok_or_else(|| TreeError::Logic("tree has no root".to_string()))?;
    if old_root == target {
        return Ok(());
    }

    let path = walk::ancestry(tree, target)?;
    let last = path.len() - 1;

    if shift_support {
        let target_is_leaf = tree.nodes[target].children.is_empty();
        let labels: Vec<Option<String>> =
            path.iter().map(|&n| tree.nodes[n].name.clone()).collect();

        for (i, &n) in path.iter().enumerate() {
            if i == last && target_is_leaf {
                // a tip label is a taxon, never a support value
                continue;
            }
            tree.nodes[n].name = if i == last {
                labels[0].clone()
            } else if i + 1 == last && target_is_leaf {
                None
            } else {
                labels[i + 1].clone()
            };
        }
    }

    // path[i].length is the edge (path[i-1] -> path[i]); flip them all
    let edges: Vec<Option<f64>> = path.iter().map(|&n| tree.nodes[n].length).collect();
    for i in (1..=last).rev() {
        let (upper, lower) = (path[i - 1], path[i]);
        tree.nodes[upper].children.retain(|&c| c != lower);
        tree.nodes[lower].children.push(upper);
        tree.nodes[upper].parent = Some(lower);
        tree.nodes[upper].length = edges[i];
    }

    tree.nodes[target].parent = None;
    tree.nodes[target].length = None;
    tree.root = Some(target);
    Ok(())
}

/// Deep-copy the subtree of `source` rooted at `source_root` into this
/// tree, attached under `parent`. Returns the copy's root id.
pub fn adopt_subtree(
    tree: &mut Tree,
    parent: NodeId,
    source: &Tree,
    source_root: NodeId,
) -> Result<NodeId, TreeError> {
    if tree.node(parent).is_none() {
        return Err(TreeError::Logic(format!("no such parent node: {}", parent)));
    }
    if source.node(source_root).is_none() {
        return Err(TreeError::Logic(format!(
            "no such source node: {}",
            source_root
        )));
    }

    // (node in source, already-copied parent in the destination)
    let mut pending = vec![(source_root, parent)];
    let mut copied_root = None;

    while let Some((src, dst_parent)) = pending.pop() {
        let original = source
            .node(src)
            .ok_or_else(|| TreeError::Logic(format!("source node {} vanished", src)))?;

        let copy = tree.add_node();
        {
            let node = &mut tree.nodes[copy];
            node.name = original.name.clone();
            node.length = original.length;
            node.annots = original.annots.clone();
        }
        link(tree, dst_parent, copy)?;
        copied_root.get_or_insert(copy);

        for &child in original.children.iter().rev() {
            pending.push((child, copy));
        }
    }

    copied_root.ok_or_else(|| TreeError::Logic("empty source subtree".to_string()))
}
