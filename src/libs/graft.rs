use crate::libs::decompose::Clade;
use crate::libs::phylo::{chrono, walk, NodeId, Tree};
use std::collections::{HashMap, HashSet};

/// Merge independently inferred clade trees onto the calibrated backbone.
///
/// Each clade's attachment point is located by the exemplar-leaf key
/// recorded at decomposition time; the backbone topology is authoritative
/// and monophyly is not re-derived. The clade tree is rescaled so its root
/// height equals the attachment node's age, the placeholder exemplar
/// leaves are removed, and the rescaled subtree is merged in their place.
/// A clade whose key cannot be found is skipped with a warning.
pub fn graft_clades(
    backbone: &Tree,
    clades: &[(Clade, Tree)],
    verbose: bool,
) -> anyhow::Result<Tree> {
    let mut tree = backbone.clone();

    for (clade, clade_tree) in clades {
        // Leaves only: internal support labels may collide with ids
        let leaf_id: HashMap<String, NodeId> = tree
            .leaves()
            .into_iter()
            .filter_map(|l| tree.node(l).and_then(|n| n.name.clone()).map(|name| (name, l)))
            .collect();
        let placeholders: Vec<NodeId> = clade
            .attachment
            .iter()
            .filter_map(|name| leaf_id.get(name).copied())
            .collect();

        if placeholders.is_empty() {
            eprintln!(
                "Warning: no attachment leaves found on the backbone for {}, skipped",
                clade.id
            );
            continue;
        }

        // Attachment node: the MRCA for a multi-leaf key, the parent
        // branch for a single placeholder
        let attach = if placeholders.len() >= 2 {
            tree.mrca(&placeholders)?
        } else {
            match tree.node(placeholders[0]).and_then(|n| n.parent) {
                Some(p) => p,
                None => {
                    eprintln!(
                        "Warning: attachment leaf for {} is the backbone root, skipped",
                        clade.id
                    );
                    continue;
                }
            }
        };

        let age = chrono::age(&tree, attach);

        // Rescale a working copy of the clade tree to the attachment age
        let mut scaled = clade_tree.clone();
        if age > 0.0 {
            if let Err(e) = scaled.scale_to_depth(age) {
                eprintln!(
                    "Warning: {} not rescaled ({}), grafted with original lengths",
                    clade.id, e
                );
            }
        }

        if verbose {
            eprintln!(
                "{}: {} placeholder(s), attachment age {:.4}",
                clade.id,
                placeholders.len(),
                age
            );
        }

        // Leaves under the attachment that are NOT placeholders must
        // survive (coarse attachments share the node with other clades)
        let placeholder_set: HashSet<NodeId> = placeholders.iter().copied().collect();
        let survivors: HashSet<NodeId> = walk::leaves_under(&tree, attach)
            .into_iter()
            .filter(|l| !placeholder_set.contains(l))
            .collect();

        for &leaf in &placeholders {
            tree.prune(leaf);
        }

        // Clear out internals left childless by placeholder removal
        loop {
            let residue = tree.preorder(attach).into_iter().find(|&n| {
                n != attach
                    && !survivors.contains(&n)
                    && tree.node(n).map(|x| x.children.is_empty()).unwrap_or(false)
            });
            match residue {
                Some(n) => tree.prune(n),
                None => break,
            }
        }

        // Merge the scaled clade under the attachment node. The clade
        // root itself dissolves: its children become the attachment
        // node's children, so the crown sits exactly at the node age.
        let clade_root = scaled
            .root()
            .ok_or_else(|| anyhow::anyhow!("Clade tree for {} is empty", clade.id))?;
        let clade_root_children = scaled.node(clade_root).unwrap().children.clone();

        if clade_root_children.is_empty() {
            // Single-tip clade tree
            tree.adopt_subtree(attach, &scaled, clade_root)?;
        } else {
            for child in clade_root_children {
                tree.adopt_subtree(attach, &scaled, child)?;
            }
        }
    }

    tree.suppress_unary();
    tree.compact();

    Ok(tree)
}

/// Rewrite tip labels from taxon ids to display names, retaining the id
/// as an NHX annotation. Ids without a display name keep the id label.
pub fn relabel_tips(tree: &mut Tree, names: &HashMap<String, String>) {
    for leaf in tree.leaves() {
        let id = match tree.node(leaf).and_then(|n| n.name.clone()) {
            Some(name) => name,
            None => continue,
        };
        if let Some(display) = names.get(&id) {
            if let Some(node) = tree.node_mut(leaf) {
                node.set_name(display.clone());
                node.annotate("id", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn clade(id: &str, attachment: &[&str], taxa: &[&str]) -> Clade {
        Clade {
            id: id.to_string(),
            attachment: attachment.iter().map(|s| s.to_string()).collect(),
            genera: Vec::new(),
            taxa: taxa.iter().map(|s| s.to_string()).collect(),
            clusters: Vec::new(),
        }
    }

    // Calibrated backbone: ((101:10,201:10):5,301:15) with exemplars as tips
    fn backbone() -> Tree {
        Tree::from_newick("((101:10,201:10):5,301:15);").unwrap()
    }

    #[test]
    fn graft_replaces_placeholders() {
        let clade_a = clade("clade_001", &["101", "201"], &["101", "102", "201", "202"]);
        // Clade tree over its taxa, heights unrelated to the backbone
        let tree_a = Tree::from_newick("((101:1,102:1):2,(201:2,202:2):1);").unwrap();

        let clade_b = clade("clade_002", &["301"], &["301", "302"]);
        let tree_b = Tree::from_newick("(301:4,302:4);").unwrap();

        let result = graft_clades(
            &backbone(),
            &[(clade_a, tree_a), (clade_b, tree_b)],
            false,
        )
        .unwrap();

        // Every taxon exactly once
        let mut leaves: Vec<String> = result
            .leaf_names()
            .into_iter()
            .map(|n| n.unwrap())
            .collect();
        leaves.sort();
        assert_eq!(leaves, vec!["101", "102", "201", "202", "301", "302"]);
    }

    #[test]
    fn graft_rescales_to_attachment_age() {
        let clade_a = clade("clade_001", &["101", "201"], &["101", "102", "201", "202"]);
        let tree_a = Tree::from_newick("((101:1,102:1):2,(201:2,202:2):1);").unwrap();

        let result = graft_clades(&backbone(), &[(clade_a, tree_a)], false).unwrap();

        // Attachment node age was 10; the grafted crown must sit there
        let a = result.by_name("101").unwrap();
        let b = result.by_name("202").unwrap();
        let mrca = result.mrca(&[a, b]).unwrap();
        assert_relative_eq!(result.age(mrca), 10.0, epsilon = 1e-9);

        // Age monotonicity inside the grafted subtree
        for id in result.preorder(mrca) {
            if let Some(parent) = result.node(id).and_then(|n| n.parent) {
                assert!(result.age(parent) >= result.age(id) - 1e-9);
            }
        }

        // The backbone above the graft is untouched
        let c = result.by_name("301").unwrap();
        let root = result.mrca(&[a, c]).unwrap();
        assert_relative_eq!(result.age(root), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn single_placeholder_attaches_at_parent_branch() {
        let clade_b = clade("clade_002", &["301"], &["301", "302"]);
        let tree_b = Tree::from_newick("(301:4,302:4);").unwrap();

        let result = graft_clades(&backbone(), &[(clade_b, tree_b)], false).unwrap();

        let x = result.by_name("301").unwrap();
        let y = result.by_name("302").unwrap();
        let mrca = result.mrca(&[x, y]).unwrap();

        // The parent of the placeholder sat at age 15
        assert_relative_eq!(result.age(mrca), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_attachment_is_skipped() {
        let clade_x = clade("clade_009", &["999"], &["999", "998"]);
        let tree_x = Tree::from_newick("(999:1,998:1);").unwrap();

        let result = graft_clades(&backbone(), &[(clade_x, tree_x)], false).unwrap();

        // Backbone unchanged
        let mut leaves: Vec<String> = result
            .leaf_names()
            .into_iter()
            .map(|n| n.unwrap())
            .collect();
        leaves.sort();
        assert_eq!(leaves, vec!["101", "201", "301"]);
    }

    #[test]
    fn relabel_keeps_id_annotation() {
        let mut tree = Tree::from_newick("(101:1,201:1);").unwrap();
        let names: HashMap<String, String> = [
            ("101".to_string(), "Aa one".to_string()),
            ("201".to_string(), "Bb one".to_string()),
        ]
        .into_iter()
        .collect();

        relabel_tips(&mut tree, &names);

        let leaf = tree.by_name("Aa one").unwrap();
        assert_eq!(tree.node(leaf).unwrap().annot("id"), Some("101"));
    }
}
