//! Rooted phylogenetic trees on an index arena, with Newick I/O.
//!
//! Nodes live in a flat `Vec`; a [`NodeId`] is an index into it. Structural
//! edits soft-delete nodes and [`Tree::compact`] reclaims them, so ids held
//! by callers stay valid until compaction. Chronogram helpers (node ages,
//! proportional rescaling) live in [`chrono`], clade bitsets in [`clades`].

pub mod chrono;
pub mod clades;
pub mod edit;
pub mod newick;
pub mod walk;

use std::collections::BTreeMap;
use std::fmt;

/// Index of a node in the tree arena.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Node {
    /// Position in the arena.
    pub id: NodeId,

    /// Parent node, `None` on the root.
    pub parent: Option<NodeId>,

    pub children: Vec<NodeId>,

    /// Tip label (taxon id or display name); on internal nodes a support
    /// value or clade name.
    pub name: Option<String>,

    /// Length of the edge to the parent. Absolute time on a chronogram.
    pub length: Option<f64>,

    /// `[&&NHX:key=value]` annotations. BTreeMap keeps the serialization
    /// order deterministic.
    pub annots: Option<BTreeMap<String, String>>,

    /// Soft-deleted: invisible to accessors, reclaimed by `compact`.
    pub deleted: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            name: None,
            length: None,
            annots: None,
            deleted: false,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annots
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }

    pub fn annot(&self, key: &str) -> Option<&str> {
        self.annots.as_ref()?.get(key).map(String::as_str)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Newick syntax error, with a 1-based position.
    Parse {
        line: usize,
        column: usize,
        message: String,
        near: String,
    },
    /// Invalid operation on the tree.
    Logic(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::Parse {
                line,
                column,
                message,
                near,
            } => write!(
                f,
                "newick parse error at {}:{}: {} (near \"{}\")",
                line, column, message, near
            ),
            TreeError::Logic(msg) => write!(f, "tree error: {}", msg),
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Debug, Default, Clone)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fresh unlinked node, returning its id.
    pub fn add_node(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id));
        id
    }

    /// Live node count.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        if self.node(id).is_some() {
            self.root = Some(id);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).filter(|n| !n.deleted)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id).filter(|n| !n.deleted)
    }

    // ----- structural edits -----

    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        edit::link(self, parent, child)
    }

    pub fn prune(&mut self, id: NodeId) {
        edit::prune(self, id)
    }

    pub fn splice_out(&mut self, id: NodeId) -> Result<(), TreeError> {
        edit::splice_out(self, id)
    }

    pub fn suppress_unary(&mut self) {
        edit::suppress_unary(self)
    }

    pub fn compact(&mut self) {
        edit::compact(self)
    }

    pub fn insert_parent(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        edit::insert_parent(self, id)
    }

    pub fn deroot(&mut self) -> Result<(), TreeError> {
        edit::deroot(self)
    }

    pub fn reroot_at(&mut self, target: NodeId, shift_support: bool) -> Result<(), TreeError> {
        edit::reroot_at(self, target, shift_support)
    }

    pub fn adopt_subtree(
        &mut self,
        parent: NodeId,
        source: &Tree,
        source_root: NodeId,
    ) -> Result<NodeId, TreeError> {
        edit::adopt_subtree(self, parent, source, source_root)
    }

    // ----- traversal and queries -----

    pub fn preorder(&self, top: NodeId) -> Vec<NodeId> {
        walk::preorder(self, top)
    }

    pub fn postorder(&self, top: NodeId) -> Vec<NodeId> {
        walk::postorder(self, top)
    }

    /// Path from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        walk::ancestry(self, id)
    }

    pub fn mrca(&self, ids: &[NodeId]) -> Result<NodeId, TreeError> {
        walk::mrca(self, ids)
    }

    pub fn is_monophyletic(&self, ids: &[NodeId]) -> bool {
        walk::is_monophyletic(self, ids)
    }

    pub fn by_name(&self, name: &str) -> Option<NodeId> {
        walk::by_name(self, name)
    }

    pub fn find_nodes<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        walk::find_nodes(self, predicate)
    }

    pub fn name_index(&self) -> BTreeMap<String, NodeId> {
        walk::name_index(self)
    }

    pub fn longest_edge(&self) -> Option<NodeId> {
        walk::longest_edge(self)
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        match self.root {
            Some(root) => walk::leaves_under(self, root),
            None => Vec::new(),
        }
    }

    pub fn leaf_names(&self) -> Vec<Option<String>> {
        self.leaves()
            .into_iter()
            .map(|id| self.node(id).and_then(|n| n.name.clone()))
            .collect()
    }

    // ----- chronogram -----

    pub fn age(&self, id: NodeId) -> f64 {
        chrono::age(self, id)
    }

    pub fn scale_to_depth(&mut self, depth: f64) -> Result<f64, TreeError> {
        chrono::scale_to_depth(self, depth)
    }

    // ----- Newick I/O -----

    pub fn from_file(infile: &str) -> anyhow::Result<Vec<Tree>> {
        newick::read_file(infile)
    }

    pub fn from_newick(input: &str) -> Result<Tree, TreeError> {
        newick::parse(input)
    }

    pub fn from_newick_multi(input: &str) -> Result<Vec<Tree>, TreeError> {
        newick::parse_forest(input)
    }

    pub fn to_newick(&self) -> String {
        newick::write(self)
    }
}
