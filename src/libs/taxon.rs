use crate::libs::phylo::Tree;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::io::BufRead;

/// Ranks in decreasing inclusiveness. The taxa table carries one id column
/// per rank, in this order after the name column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

pub const RANKS: [Rank; 7] = [
    Rank::Kingdom,
    Rank::Phylum,
    Rank::Class,
    Rank::Order,
    Rank::Family,
    Rank::Genus,
    Rank::Species,
];

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Kingdom => "kingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
        }
    }

    pub fn from_str(s: &str) -> Option<Rank> {
        match s.to_ascii_lowercase().as_str() {
            "kingdom" => Some(Rank::Kingdom),
            "phylum" => Some(Rank::Phylum),
            "class" => Some(Rank::Class),
            "order" => Some(Rank::Order),
            "family" => Some(Rank::Family),
            "genus" => Some(Rank::Genus),
            "species" => Some(Rank::Species),
            _ => None,
        }
    }
}

/// One row of the taxa table: a resolved name plus its id at every rank.
/// Ranks the resolution could not fill are absent.
#[derive(Debug, Clone, Default)]
pub struct TaxaRow {
    pub name: String,
    pub ids: HashMap<Rank, String>,
}

impl TaxaRow {
    pub fn id(&self, rank: Rank) -> Option<&str> {
        self.ids.get(&rank).map(|s| s.as_str())
    }

    pub fn species(&self) -> Option<&str> {
        self.id(Rank::Species)
    }

    pub fn genus(&self) -> Option<&str> {
        self.id(Rank::Genus)
    }
}

/// The taxa table: the pipeline's central bookkeeping artifact, written by
/// `taxize` and consumed read-only by every later stage.
#[derive(Debug, Clone, Default)]
pub struct TaxaTable {
    pub rows: Vec<TaxaRow>,
}

impl TaxaTable {
    /// Load a TSV taxa table: `#name  species  genus  family  order  class
    /// phylum  kingdom`. Empty cells mean the rank was not resolved.
    pub fn from_file(infile: &str) -> anyhow::Result<TaxaTable> {
        let reader = intspan::reader(infile);
        let mut rows = Vec::new();

        for line in reader.lines().map_while(Result::ok) {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                continue;
            }

            let mut row = TaxaRow {
                name: fields[0].to_string(),
                ids: HashMap::new(),
            };
            // Columns run species .. kingdom, i.e. RANKS reversed
            for (i, rank) in RANKS.iter().rev().enumerate() {
                if let Some(&cell) = fields.get(i + 1) {
                    if !cell.is_empty() {
                        row.ids.insert(*rank, cell.to_string());
                    }
                }
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(anyhow::anyhow!("No taxa rows found in {}", infile));
        }

        Ok(TaxaTable { rows })
    }

    pub fn header() -> &'static str {
        "#name\tspecies\tgenus\tfamily\torder\tclass\tphylum\tkingdom"
    }

    pub fn write_row(row: &TaxaRow) -> String {
        let mut fields = vec![row.name.clone()];
        for rank in RANKS.iter().rev() {
            fields.push(row.id(*rank).unwrap_or("").to_string());
        }
        fields.join("\t")
    }

    /// Species id -> genus id, for every row that has both.
    pub fn genus_of(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .filter_map(|r| match (r.species(), r.genus()) {
                (Some(s), Some(g)) => Some((s.to_string(), g.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Species id -> display name.
    pub fn display_names(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .filter_map(|r| r.species().map(|id| (id.to_string(), r.name.clone())))
            .collect()
    }

    pub fn species_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.species().map(|s| s.to_string()))
            .collect()
    }
}

/// A node of the reference taxonomy snapshot (offline stand-in for the
/// taxonomy query service).
#[derive(Debug, Clone)]
pub struct TaxonNode {
    pub id: String,
    pub parent: Option<String>,
    pub rank: Option<Rank>,
    pub name: String,
}

/// Read-only taxonomy snapshot, id-keyed, built once per run.
#[derive(Debug, Default)]
pub struct Taxonomy {
    pub nodes: IndexMap<String, TaxonNode>,
    name_index: HashMap<String, Vec<String>>,
}

impl Taxonomy {
    /// Load a reference dump: TSV `id  parent_id  rank  name`.
    pub fn from_dump(infile: &str) -> anyhow::Result<Taxonomy> {
        let reader = intspan::reader(infile);
        let mut taxonomy = Taxonomy::default();

        for line in reader.lines().map_while(Result::ok) {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                continue;
            }

            let node = TaxonNode {
                id: fields[0].to_string(),
                parent: if fields[1].is_empty() || fields[1] == fields[0] {
                    None
                } else {
                    Some(fields[1].to_string())
                },
                rank: Rank::from_str(fields[2]),
                name: fields[3].to_string(),
            };

            taxonomy
                .name_index
                .entry(node.name.to_ascii_lowercase())
                .or_default()
                .push(node.id.clone());
            taxonomy.nodes.insert(node.id.clone(), node);
        }

        if taxonomy.nodes.is_empty() {
            return Err(anyhow::anyhow!("No taxonomy nodes found in {}", infile));
        }

        Ok(taxonomy)
    }

    pub fn get(&self, id: &str) -> Option<&TaxonNode> {
        self.nodes.get(id)
    }

    /// Resolve a name to a taxon id. Exact case-insensitive match first,
    /// then a binomial fallback that strips subspecific epithets.
    pub fn resolve(&self, name: &str) -> Option<&TaxonNode> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(ids) = self.name_index.get(&key) {
            return self.nodes.get(&ids[0]);
        }

        // "Genus species subsp. x" -> "Genus species"
        let words: Vec<&str> = key.split_whitespace().collect();
        if words.len() > 2 {
            let binomial = words[..2].join(" ");
            if let Some(ids) = self.name_index.get(&binomial) {
                return self.nodes.get(&ids[0]);
            }
        }

        None
    }

    /// Walk from a node to the root, returning (rank, id) for every ranked
    /// ancestor including the node itself. Stops on a parent cycle.
    pub fn lineage(&self, id: &str) -> Vec<(Rank, &TaxonNode)> {
        let mut result = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = self.get(id);

        while let Some(node) = current {
            if !seen.insert(node.id.clone()) {
                break;
            }
            if let Some(rank) = node.rank {
                result.push((rank, node));
            }
            current = node.parent.as_deref().and_then(|p| self.get(p));
        }

        result
    }

    /// Build a taxa-table row for a resolved node.
    pub fn to_row(&self, name: &str, node: &TaxonNode) -> TaxaRow {
        let mut row = TaxaRow {
            name: name.to_string(),
            ids: HashMap::new(),
        };
        for (rank, anc) in self.lineage(&node.id) {
            row.ids.entry(rank).or_insert_with(|| anc.id.clone());
        }
        row
    }
}

/// Build the classification tree from the taxa table: rank-chained from
/// kingdom down to species. Ranks missing from a row are skipped, which
/// collapses the violation into a polytomy instead of erroring. Internal
/// nodes carry the rank id as the label; species leaves carry the display
/// name with the id kept as an NHX annotation.
pub fn classification_tree(table: &TaxaTable) -> Tree {
    let mut tree = Tree::new();
    let root = tree.add_node();
    tree.set_root(root);
    tree.node_mut(root).unwrap().set_name("root");

    // (rank, id) -> NodeId
    let mut node_of: HashMap<(Rank, String), usize> = HashMap::new();

    for row in &table.rows {
        let mut parent = root;
        for rank in RANKS {
            let id = match row.id(rank) {
                Some(id) => id.to_string(),
                None => continue,
            };

            let key = (rank, id.clone());
            let node_id = match node_of.get(&key) {
                Some(&n) => n,
                None => {
                    let n = tree.add_node();
                    // link cannot fail: n was just created
                    tree.link(parent, n).unwrap();
                    if let Some(node) = tree.node_mut(n) {
                        if rank == Rank::Species {
                            node.set_name(row.name.clone());
                            node.annotate("id", id.clone());
                        } else {
                            node.set_name(id.clone());
                        }
                    }
                    node_of.insert(key, n);
                    n
                }
            };
            parent = node_id;
        }
    }

    // Chains of single-child ranks carry no grouping signal
    tree.suppress_unary();

    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_table() -> TaxaTable {
        let mut rows = Vec::new();
        for (name, sp, genus, family) in [
            ("Homo sapiens", "9606", "9605", "9604"),
            ("Pan troglodytes", "9598", "9596", "9604"),
            ("Gorilla gorilla", "9593", "9592", "9604"),
        ] {
            let mut row = TaxaRow {
                name: name.to_string(),
                ids: HashMap::new(),
            };
            row.ids.insert(Rank::Species, sp.to_string());
            row.ids.insert(Rank::Genus, genus.to_string());
            row.ids.insert(Rank::Family, family.to_string());
            rows.push(row);
        }
        TaxaTable { rows }
    }

    #[test]
    fn taxa_table_round_trip() {
        let table = sample_table();

        let mut content = String::new();
        content.push_str(TaxaTable::header());
        content.push('\n');
        for row in &table.rows {
            content.push_str(&TaxaTable::write_row(row));
            content.push('\n');
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let loaded = TaxaTable::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.rows.len(), 3);
        assert_eq!(loaded.rows[0].species(), Some("9606"));
        assert_eq!(loaded.rows[0].genus(), Some("9605"));
        assert_eq!(loaded.rows[0].id(Rank::Family), Some("9604"));
        assert_eq!(loaded.rows[0].id(Rank::Kingdom), None);
    }

    #[test]
    fn genus_lookup() {
        let table = sample_table();
        let genus_of = table.genus_of();
        assert_eq!(genus_of.get("9606").map(|s| s.as_str()), Some("9605"));
        assert_eq!(genus_of.get("9593").map(|s| s.as_str()), Some("9592"));
    }

    #[test]
    fn classification_builds_polytomy() {
        let table = sample_table();
        let tree = classification_tree(&table);

        // Three species leaves under the shared family node
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 3);

        let homo = tree.by_name("Homo sapiens").unwrap();
        assert_eq!(tree.node(homo).unwrap().annot("id"), Some("9606"));
    }

    #[test]
    fn dump_resolution() {
        let content = "\
#id\tparent\trank\tname
9604\t\tfamily\tHominidae
9605\t9604\tgenus\tHomo
9606\t9605\tspecies\tHomo sapiens
";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let taxonomy = Taxonomy::from_dump(file.path().to_str().unwrap()).unwrap();

        let hit = taxonomy.resolve("homo SAPIENS").unwrap();
        assert_eq!(hit.id, "9606");

        // Subspecific epithet falls back to the binomial
        let hit = taxonomy.resolve("Homo sapiens neanderthalensis").unwrap();
        assert_eq!(hit.id, "9606");

        assert!(taxonomy.resolve("Pan troglodytes").is_none());

        let row = taxonomy.to_row("Homo sapiens", hit);
        assert_eq!(row.species(), Some("9606"));
        assert_eq!(row.genus(), Some("9605"));
        assert_eq!(row.id(Rank::Family), Some("9604"));
    }
}
