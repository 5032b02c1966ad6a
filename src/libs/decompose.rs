use crate::libs::cluster::AlignmentCluster;
use crate::libs::conf::{BackboneFilter, CladeFilter};
use crate::libs::phylo::{walk, NodeId, Tree};
use crate::libs::taxon::{Rank, TaxaTable, RANKS};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::BufRead;

/// Result of Pass A: exemplar taxa and the clusters that back them.
#[derive(Debug, Clone, Default)]
pub struct BackboneSelection {
    /// Taxon ids, sorted
    pub exemplars: Vec<String>,
    /// Surviving clusters restricted to exemplar taxa, sorted by id
    pub clusters: Vec<AlignmentCluster>,
}

/// Pass A: pick up to `exemplar_cap` representatives per genus from the
/// clusters that carry backbone-grade signal.
///
/// A cluster qualifies when its mean pairwise distance is at most
/// `max_distance` (saturated clusters mislead deep nodes). A taxon is
/// exemplar-eligible when it participates in at least `min_coverage`
/// qualifying clusters; within a genus, taxa co-occurring in the most
/// clusters win, ties broken by taxon id. Each exemplar contributes to at
/// most `max_coverage` clusters in the final matrix.
pub fn select_exemplars(
    table: &TaxaTable,
    clusters: &[AlignmentCluster],
    filter: &BackboneFilter,
    verbose: bool,
) -> BackboneSelection {
    // 1. Qualifying clusters
    let mut qualifying: Vec<&AlignmentCluster> = Vec::new();
    for cluster in clusters {
        if cluster.seq_count() < 2 {
            if verbose {
                eprintln!("Warning: cluster {} below minimum size, skipped", cluster.id);
            }
            continue;
        }
        let d = cluster.mean_distance();
        if d > filter.max_distance {
            if verbose {
                eprintln!(
                    "Warning: cluster {} too saturated for the backbone (mean distance {:.4}), skipped",
                    cluster.id, d
                );
            }
            continue;
        }
        qualifying.push(cluster);
    }

    // 2. Per-taxon participation across qualifying clusters
    let known_species: HashSet<String> = table.species_ids().into_iter().collect();
    let mut coverage: BTreeMap<String, usize> = BTreeMap::new();
    for cluster in &qualifying {
        for taxon in cluster.taxa() {
            if known_species.contains(taxon) {
                *coverage.entry(taxon.to_string()).or_insert(0) += 1;
            }
        }
    }

    // 3. Exemplars per genus: coverage desc, then taxon id asc
    let genus_of = table.genus_of();
    let mut by_genus: BTreeMap<String, Vec<(String, usize)>> = BTreeMap::new();
    for (taxon, &count) in &coverage {
        if count < filter.min_coverage {
            continue;
        }
        let genus = genus_of
            .get(taxon)
            .cloned()
            .unwrap_or_else(|| taxon.clone());
        by_genus
            .entry(genus)
            .or_default()
            .push((taxon.clone(), count));
    }

    let mut exemplars: Vec<String> = Vec::new();
    for (_, mut candidates) in by_genus {
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (taxon, _) in candidates.into_iter().take(filter.exemplar_cap) {
            exemplars.push(taxon);
        }
    }
    exemplars.sort();

    // 4. Restrict clusters to exemplars, then cap markers per taxon
    let exemplar_set: BTreeSet<&str> = exemplars.iter().map(|s| s.as_str()).collect();
    let mut restricted: Vec<AlignmentCluster> = qualifying
        .iter()
        .map(|c| c.restrict(&exemplar_set))
        .filter(|c| c.seq_count() >= 2)
        .collect();
    restricted.sort_by(|a, b| a.id.cmp(&b.id));

    cap_markers_per_taxon(&mut restricted, filter.max_coverage);
    restricted.retain(|c| c.seq_count() >= 2);

    BackboneSelection {
        exemplars,
        clusters: restricted,
    }
}

/// Keep each taxon in at most `cap` clusters, preferring the clusters with
/// the most exemplar rows (densest matrix blocks). Rows beyond the cap are
/// dropped from their clusters.
fn cap_markers_per_taxon(clusters: &mut [AlignmentCluster], cap: usize) {
    if cap == 0 {
        return;
    }

    // Cluster preference order: row count desc, id asc
    let mut order: Vec<usize> = (0..clusters.len()).collect();
    order.sort_by(|&a, &b| {
        clusters[b]
            .seq_count()
            .cmp(&clusters[a].seq_count())
            .then_with(|| clusters[a].id.cmp(&clusters[b].id))
    });

    let mut kept: HashMap<String, usize> = HashMap::new();
    let mut drop: Vec<(usize, String)> = Vec::new();

    for &ci in &order {
        for (taxon, _) in &clusters[ci].seqs {
            let count = kept.entry(taxon.clone()).or_insert(0);
            if *count < cap {
                *count += 1;
            } else {
                drop.push((ci, taxon.clone()));
            }
        }
    }

    for (ci, taxon) in drop {
        clusters[ci].seqs.retain(|(t, _)| t != &taxon);
    }
}

/// A monophyletic piece of the decomposition: the genera attached at one
/// backbone node, every taxon of those genera, and the clusters selected
/// for the clade's own inference run.
///
/// `attachment` (the clade's exemplar ids on the backbone, sorted) is the
/// stable key the grafter uses to find the attachment point again; the
/// backbone topology is authoritative by then, so monophyly is not
/// re-derived.
#[derive(Debug, Clone, Default)]
pub struct Clade {
    pub id: String,
    pub attachment: Vec<String>,
    pub genera: Vec<String>,
    /// All taxa of the member genera, exemplars included, sorted
    pub taxa: Vec<String>,
    pub clusters: Vec<AlignmentCluster>,
}

impl Clade {
    /// Member taxa only: the clade's share of the partition, i.e. its taxa
    /// minus the backbone exemplars.
    pub fn members(&self) -> Vec<&str> {
        let attachment: HashSet<&str> = self.attachment.iter().map(|s| s.as_str()).collect();
        self.taxa
            .iter()
            .map(|s| s.as_str())
            .filter(|t| !attachment.contains(t))
            .collect()
    }
}

/// Pass B: decompose the non-exemplar taxa into disjoint monophyletic
/// clades guided by the calibrated backbone topology.
///
/// Descends from the root and stops at the topmost nodes whose subtended
/// genus set is clean (no genus split across the node's boundary); genera
/// that never reach a clean node fall through to the nearest ancestor that
/// does subtend a clean genus group, coarsening rather than failing.
/// Genera without any backbone exemplar are attached alongside their
/// closest relative by shared higher rank.
pub fn decompose(
    backbone: &Tree,
    table: &TaxaTable,
    clusters: &[AlignmentCluster],
    exemplars: &[String],
    filter: &CladeFilter,
    verbose: bool,
) -> Vec<Clade> {
    let genus_of = table.genus_of();
    let genus_key = |species: &str| -> String {
        genus_of
            .get(species)
            .cloned()
            .unwrap_or_else(|| species.to_string())
    };

    // Backbone leaves by genus
    let mut genus_leaves: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
    let mut leaf_genus: HashMap<NodeId, String> = HashMap::new();
    for leaf in backbone.leaves() {
        let name = match backbone.node(leaf).and_then(|n| n.name.clone()) {
            Some(n) => n,
            None => continue,
        };
        let genus = genus_key(&name);
        genus_leaves.entry(genus.clone()).or_default().push(leaf);
        leaf_genus.insert(leaf, genus);
    }

    let root = match backbone.root() {
        Some(r) => r,
        None => return Vec::new(),
    };

    // A node is clean when every genus with a leaf below it has all of its
    // backbone leaves below it.
    let is_clean = |node: NodeId| -> bool {
        let under: HashSet<NodeId> = walk::leaves_under(backbone, node).into_iter().collect();
        let genera: BTreeSet<&String> = under.iter().filter_map(|l| leaf_genus.get(l)).collect();
        genera
            .iter()
            .all(|g| genus_leaves[*g].iter().all(|l| under.contains(l)))
    };

    // Top-down sweep: stop at the topmost clean nodes below the root
    let mut attach_genera: BTreeMap<NodeId, BTreeSet<String>> = BTreeMap::new();
    let mut assigned: BTreeSet<String> = BTreeSet::new();

    let mut stack: Vec<NodeId> = backbone
        .node(root)
        .map(|n| n.children.clone())
        .unwrap_or_default();
    while let Some(node) = stack.pop() {
        if is_clean(node) {
            let genera: BTreeSet<String> = walk::leaves_under(backbone, node)
                .into_iter()
                .filter_map(|l| leaf_genus.get(&l).cloned())
                .collect();
            if !genera.is_empty() {
                assigned.extend(genera.iter().cloned());
                attach_genera.entry(node).or_default().extend(genera);
            }
        } else if let Some(n) = backbone.node(node) {
            stack.extend(n.children.iter().copied());
        }
    }

    // Fallthrough: split genera climb to the nearest clean ancestor
    for (genus, leaves) in &genus_leaves {
        if assigned.contains(genus) {
            continue;
        }
        let mut attach = backbone.mrca(leaves).unwrap_or(root);
        while attach != root && !is_clean(attach) {
            attach = backbone.node(attach).and_then(|n| n.parent).unwrap_or(root);
        }
        if verbose {
            eprintln!(
                "Warning: genus {} is not monophyletic on the backbone, attached at a coarser node",
                genus
            );
        }
        assigned.insert(genus.clone());
        attach_genera.entry(attach).or_default().insert(genus.clone());
    }

    // Genera with no backbone presence ride along with the nearest
    // relative by shared higher rank
    let mut genus_rows: BTreeMap<String, Vec<&crate::libs::taxon::TaxaRow>> = BTreeMap::new();
    for row in &table.rows {
        if let Some(species) = row.species() {
            genus_rows.entry(genus_key(species)).or_default().push(row);
        }
    }

    let rank_id = |genus: &str, rank: Rank| -> Option<String> {
        genus_rows
            .get(genus)
            .and_then(|rows| rows.first())
            .and_then(|row| row.id(rank).map(|s| s.to_string()))
    };

    let mut extra_genera: BTreeMap<NodeId, BTreeSet<String>> = BTreeMap::new();
    for genus in genus_rows.keys() {
        if assigned.contains(genus) {
            continue;
        }

        // Family upward, most specific shared rank first
        let mut home = None;
        'ranks: for rank in RANKS.iter().rev().skip(2) {
            let Some(want) = rank_id(genus, *rank) else {
                continue;
            };
            for (node, genera) in &attach_genera {
                for candidate in genera {
                    if rank_id(candidate, *rank).as_deref() == Some(want.as_str()) {
                        home = Some(*node);
                        break 'ranks;
                    }
                }
            }
        }

        match home {
            Some(node) => {
                extra_genera.entry(node).or_default().insert(genus.clone());
            }
            None => {
                eprintln!(
                    "Warning: genus {} has no backbone exemplar and no placeable relative, skipped",
                    genus
                );
            }
        }
    }
    for (node, genera) in extra_genera {
        attach_genera.entry(node).or_default().extend(genera);
    }

    // Materialize clades
    let exemplar_set: HashSet<&str> = exemplars.iter().map(|s| s.as_str()).collect();
    let mut clades = Vec::new();

    for (node, genera) in &attach_genera {
        let mut taxa: BTreeSet<String> = BTreeSet::new();
        for genus in genera {
            if let Some(rows) = genus_rows.get(genus) {
                for row in rows {
                    if let Some(species) = row.species() {
                        taxa.insert(species.to_string());
                    }
                }
            }
        }

        let members: Vec<&String> = taxa
            .iter()
            .filter(|t| !exemplar_set.contains(t.as_str()))
            .collect();
        if members.is_empty() {
            // Everything already consumed as backbone exemplars
            continue;
        }

        let attachment: Vec<String> = walk::leaves_under(backbone, *node)
            .into_iter()
            .filter_map(|l| backbone.node(l).and_then(|n| n.name.clone()))
            .filter(|name| {
                exemplar_set.contains(name.as_str()) && genera.contains(&genus_key(name))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let taxa: Vec<String> = taxa.into_iter().collect();
        let selected = select_clade_clusters(clusters, &taxa, filter, verbose);

        clades.push(Clade {
            id: String::new(), // numbered below, after deterministic sort
            attachment,
            genera: genera.iter().cloned().collect(),
            taxa,
            clusters: selected,
        });
    }

    clades.sort_by(|a, b| a.taxa.cmp(&b.taxa));
    for (i, clade) in clades.iter_mut().enumerate() {
        clade.id = format!("clade_{:03}", i + 1);
    }

    clades
}

/// Cluster selection for one clade: distance and density thresholds, the
/// per-taxon marker floor, then the marker cap preferring denser clusters.
fn select_clade_clusters(
    clusters: &[AlignmentCluster],
    taxa: &[String],
    filter: &CladeFilter,
    verbose: bool,
) -> Vec<AlignmentCluster> {
    let taxon_set: BTreeSet<&str> = taxa.iter().map(|s| s.as_str()).collect();

    let mut kept: Vec<(AlignmentCluster, f64)> = Vec::new();
    for cluster in clusters {
        let restricted = cluster.restrict(&taxon_set);
        if restricted.seq_count() < 2 {
            continue;
        }
        let d = restricted.mean_distance();
        if d > filter.max_distance {
            if verbose {
                eprintln!(
                    "Warning: cluster {} too distant for clade use (mean distance {:.4}), skipped",
                    cluster.id, d
                );
            }
            continue;
        }
        let density = restricted.density(&taxon_set);
        if density < filter.min_density {
            continue;
        }
        kept.push((restricted, density));
    }

    // Marker floor: a cluster whose every row belongs to a marker-poor
    // taxon adds noise, not signal
    if filter.taxon_min_markers > 1 {
        let mut markers: HashMap<&str, usize> = HashMap::new();
        for (cluster, _) in &kept {
            for (taxon, _) in &cluster.seqs {
                *markers.entry(taxon.as_str()).or_insert(0) += 1;
            }
        }
        let poor: HashSet<String> = markers
            .iter()
            .filter(|(_, &n)| n < filter.taxon_min_markers)
            .map(|(t, _)| t.to_string())
            .collect();
        kept.retain(|(cluster, _)| {
            !cluster.seqs.iter().all(|(t, _)| poor.contains(t.as_str()))
        });
    }

    // Marker cap: densest first, id as the deterministic tie-break
    kept.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    kept.truncate(filter.max_markers);

    let mut result: Vec<AlignmentCluster> = kept.into_iter().map(|(c, _)| c).collect();
    result.sort_by(|a, b| a.id.cmp(&b.id));
    result
}

/// Write a clade manifest: the attachment key, the taxon roster, and the
/// cluster file names, one record per line.
pub fn write_manifest<W: std::io::Write>(
    clade: &Clade,
    names: &HashMap<String, String>,
    writer: &mut W,
) -> anyhow::Result<()> {
    writer.write_fmt(format_args!("#clade\t{}\n", clade.id))?;
    writer.write_fmt(format_args!(
        "attachment\t{}\n",
        clade.attachment.join(",")
    ))?;
    let attachment: HashSet<&str> = clade.attachment.iter().map(|s| s.as_str()).collect();
    for taxon in &clade.taxa {
        let role = if attachment.contains(taxon.as_str()) {
            "exemplar"
        } else {
            "member"
        };
        let name = names.get(taxon).map(|s| s.as_str()).unwrap_or("");
        writer.write_fmt(format_args!("taxon\t{}\t{}\t{}\n", taxon, role, name))?;
    }
    for cluster in &clade.clusters {
        writer.write_fmt(format_args!("cluster\t{}.fa\n", cluster.id))?;
    }
    Ok(())
}

/// Read back the parts of a manifest later stages need. Cluster sequences
/// stay in their FASTA files; this only restores the bookkeeping.
pub fn read_manifest(infile: &str) -> anyhow::Result<Clade> {
    let reader = intspan::reader(infile);
    let mut clade = Clade::default();
    let mut names_seen = false;

    for line in reader.lines().map_while(Result::ok) {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.first() {
            Some(&"#clade") => {
                if let Some(&id) = fields.get(1) {
                    clade.id = id.to_string();
                }
            }
            Some(&"attachment") => {
                if let Some(&ids) = fields.get(1) {
                    clade.attachment = ids
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect();
                }
            }
            Some(&"taxon") => {
                if let Some(&id) = fields.get(1) {
                    clade.taxa.push(id.to_string());
                    names_seen = true;
                }
            }
            Some(&"cluster") => {
                if let Some(&file) = fields.get(1) {
                    clade.clusters.push(AlignmentCluster {
                        id: file.trim_end_matches(".fa").to_string(),
                        seqs: Vec::new(),
                    });
                }
            }
            _ => {}
        }
    }

    if !names_seen {
        return Err(anyhow::anyhow!("Manifest {} lists no taxa", infile));
    }

    Ok(clade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::taxon::TaxaRow;

    fn table_6sp_3gen() -> TaxaTable {
        // Three genera, two species each
        let mut rows = Vec::new();
        for (name, sp, genus) in [
            ("Aa one", "101", "g1"),
            ("Aa two", "102", "g1"),
            ("Bb one", "201", "g2"),
            ("Bb two", "202", "g2"),
            ("Cc one", "301", "g3"),
            ("Cc two", "302", "g3"),
        ] {
            let mut row = TaxaRow {
                name: name.to_string(),
                ids: HashMap::new(),
            };
            row.ids.insert(Rank::Species, sp.to_string());
            row.ids.insert(Rank::Genus, genus.to_string());
            row.ids.insert(Rank::Family, "f1".to_string());
            rows.push(row);
        }
        TaxaTable { rows }
    }

    fn cluster(id: &str, rows: &[(&str, &str)]) -> AlignmentCluster {
        AlignmentCluster {
            id: id.to_string(),
            seqs: rows
                .iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect(),
        }
    }

    fn backbone_filter() -> BackboneFilter {
        BackboneFilter {
            max_distance: 0.5,
            min_coverage: 2,
            max_coverage: 10,
            exemplar_cap: 2,
        }
    }

    #[test]
    fn exemplar_selection_scenario() {
        // 101, 102, 201, 301 appear in >= 2 qualifying clusters;
        // 202 and 302 appear in only one
        let clusters = vec![
            cluster("c1", &[("101", "ACGT"), ("102", "ACGT"), ("201", "ACGA")]),
            cluster("c2", &[("101", "ACGT"), ("102", "ACGT"), ("301", "ACGA")]),
            cluster(
                "c3",
                &[("201", "ACGT"), ("301", "ACGT"), ("202", "ACGA"), ("302", "ACGA")],
            ),
        ];

        let selection = select_exemplars(&table_6sp_3gen(), &clusters, &backbone_filter(), false);
        assert_eq!(
            selection.exemplars,
            vec!["101", "102", "201", "301"]
        );

        // Every exemplar appears in at least one selected cluster
        for taxon in &selection.exemplars {
            assert!(selection.clusters.iter().any(|c| c.contains(taxon)));
        }
    }

    #[test]
    fn exemplar_cap_respected() {
        let mut filter = backbone_filter();
        filter.exemplar_cap = 1;
        filter.min_coverage = 1;

        let clusters = vec![cluster(
            "c1",
            &[("101", "ACGT"), ("102", "ACGT"), ("201", "ACGA")],
        )];

        let selection = select_exemplars(&table_6sp_3gen(), &clusters, &filter, false);

        let genus_of = table_6sp_3gen().genus_of();
        let mut per_genus: HashMap<String, usize> = HashMap::new();
        for e in &selection.exemplars {
            *per_genus.entry(genus_of[e].clone()).or_insert(0) += 1;
        }
        for (_, count) in per_genus {
            assert!(count <= 1);
        }
    }

    #[test]
    fn saturated_clusters_discarded() {
        let mut filter = backbone_filter();
        filter.max_distance = 0.1;
        filter.min_coverage = 1;

        // 2/4 mismatches = 0.5 mean distance
        let clusters = vec![cluster("c1", &[("101", "ACGT"), ("102", "ATTT")])];

        let selection = select_exemplars(&table_6sp_3gen(), &clusters, &filter, false);
        assert!(selection.exemplars.is_empty());
        assert!(selection.clusters.is_empty());
    }

    fn clade_filter() -> CladeFilter {
        CladeFilter {
            max_distance: 0.6,
            min_density: 0.0,
            taxon_min_markers: 1,
            max_markers: 10,
        }
    }

    #[test]
    fn decompose_partitions_all_non_exemplars() {
        let table = table_6sp_3gen();
        // Backbone with one exemplar per genus
        let backbone = Tree::from_newick("((101:1,201:1):1,301:2);").unwrap();
        let exemplars = vec!["101".to_string(), "201".to_string(), "301".to_string()];

        let clusters = vec![
            cluster("c1", &[("101", "ACGT"), ("102", "ACGT")]),
            cluster("c2", &[("201", "ACGT"), ("202", "ACGT")]),
            cluster("c3", &[("301", "ACGT"), ("302", "ACGT")]),
        ];

        let clades = decompose(
            &backbone,
            &table,
            &clusters,
            &exemplars,
            &clade_filter(),
            false,
        );

        // Partition totality: members of all clades == taxa minus exemplars
        let mut members: Vec<String> = clades
            .iter()
            .flat_map(|c| c.members().into_iter().map(|s| s.to_string()))
            .collect();
        members.sort();
        assert_eq!(members, vec!["102", "202", "302"]);

        // No duplicates across clades
        let unique: BTreeSet<&String> = members.iter().collect();
        assert_eq!(unique.len(), members.len());

        // Monophyly: no genus appears in two clades
        let mut seen_genera: BTreeSet<String> = BTreeSet::new();
        for clade in &clades {
            for genus in &clade.genera {
                assert!(seen_genera.insert(genus.clone()), "genus {} split", genus);
            }
        }

        // Each clade's attachment tips form a monophyletic group on the
        // backbone
        for clade in &clades {
            let ids: Vec<usize> = clade
                .attachment
                .iter()
                .filter_map(|name| backbone.by_name(name))
                .collect();
            assert!(backbone.is_monophyletic(&ids), "clade {} attachment", clade.id);
        }
    }

    #[test]
    fn scenario_4_exemplars_2_clade_members() {
        // The two low-coverage taxa from the Pass A scenario must land in
        // exactly one clade each
        let table = table_6sp_3gen();
        let clusters = vec![
            cluster("c1", &[("101", "ACGT"), ("102", "ACGT"), ("201", "ACGA")]),
            cluster("c2", &[("101", "ACGT"), ("102", "ACGT"), ("301", "ACGA")]),
            cluster(
                "c3",
                &[("201", "ACGT"), ("301", "ACGT"), ("202", "ACGA"), ("302", "ACGA")],
            ),
        ];

        let selection = select_exemplars(&table, &clusters, &backbone_filter(), false);
        assert_eq!(selection.exemplars.len(), 4);

        let backbone = Tree::from_newick("((101:1,102:1):1,(201:1,301:1):1);").unwrap();
        let clades = decompose(
            &backbone,
            &table,
            &clusters,
            &selection.exemplars,
            &clade_filter(),
            false,
        );

        let mut placements: HashMap<&str, usize> = HashMap::new();
        for clade in &clades {
            for member in clade.members() {
                *placements.entry(member).or_insert(0) += 1;
            }
        }
        assert_eq!(placements.get("202"), Some(&1));
        assert_eq!(placements.get("302"), Some(&1));
    }

    #[test]
    fn fully_exemplar_genus_produces_no_clade() {
        let mut table = table_6sp_3gen();
        // Genus g1 has only one species: it will be fully consumed
        table.rows.retain(|r| r.species() != Some("102"));

        let backbone = Tree::from_newick("(101:2,(201:1,301:1):1);").unwrap();
        let exemplars = vec!["101".to_string(), "201".to_string(), "301".to_string()];

        let clades = decompose(
            &backbone,
            &table,
            &[],
            &exemplars,
            &clade_filter(),
            false,
        );

        assert!(clades.iter().all(|c| !c.genera.contains(&"g1".to_string())));
    }

    #[test]
    fn clade_cluster_cap_prefers_density() {
        let taxa = vec!["101".to_string(), "102".to_string(), "103".to_string()];
        let clusters = vec![
            cluster("sparse", &[("101", "ACGT"), ("102", "ACGT")]),
            cluster(
                "dense",
                &[("101", "ACGT"), ("102", "ACGT"), ("103", "ACGT")],
            ),
        ];

        let mut filter = clade_filter();
        filter.max_markers = 1;

        let selected = select_clade_clusters(&clusters, &taxa, &filter, false);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "dense");
    }

    #[test]
    fn manifest_round_trip() {
        let clade = Clade {
            id: "clade_001".to_string(),
            attachment: vec!["101".to_string()],
            genera: vec!["g1".to_string()],
            taxa: vec!["101".to_string(), "102".to_string()],
            clusters: vec![cluster("c1", &[("101", "ACGT"), ("102", "ACGT")])],
        };

        let mut buf = Vec::new();
        let names: HashMap<String, String> =
            [("101".to_string(), "Aa one".to_string())].into_iter().collect();
        write_manifest(&clade, &names, &mut buf).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        file.write_all(&buf).unwrap();

        let loaded = read_manifest(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.id, "clade_001");
        assert_eq!(loaded.attachment, vec!["101"]);
        assert_eq!(loaded.taxa, vec!["101", "102"]);
        assert_eq!(loaded.clusters.len(), 1);
        assert_eq!(loaded.clusters[0].id, "c1");
    }
}
