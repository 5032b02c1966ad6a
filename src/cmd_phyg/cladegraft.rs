use clap::*;
use phyg::libs::conf::ensure_input;
use phyg::libs::consense::{apply_burnin, majority_consensus};
use phyg::libs::decompose::{read_manifest, Clade};
use phyg::libs::graft::{graft_clades, relabel_tips};
use phyg::libs::phylo::Tree;
use phyg::libs::taxon::TaxaTable;
use std::io::Write;
use std::path::Path;

use super::clademerge::clade_dirs;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("cladegraft")
        .about("Graft clade trees onto the calibrated backbone")
        .after_help(
            r###"
The final recomposition: every clade tree is rescaled so its root height
equals the age of its attachment node on the chronogram, the exemplar
placeholder tips are removed, and the rescaled subtree is merged in their
place. The attachment point is located by the exemplar key recorded at
decomposition time; the backbone topology is authoritative.

Per clade, the tree is read in order of preference:
* `consensus.nwk`  (from phyg consense)
* `mltree.nwk`     (likelihood engines)
* `posterior.nwk`  (consensed here with --burnin/--limit)

Notes:
* Guarantees: every input taxon appears exactly once as a tip; within a
  grafted subtree no node is older than its attachment point.
* With a taxa table, tips are rewritten to display names with the taxon
  id kept as an NHX annotation (`--keep-ids` disables this).
* NHX annotations survive phyg's own reader/writer pair; annotations
  written by external engines do not survive their round trips.
* A clade without a tree file or attachment is skipped with a warning.

Examples:
1. Graft everything:
   phyg cladegraft chronogram.nwk clades/ --taxa taxa.tsv -o final.nwk

2. Keep taxon ids as tip labels:
   phyg cladegraft chronogram.nwk clades/ --keep-ids -o final.nwk

"###,
        )
        .arg(
            Arg::new("backbone")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Calibrated backbone tree (Newick)"),
        )
        .arg(
            Arg::new("dir")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Directory holding the per-clade working directories"),
        )
        .arg(
            Arg::new("taxa")
                .long("taxa")
                .num_args(1)
                .help("Taxa table, for display-name tip labels"),
        )
        .arg(
            Arg::new("keep_ids")
                .long("keep-ids")
                .action(ArgAction::SetTrue)
                .help("Keep taxon ids as tip labels"),
        )
        .arg(
            Arg::new("burnin")
                .long("burnin")
                .num_args(1)
                .default_value("0.1")
                .value_parser(value_parser!(f64))
                .help("Burnin when consensing a raw posterior sample"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .num_args(1)
                .default_value("0.5")
                .value_parser(value_parser!(f64))
                .help("Clade frequency floor when consensing a raw posterior sample"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Report each graft on stderr"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let backbone_file = args.get_one::<String>("backbone").unwrap();
    let dir = args.get_one::<String>("dir").unwrap();
    let burnin = *args.get_one::<f64>("burnin").unwrap();
    let limit = *args.get_one::<f64>("limit").unwrap();
    let keep_ids = args.get_flag("keep_ids");
    let verbose = args.get_flag("verbose");

    ensure_input(backbone_file)?;

    let mut trees = Tree::from_file(backbone_file)?;
    let Some(backbone) = trees.pop() else {
        return Err(anyhow::anyhow!("No tree found in {}", backbone_file));
    };

    //----------------------------
    // Collect clade trees
    //----------------------------
    let mut clades: Vec<(Clade, Tree)> = Vec::new();
    for clade_dir in clade_dirs(dir)? {
        let manifest = clade_dir.join("manifest.tsv");
        let clade = match read_manifest(&manifest.display().to_string()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Warning: {}", e);
                continue;
            }
        };

        match load_clade_tree(&clade_dir, burnin, limit) {
            Ok(Some(tree)) => {
                if verbose {
                    eprintln!("{}: {} tips", clade.id, tree.leaves().len());
                }
                clades.push((clade, tree));
            }
            Ok(None) => {
                eprintln!("Warning: clade {} has no tree file, skipped", clade.id);
            }
            Err(e) => {
                eprintln!("Warning: clade {} skipped: {}", clade.id, e);
            }
        }
    }

    if clades.is_empty() {
        return Err(anyhow::anyhow!("No clade trees found under {}", dir));
    }

    //----------------------------
    // Graft
    //----------------------------
    let mut final_tree = graft_clades(&backbone, &clades, verbose)?;

    if !keep_ids {
        if let Some(taxa_file) = args.get_one::<String>("taxa") {
            ensure_input(taxa_file)?;
            let table = TaxaTable::from_file(taxa_file)?;
            relabel_tips(&mut final_tree, &table.display_names());
        }
    }

    //----------------------------
    // Output
    //----------------------------
    let outfile = args.get_one::<String>("outfile").unwrap();
    if outfile == "stdout" {
        let mut writer = intspan::writer(outfile);
        writer.write_all((final_tree.to_newick() + "\n").as_ref())?;
    } else {
        let parent = Path::new(outfile).parent().unwrap_or(Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all((final_tree.to_newick() + "\n").as_ref())?;
        temp.persist(outfile)?;
    }

    Ok(())
}

/// The clade tree, by preference: an explicit consensus, a likelihood
/// tree, or a raw posterior sample consensed on the spot.
fn load_clade_tree(clade_dir: &Path, burnin: f64, limit: f64) -> anyhow::Result<Option<Tree>> {
    let consensus = clade_dir.join("consensus.nwk");
    if consensus.is_file() {
        let trees = Tree::from_file(&consensus.display().to_string())?;
        return Ok(trees.into_iter().next());
    }

    let mltree = clade_dir.join("mltree.nwk");
    if mltree.is_file() {
        let trees = Tree::from_file(&mltree.display().to_string())?;
        return Ok(trees.into_iter().next());
    }

    let posterior = clade_dir.join("posterior.nwk");
    if posterior.is_file() {
        let trees = Tree::from_file(&posterior.display().to_string())?;
        let kept = apply_burnin(trees, burnin);
        if kept.is_empty() {
            return Err(anyhow::anyhow!("posterior sample empty after burnin"));
        }
        return Ok(Some(majority_consensus(&kept, limit, false)?));
    }

    Ok(None)
}
