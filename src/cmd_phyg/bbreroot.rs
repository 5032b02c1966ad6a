use clap::*;
use phyg::libs::conf::ensure_input;
use phyg::libs::phylo::Tree;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("bbreroot")
        .about("Reroot the backbone on an outgroup")
        .after_help(
            r###"
Reroots the inferred backbone so the calibration step sees the intended
root. The new root is placed at the midpoint of the parent edge of the
outgroup's LCA.

Notes:
* Outgroup selection:
    * `-n` names one or more outgroup tips; with several, their LCA's
      parent edge is split.
    * `-f` reads outgroup names from a file (first column).
    * With NO selection, the midpoint of the longest branch is used.
* `--support-as-labels` shifts internal node labels along the rerooting
  path so support values stay with their bipartitions.
* `--deroot` instead splices the root into a multifurcation.
* Degree-2 nodes produced by the operation are collapsed.

Examples:
1. Reroot on an outgroup taxon:
   phyg bbreroot backbone.nwk -n 9606 -o rerooted.nwk

2. Reroot keeping bootstrap labels coherent:
   phyg bbreroot backbone.nwk -n 9606 -s -o rerooted.nwk

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input tree file. [stdin] for standard input"),
        )
        .arg(
            Arg::new("node")
                .long("node")
                .short('n')
                .num_args(1)
                .action(ArgAction::Append)
                .help("Outgroup tip name"),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .short('f')
                .num_args(1)
                .help("File of outgroup tip names, first column"),
        )
        .arg(
            Arg::new("support_as_labels")
                .long("support-as-labels")
                .short('s')
                .action(ArgAction::SetTrue)
                .help("Internal labels are support values; keep them on their bipartitions"),
        )
        .arg(
            Arg::new("deroot")
                .long("deroot")
                .short('d')
                .action(ArgAction::SetTrue)
                .help("Deroot the tree (create a multifurcating root)"),
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
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    let process_support = args.get_flag("support_as_labels");
    let deroot = args.get_flag("deroot");

    let infile = args.get_one::<String>("infile").unwrap();
    ensure_input(infile)?;

    let mut trees = Tree::from_file(infile)?;
    let Some(mut tree) = trees.pop() else {
        return Err(anyhow::anyhow!("No tree found in {}", infile));
    };

    if deroot {
        tree.deroot()?;
    } else {
        // ids with names
        let id_of: BTreeMap<_, _> = tree.name_index();

        let mut ids = BTreeSet::new();
        if let Some(nodes) = args.get_many::<String>("node") {
            for name in nodes {
                match id_of.get(name) {
                    Some(&id) => {
                        ids.insert(id);
                    }
                    None => {
                        eprintln!("Warning: outgroup {} not found in the tree", name);
                    }
                }
            }
        }
        if let Some(file) = args.get_one::<String>("file") {
            ensure_input(file)?;
            for name in intspan::read_first_column(file).iter() {
                if let Some(&id) = id_of.get(name) {
                    ids.insert(id);
                }
            }
        }

        if !ids.is_empty() {
            let nodes: Vec<usize> = ids.iter().cloned().collect();
            let sub_root_id = tree.mrca(&nodes)?;

            let old_root = tree.root().unwrap();
            if old_root != sub_root_id {
                let new_root = tree.insert_parent(sub_root_id)?;
                tree.reroot_at(new_root, process_support)?;
                tree.suppress_unary();
            }
        } else {
            // Default: root at the middle of the longest branch
            if let Some(longest_node) = tree.longest_edge() {
                let new_root = tree.insert_parent(longest_node)?;
                tree.reroot_at(new_root, process_support)?;
                tree.suppress_unary();
            }
        }
    }

    let out_string = tree.to_newick();
    writer.write_all((out_string + "\n").as_ref())?;

    Ok(())
}
