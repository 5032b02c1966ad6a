use clap::*;
use phyg::libs::conf::ensure_input;
use phyg::libs::taxon::{classification_tree, TaxaTable};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("classify")
        .about("Build the classification tree from a taxa table")
        .after_help(
            r###"
Chains the per-rank id columns of the taxa table into a rooted
classification tree (Newick).

Notes:
* Ranks missing from a row are skipped, so rank violations collapse into
  polytomies rather than failing.
* Uninformative single-child rank chains are collapsed.
* Species tips are labelled with display names; the taxon id is kept as
  an NHX annotation.

Examples:
1. Build the tree:
   phyg classify taxa.tsv -o classification.nwk

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Taxa table. [stdin] for standard input"),
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
    let infile = args.get_one::<String>("infile").unwrap();
    ensure_input(infile)?;

    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    //----------------------------
    // Process
    //----------------------------
    let table = TaxaTable::from_file(infile)?;
    let tree = classification_tree(&table);

    writer.write_all((tree.to_newick() + "\n").as_ref())?;

    Ok(())
}
