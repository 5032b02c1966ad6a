use clap::*;
use phyg::libs::conf::ensure_input;
use phyg::libs::consense::{apply_burnin, majority_consensus};
use phyg::libs::phylo::Tree;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("consense")
        .about("Majority-rule consensus of a tree sample")
        .after_help(
            r###"
Builds the majority-rule extended consensus of a posterior (or bootstrap)
tree sample: clades are accepted greedily in frequency order while they
stay compatible with already-accepted clades, so the consensus is as
resolved as the sample supports.

Notes:
* `--burnin` drops the leading fraction of the sample before counting.
* `--limit` is the minimum clade frequency to keep (0.5 = strict
  majority rule).
* Internal node labels carry the clade frequency; branch lengths are
  averaged over the trees containing the clade.

Examples:
1. Posterior sample with 10% burnin:
   phyg consense posterior.nwk --burnin 0.1 -o consensus.nwk

2. Percent support labels:
   phyg consense posterior.nwk --percent -o consensus.nwk

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Tree sample, one Newick per line. [stdin] for standard input"),
        )
        .arg(
            Arg::new("burnin")
                .long("burnin")
                .num_args(1)
                .default_value("0.1")
                .value_parser(value_parser!(f64))
                .help("Leading fraction of the sample to discard"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .num_args(1)
                .default_value("0.5")
                .value_parser(value_parser!(f64))
                .help("Minimum clade frequency to keep"),
        )
        .arg(
            Arg::new("percent")
                .long("percent")
                .action(ArgAction::SetTrue)
                .help("Print support as integer percentages"),
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
    let burnin = *args.get_one::<f64>("burnin").unwrap();
    let limit = *args.get_one::<f64>("limit").unwrap();
    let percent = args.get_flag("percent");

    ensure_input(infile)?;
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    //----------------------------
    // Process
    //----------------------------
    let trees = Tree::from_file(infile)?;
    if trees.is_empty() {
        return Err(anyhow::anyhow!("No trees found in {}", infile));
    }

    let kept = apply_burnin(trees, burnin);
    if kept.is_empty() {
        return Err(anyhow::anyhow!(
            "Burnin {} leaves no trees from {}",
            burnin,
            infile
        ));
    }

    let consensus = majority_consensus(&kept, limit, percent)?;

    writer.write_all((consensus.to_newick() + "\n").as_ref())?;

    Ok(())
}
