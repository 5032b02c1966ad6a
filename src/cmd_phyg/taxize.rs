use clap::*;
use phyg::libs::conf::ensure_input;
use phyg::libs::pool;
use phyg::libs::taxon::{TaxaTable, Taxonomy};
use std::io::{BufRead, Write};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("taxize")
        .about("Resolve taxon names to per-rank ids")
        .after_help(
            r###"
Resolves a list of taxon names against a reference taxonomy snapshot and
writes the taxa table consumed by all later stages.

Notes:
* The names file holds one name per line; `#` comments are ignored.
* The reference dump is a TSV of `id  parent_id  rank  name`.
* Resolution is case-insensitive; names with subspecific epithets fall
  back to the binomial.
* An unresolved name is a per-item condition: it is logged and skipped,
  the run continues.

Examples:
1. Resolve names:
   phyg taxize names.txt --dump taxdump.tsv -o taxa.tsv

2. Parallel resolution with progress warnings:
   phyg taxize names.txt --dump taxdump.tsv -p 4 --verbose -o taxa.tsv

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Names file, one taxon name per line. [stdin] for standard input"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .short('d')
                .num_args(1)
                .required(true)
                .help("Reference taxonomy dump (TSV: id, parent_id, rank, name)"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of threads"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Report each resolution on stderr"),
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
    let dump = args.get_one::<String>("dump").unwrap();
    let verbose = args.get_flag("verbose");

    ensure_input(infile)?;
    ensure_input(dump)?;

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    pool::init(opt_parallel)?;

    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    //----------------------------
    // Load
    //----------------------------
    let taxonomy = Taxonomy::from_dump(dump)?;

    let names: Vec<String> = intspan::reader(infile)
        .lines()
        .map_while(Result::ok)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    if names.is_empty() {
        return Err(anyhow::anyhow!("No taxon names found in {}", infile));
    }

    //----------------------------
    // Resolve
    //----------------------------
    let rows = pool::map_ordered(&names, |name| {
        let node = taxonomy
            .resolve(name)
            .ok_or_else(|| anyhow::anyhow!("Unresolved taxon name: {}", name))?;
        if verbose {
            eprintln!("{} -> {}", name, node.id);
        }
        Ok(taxonomy.to_row(name, node))
    });

    //----------------------------
    // Output
    //----------------------------
    writer.write_fmt(format_args!("{}\n", TaxaTable::header()))?;
    let mut resolved = 0;
    for row in rows.into_iter().flatten() {
        writer.write_fmt(format_args!("{}\n", TaxaTable::write_row(&row)))?;
        resolved += 1;
    }

    if verbose {
        eprintln!("Resolved {}/{} names", resolved, names.len());
    }

    Ok(())
}
