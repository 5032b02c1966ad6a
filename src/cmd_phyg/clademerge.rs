use clap::*;
use phyg::libs::cluster::AlignmentCluster;
use phyg::libs::decompose::read_manifest;
use phyg::libs::nexml::write_nexml;
use phyg::libs::pool;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("clademerge")
        .about("Bundle per-clade alignments into NeXML input files")
        .after_help(
            r###"
For every clade directory produced by bbdecompose, merges the selected
cluster FASTA files into one NeXML document (`clade.xml`) holding the
taxa block and one DNA characters block per cluster. This is the input
contract of cladeinfer.

Notes:
* Clades without qualifying clusters are skipped with a warning; the
  run continues.
* Clades are processed concurrently; each writes only into its own
  directory.

Examples:
1. Merge all clades:
   phyg clademerge clades/

"###,
        )
        .arg(
            Arg::new("dir")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Directory holding the per-clade working directories"),
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
                .help("Report each clade on stderr"),
        )
}

/// Clade directories under `dir`, sorted for deterministic processing.
pub fn clade_dirs(dir: &str) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|_| anyhow::anyhow!("Required input directory {} is missing", dir))?
    {
        let path = entry?.path();
        if path.is_dir() && path.join("manifest.tsv").is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();

    if dirs.is_empty() {
        return Err(anyhow::anyhow!("No clade directories found under {}", dir));
    }

    Ok(dirs)
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let dir = args.get_one::<String>("dir").unwrap();
    let verbose = args.get_flag("verbose");

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    pool::init(opt_parallel)?;

    let dirs = clade_dirs(dir)?;

    //----------------------------
    // Process
    //----------------------------
    let done = pool::map_ordered(&dirs, |clade_dir| {
        let manifest = clade_dir.join("manifest.tsv");
        let clade = read_manifest(&manifest.display().to_string())?;

        if clade.clusters.is_empty() {
            return Err(anyhow::anyhow!(
                "Clade {} has no clusters, nothing to merge",
                clade.id
            ));
        }

        let mut clusters = Vec::new();
        for stub in &clade.clusters {
            let fasta = clade_dir.join(format!("{}.fa", stub.id));
            clusters.push(AlignmentCluster::from_fasta(&fasta.display().to_string())?);
        }

        let xml_path = clade_dir.join("clade.xml");
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&xml_path)?);
        write_nexml(&clusters, &mut writer)?;
        writer.flush()?;

        if verbose {
            eprintln!("{}: {} clusters merged", clade.id, clusters.len());
        }

        Ok(clade.id)
    });

    let merged = done.iter().flatten().count();
    if merged == 0 {
        return Err(anyhow::anyhow!("No clade could be merged under {}", dir));
    }

    Ok(())
}
