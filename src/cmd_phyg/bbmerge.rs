use clap::*;
use phyg::libs::cluster::{read_cluster_list, AlignmentCluster};
use phyg::libs::conf::{ensure_input, BackboneFilter, Conf};
use phyg::libs::decompose::select_exemplars;
use phyg::libs::pool;
use phyg::libs::supermatrix::Supermatrix;
use phyg::libs::taxon::TaxaTable;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("bbmerge")
        .about("Select exemplars and build the backbone supermatrix")
        .after_help(
            r###"
Pass A of the decomposition: filters the cluster pool by saturation,
selects up to two exemplar taxa per genus, and concatenates the surviving
clusters (restricted to exemplars) into a relaxed PHYLIP supermatrix.

Notes:
* Clusters with a mean pairwise distance above the threshold are too
  saturated to carry backbone signal and are discarded.
* A taxon qualifies as an exemplar candidate when it participates in at
  least MIN_COVERAGE surviving clusters; within a genus, taxa that
  co-occur in the most clusters win, ties broken by taxon id.
* Each exemplar contributes at most MAX_COVERAGE markers to the matrix.
* Thresholds: flags below > PHYG_BACKBONE_* environment > --conf file.

Output companions (next to the supermatrix):
* `<outfile>.partitions` - RAxML-style partition table
* `<outfile>.exemplars`  - selected exemplar ids, one per line

Examples:
1. Defaults:
   phyg bbmerge clusters.list taxa.tsv -o supermatrix.phy

2. Stricter saturation threshold:
   phyg bbmerge clusters.list taxa.tsv --max-distance 0.1 -o supermatrix.phy

"###,
        )
        .arg(
            Arg::new("clusters")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Cluster list file, one aligned FASTA path per line"),
        )
        .arg(
            Arg::new("taxa")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Taxa table"),
        )
        .arg(
            Arg::new("conf")
                .long("conf")
                .num_args(1)
                .help("Config file with key = value defaults"),
        )
        .arg(
            Arg::new("max_distance")
                .long("max-distance")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Discard clusters with mean pairwise distance above this"),
        )
        .arg(
            Arg::new("min_coverage")
                .long("min-coverage")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Minimum qualifying clusters per exemplar candidate"),
        )
        .arg(
            Arg::new("max_coverage")
                .long("max-coverage")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Maximum markers per exemplar in the matrix"),
        )
        .arg(
            Arg::new("cap")
                .long("cap")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Exemplars per genus"),
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
                .help("Report discarded clusters on stderr"),
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
    let cluster_list = args.get_one::<String>("clusters").unwrap();
    let taxa_file = args.get_one::<String>("taxa").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();
    let verbose = args.get_flag("verbose");

    ensure_input(cluster_list)?;
    ensure_input(taxa_file)?;

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    pool::init(opt_parallel)?;

    let conf = Conf::load(args.get_one::<String>("conf").map(|s| s.as_str()))?;
    let mut filter = BackboneFilter::from_conf(&conf);
    if let Some(&v) = args.get_one::<f64>("max_distance") {
        filter.max_distance = v;
    }
    if let Some(&v) = args.get_one::<usize>("min_coverage") {
        filter.min_coverage = v;
    }
    if let Some(&v) = args.get_one::<usize>("max_coverage") {
        filter.max_coverage = v;
    }
    if let Some(&v) = args.get_one::<usize>("cap") {
        filter.exemplar_cap = v;
    }

    //----------------------------
    // Load
    //----------------------------
    let table = TaxaTable::from_file(taxa_file)?;
    let paths = read_cluster_list(cluster_list)?;

    let clusters: Vec<AlignmentCluster> = pool::map_ordered(&paths, |path| {
        AlignmentCluster::from_fasta(path)
    })
    .into_iter()
    .flatten()
    .collect();

    if clusters.is_empty() {
        return Err(anyhow::anyhow!(
            "No loadable clusters listed in {}",
            cluster_list
        ));
    }

    //----------------------------
    // Select and concatenate
    //----------------------------
    let selection = select_exemplars(&table, &clusters, &filter, verbose);
    if selection.exemplars.is_empty() {
        return Err(anyhow::anyhow!(
            "No exemplar taxa passed the backbone thresholds"
        ));
    }

    let matrix = Supermatrix::concat(&selection.clusters, &selection.exemplars);

    if verbose {
        eprintln!(
            "{} exemplars, {} clusters, {} columns",
            selection.exemplars.len(),
            selection.clusters.len(),
            matrix.nchar()
        );
    }

    //----------------------------
    // Output
    //----------------------------
    let mut writer = intspan::writer(outfile);
    matrix.write_phylip(&mut writer)?;

    if outfile != "stdout" {
        let mut part_writer = intspan::writer(&format!("{}.partitions", outfile));
        matrix.write_partitions(&mut part_writer)?;

        let mut ex_writer = intspan::writer(&format!("{}.exemplars", outfile));
        for taxon in &selection.exemplars {
            ex_writer.write_fmt(format_args!("{}\n", taxon))?;
        }
    }

    Ok(())
}
