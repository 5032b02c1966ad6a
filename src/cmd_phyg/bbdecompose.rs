use clap::*;
use phyg::libs::cluster::{read_cluster_list, AlignmentCluster};
use phyg::libs::conf::{ensure_input, CladeFilter, Conf};
use phyg::libs::decompose::{decompose, write_manifest};
use phyg::libs::phylo::Tree;
use phyg::libs::pool;
use phyg::libs::taxon::TaxaTable;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("bbdecompose")
        .about("Decompose the remaining taxa into monophyletic clades")
        .after_help(
            r###"
Pass B of the decomposition: walks the calibrated backbone from the root
toward the tips and cuts it at the topmost nodes whose subtended genus
set is clean (no genus split across the node's boundary). Each cut
becomes a clade holding every taxon of its genera; the exemplar tips
below the cut are recorded as the clade's attachment key for grafting.

Notes:
* The backbone's tip labels are the exemplar taxon ids; every other
  taxon in the taxa table is assigned to exactly one clade.
* Genera split on the backbone fall through to the nearest ancestor
  subtending a clean genus group (coarser, never dropped).
* Genera without any backbone exemplar ride along with their closest
  relative by shared higher rank.
* Per-clade cluster selection: mean distance <= CLADE_MAX_DISTANCE,
  density >= CLADE_MIN_DENSITY, the per-taxon marker floor, then at most
  CLADE_MAX_MARKERS clusters, densest first.
* A clade with zero qualifying clusters is reported and written without
  cluster files; inference for it is skipped downstream, the run
  continues.
* Thresholds: flags below > PHYG_CLADE_* environment > --conf file.

Output: one directory per clade under --dir, each holding `manifest.tsv`
and one FASTA per selected cluster. A summary line per clade goes to the
output file.

Examples:
1. Decompose:
   phyg bbdecompose chronogram.nwk clusters.list taxa.tsv --dir clades

2. Denser clades, at most 5 markers each:
   phyg bbdecompose chronogram.nwk clusters.list taxa.tsv \
       --min-density 0.5 --max-markers 5 --dir clades

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
            Arg::new("clusters")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Cluster list file, one aligned FASTA path per line"),
        )
        .arg(
            Arg::new("taxa")
                .required(true)
                .num_args(1)
                .index(3)
                .help("Taxa table"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .num_args(1)
                .default_value("clades")
                .help("Directory to create per-clade working directories in"),
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
                .help("Discard clade clusters with mean pairwise distance above this"),
        )
        .arg(
            Arg::new("min_density")
                .long("min-density")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Minimum fraction of clade taxa a cluster must cover"),
        )
        .arg(
            Arg::new("min_markers")
                .long("min-markers")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Per-taxon marker floor"),
        )
        .arg(
            Arg::new("max_markers")
                .long("max-markers")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Marker cap per clade"),
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
                .help("Report filtering decisions on stderr"),
        )
        .arg(
            Arg::new("outfile")
                .short('o')
                .long("outfile")
                .num_args(1)
                .default_value("stdout")
                .help("Summary output. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let backbone_file = args.get_one::<String>("backbone").unwrap();
    let cluster_list = args.get_one::<String>("clusters").unwrap();
    let taxa_file = args.get_one::<String>("taxa").unwrap();
    let dir = args.get_one::<String>("dir").unwrap();
    let verbose = args.get_flag("verbose");

    ensure_input(backbone_file)?;
    ensure_input(cluster_list)?;
    ensure_input(taxa_file)?;

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    pool::init(opt_parallel)?;

    let conf = Conf::load(args.get_one::<String>("conf").map(|s| s.as_str()))?;
    let mut filter = CladeFilter::from_conf(&conf);
    if let Some(&v) = args.get_one::<f64>("max_distance") {
        filter.max_distance = v;
    }
    if let Some(&v) = args.get_one::<f64>("min_density") {
        filter.min_density = v;
    }
    if let Some(&v) = args.get_one::<usize>("min_markers") {
        filter.taxon_min_markers = v;
    }
    if let Some(&v) = args.get_one::<usize>("max_markers") {
        filter.max_markers = v;
    }

    //----------------------------
    // Load
    //----------------------------
    let mut trees = Tree::from_file(backbone_file)?;
    let Some(backbone) = trees.pop() else {
        return Err(anyhow::anyhow!("No tree found in {}", backbone_file));
    };

    let table = TaxaTable::from_file(taxa_file)?;
    let paths = read_cluster_list(cluster_list)?;
    let clusters: Vec<AlignmentCluster> = pool::map_ordered(&paths, |path| {
        AlignmentCluster::from_fasta(path)
    })
    .into_iter()
    .flatten()
    .collect();

    // The backbone's tips ARE the exemplar set
    let exemplars: Vec<String> = backbone
        .leaf_names()
        .into_iter()
        .flatten()
        .collect();
    if exemplars.is_empty() {
        return Err(anyhow::anyhow!(
            "Backbone {} has no labelled tips",
            backbone_file
        ));
    }

    //----------------------------
    // Decompose
    //----------------------------
    let clades = decompose(&backbone, &table, &clusters, &exemplars, &filter, verbose);
    if clades.is_empty() {
        return Err(anyhow::anyhow!("Decomposition produced no clades"));
    }

    let names = table.display_names();
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());
    writer.write_fmt(format_args!("#clade\ttaxa\tclusters\tattachment\n"))?;

    for clade in &clades {
        if clade.clusters.is_empty() {
            eprintln!(
                "Warning: clade {} has no qualifying alignment clusters, no inference possible",
                clade.id
            );
        }

        let clade_dir = std::path::Path::new(dir).join(&clade.id);
        std::fs::create_dir_all(&clade_dir)?;

        let manifest_path = clade_dir.join("manifest.tsv");
        let mut manifest = std::io::BufWriter::new(std::fs::File::create(&manifest_path)?);
        write_manifest(clade, &names, &mut manifest)?;
        manifest.flush()?;

        for cluster in &clade.clusters {
            let fasta_path = clade_dir.join(format!("{}.fa", cluster.id));
            let mut fasta = std::io::BufWriter::new(std::fs::File::create(&fasta_path)?);
            cluster.write_fasta(&mut fasta)?;
            fasta.flush()?;
        }

        writer.write_fmt(format_args!(
            "{}\t{}\t{}\t{}\n",
            clade.id,
            clade.taxa.len(),
            clade.clusters.len(),
            clade.attachment.join(",")
        ))?;
    }

    Ok(())
}
