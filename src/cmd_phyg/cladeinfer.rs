use clap::*;
use phyg::libs::conf::{ensure_input, Conf};
use phyg::libs::engine::{Engine, EngineConf, EngineKind};
use phyg::libs::nexml::read_nexml;
use phyg::libs::pool;
use phyg::libs::supermatrix::Supermatrix;
use std::collections::BTreeSet;
use std::io::Write;

use super::clademerge::clade_dirs;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("cladeinfer")
        .about("Infer per-clade trees from the NeXML bundles")
        .after_help(
            r###"
Runs the selected inference engine once per clade, concurrently across
clades. Each clade reads its own `clade.xml`, concatenates the characters
blocks, and writes the engine result into its own directory, so no two
workers touch the same files.

Notes:
* The default engine is exabayes; its posterior sample lands in
  `posterior.nwk` and is consensed by `phyg consense` (or implicitly by
  cladegraft). Likelihood engines write `mltree.nwk` instead.
* A failed clade is logged and skipped; remaining clades complete.
* Every engine invocation receives the same seed for reproducibility.

Examples:
1. Bayesian per-clade inference:
   phyg cladeinfer clades/ --generations 200000 -p 4

2. Quick likelihood trees instead:
   phyg cladeinfer clades/ --tool raxml -p 4

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
            Arg::new("tool")
                .long("tool")
                .short('t')
                .num_args(1)
                .default_value("exabayes")
                .help("Inference engine tag: raxml|examl|exabayes|phyml"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .num_args(1)
                .default_value("GTRGAMMA")
                .help("Substitution model passed to the engine"),
        )
        .arg(
            Arg::new("generations")
                .long("generations")
                .num_args(1)
                .default_value("100000")
                .value_parser(value_parser!(usize))
                .help("MCMC generations (Bayesian engines)"),
        )
        .arg(
            Arg::new("sample_freq")
                .long("sample-freq")
                .num_args(1)
                .default_value("100")
                .value_parser(value_parser!(usize))
                .help("Sampling frequency (Bayesian engines)"),
        )
        .arg(
            Arg::new("log_freq")
                .long("log-freq")
                .num_args(1)
                .default_value("1000")
                .value_parser(value_parser!(usize))
                .help("Diagnostic/log frequency (Bayesian engines)"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .num_args(1)
                .value_parser(value_parser!(u64))
                .help("Random seed [default: RANDOM_SEED config or 42]"),
        )
        .arg(
            Arg::new("conf")
                .long("conf")
                .num_args(1)
                .help("Config file with key = value defaults"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Concurrent clades"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Report each clade on stderr"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let dir = args.get_one::<String>("dir").unwrap();
    let tool = args.get_one::<String>("tool").unwrap();
    let verbose = args.get_flag("verbose");

    let kind = EngineKind::from_tag(tool)?;

    let conf = Conf::load(args.get_one::<String>("conf").map(|s| s.as_str()))?;
    let seed = match args.get_one::<u64>("seed") {
        Some(&s) => s,
        None => conf.get_u64("RANDOM_SEED", 42),
    };

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    pool::init(opt_parallel)?;

    let engine_conf = EngineConf {
        model: args.get_one::<String>("model").unwrap().clone(),
        generations: *args.get_one::<usize>("generations").unwrap(),
        sample_freq: *args.get_one::<usize>("sample_freq").unwrap(),
        log_freq: *args.get_one::<usize>("log_freq").unwrap(),
        threads: 1,
        seed,
    };

    let dirs = clade_dirs(dir)?;

    //----------------------------
    // Per-clade inference
    //----------------------------
    let outfile_name = if kind.is_bayesian() {
        "posterior.nwk"
    } else {
        "mltree.nwk"
    };

    let done = pool::map_ordered(&dirs, |clade_dir| {
        let clade_id = clade_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("clade")
            .to_string();

        let xml = clade_dir.join("clade.xml");
        ensure_input(&xml.display().to_string())
            .map_err(|_| anyhow::anyhow!("{}: no clade.xml, inference skipped", clade_id))?;

        let clusters = read_nexml(&xml.display().to_string())?;

        let mut taxa: BTreeSet<String> = BTreeSet::new();
        for cluster in &clusters {
            taxa.extend(cluster.taxa().iter().map(|s| s.to_string()));
        }
        let taxa: Vec<String> = taxa.into_iter().collect();
        if taxa.len() < 3 {
            return Err(anyhow::anyhow!(
                "{}: only {} taxa, no resolvable topology",
                clade_id,
                taxa.len()
            ));
        }

        let matrix = Supermatrix::concat(&clusters, &taxa);

        let scratch = clade_dir.join("scratch");
        let engine = Engine::create(kind, engine_conf.clone(), &scratch)?;

        let matrix_path = scratch.join("clade.phy");
        {
            let mut w = std::io::BufWriter::new(std::fs::File::create(&matrix_path)?);
            matrix.write_phylip(&mut w)?;
            w.flush()?;
        }

        let result = engine.run(&matrix_path, None, &clade_id);
        let tree_path = match result {
            Ok(path) => path,
            Err(e) => {
                engine.cleanup();
                return Err(anyhow::anyhow!("{}: {}", clade_id, e));
            }
        };

        // Copy the result out before the scratch space goes away
        let content = std::fs::read_to_string(&tree_path)?;
        engine.cleanup();

        let out_path = clade_dir.join(outfile_name);
        let temp = tempfile::NamedTempFile::new_in(clade_dir)?;
        std::fs::write(temp.path(), content)?;
        temp.persist(&out_path)?;

        if verbose {
            eprintln!("{}: wrote {}", clade_id, out_path.display());
        }

        Ok(clade_id)
    });

    let finished = done.iter().flatten().count();
    if finished == 0 {
        return Err(anyhow::anyhow!("Every clade inference failed under {}", dir));
    }
    if finished < dirs.len() {
        eprintln!("Warning: {}/{} clades completed", finished, dirs.len());
    }

    Ok(())
}
