use clap::*;
use phyg::libs::conf::{ensure_input, Conf};
use phyg::libs::engine::{Engine, EngineConf, EngineKind};
use phyg::libs::phylo::clades;
use phyg::libs::phylo::Tree;
use phyg::libs::pool;
use phyg::libs::supermatrix::Supermatrix;
use std::io::Write;
use std::path::{Path, PathBuf};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("bbinfer")
        .about("Infer the backbone tree from the supermatrix")
        .after_help(
            r###"
Runs one of the interchangeable inference engines on the backbone
supermatrix. The engine either produces a parseable tree or this stage
fails with the backend's exit status; an engine exiting cleanly without
its declared output file is an error, never a silent partial result.

Notes:
* `--tool` selects the engine: raxml|examl|exabayes|phyml.
* examl requires a starting tree (`--starting-tree`).
* `--bootstraps N` resamples supermatrix columns N times and runs one
  replicate per resample, concurrently, each in its own namespace keyed
  by the replicate index. Support counts are attached to the best tree
  as internal node labels. Meaningless for Bayesian engines (their
  posterior sample already measures support) and refused there.
* The seed is threaded into every engine invocation that accepts one.
* Scratch files live under --workdir and are removed afterwards, on
  success and on failure.

Examples:
1. Maximum likelihood backbone:
   phyg bbinfer supermatrix.phy --tool raxml -o backbone.nwk

2. With bootstrap support:
   phyg bbinfer supermatrix.phy --tool raxml --bootstraps 100 -o backbone.nwk

"###,
        )
        .arg(
            Arg::new("matrix")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Supermatrix in relaxed PHYLIP"),
        )
        .arg(
            Arg::new("tool")
                .long("tool")
                .short('t')
                .num_args(1)
                .default_value("raxml")
                .help("Inference engine tag: raxml|examl|exabayes|phyml"),
        )
        .arg(
            Arg::new("starting_tree")
                .long("starting-tree")
                .num_args(1)
                .help("Starting/constraint tree (Newick)"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .num_args(1)
                .default_value("GTRGAMMA")
                .help("Substitution model passed to the engine"),
        )
        .arg(
            Arg::new("bootstraps")
                .long("bootstraps")
                .short('b')
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Number of bootstrap replicates (0 = none)"),
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
            Arg::new("workdir")
                .long("workdir")
                .num_args(1)
                .help("Scratch directory [default: a fresh temp dir]"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Threads for the engine and concurrent replicates"),
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
    let matrix_file = args.get_one::<String>("matrix").unwrap();
    let tool = args.get_one::<String>("tool").unwrap();
    let bootstraps = *args.get_one::<usize>("bootstraps").unwrap();

    ensure_input(matrix_file)?;

    let kind = EngineKind::from_tag(tool)?;
    if bootstraps > 0 && kind.is_bayesian() {
        return Err(anyhow::anyhow!(
            "Bootstrap resampling is meaningless for {}: it already samples a posterior",
            kind.tag()
        ));
    }

    let conf = Conf::load(args.get_one::<String>("conf").map(|s| s.as_str()))?;
    let seed = match args.get_one::<u64>("seed") {
        Some(&s) => s,
        None => conf.get_u64("RANDOM_SEED", 42),
    };

    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    pool::init(opt_parallel)?;

    let engine_conf = EngineConf {
        model: args.get_one::<String>("model").unwrap().clone(),
        threads: opt_parallel,
        seed,
        ..EngineConf::default()
    };

    let starting_tree = args.get_one::<String>("starting_tree").map(PathBuf::from);
    if let Some(tree) = &starting_tree {
        ensure_input(&tree.display().to_string())?;
    }

    // Scratch space: an explicit dir survives for inspection, a temp dir
    // is removed by cleanup
    let _temp_holder;
    let workdir: PathBuf = match args.get_one::<String>("workdir") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let temp = tempfile::tempdir()?;
            let path = temp.path().to_path_buf();
            _temp_holder = temp;
            path
        }
    };

    let engine = Engine::create(kind, engine_conf, &workdir)?;

    //----------------------------
    // Main search
    //----------------------------
    let matrix_path = std::fs::canonicalize(matrix_file)?;
    let result = engine.run(&matrix_path, starting_tree.as_deref(), "search");
    let tree_path = match result {
        Ok(path) => path,
        Err(e) => {
            engine.cleanup();
            return Err(anyhow::anyhow!("{}", e));
        }
    };

    let mut best = {
        let trees = Tree::from_file(&tree_path.display().to_string())?;
        trees
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Engine output {} holds no tree", tree_path.display()))?
    };

    //----------------------------
    // Bootstrap replicates
    //----------------------------
    if bootstraps > 0 {
        let matrix = Supermatrix::from_phylip(matrix_file)?;
        let indices: Vec<usize> = (0..bootstraps).collect();

        let replicates: Vec<Tree> = pool::map_ordered(&indices, |&i| {
            let resampled = matrix.bootstrap_columns(seed.wrapping_add(i as u64));
            let rep_matrix = workdir.join(format!("boot{}.phy", i));
            let mut w = std::io::BufWriter::new(std::fs::File::create(&rep_matrix)?);
            resampled.write_phylip(&mut w)?;
            w.flush()?;

            let path = engine
                .run(&rep_matrix, None, &format!("boot{}", i))
                .map_err(|e| anyhow::anyhow!("replicate {}: {}", i, e))?;
            let trees = Tree::from_file(&path.display().to_string())?;
            trees
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("replicate {} produced no tree", i))
        })
        .into_iter()
        .flatten()
        .collect();

        if replicates.is_empty() {
            engine.cleanup();
            return Err(anyhow::anyhow!("All bootstrap replicates failed"));
        }
        if replicates.len() < bootstraps {
            eprintln!(
                "Warning: {}/{} bootstrap replicates completed",
                replicates.len(),
                bootstraps
            );
        }

        clades::attach_support(&mut best, &replicates, true)?;
    }

    engine.cleanup();

    //----------------------------
    // Output
    //----------------------------
    let outfile = args.get_one::<String>("outfile").unwrap();
    write_tree(&best, outfile)?;

    Ok(())
}

fn write_tree(tree: &Tree, outfile: &str) -> anyhow::Result<()> {
    // Temp-file-then-rename: no partial tree files on failure
    if outfile == "stdout" {
        let mut writer = intspan::writer(outfile);
        writer.write_all((tree.to_newick() + "\n").as_ref())?;
    } else {
        let dir = Path::new(outfile).parent().unwrap_or(Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all((tree.to_newick() + "\n").as_ref())?;
        temp.persist(outfile)?;
    }
    Ok(())
}
