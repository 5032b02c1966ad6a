use clap::*;
use phyg::libs::calibrate::CalibrationTable;
use phyg::libs::conf::ensure_input;
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("bbcalibrate")
        .about("Calibrate the rerooted backbone into a chronogram")
        .after_help(
            r###"
Prepares the fossil constraint table and runs the external calibration
engine (treePL) to turn the rerooted backbone into a chronogram with
absolute node ages.

Table preparation (always applied, in this order):
* Constraints naming the same MRCA (same sorted taxon set) are collapsed;
  when they conflict, the oldest max_age wins.
* Constraints naming a single taxon are dropped (no internal node to date).
* Rows are sorted ascending by minimum age and relabelled cal1, cal2, ...
  because the engine is sensitive to input ordering.

Notes:
* The fossil table is TSV: `#name  min_age  max_age  taxa` with taxa
  comma-separated, matching the tip labels of the tree.
* `--table` writes the prepared table to the output and stops, for
  inspection or for driving another dating tool.
* `--numsites` must match the supermatrix width the backbone was
  inferred from.

Examples:
1. Calibrate:
   phyg bbcalibrate rerooted.nwk fossils.tsv --numsites 12480 -o chronogram.nwk

2. Only prepare the constraint table:
   phyg bbcalibrate rerooted.nwk fossils.tsv --table -o calibrations.tsv

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Rerooted backbone tree (Newick)"),
        )
        .arg(
            Arg::new("fossils")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Fossil constraint table (TSV)"),
        )
        .arg(
            Arg::new("numsites")
                .long("numsites")
                .num_args(1)
                .default_value("1000")
                .value_parser(value_parser!(usize))
                .help("Alignment columns behind the branch lengths"),
        )
        .arg(
            Arg::new("smooth")
                .long("smooth")
                .num_args(1)
                .default_value("100")
                .value_parser(value_parser!(f64))
                .help("Rate smoothing parameter"),
        )
        .arg(
            Arg::new("table")
                .long("table")
                .action(ArgAction::SetTrue)
                .help("Write the prepared constraint table and stop"),
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
    let fossils = args.get_one::<String>("fossils").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();
    let numsites = *args.get_one::<usize>("numsites").unwrap();
    let smooth = *args.get_one::<f64>("smooth").unwrap();

    ensure_input(infile)?;
    ensure_input(fossils)?;

    //----------------------------
    // Prepare constraints
    //----------------------------
    let table = CalibrationTable::from_file(fossils)?.prepare();
    if table.points.is_empty() {
        return Err(anyhow::anyhow!(
            "No usable calibration points left in {} after preparation",
            fossils
        ));
    }

    if args.get_flag("table") {
        let mut writer = intspan::writer(outfile);
        table.write_table(&mut writer)?;
        return Ok(());
    }

    //----------------------------
    // Run the calibration engine
    //----------------------------
    let treepl = which::which("treepl")
        .or_else(|_| which::which("treePL"))
        .map_err(|_| anyhow::anyhow!("No treepl executable found on PATH"))?;

    let scratch = tempfile::tempdir()?;
    let config_path = scratch.path().join("treepl.config");
    let dated_path = scratch.path().join("dated.nwk");

    let treefile = std::fs::canonicalize(infile)?;
    {
        let mut config = std::io::BufWriter::new(std::fs::File::create(&config_path)?);
        table.write_treepl_config(
            &mut config,
            &treefile.display().to_string(),
            numsites,
            smooth,
            &dated_path.display().to_string(),
        )?;
        config.flush()?;
    }

    let status = std::process::Command::new(&treepl)
        .arg(&config_path)
        .current_dir(scratch.path())
        .status()
        .map_err(|e| anyhow::anyhow!("Could not launch {}: {}", treepl.display(), e))?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "{} exited with status {}",
            treepl.display(),
            status.code().map_or("signal".to_string(), |c| c.to_string())
        ));
    }

    let ok = std::fs::metadata(&dated_path).map(|m| m.len() > 0).unwrap_or(false);
    if !ok {
        return Err(anyhow::anyhow!(
            "{} exited successfully but produced no chronogram at {}",
            treepl.display(),
            dated_path.display()
        ));
    }

    //----------------------------
    // Output
    //----------------------------
    if outfile == "stdout" {
        let content = std::fs::read_to_string(&dated_path)?;
        let mut writer = intspan::writer(outfile);
        writer.write_all(content.as_ref())?;
    } else {
        // Temp-file-then-rename: never leave a partial chronogram behind
        let dir = Path::new(outfile).parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let temp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::copy(&dated_path, temp.path())?;
        temp.persist(outfile)?;
    }

    Ok(())
}
