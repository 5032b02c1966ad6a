use assert_cmd::Command;

/// The second half of the pipeline, chained over the fixture dataset:
/// decompose the chronogram, merge clade alignments, consense the clade's
/// posterior sample, then graft.
#[test]
fn decompose_merge_graft_chain() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let clades_dir = dir.path().join("clades");

    // 1. bbdecompose
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbdecompose")
        .arg("tests/pipeline/chronogram.nwk")
        .arg("tests/pipeline/clusters.list")
        .arg("tests/pipeline/taxa.tsv")
        .arg("--dir")
        .arg(&clades_dir)
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());

    // Rosa is fully consumed by the backbone (both species are
    // exemplars): one clade remains, holding Malus + Prunus
    let rows: Vec<&str> = stdout.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("clade_001"));
    assert!(rows[0].contains("202,302"));

    let clade_dir = clades_dir.join("clade_001");
    let manifest = std::fs::read_to_string(clade_dir.join("manifest.tsv"))?;
    assert!(manifest.contains("attachment\t202,302"));
    assert!(manifest.contains("taxon\t203\tmember"));
    assert!(manifest.contains("taxon\t202\texemplar"));

    // 2. clademerge
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd.arg("clademerge").arg(&clades_dir).output()?;
    assert!(output.status.success());

    let xml = std::fs::read_to_string(clade_dir.join("clade.xml"))?;
    assert!(xml.contains("<nex:nexml"));
    assert!(xml.contains("label=\"203\""));

    // 3. consense the clade's posterior sample into the clade dir
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("consense")
        .arg("tests/pipeline/posterior.nwk")
        .arg("--burnin")
        .arg("0")
        .arg("-o")
        .arg(clade_dir.join("consensus.nwk"))
        .output()?;
    assert!(output.status.success());

    // 4. cladegraft
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("cladegraft")
        .arg("tests/pipeline/chronogram.nwk")
        .arg(&clades_dir)
        .arg("--taxa")
        .arg("tests/pipeline/taxa.tsv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout.lines().count(), 1);

    // Every input taxon appears exactly once, relabelled to display names
    for name in [
        "Rosa alba",
        "Rosa rubra",
        "Malus pumila",
        "Malus baccata",
        "Prunus avium",
        "Prunus cerasus",
    ] {
        assert_eq!(stdout.matches(name).count(), 1, "tip {}", name);
    }

    // Ids survive as annotations
    assert!(stdout.contains("id=203"));

    Ok(())
}

#[test]
fn cladegraft_keep_ids() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let clades_dir = dir.path().join("clades");

    let mut cmd = Command::cargo_bin("phyg")?;
    cmd.arg("bbdecompose")
        .arg("tests/pipeline/chronogram.nwk")
        .arg("tests/pipeline/clusters.list")
        .arg("tests/pipeline/taxa.tsv")
        .arg("--dir")
        .arg(&clades_dir)
        .assert()
        .success();

    // A hand-written ultrametric clade tree in place of inference
    std::fs::write(
        clades_dir.join("clade_001").join("consensus.nwk"),
        "((202:1,203:1):1,(302:1,303:1):1);\n",
    )?;

    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("cladegraft")
        .arg("tests/pipeline/chronogram.nwk")
        .arg(&clades_dir)
        .arg("--keep-ids")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    for tip in ["102", "103", "202", "203", "302", "303"] {
        assert_eq!(stdout.matches(tip).count(), 1, "tip {}", tip);
    }

    Ok(())
}

#[test]
fn bbdecompose_missing_backbone() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbdecompose")
        .arg("tests/pipeline/no_such.nwk")
        .arg("tests/pipeline/clusters.list")
        .arg("tests/pipeline/taxa.tsv")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("no_such.nwk"));

    Ok(())
}
