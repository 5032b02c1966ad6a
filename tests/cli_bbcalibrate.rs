use assert_cmd::Command;

#[test]
fn command_bbcalibrate_table() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbcalibrate")
        .arg("tests/pipeline/chronogram.nwk")
        .arg("tests/pipeline/fossils.tsv")
        .arg("--table")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;

    assert!(output.status.success());

    // Two rows survive: the duplicate MRCA collapsed, the orphan dropped
    let rows: Vec<&str> = stdout.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(rows.len(), 2);

    // The oldest max_age won for the duplicated constraint
    assert!(stdout.contains("45"));
    assert!(!stdout.contains("\t30\t"));

    // Ascending by min_age, relabelled
    assert!(rows[0].starts_with("cal1\t8\t"));
    assert!(rows[1].starts_with("cal2\t12\t"));

    // The single-taxon constraint was reported
    assert!(stderr.contains("tip"));

    Ok(())
}

#[test]
fn command_bbcalibrate_missing_fossils() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbcalibrate")
        .arg("tests/pipeline/chronogram.nwk")
        .arg("tests/pipeline/no_such.tsv")
        .arg("--table")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("no_such.tsv"));

    Ok(())
}
