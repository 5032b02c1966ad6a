use assert_cmd::Command;

#[test]
fn command_bbinfer_unknown_tool() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let matrix = dir.path().join("m.phy");
    std::fs::write(&matrix, "2 4\na  ACGT\nb  ACGA\n")?;

    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbinfer")
        .arg(&matrix)
        .arg("--tool")
        .arg("iqtree")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("raxml|examl|exabayes|phyml"));

    Ok(())
}

#[test]
fn command_bbinfer_missing_matrix() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd.arg("bbinfer").arg("tests/pipeline/no_such.phy").output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("no_such.phy"));

    Ok(())
}

#[test]
fn command_bbinfer_bootstrap_refused_for_bayesian() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let matrix = dir.path().join("m.phy");
    std::fs::write(&matrix, "2 4\na  ACGT\nb  ACGA\n")?;

    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbinfer")
        .arg(&matrix)
        .arg("--tool")
        .arg("exabayes")
        .arg("--bootstraps")
        .arg("10")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("posterior"));

    Ok(())
}
