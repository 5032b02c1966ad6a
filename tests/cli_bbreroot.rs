use assert_cmd::Command;

#[test]
fn command_bbreroot_outgroup() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbreroot")
        .arg("stdin")
        .arg("-n")
        .arg("C")
        .write_stdin("((A:1,B:1):1,(C:1,D:4):1);")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout.lines().count(), 1);

    // C sits directly under the new root
    let tree = stdout.trim();
    assert!(tree.starts_with("(C:0.5,") || tree.contains(",C:0.5)"));

    Ok(())
}

#[test]
fn command_bbreroot_deroot() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("bbreroot")
        .arg("stdin")
        .arg("--deroot")
        .write_stdin("((A:1,B:1):1,(C:1,D:1):1);")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    // Multifurcating top level: three children at the root
    assert_eq!(stdout.matches(':').count(), 5);

    Ok(())
}

#[test]
fn command_bbreroot_missing_input() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd.arg("bbreroot").arg("tests/pipeline/no_such.nwk").output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("no_such.nwk"));

    Ok(())
}
