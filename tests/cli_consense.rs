use assert_cmd::Command;

#[test]
fn command_consense() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("consense")
        .arg("tests/pipeline/posterior.nwk")
        .arg("--burnin")
        .arg("0")
        .arg("--percent")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout.lines().count(), 1);

    // (202,203) and (302,303) appear in 3/4 trees
    assert!(stdout.contains("75"));

    // All four tips survive
    for tip in ["202", "203", "302", "303"] {
        assert_eq!(stdout.matches(tip).count(), 1, "tip {}", tip);
    }

    Ok(())
}

#[test]
fn command_consense_burnin_and_limit() -> anyhow::Result<()> {
    // Burnin past the sample is a usage error, not a crash
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("consense")
        .arg("tests/pipeline/posterior.nwk")
        .arg("--burnin")
        .arg("1.0")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Burnin"));

    Ok(())
}
