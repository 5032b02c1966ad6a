use assert_cmd::Command;

#[test]
fn command_classify() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("classify")
        .arg("tests/pipeline/taxa.tsv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(output.status.success());
    assert_eq!(stdout.lines().count(), 1);

    // Species tips carry display names and id annotations
    assert!(stdout.contains("'Rosa alba'"));
    assert!(stdout.contains("id=102"));

    // Two Rosa species group under the genus node
    assert!(stdout.contains("('Rosa alba'[&&NHX:id=102],'Rosa rubra'[&&NHX:id=103])"));

    Ok(())
}

#[test]
fn command_classify_empty_input() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let empty = dir.path().join("empty.tsv");
    std::fs::write(&empty, "")?;

    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd.arg("classify").arg(&empty).output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("empty"));

    Ok(())
}
