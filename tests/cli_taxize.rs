use assert_cmd::Command;

#[test]
fn command_taxize() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("taxize")
        .arg("tests/pipeline/names.txt")
        .arg("--dump")
        .arg("tests/pipeline/taxdump.tsv")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;

    assert!(output.status.success());

    // Header plus six resolved rows
    assert_eq!(stdout.lines().count(), 7);
    assert!(stdout.starts_with("#name\tspecies\tgenus"));
    assert!(stdout.contains("Rosa alba\t102\t101\t50\t40\t30\t20\t10"));
    assert!(stdout.contains("Prunus cerasus\t303\t301\t50\t40\t30\t20\t10"));

    // The unresolved name is skipped, not fatal
    assert!(stderr.contains("Nonexistus fake"));
    assert!(!stdout.contains("Nonexistus"));

    Ok(())
}

#[test]
fn command_taxize_missing_dump() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("phyg")?;
    let output = cmd
        .arg("taxize")
        .arg("tests/pipeline/names.txt")
        .arg("--dump")
        .arg("tests/pipeline/no_such_dump.tsv")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("no_such_dump.tsv"));

    Ok(())
}
