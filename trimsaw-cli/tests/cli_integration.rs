use assert_cmd::Command;
use predicates::str::contains;
use std::error::Error;
use tempfile::tempdir;

fn trimsaw_cmd() -> Command {
    Command::cargo_bin("trimsaw").expect("Failed to find trimsaw binary")
}

#[test]
fn help_lists_the_subcommands() -> Result<(), Box<dyn Error>> {
    trimsaw_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("trim"))
        .stdout(contains("probe"));
    Ok(())
}

#[test]
fn trim_requires_input_and_output() {
    trimsaw_cmd()
        .arg("trim")
        .assert()
        .failure()
        .stderr(contains("--input"));
}

#[test]
fn trim_rejects_missing_input() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;

    trimsaw_cmd()
        .arg("trim")
        .arg("--input")
        .arg("surely/this/does/not/exist.mp4")
        .arg("--output")
        .arg(output_dir.path())
        .assert()
        .failure()
        .stderr(contains("invalid input path"));
    Ok(())
}

#[test]
fn trim_rejects_unknown_method() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let output_dir = tempdir()?;
    let input = input_dir.path().join("clip.mp4");
    std::fs::write(&input, b"dummy content")?;

    trimsaw_cmd()
        .arg("trim")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(output_dir.path())
        .arg("--method")
        .arg("magick")
        .assert()
        .failure()
        .stderr(contains("unknown conversion method"));
    Ok(())
}

#[test]
fn trim_rejects_non_numeric_length() {
    trimsaw_cmd()
        .arg("trim")
        .arg("--input")
        .arg("clip.mp4")
        .arg("--output")
        .arg("out")
        .arg("--length")
        .arg("abc")
        .assert()
        .failure()
        .stderr(contains("invalid value"));
}

#[test]
fn probe_requires_a_locator() {
    trimsaw_cmd()
        .arg("probe")
        .assert()
        .failure()
        .stderr(contains("LOCATOR"));
}
