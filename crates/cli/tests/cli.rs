use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn export_normalizes_markdown() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("notes.md");
    fs::write(&input, "# Area\n\n\n*circle*: $\\pi r^2$\n\n+ one\n+ two\n").unwrap();

    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("export").arg(&input);
    cmd.assert().success().stdout(predicate::eq(
        "# Area\n\n_circle_: $\\pi r^2$\n\n- one\n- two\n",
    ));
}

#[test]
fn export_writes_output_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.md");
    let output = dir.path().join("out.md");
    fs::write(&input, "$$\\int x\\,dx$$").unwrap();

    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("export").arg(&input).arg("-o").arg(&output);
    cmd.assert().success().stdout(predicate::str::is_empty());
    assert_eq!(fs::read_to_string(&output).unwrap(), "$$\\int x\\,dx$$");
}

#[test]
fn export_reads_stdin_and_reports_warnings() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("export").arg("-").write_stdin("```rust\nfn main() {}\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("fn main() {}"))
        .stderr(predicate::str::contains("warning: Unclosed code fence"));
}

#[test]
fn stats_count_each_formula_once() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("stats").arg("-").write_stdin("ab $\\frac{1}{2}$");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"characterCount\": 4"))
        .stdout(predicate::str::contains("\"mathCount\": 1"));
}

#[test]
fn config_can_hide_character_count() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"characterCount": false}"#).unwrap();

    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("--config")
        .arg(&config)
        .arg("stats")
        .arg("-")
        .write_stdin("text");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("characterCount").not());
}

#[test]
fn typed_input_is_promoted() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("type")
        .arg("-")
        .write_stdin("The value $x+1$ grows\n$$\nE=mc^2\n$$\n");
    cmd.assert()
        .success()
        .stdout(predicate::eq("The value $x+1$ grows\n\n$$E=mc^2$$\n"));
}

#[test]
fn preview_renders_math() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("preview").arg("-").write_stdin("see $a<b$");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "<span class=\"math-inline\">a&lt;b</span>",
        ));
}

#[test]
fn guard_flags_spam() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("guard")
        .arg("-")
        .write_stdin("CLICK HERE NOW!!! LIMITED TIME OFFER!!!");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"status":"unsafe","categories":["Spam"]}"#,
        ));
}

#[test]
fn guard_passes_plain_prose() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("guard").arg("-").write_stdin("The area of a circle is $\\pi r^2$.");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#"{"status":"safe","categories":[]}"#));
}

#[test]
fn missing_input_fails() {
    let mut cmd = cargo_bin_cmd!("mathmark");
    cmd.arg("export").arg("does-not-exist.md");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not read 'does-not-exist.md'"));
}
