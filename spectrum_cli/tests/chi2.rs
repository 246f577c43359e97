#![allow(missing_docs)]

use assert_cmd::Command;
use assert_fs::NamedTempFile;
use assert_fs::prelude::*;
use predicates::str;

const DATA_STR: &str = "bins:
  - { x: 0.5, exl: 0.5, exh: 0.5, y: 1.0, eyh: 0.1, eyl: 0.1 }
  - { x: 1.5, exl: 0.5, exh: 0.5, y: 1.0, eyh: 0.1, eyl: 0.1 }
";

const COVARIANCE_STR: &str = "- [0.01, 0.0]
- [0.0, 0.01]
";

const SINGULAR_STR: &str = "- [0.0, 0.0]
- [0.0, 0.0]
";

const EXACT_STR: &str = "bins:
  - { x: 0.5, exl: 0.5, exh: 0.5, y: 1.0, eyh: 0.0, eyl: 0.0 }
  - { x: 1.5, exl: 0.5, exh: 0.5, y: 1.0, eyh: 0.0, eyl: 0.0 }
";

const SHIFTED_STR: &str = "bins:
  - { x: 0.5, exl: 0.5, exh: 0.5, y: 1.2, eyh: 0.0, eyl: 0.0 }
  - { x: 1.5, exl: 0.5, exh: 0.5, y: 1.0, eyh: 0.0, eyl: 0.0 }
";

fn yaml_file(name: &str, content: &str) -> NamedTempFile {
    let file = NamedTempFile::new(name).unwrap();
    file.write_str(content).unwrap();
    file
}

#[test]
fn help() {
    Command::cargo_bin("spectrum")
        .unwrap()
        .args(["chi2", "--help"])
        .assert()
        .success()
        .stdout(str::contains(
            "Calculates the χ² of one or more theory predictions with respect to a measurement",
        ))
        .stdout(str::contains("--threads <THREADS>"));
}

#[test]
fn default() {
    let data = yaml_file("data.yaml", DATA_STR);
    let covariance = yaml_file("covariance.yaml", COVARIANCE_STR);
    let exact = yaml_file("exact.yaml", EXACT_STR);
    let shifted = yaml_file("shifted.yaml", SHIFTED_STR);

    Command::cargo_bin("spectrum")
        .unwrap()
        .args(["chi2", "--threads=2"])
        .arg(data.path())
        .arg(covariance.path())
        .arg(exact.path())
        .arg(shifted.path())
        .assert()
        .success()
        .stdout(str::contains("0.0000   2   0.0000"))
        .stdout(str::contains("4.0000   2   2.0000"));
}

#[test]
fn singular_covariance() {
    let data = yaml_file("data.yaml", DATA_STR);
    let covariance = yaml_file("covariance.yaml", SINGULAR_STR);
    let exact = yaml_file("exact.yaml", EXACT_STR);

    Command::cargo_bin("spectrum")
        .unwrap()
        .arg("chi2")
        .arg(data.path())
        .arg(covariance.path())
        .arg(exact.path())
        .assert()
        .code(1)
        .stderr(str::contains("singular"));
}

#[test]
fn missing_theory() {
    Command::cargo_bin("spectrum")
        .unwrap()
        .args(["chi2", "data.yaml", "covariance.yaml"])
        .assert()
        .failure()
        .stderr(str::contains("<THEORY>..."));
}
