use std::process::Command;

use pretty_assertions::assert_eq;

fn csvxl() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("csvxl"))
}

#[test]
fn csv_round_trips_through_a_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("people.csv");
    let xlsx = dir.path().join("people.xlsx");
    std::fs::write(&csv, "Id,Name,Age\n,Bill,40\n5,Ben,30\n").unwrap();

    let status = csvxl()
        .args(["from-csv"])
        .arg(&csv)
        .arg(&xlsx)
        .args(["--sheet", "People", "--row-offset", "2", "--column-offset", "1"])
        .status()
        .expect("run from-csv");
    assert!(status.success());
    assert!(xlsx.exists());

    let output = csvxl()
        .arg("to-csv")
        .arg(&xlsx)
        .args(["--sheet", "People", "--row-offset", "2", "--column-offset", "1"])
        .output()
        .expect("run to-csv");
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "Id,Name,Age\n,Bill,40\n5,Ben,30\n"
    );
}

#[test]
fn to_csv_writes_to_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("in.csv");
    let xlsx = dir.path().join("book.xlsx");
    let out = dir.path().join("out.csv");
    std::fs::write(&csv, "a;b\n1;2\n").unwrap();

    let status = csvxl()
        .arg("from-csv")
        .arg(&csv)
        .arg(&xlsx)
        .args(["--delimiter", ";"])
        .status()
        .unwrap();
    assert!(status.success());

    let status = csvxl()
        .arg("to-csv")
        .arg(&xlsx)
        .arg("--output")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "a,b\n1,2\n");
}

#[test]
fn from_csv_sanitizes_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("in.csv");
    let xlsx = dir.path().join("book.xlsx");
    std::fs::write(&csv, "cmd\n=1+1\n").unwrap();

    let status = csvxl()
        .arg("from-csv")
        .arg(&csv)
        .arg(&xlsx)
        .arg("--sanitize")
        .status()
        .unwrap();
    assert!(status.success());

    let output = csvxl().arg("to-csv").arg(&xlsx).output().unwrap();
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "cmd\n'=1+1\n");
}

#[test]
fn missing_workbook_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let output = csvxl()
        .arg("to-csv")
        .arg(dir.path().join("nope.xlsx"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.xlsx"));
}
