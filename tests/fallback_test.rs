use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

fn commands() -> tempfile::NamedTempFile {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "command, showtime, customer, reference, seats, value").unwrap();
    writeln!(csv, "open, S1, ops, M1, A1 A2, 10.00").unwrap();
    csv
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let csv = commands();

    let mut cmd = Command::new(cargo_bin!("boxoffice"));
    cmd.arg(csv.path()).arg("--ledger-path").arg("some_ledger");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("S1,A1,free"))
        .stderr(predicate::str::contains("WARNING: Persistent ledger requested via --ledger-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let csv = commands();

    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger");

    let mut cmd = Command::new(cargo_bin!("boxoffice"));
    cmd.arg(csv.path()).arg("--ledger-path").arg(&ledger_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARNING").not());
}
