use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_generated_commands_csv_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.csv");
    common::generate_commands_csv(&path, 3, 4).expect("Failed to generate CSV");

    let content = std::fs::read_to_string(&path).expect("Failed to read file");
    // Header + per showtime: one open plus a select and confirm per customer
    assert_eq!(content.lines().count(), 1 + 3 * (1 + 2 * 4));
}

#[test]
fn test_many_showtimes_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.csv");
    common::generate_commands_csv(&path, 200, 10).expect("Failed to generate CSV");

    let output = Command::new(cargo_bin!("boxoffice"))
        .arg(&path)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Binary failed to process the stream");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1 + 200 * 10);
    assert!(stdout.lines().skip(1).all(|line| line.ends_with(",booked")));
}
