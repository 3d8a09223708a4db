use std::fs;
use std::process::Command;

use tempfile::TempDir;

const LSTM_CFG: &str = "\
[data]
train = train.txt
test = test.txt

[lstm]
batch = 2
epochs = 1
embdims = 4
units = 3
dropout = 0.1
udropout = 0.1
wdropout = 0.1
learnrt = 0.01
";

#[test]
fn lstm_fails_without_data_root() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("lstm.cfg");
    fs::write(&cfg, LSTM_CFG).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lstm"))
        .arg(&cfg)
        .env_remove("DATA_ROOT")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DATA_ROOT"), "{stderr}");
}

#[test]
fn cnn_fails_on_empty_data_root() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_cnn"))
        .arg(dir.path().join("cnn.cfg"))
        .env("DATA_ROOT", "")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn lstm_fails_on_missing_training_file() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("lstm.cfg");
    fs::write(&cfg, LSTM_CFG).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lstm"))
        .arg(&cfg)
        .env("DATA_ROOT", dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
}
