use serde_json::Value;
use std::process::Command;

const ROOT_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
const ACCOUNT_XPUB: &str = "xpub6Cxnxy4QXvNbJ3xCdTDGNUvb99WATLXPSHnPCmwAw9qNJLp1tRkSn6zXtEF8RTX8VPKYNYKKHvAv1TzDicK3hS6k6wDjTCfJbhVi9vwnM9d";

fn cli() -> Command {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("custody-signer"));
    for var in [
        "CUSTODIAN_URL",
        "CUSTODIAN_API_KEY",
        "CUSTODIAN_API_SECRET",
        "CUSTODIAN_API_SECRET_FILE",
    ] {
        command.env_remove(var);
    }
    command
}

#[test]
fn derive_xpub_prints_account_xpub() {
    let output = cli().args(["derive-xpub", ROOT_XPUB]).output().expect("cli runs");

    assert!(output.status.success(), "cli failed: {:?}", output);
    let stdout = String::from_utf8(output.stdout).expect("stdout is utf8");
    assert_eq!(stdout.trim(), format!("Account path xPub: {}", ACCOUNT_XPUB));
}

#[test]
fn derive_xpub_json_output() {
    let output = cli()
        .args(["--json", "derive-xpub", ROOT_XPUB])
        .output()
        .expect("cli runs");

    assert!(output.status.success(), "cli failed: {:?}", output);
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout is valid json");
    assert_eq!(value["xpub"], ACCOUNT_XPUB);
}

#[test]
fn derive_xpub_rejects_garbage() {
    let output = cli().args(["derive-xpub", "not-an-xpub"]).output().expect("cli runs");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot derive account xpub"), "stderr: {}", stderr);
}

#[test]
fn status_requires_configuration() {
    let output = cli().args(["status", "abcdef"]).output().expect("cli runs");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CUSTODIAN_URL"), "stderr: {}", stderr);
}
