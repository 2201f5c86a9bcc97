//! Integration tests for the deploykit CLI
//!
//! These tests run the actual binary against a project written to a temp
//! directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const PROJECT: &str = r#"
[compiler]
version = "0.8.4"

[networks.hardhat]
gas_price = 1000000000

[networks.polygon]
url = "https://matic-mainnet.chainstacklabs.com/"
gas_price = 120000000000

[networks.polygon.accounts]
mnemonic_env = "DEPLOYKIT_TEST_MAINNET_MNEMONIC"
count = 3

[named_accounts.deployer]
default = 0

[named_accounts.protocolOwner]
default = 1
1 = "0x7E3e7545B4dE806F46A16D1F815Df5F1DB49841d"

[named_accounts.user3]
default = 5

[named_accounts.trustedForwarder]
default = 7
137 = "0x1337c0d31337c0D31337C0d31337c0d31337C0d3"

[preprocess]
remappings = "remappings.txt"
"#;

/// Get the binary to test
fn deploykit_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("deploykit").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DEPLOYKIT_NETWORK")
        .env_remove("DEPLOYKIT_TEST_MAINNET_MNEMONIC");
    cmd
}

fn project_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("deploykit.toml"), PROJECT).unwrap();
    fs::write(
        dir.path().join("remappings.txt"),
        "@openzeppelin/=./lib/openzeppelin-contracts/\n\n@foo/=./lib/foo/\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    deploykit_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("accounts"))
        .stdout(predicate::str::contains("remap"));
}

#[test]
fn test_resolve_override_and_default() {
    let dir = project_dir();
    deploykit_cmd(&dir)
        .args(["resolve", "protocolOwner", "--chain-id", "1"])
        .assert()
        .success()
        .stdout("0x7E3e7545B4dE806F46A16D1F815Df5F1DB49841d\n");

    deploykit_cmd(&dir)
        .args(["resolve", "protocolOwner", "--network", "polygon"])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn test_resolve_uses_network_env() {
    let dir = project_dir();
    deploykit_cmd(&dir)
        .env("DEPLOYKIT_NETWORK", "polygon")
        .args(["resolve", "trustedForwarder"])
        .assert()
        .success()
        .stdout("0x1337c0d31337c0D31337C0d31337c0d31337C0d3\n");
}

#[test]
fn test_resolve_unknown_role_fails() {
    let dir = project_dir();
    deploykit_cmd(&dir)
        .args(["resolve", "treasury", "--chain-id", "137"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown role: 'treasury'"));
}

#[test]
fn test_accounts_without_mnemonic() {
    let dir = project_dir();
    deploykit_cmd(&dir)
        .args(["accounts", "--network", "polygon"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Named accounts on polygon (chain 137)"))
        .stdout(predicate::str::contains("signer #0"))
        .stdout(predicate::str::contains(
            "0x1337c0d31337c0D31337C0d31337c0d31337C0d3",
        ))
        .stdout(predicate::str::contains("(outside derived signers)"));
}

#[test]
fn test_accounts_json() {
    let dir = project_dir();
    let output = deploykit_cmd(&dir)
        .args(["accounts", "--network", "hardhat", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["chain"]["chain_id"], 31337);
    assert_eq!(plan["entries"].as_array().unwrap().len(), 4);
}

#[test]
fn test_config_json_hides_mnemonic() {
    let dir = project_dir();
    deploykit_cmd(&dir)
        .env("DEPLOYKIT_TEST_MAINNET_MNEMONIC", "very_secret_phrase")
        .args(["config", "--network", "polygon", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mnemonic_set\": true"))
        .stdout(predicate::str::contains("secret").not());
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    deploykit_cmd(&dir)
        .args(["config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_remap_to_stdout() {
    let dir = project_dir();
    fs::write(
        dir.path().join("Token.sol"),
        "pragma solidity ^0.8.4;\nimport \"@foo/Token.sol\";\ncontract Token {}\n",
    )
    .unwrap();

    deploykit_cmd(&dir)
        .args(["remap", "Token.sol"])
        .assert()
        .success()
        .stdout("pragma solidity ^0.8.4;\nimport \"./lib/foo/Token.sol\";\ncontract Token {}\n");
}

#[test]
fn test_remap_multiple_files_to_out_dir() {
    let dir = project_dir();
    fs::write(
        dir.path().join("A.sol"),
        "import \"@openzeppelin/token/ERC20/ERC20.sol\";\n",
    )
    .unwrap();
    fs::write(dir.path().join("B.sol"), "contract B {}\n").unwrap();

    deploykit_cmd(&dir)
        .args(["remap", "A.sol", "B.sol", "--out-dir", "out"])
        .assert()
        .success()
        .stdout("");

    let a = fs::read_to_string(dir.path().join("out/A.sol")).unwrap();
    assert_eq!(a, "import \"./lib/openzeppelin-contracts/token/ERC20/ERC20.sol\";\n");
    let b = fs::read_to_string(dir.path().join("out/B.sol")).unwrap();
    assert_eq!(b, "contract B {}\n");
}

#[test]
fn test_remap_malformed_rules() {
    let dir = project_dir();
    fs::write(dir.path().join("bad.txt"), "@foo/=./lib/foo/\njusttext\n").unwrap();
    fs::write(dir.path().join("Token.sol"), "contract Token {}\n").unwrap();

    deploykit_cmd(&dir)
        .args(["remap", "Token.sol", "--rules", "bad.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("justtext"));
}

#[test]
fn test_remap_rejects_broken_project_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("deploykit.toml"),
        r#"
[compiler]
version = "0.8.4"

[preprocess]
remappings = "custom.txt"

[named_accounts.protocolOwner]
default = 1
1 = 2
01 = 3
"#,
    )
    .unwrap();
    fs::write(dir.path().join("custom.txt"), "@foo/=./lib/foo/\n").unwrap();
    fs::write(dir.path().join("remappings.txt"), "@foo/=./WRONG/\n").unwrap();
    fs::write(dir.path().join("A.sol"), "import \"@foo/A.sol\";\n").unwrap();

    deploykit_cmd(&dir)
        .args(["remap", "A.sol"])
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("failed to load configuration"))
        .stderr(predicate::str::contains("Ambiguous override"));
}

#[test]
fn test_remap_default_rules_next_to_config() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("project")).unwrap();
    fs::write(
        dir.path().join("project/remappings.txt"),
        "@foo/=./lib/foo/\n",
    )
    .unwrap();
    fs::write(dir.path().join("remappings.txt"), "@foo/=./WRONG/\n").unwrap();
    fs::write(dir.path().join("A.sol"), "import \"@foo/A.sol\";\n").unwrap();

    deploykit_cmd(&dir)
        .args(["--config", "project/deploykit.toml", "remap", "A.sol"])
        .assert()
        .success()
        .stdout("import \"./lib/foo/A.sol\";\n");
}

#[test]
fn test_remap_failure_writes_nothing() {
    let dir = project_dir();
    fs::write(dir.path().join("A.sol"), "import \"@foo/A.sol\";\n").unwrap();

    deploykit_cmd(&dir)
        .args(["remap", "A.sol", "Missing.sol", "--out-dir", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read Missing.sol"));

    assert!(!dir.path().join("out/A.sol").exists());
}

#[test]
fn test_dotenv_selects_network() {
    let dir = project_dir();
    fs::write(dir.path().join(".env"), "DEPLOYKIT_NETWORK=polygon\n").unwrap();

    deploykit_cmd(&dir)
        .args(["resolve", "trustedForwarder"])
        .assert()
        .success()
        .stdout("0x1337c0d31337c0D31337C0d31337c0d31337C0d3\n");
}

#[test]
fn test_accounts_with_unset_url_variable() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("deploykit.toml"),
        r#"
[compiler]
version = "0.8.4"

[networks.polygon]
url = "${DEPLOYKIT_TEST_POLYGON_RPC}"

[named_accounts.deployer]
default = 0
"#,
    )
    .unwrap();

    deploykit_cmd(&dir)
        .env_remove("DEPLOYKIT_TEST_POLYGON_RPC")
        .args(["accounts", "--network", "polygon"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signer #0"));
}
