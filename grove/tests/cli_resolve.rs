//! CLI tests for address resolution and exit codes.
//!
//! Spawns the grove binary. None of these touch git: every traversal here
//! only visits groups and lazy nodes that are skipped.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use grove::exit_codes;

fn grove(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grove"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run grove")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn init(dir: &Path) {
    let output = grove(dir, &["init", "--name", "platform"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
}

#[test]
fn commands_outside_a_workspace_fail() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = grove(temp.path(), &["tree"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("not initialized"));
}

#[test]
fn path_of_root_and_unknown_node() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical");
    init(&root);

    let output = grove(&root, &["path", "/"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).trim(), root.display().to_string());

    let output = grove(&root, &["path", "../.."]);
    assert_eq!(stdout(&output).trim(), root.display().to_string());

    let output = grove(&root, &["path", "/nope"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("does not exist"));
}

#[test]
fn lazy_node_is_listed_but_not_on_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical");
    init(&root);

    let output = grove(
        &root,
        &["add", "api", "--url", "git@example.com:api.git", "--lazy"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let manifest = fs::read_to_string(root.join("grove.yaml")).expect("manifest");
    assert!(manifest.contains("fetch: lazy"));

    let output = grove(&root, &["ls"]);
    assert_eq!(stdout(&output), "💤 api\n");

    let output = grove(&root, &["path", "api"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("does not exist"));

    let output = grove(&root, &["pull", "-r"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert!(stdout(&output).contains("/api: skipped"));
    assert!(!root.join("repos/api").exists());
}

#[test]
fn navigation_persists_between_invocations() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical");
    init(&root);

    let output = grove(&root, &["add", "tools"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));

    let tools = root.join("repos").join("tools");
    let output = grove(&root, &["nav", "tools"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), tools.display().to_string());

    let output = grove(&root, &["path", "."]);
    assert_eq!(stdout(&output).trim(), tools.display().to_string());

    let output = grove(&tools, &["path", ".."]);
    assert_eq!(stdout(&output).trim(), root.display().to_string());
}

#[test]
fn non_recursive_status_on_group_is_not_fatal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical");
    init(&root);

    let output = grove(&root, &["status", "/"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(stdout(&output), "/: not a repository\n");
}

#[test]
fn tree_prints_summary() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical");
    init(&root);
    grove(&root, &["add", "web", "--url", "u-web", "--lazy"]);
    grove(&root, &["add", "docs"]);

    let output = grove(&root, &["tree"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        "/\n💤 web\n⬇️ docs\n2 nodes: 0 cloned, 1 lazy\n"
    );
}
