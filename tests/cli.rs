//! End-to-end runs of the `cmeta` binary against temp metadata files.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmeta(&self, file: &Path) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cmeta");
        cmd.current_dir(self.dir.path());
        cmd.env("CMETA_CONFIG_DIR", self.dir.path().join("config"));
        cmd.env("CMETA_DATA_DIR", self.dir.path().join("data"));
        cmd.env("CMETA_LOG_DIR", self.dir.path().join("logs"));
        cmd.env_remove("CMETA_PEER_ID");
        cmd.arg("--file").arg(file);
        cmd
    }

    fn json(&self, file: &Path, args: &[&str]) -> Value {
        let output = self
            .cmeta(file)
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("command printed invalid json")
    }

    /// An initialized file with one server and one database.
    fn seeded(&self, name: &str) -> PathBuf {
        let file = self.file(name);
        self.cmeta(&file).arg("init").assert().success();
        self.cmeta(&file).args(["server", "add", "s1"]).assert().success();
        self.cmeta(&file).args(["db", "create", "app"]).assert().success();
        file
    }
}

#[test]
fn init_refuses_to_overwrite() {
    let ws = Workspace::new();
    let file = ws.file("cluster.meta");
    ws.cmeta(&file).arg("init").assert().success();
    ws.cmeta(&file)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    ws.cmeta(&file).args(["init", "--force"]).assert().success();
}

#[test]
fn missing_file_is_reported() {
    let ws = Workspace::new();
    ws.cmeta(&ws.file("absent.meta"))
        .arg("inspect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cmeta init"));
}

#[test]
fn create_table_and_list_rows() {
    let ws = Workspace::new();
    let file = ws.seeded("cluster.meta");

    let created = ws.json(
        &file,
        &[
            "table", "create", "app", "users", "--replica", "s1", "--director", "s1",
            "--primary-key", "email",
        ],
    );
    let id = created["id"].as_str().expect("table id").to_string();

    let rows = ws.json(&file, &["table", "list"]);
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["id"], id.as_str());
    assert_eq!(rows[0]["db"], "app");
    assert_eq!(rows[0]["primary_key"], "email");

    let row = ws.json(&file, &["table", "get", &id]);
    assert_eq!(row["name"], "users");

    ws.cmeta(&file)
        .args(["table", "get", "not-a-uuid", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("null"));
}

#[test]
fn split_points_make_more_shards() {
    let ws = Workspace::new();
    let file = ws.seeded("cluster.meta");
    ws.json(
        &file,
        &[
            "table", "create", "app", "events", "--replica", "s1", "--director", "s1",
            "--split-point", "m",
        ],
    );
    let rows = ws.json(&file, &["table", "list"]);
    assert_eq!(rows[0]["shards"].as_array().map(Vec::len), Some(2));
    assert_eq!(rows[0]["shards"][0]["split_point"], "m");
}

#[test]
fn director_must_be_known_server() {
    let ws = Workspace::new();
    let file = ws.seeded("cluster.meta");
    ws.cmeta(&file)
        .args(["table", "create", "app", "users", "--replica", "ghost", "--director", "ghost"])
        .assert()
        .failure();
}

#[test]
fn dropped_database_disappears_from_listing() {
    let ws = Workspace::new();
    let file = ws.seeded("cluster.meta");
    ws.json(&file, &["table", "create", "app", "users", "--replica", "s1", "--director", "s1"]);

    let dropped = ws.json(&file, &["db", "drop", "app"]);
    assert_eq!(dropped["dropped_tables"], 1);

    let dbs = ws.json(&file, &["db", "list"]);
    assert_eq!(dbs, Value::Array(vec![]));
    let summary = ws.json(&file, &["inspect"]);
    assert_eq!(summary["databases"], 0);
    assert_eq!(summary["tombstones"], 2);
}

#[test]
fn join_merges_independent_edits() {
    let ws = Workspace::new();
    let a = ws.file("a.meta");
    ws.cmeta(&a).arg("init").assert().success();
    let b = ws.file("b.meta");
    std::fs::copy(&a, &b).expect("copy metadata");

    ws.cmeta(&a).args(["db", "create", "left"]).assert().success();
    ws.cmeta(&b).args(["db", "create", "right"]).assert().success();

    let joined = ws.json(&a, &["join", b.to_str().expect("utf-8 path")]);
    assert_eq!(joined["changed"], true);

    let names: Vec<String> = ws
        .json(&a, &["db", "list"])
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|row| row["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"left".to_string()));
    assert!(names.contains(&"right".to_string()));

    let again = ws.json(&a, &["join", b.to_str().expect("utf-8 path")]);
    assert_eq!(again["changed"], false);
}

#[test]
fn directory_document_names_the_machine() {
    let ws = Workspace::new();
    let file = ws.seeded("cluster.meta");
    let servers = ws.json(&file, &["server", "list"]);
    let machine = servers[0]["id"].as_str().expect("server id").to_string();

    ws.cmeta(&file)
        .args(["directory", "s1", "--ip", "10.0.0.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(machine))
        .stdout(predicate::str::contains("10.0.0.1"));
}

#[test]
fn demo_forwards_every_write() {
    let ws = Workspace::new();
    let file = ws.file("unused.meta");
    let out = ws.json(&file, &["demo", "--writes", "4"]);
    assert_eq!(out["results"].as_array().map(Vec::len), Some(4));
    assert_eq!(out["forwarded"].as_array().map(Vec::len), Some(4));
    assert_eq!(out["backfilled"], 4);

    let local = ws.json(&file, &["demo", "--writes", "2", "--no-master"]);
    assert_eq!(local["forwarded"], Value::Array(vec![]));
}
