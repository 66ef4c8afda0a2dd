// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
[pipeline]
persist_directory = "./store"
collection_name = "test_news"

[embeddings]
provider = "hashing"
dimension = 128
"#;

const NEWS: &str = r#"[
  {"title": "Congreso aprueba reforma", "description": "El pleno votó la reforma electoral", "link": "https://rpp.pe/politica/reforma", "published": "Mon, 13 May 2024 20:00:00 -0500"},
  {"title": "Alianza Lima gana el clásico", "description": "Los blanquiazules vencieron por dos goles", "link": "https://rpp.pe/futbol/clasico", "published": "Sun, 12 May 2024 17:45:00 -0500"},
  {"title": "Sismo de magnitud 4.5 en Ica", "description": "El IGP reportó un movimiento sin daños", "link": "https://rpp.pe/peru/sismo-ica", "published": "Sat, 11 May 2024 03:10:00 -0500"}
]"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join(".newsvecrc.toml"), CONFIG).expect("write config");
    fs::write(dir.path().join("news.json"), NEWS).expect("write news");
    dir
}

fn newsvec(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("newsvec"));
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let assert = cmd.assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    serde_json::from_str(&stdout).expect("json output")
}

#[test]
fn index_then_query_returns_closest_article() {
    let dir = workspace();

    newsvec(&dir)
        .args(["index", "news.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 3 articles into test_news"));

    let json = stdout_json(newsvec(&dir).args([
        "--format",
        "json",
        "query",
        "Sismo de magnitud 4.5 en Ica. El IGP reportó un movimiento sin daños",
        "-k",
        "2",
    ]));
    let rows = json.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["link"], "https://rpp.pe/peru/sismo-ica");
    assert_eq!(rows[0]["date_published"], "Sat, 11 May 2024 03:10:00 -0500");
}

#[test]
fn reindexing_does_not_duplicate_entries() {
    let dir = workspace();
    newsvec(&dir).args(["index", "news.json"]).assert().success();
    newsvec(&dir).args(["index", "news.json"]).assert().success();

    newsvec(&dir)
        .arg("count")
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn drop_empties_the_collection() {
    let dir = workspace();
    newsvec(&dir).args(["index", "news.json"]).assert().success();

    let json = stdout_json(newsvec(&dir).args(["--format", "json", "drop"]));
    assert_eq!(json["removed"], 3);

    let json = stdout_json(newsvec(&dir).args(["--format", "json", "count"]));
    assert_eq!(json["count"], 0);
}

#[test]
fn where_filter_limits_results() {
    let dir = workspace();
    newsvec(&dir).args(["index", "news.json"]).assert().success();

    let json = stdout_json(newsvec(&dir).args([
        "--format",
        "json",
        "query",
        "reforma",
        "--where",
        "title=Alianza Lima gana el clásico",
    ]));
    let rows = json.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "Alianza Lima gana el clásico");
}

#[test]
fn run_indexes_and_queries_in_one_step() {
    let dir = workspace();
    newsvec(&dir)
        .args(["run", "news.json", "Congreso aprueba reforma", "-k", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Congreso aprueba reforma"))
        .stdout(predicate::str::contains("https://rpp.pe/politica/reforma"));
}

#[test]
fn malformed_batch_is_reported() {
    let dir = workspace();
    fs::write(dir.path().join("bad.json"), r#"[{"title": "only"}]"#).expect("write");
    newsvec(&dir)
        .args(["index", "bad.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad.json"));
}

#[test]
fn explicit_config_overrides_local_file() {
    let dir = workspace();
    fs::write(
        dir.path().join("other.toml"),
        CONFIG.replace("test_news", "other_news"),
    )
    .expect("write config");

    newsvec(&dir)
        .args(["--config", "other.toml", "index", "news.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("other_news"));
}

#[test]
fn tokens_reports_budget() {
    let dir = workspace();
    let json = stdout_json(newsvec(&dir).args([
        "--format",
        "json",
        "tokens",
        "one two three four five six",
        "--max-tokens",
        "2",
    ]));
    assert_eq!(json["should_chunk"], true);
    assert_eq!(json["model"], "gpt-3.5-turbo");
    assert!(json["tokens"].as_u64().expect("count") > 2);
}

#[test]
fn completions_are_generated() {
    let dir = workspace();
    newsvec(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("newsvec"));
}
