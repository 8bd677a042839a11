use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn evalboard_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("evalboard");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/evalboard.sqlite"

[server]
bind = "127.0.0.1:7340"

[feedback]
page_size = 10
"#,
        root.display()
    );

    let config_path = config_dir.join("evalboard.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_evalboard(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = evalboard_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run evalboard binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn rating(id: &str, user: &str, model: &str, value: Value, ts: i64) -> Value {
    json!({
        "id": id,
        "user_id": user,
        "version": 0,
        "type": "rating",
        "data": {"model_id": model, "rating": value},
        "meta": null,
        "snapshot": null,
        "created_at": ts,
        "updated_at": ts
    })
}

/// Writes `rows` next to the config and imports them.
fn import_rows(config_path: &Path, rows: &Value) {
    let file = config_path.parent().unwrap().join("import.json");
    fs::write(&file, serde_json::to_string(rows).unwrap()).unwrap();
    let (stdout, stderr, success) = run_evalboard(config_path, &["import", file.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_evalboard(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/evalboard.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_evalboard(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_evalboard(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_reviews_empty_database() {
    let (_tmp, config_path) = setup_test_env();
    run_evalboard(&config_path, &["init"]);

    let (stdout, stderr, success) = run_evalboard(&config_path, &["reviews", "--json"]);
    assert!(success, "reviews failed: stderr={}", stderr);
    let body: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(body, json!({"entries": []}));

    let (stdout, _, success) = run_evalboard(&config_path, &["reviews"]);
    assert!(success);
    assert!(stdout.contains("No rated feedback"));
}

#[test]
fn test_reviews_ranking_after_import() {
    let (_tmp, config_path) = setup_test_env();
    run_evalboard(&config_path, &["init"]);

    let mut rows = Vec::new();
    for i in 0..8 {
        rows.push(rating(&format!("p{}", i), "u1", "steady", json!(1), 100 + i));
    }
    rows.push(rating("n0", "u1", "steady", json!(-1), 200));
    rows.push(rating("n1", "u2", "steady", json!("-1"), 201));
    rows.push(rating("lucky", "u2", "lucky", json!("1"), 300));
    rows.push(rating("bad", "u2", "grumpy", json!(-1), 301));
    // Unrecognized ratings are skipped.
    rows.push(rating("meh", "u2", "grumpy", json!("0"), 302));
    // Non-rating feedback never reaches the leaderboard.
    rows.push(json!({
        "id": "c1", "user_id": "u1", "type": "comment",
        "data": {"model_id": "ghost", "rating": 1},
        "created_at": 400, "updated_at": 400
    }));
    import_rows(&config_path, &Value::Array(rows));

    let (stdout, stderr, success) = run_evalboard(&config_path, &["reviews", "--json"]);
    assert!(success, "reviews failed: stderr={}", stderr);
    let body: Value = serde_json::from_str(&stdout).unwrap();
    let entries = body["entries"].as_array().unwrap();

    let order: Vec<&str> = entries
        .iter()
        .map(|e| e["model_id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["steady", "lucky", "grumpy"]);

    assert_eq!(entries[0]["score"], json!(0.6364));
    assert_eq!(entries[0]["total"], json!(10));
    assert_eq!(entries[0]["positive"], json!(8));
    assert_eq!(entries[0]["negative"], json!(2));

    assert_eq!(entries[1]["score"], json!(0.5227));

    assert_eq!(entries[2]["score"], json!(0.4773));
    assert_eq!(entries[2]["total"], json!(1));
    assert_eq!(entries[2]["positive"], json!(0));
    assert_eq!(entries[2]["negative"], json!(1));
}

#[test]
fn test_export_import_roundtrip() {
    let (tmp, config_path) = setup_test_env();
    run_evalboard(&config_path, &["init"]);

    import_rows(
        &config_path,
        &json!([
            rating("a", "u1", "m1", json!(1), 10),
            rating("b", "u2", "m2", json!(-1), 20),
        ]),
    );

    let out = tmp.path().join("out/export.json");
    let (_, stderr, success) =
        run_evalboard(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success, "export failed: stderr={}", stderr);
    assert!(stderr.contains("Exported 2"));

    let exported: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported.as_array().unwrap().len(), 2);

    // Import into a fresh database yields the same leaderboard.
    let (_tmp2, other_config) = setup_test_env();
    let (_, stderr, success) =
        run_evalboard(&other_config, &["import", out.to_str().unwrap()]);
    assert!(success, "import failed: stderr={}", stderr);

    let (first, _, _) = run_evalboard(&config_path, &["reviews", "--json"]);
    let (second, _, _) = run_evalboard(&other_config, &["reviews", "--json"]);
    let first: Value = serde_json::from_str(&first).unwrap();
    let second: Value = serde_json::from_str(&second).unwrap();
    assert_eq!(first, second);
    assert_eq!(first["entries"].as_array().unwrap().len(), 2);
}

#[test]
fn test_import_rejects_malformed_file() {
    let (tmp, config_path) = setup_test_env();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, "{\"not\": \"an array\"}").unwrap();

    let (_, stderr, success) = run_evalboard(&config_path, &["import", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("not a feedback export"));
}

#[test]
fn test_stats_reports_counts() {
    let (_tmp, config_path) = setup_test_env();
    run_evalboard(&config_path, &["init"]);
    import_rows(
        &config_path,
        &json!([
            rating("a", "u1", "m1", json!(1), 10),
            rating("b", "u2", "m1", json!(-1), 20),
        ]),
    );

    let (stdout, stderr, success) = run_evalboard(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("rating"));
    assert!(stdout.contains("m1"));
}

#[test]
fn test_hash_token_without_config() {
    let (stdout, _, success) = run_evalboard(Path::new("/nonexistent/evalboard.toml"), &[
        "hash-token",
        "test",
    ]);
    assert!(success);
    assert_eq!(
        stdout.trim(),
        "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    );
}

#[test]
fn test_missing_config_fails() {
    let (_, stderr, success) = run_evalboard(Path::new("/nonexistent/evalboard.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
