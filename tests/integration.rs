use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const MANIFEST: &str = r#"{"testing": "one, two"}"#;
const DIGEST: &str = "6672b83be30e9c4956d6f5c82d896fe2937b7a4d";

fn docvault_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docvault");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Sharded documents
    let docman = root.join("docman");
    let docs = [
        ("misc/xf/ed/b673.jpg", "abc"),
        ("misc/xf/dd/ffcextrafile.html.rm20220313", "def"),
        ("misc/y6/ae/extrafile.html", "auto"),
        ("misc2021/xf/ed/b674.jpg", "shadowed"),
        ("misc/xf/ed/b674.jpg", "primary"),
    ];
    for (rel, body) in docs {
        let path = docman.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fs::write(root.join("manifest.json"), MANIFEST).unwrap();

    let config_content = format!(
        r#"[storage]
root = "{root}/docman"

[archive]
root = "{root}/iiif"

[index]
path = "{root}/data/index.sqlite"

[workers]
max = 4
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docvault.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docvault(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docvault_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docvault binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn root_of(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().to_path_buf()
}

fn store_archive(config_path: &Path) {
    let manifest = root_of(config_path).join("manifest.json");
    let (stdout, stderr, success) = run_docvault(
        config_path,
        &[
            "archive",
            "store",
            "--doc",
            "/misc/fedb67/3.jpg",
            "--doc",
            "/misc/fddffc/extrafile.html",
            "--index",
            "c:stcv:12915850",
            "--index",
            "o:lib:1,iiifsys:stcv",
            "--manifest",
            manifest.to_str().unwrap(),
            "--system",
            "foobar",
        ],
    );
    assert!(success, "store failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(DIGEST), "unexpected digest: {}", stdout);
}

#[test]
fn test_init_creates_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docvault(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docvault(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docvault(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_id_db_without_config() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing.toml");

    let (stdout, _, success) =
        run_docvault(&missing, &["id", "db", "/exchange/d8e365/richard_philips.pdf"]);
    assert!(success);
    assert_eq!(stdout.trim(), "exchange");
}

#[test]
fn test_locate_exact() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docvault(&config_path, &["id", "locate", "/misc/fedb67/3.jpg"]);
    assert!(success, "locate failed: {}", stderr);
    assert_eq!(
        PathBuf::from(stdout.trim()),
        tmp.path().join("docman/misc/xf/ed/b673.jpg")
    );
}

#[test]
fn test_locate_renamed_file() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_docvault(&config_path, &["id", "locate", "/docman/misc/fddffc/extrafile.html"]);
    assert!(success, "locate failed: {}", stderr);
    assert_eq!(
        PathBuf::from(stdout.trim()),
        tmp.path()
            .join("docman/misc/xf/dd/ffcextrafile.html.rm20220313")
    );
}

#[test]
fn test_locate_auto_shard_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) =
        run_docvault(&config_path, &["id", "locate", "/misc/extrafile.html", "--json"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["match"], "exact");
    assert!(value["path"]
        .as_str()
        .unwrap()
        .ends_with("misc/y6/ae/extrafile.html"));
}

#[test]
fn test_locate_prefers_shadow_database() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("docman/misc/__shadow__"), "misc2021\n").unwrap();

    let (stdout, _, success) = run_docvault(&config_path, &["id", "locate", "/misc/fedb67/4.jpg"]);
    assert!(success);
    assert_eq!(
        PathBuf::from(stdout.trim()),
        tmp.path().join("docman/misc2021/xf/ed/b674.jpg")
    );

    // Shadow lacks this one: falls back to the primary location.
    let (stdout, _, success) = run_docvault(&config_path, &["id", "locate", "/misc/fedb67/3.jpg"]);
    assert!(success);
    assert_eq!(
        PathBuf::from(stdout.trim()),
        tmp.path().join("docman/misc/xf/ed/b673.jpg")
    );
}

#[test]
fn test_locate_not_found_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_docvault(&config_path, &["id", "locate", "/misc/aaaaaa/none.pdf"]);
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("not found"));
}

#[test]
fn test_locate_malformed_identifier() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_docvault(&config_path, &["id", "locate", "/misc"]);
    assert!(!success);
    assert!(stderr.contains("malformed identifier"), "stderr: {}", stderr);
}

#[test]
fn test_fetch_to_file() {
    let (tmp, config_path) = setup_test_env();
    let out = tmp.path().join("out.jpg");

    let (_, stderr, success) = run_docvault(
        &config_path,
        &["id", "fetch", "/misc/fedb67/3.jpg", "--output", out.to_str().unwrap()],
    );
    assert!(success, "fetch failed: {}", stderr);
    assert_eq!(fs::read(&out).unwrap(), b"abc");
}

#[test]
fn test_fetch_missing_without_remote() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_docvault(&config_path, &["id", "fetch", "/misc/aaaaaa/none.pdf"]);
    assert!(!success);
    assert!(stderr.contains("cannot find"), "stderr: {}", stderr);
}

#[test]
fn test_digest_compute_vector() {
    let (tmp, config_path) = setup_test_env();
    let a = tmp.path().join("a.txt");
    let b = tmp.path().join("b.txt");
    fs::write(&a, "def").unwrap();
    fs::write(&b, "abc").unwrap();
    let manifest = tmp.path().join("manifest.json");

    let (stdout, stderr, success) = run_docvault(
        &config_path,
        &[
            "digest",
            "compute",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--manifest",
            manifest.to_str().unwrap(),
            "--system",
            "foobar",
        ],
    );
    assert!(success, "compute failed: {}", stderr);
    assert!(stdout.contains("filesHash: a4966be9021438019ed13e3c8e22551222bb1127"));
    assert!(stdout.contains(&format!("digest: {}", DIGEST)));
}

#[test]
fn test_digest_compute_missing_file_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope.txt");

    let (stdout, _, success) = run_docvault(
        &config_path,
        &["digest", "compute", missing.to_str().unwrap()],
    );
    assert!(!success);
    assert!(!stdout.contains("digest:"));
}

#[test]
fn test_digest_location() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_docvault(
        &config_path,
        &["digest", "location", "e1e53b3d6b74c2e7ed0615ec687e68fdb61de242"],
    );
    assert!(success);
    assert_eq!(
        PathBuf::from(stdout.trim()),
        tmp.path()
            .join("iiif/24/2e/242ed16bdf86e786ce5160de7e2c47b6d3b35e1e/db.sqlite")
    );
}

#[test]
fn test_store_lookup_search() {
    let (_tmp, config_path) = setup_test_env();
    store_archive(&config_path);

    let (stdout, _, success) = run_docvault(&config_path, &["index", "lookup", "o:lib:1"]);
    assert!(success);
    assert_eq!(stdout.trim(), DIGEST);

    let (stdout, _, success) = run_docvault(&config_path, &["index", "search", DIGEST, "--json"]);
    assert!(success);
    let entries: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["identifier"], "c:stcv:12915850");
    assert_eq!(entries[0]["system"], "foobar");
}

#[test]
fn test_lookup_unknown_is_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_docvault(&config_path, &["init"]);

    let (stdout, _, success) = run_docvault(&config_path, &["index", "lookup", "c:stcv:404"]);
    assert!(success);
    assert!(stdout.trim().is_empty());

    let (stdout, _, success) = run_docvault(&config_path, &["index", "search", "c:stcv:404"]);
    assert!(success);
    assert!(stdout.contains("No entries."));
}

#[test]
fn test_manifest_and_harvest() {
    let (tmp, config_path) = setup_test_env();
    store_archive(&config_path);

    let (stdout, _, success) = run_docvault(&config_path, &["digest", "manifest", DIGEST]);
    assert!(success);
    assert_eq!(stdout.trim(), MANIFEST);

    let out = tmp.path().join("harvested.html");
    let code = format!("{}00000002.html", DIGEST);
    let (_, stderr, success) = run_docvault(
        &config_path,
        &["digest", "harvest", &code, "--output", out.to_str().unwrap()],
    );
    assert!(success, "harvest failed: {}", stderr);
    assert_eq!(fs::read(&out).unwrap(), b"def");
}

#[test]
fn test_manifest_set_refreshes_index() {
    let (tmp, config_path) = setup_test_env();
    store_archive(&config_path);

    let search = |config: &Path| -> Vec<serde_json::Value> {
        let (stdout, _, success) = run_docvault(config, &["index", "search", DIGEST, "--json"]);
        assert!(success);
        serde_json::from_str(&stdout).unwrap()
    };
    let before = search(&config_path);

    std::thread::sleep(std::time::Duration::from_millis(50));
    let updated = tmp.path().join("updated.json");
    fs::write(&updated, r#"{"label": "updated"}"#).unwrap();
    let (stdout, stderr, success) = run_docvault(
        &config_path,
        &["digest", "manifest", DIGEST, "--set", updated.to_str().unwrap()],
    );
    assert!(success, "manifest --set failed: {}", stderr);
    assert!(stdout.contains("index entries: 2"));

    let (stdout, _, _) = run_docvault(&config_path, &["digest", "manifest", DIGEST]);
    assert_eq!(stdout.trim(), r#"{"label": "updated"}"#);

    let (stdout, _, success) =
        run_docvault(&config_path, &["archive", "inspect", DIGEST, "--json"]);
    assert!(success);
    let inspected: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    let after = search(&config_path);
    assert_eq!(after.len(), 2);
    for entry in &after {
        assert_eq!(entry["meta_time"], inspected["meta_time"]);
        assert_eq!(entry["digest"], DIGEST);
    }
    assert_ne!(after[0]["meta_time"], before[0]["meta_time"]);
}

#[test]
fn test_archive_inspect_lists_files() {
    let (_tmp, config_path) = setup_test_env();
    store_archive(&config_path);

    let (stdout, stderr, success) = run_docvault(&config_path, &["archive", "inspect", DIGEST]);
    assert!(success, "inspect failed: {}", stderr);
    assert!(stdout.contains("system: foobar"));
    assert!(stdout.contains("files: 2"));
    assert!(stdout.contains("00000001.jpg"));
    assert!(stdout.contains("/misc/fddffc/extrafile.html"));

    let (_, stderr, success) = run_docvault(
        &config_path,
        &["archive", "inspect", "e1e53b3d6b74c2e7ed0615ec687e68fdb61de242"],
    );
    assert!(!success);
    assert!(stderr.contains("cannot find"), "stderr: {}", stderr);
}

#[test]
fn test_rebuild_restores_index() {
    let (tmp, config_path) = setup_test_env();
    store_archive(&config_path);

    // Lose the index, then rebuild it from the archive.
    fs::remove_dir_all(tmp.path().join("data")).unwrap();

    let (stdout, stderr, success) =
        run_docvault(&config_path, &["index", "rebuild", "--progress", "json"]);
    assert!(success, "rebuild failed: {}", stderr);
    assert!(stdout.contains("archives: 1"));
    assert!(stdout.contains("entries: 2"));
    assert!(stderr.contains("\"phase\":\"reading\""));

    let (stdout, _, _) = run_docvault(&config_path, &["index", "lookup", "c:stcv:12915850"]);
    assert_eq!(stdout.trim(), DIGEST);

    // Second rebuild gives the same counts.
    let (again, _, success) =
        run_docvault(&config_path, &["index", "rebuild", "--progress", "off"]);
    assert!(success);
    assert!(again.contains("archives: 1"));
    assert!(again.contains("entries: 2"));
}

#[test]
fn test_digest_delete() {
    let (tmp, config_path) = setup_test_env();
    store_archive(&config_path);
    let archive = tmp
        .path()
        .join("iiif/d4/a7/d4a7b7392ef698d28c5f6d6594c9e03eb38b2766/db.sqlite");
    assert!(archive.exists());

    let (stdout, stderr, success) = run_docvault(&config_path, &["digest", "delete", DIGEST]);
    assert!(success, "delete failed: {}", stderr);
    assert!(stdout.contains("archive removed: true"));
    assert!(stdout.contains("index entries removed: 2"));

    let (stdout, _, _) = run_docvault(&config_path, &["index", "lookup", "o:lib:1"]);
    assert!(stdout.trim().is_empty());
    assert!(!archive.exists());
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content = content.replace("max = 4", "max = 0");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_docvault(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("workers.max"));
}
