use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nav-server");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("spider"))
        .stdout(predicate::str::contains("seo"));
}

#[test]
fn seo_rewrites_template_under_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    std::fs::create_dir_all(root.join("data")).expect("mkdir data");
    std::fs::create_dir_all(root.join("dist/browser")).expect("mkdir dist");
    std::fs::write(
        root.join("data/db.json"),
        r#"[{"id":1,"title":"A","nav":[{"id":2,"title":"B","nav":[{"id":3,"title":"C",
        "nav":[{"name":"Docs","url":"https://docs.example"}]}]}]}]"#,
    )
    .expect("write entries");
    std::fs::write(root.join("data/settings.json"), r#"{"title":"CLI Nav"}"#)
        .expect("write settings");
    std::fs::write(
        root.join("dist/browser/index.html"),
        "<html><head><title>x</title></head><body></body></html>",
    )
    .expect("write template");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nav-server");
    cmd.args(["seo", "--root"])
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("index.html"));

    let html = std::fs::read_to_string(root.join("dist/browser/index.html")).expect("read");
    assert!(html.contains("<title>CLI Nav</title>"));
    assert!(html.contains("https://docs.example"));
}

#[test]
fn spider_without_data_fails_with_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nav-server");
    cmd.args(["spider", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("load entries"));
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nav-server");
    cmd.env("RUST_LOG", "debug")
        .args(["spider", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"));
}
