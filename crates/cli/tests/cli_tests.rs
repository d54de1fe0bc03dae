//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

const ARTICLE_URL: &str = "http://coastal.example.com/news/lighthouse-reopens";

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("perlego")
}

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

#[test]
fn test_cli_file_input() {
    cmd()
        .arg(get_fixture_path("article.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"<div id="readInner""#))
        .stdout(predicate::str::contains("granite blocks"));
}

#[test]
fn test_cli_stdin_input() {
    let html = std::fs::read_to_string(get_fixture_path("article.html")).unwrap();
    cmd()
        .arg("-")
        .write_stdin(html)
        .assert()
        .success()
        .stdout(predicate::str::contains("granite blocks"));
}

#[test]
fn test_cli_text_format() {
    cmd()
        .args(["-f", "text", &get_fixture_path("article.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Harbour Lighthouse Reopens After Two Year Restoration\n"))
        .stdout(predicate::str::contains("<p").not())
        .stdout(predicate::str::contains("Most read").not());
}

#[test]
fn test_cli_json_format() {
    let output = cmd().args(["-f", "json", "--url", ARTICLE_URL, &get_fixture_path("article.html")]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["content_extracted"], true);
    assert_eq!(json["title"], "Harbour Lighthouse Reopens After Two Year Restoration");
    assert_eq!(json["next_page_url"], "http://coastal.example.com/news/lighthouse-reopens/2");
}

#[test]
fn test_cli_base_url_resolves_links() {
    cmd()
        .args(["--url", ARTICLE_URL, &get_fixture_path("article.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"src="http://coastal.example.com/news/images/lighthouse.jpg""#));
}

#[test]
fn test_cli_reading_options() {
    cmd()
        .args(["--style", "terminal", "--margin", "extra-narrow", "--size", "large", "--no-stylesheet"])
        .arg(get_fixture_path("article.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"class="style-terminal""#))
        .stdout(predicate::str::contains(r#"class="margin-extra-narrow size-large""#))
        .stdout(predicate::str::contains("<style").not());
}

#[test]
fn test_cli_pretty_output() {
    cmd()
        .args(["--pretty", &get_fixture_path("article.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("\n  <head>"));
}

#[test]
fn test_cli_output_file() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("article.html");

    cmd()
        .args(["-o", output.to_str().unwrap()])
        .arg(get_fixture_path("article.html"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Output written to"));

    assert!(std::fs::read_to_string(&output).unwrap().contains("readOverlay"));
}

#[test]
fn test_cli_legacy_encoding() {
    cmd()
        .args(["-f", "text", &get_fixture_path("windows1250.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("łódź jeża"));
}

#[test]
fn test_cli_invalid_file() {
    cmd().arg("nonexistent.html").assert().failure().stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_cli_empty_content() {
    cmd()
        .arg(get_fixture_path("empty_content.html"))
        .assert()
        .success()
        .stderr(predicate::str::contains("No readable article content"));
}

#[test]
fn test_cli_malformed_html() {
    cmd()
        .args(["-f", "text", &get_fixture_path("malformed.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("élève"));
}

#[test]
fn test_cli_paginate_requires_url() {
    cmd()
        .args(["--paginate", &get_fixture_path("article.html")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--paginate"));
}

#[test]
fn test_cli_invalid_base_url() {
    cmd().args(["--url", "not a url", &get_fixture_path("article.html")]).assert().failure();
}

#[test]
fn test_cli_invalid_reading_style() {
    cmd().args(["--style", "gothic", &get_fixture_path("article.html")]).assert().failure();
}

#[test]
fn test_cli_verbose() {
    cmd()
        .args(["-v", &get_fixture_path("article.html")])
        .assert()
        .success()
        .stderr(predicate::str::contains("Perlego"))
        .stderr(predicate::str::contains("Timing Summary"));
}
