use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Command running inside `dir` against a fresh database there
fn bizdir(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("bizdir");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env(
            "BIZDIR__GENERAL__DATABASE_PATH",
            dir.path().join("directory.sqlite"),
        );
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run bizdir");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn create_company(dir: &TempDir, name: &str) -> Value {
    json_output(bizdir(dir).args([
        "companies",
        "create",
        "--name",
        name,
        "--tax-id",
        "5260250021",
        "--address",
        "ul. Prosta 1",
        "--city",
        "Warszawa",
        "--zip",
        "00-001",
        "--json",
    ]))
}

fn create_person(dir: &TempDir, email: &str, companies: Option<&str>) -> Value {
    let mut cmd = bizdir(dir);
    cmd.args([
        "people",
        "create",
        "--first-name",
        "Jan",
        "--last-name",
        "Kowalski",
        "--email",
        email,
        "--json",
    ]);
    if let Some(companies) = companies {
        cmd.args(["--companies", companies]);
    }
    json_output(&mut cmd)
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("bizdir.toml");

    bizdir(&dir)
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("database_path"));
    assert!(content.contains("transaction_attempts = 5"));

    bizdir(&dir)
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn config_show_applies_environment_overrides() {
    let dir = TempDir::new().expect("temp dir");

    bizdir(&dir)
        .env("BIZDIR__LISTING__DEFAULT_TAKE", "25")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_take = 25"));
}

#[test]
fn tax_id_validate_accepts_and_rejects() {
    let dir = TempDir::new().expect("temp dir");

    bizdir(&dir)
        .args(["tax-id", "validate", "5260250021"])
        .assert()
        .success();

    bizdir(&dir)
        .args(["tax-id", "validate", "1234567890"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error[422]"));
}

#[test]
fn tax_id_generate_is_reproducible_with_seed() {
    let dir = TempDir::new().expect("temp dir");

    let run = || {
        bizdir(&dir)
            .args(["tax-id", "generate", "--count", "5", "--seed", "42"])
            .output()
            .expect("run generate")
    };
    let first = run();
    let second = run();

    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let stdout = String::from_utf8(first.stdout).expect("utf8");
    let ids: Vec<&str> = stdout.lines().collect();
    assert_eq!(ids.len(), 5);
    for id in ids {
        assert_eq!(id.len(), 10);
        bizdir(&dir)
            .args(["tax-id", "validate", id])
            .assert()
            .success();
    }
}

#[test]
fn company_create_and_show_by_slug() {
    let dir = TempDir::new().expect("temp dir");

    let created = create_company(&dir, "Zażółć Sp. z o.o.");
    assert_eq!(created["slug"], "zazolc-sp-z-o-o");

    let shown = json_output(bizdir(&dir).args(["companies", "show", "zazolc-sp-z-o-o", "--json"]));
    assert_eq!(shown["id"], created["id"]);

    let by_id = json_output(bizdir(&dir).args(["companies", "show", "1", "--json"]));
    assert_eq!(by_id["slug"], "zazolc-sp-z-o-o");
}

#[test]
fn company_with_invalid_tax_id_is_rejected() {
    let dir = TempDir::new().expect("temp dir");

    bizdir(&dir)
        .args([
            "companies",
            "create",
            "--name",
            "Acme",
            "--tax-id",
            "5260250022",
            "--address",
            "ul. Prosta 1",
            "--city",
            "Warszawa",
            "--zip",
            "00-001",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error[422]: tax_id"));

    let page = json_output(bizdir(&dir).args(["companies", "list", "--json"]));
    assert_eq!(page["total"], 0);
}

#[test]
fn unknown_company_is_not_found() {
    let dir = TempDir::new().expect("temp dir");

    bizdir(&dir)
        .args(["companies", "show", "missing-co"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("error[404]"));
}

#[test]
fn listing_pages_and_rejects_unknown_sort() {
    let dir = TempDir::new().expect("temp dir");
    for name in ["Delta", "Alpha", "Charlie", "Bravo", "Echo"] {
        create_company(&dir, name);
    }

    let page = json_output(bizdir(&dir).args([
        "companies",
        "list",
        "--take",
        "2",
        "--page",
        "2",
        "--order-by",
        "name",
        "--json",
    ]));
    let names: Vec<&str> = page["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|c| c["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Charlie", "Delta"]);
    assert_eq!(page["last_page"], 3);

    let all = json_output(bizdir(&dir).args(["companies", "list", "--take", "0", "--json"]));
    assert_eq!(all["data"].as_array().expect("data array").len(), 5);

    bizdir(&dir)
        .args(["companies", "list", "--order-by", "password"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("order_by"));
}

#[test]
fn attach_and_detach_people() {
    let dir = TempDir::new().expect("temp dir");
    let company = create_company(&dir, "Acme");
    let id = company["id"].to_string();
    let id = id.as_str();
    create_person(&dir, "jan@example.com", None);
    create_person(&dir, "anna@example.com", None);

    let members = json_output(bizdir(&dir).args(["companies", "attach", id, "--people", "1,2", "--json"]));
    assert_eq!(members.as_array().expect("members").len(), 2);

    // attaching again keeps the union
    let members = json_output(bizdir(&dir).args(["companies", "attach", id, "--people", "2", "--json"]));
    assert_eq!(members.as_array().expect("members").len(), 2);

    bizdir(&dir)
        .args(["companies", "attach", id, "--people", "99"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("people: unknown ids: 99"));

    bizdir(&dir)
        .args(["companies", "detach", id, "--people", "1"])
        .assert()
        .success();

    let members = json_output(bizdir(&dir).args(["companies", "members", id, "--json"]));
    let ids: Vec<i64> = members
        .as_array()
        .expect("members")
        .iter()
        .map(|p| p["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn people_filter_by_company_and_cascade_delete() {
    let dir = TempDir::new().expect("temp dir");
    create_company(&dir, "Acme");
    create_company(&dir, "Globex");
    create_person(&dir, "jan@example.com", Some("1"));
    create_person(&dir, "anna@example.com", Some("2"));

    let page = json_output(bizdir(&dir).args(["people", "list", "--companies", "1", "--json"]));
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["email"], "jan@example.com");

    bizdir(&dir)
        .args(["companies", "delete", "1"])
        .assert()
        .success();

    let companies = json_output(bizdir(&dir).args(["people", "companies", "1", "--json"]));
    assert!(companies.as_array().expect("companies").is_empty());

    let everyone = json_output(bizdir(&dir).args(["people", "list", "--json"]));
    assert_eq!(everyone["total"], 2);
}

#[test]
fn duplicate_email_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    create_person(&dir, "jan@example.com", None);

    bizdir(&dir)
        .args([
            "people",
            "create",
            "--first-name",
            "Jan",
            "--last-name",
            "Nowak",
            "--email",
            "jan@example.com",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("email: has already been taken"));
}

#[test]
fn doctor_reports_json() {
    let dir = TempDir::new().expect("temp dir");

    let report = json_output(bizdir(&dir).args(["doctor", "--json"]));
    assert_eq!(report["overall"], "ok");
    assert_eq!(report["database"]["details"]["organizations"], 0);
}
