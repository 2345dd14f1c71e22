//! CLI integration tests running the `tally` binary against a fixtures
//! directory and a temp journal, covering the write pipeline end to end:
//! gate decisions, per-id outcome tables, journaling, undo, and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

struct Env {
    tmp: TempDir,
}

impl Env {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let env = Self { tmp };
        env.seed();
        env
    }

    fn fixtures(&self) -> std::path::PathBuf {
        self.tmp.path().join("fixtures")
    }

    fn journal(&self) -> std::path::PathBuf {
        self.tmp.path().join("journal.json")
    }

    fn seed(&self) {
        std::fs::create_dir_all(self.fixtures()).unwrap();
        write_json(
            &self.fixtures().join("transactions.json"),
            &json!({
                "t1": {
                    "date": "2026-07-01",
                    "name": "Corner Grocer",
                    "amount": "-42.10",
                    "isReviewed": false,
                    "categoryId": "c1",
                    "notes": null,
                    "tagIds": [],
                    "recurringId": null
                },
                "t2": {
                    "date": "2026-07-02",
                    "name": "Coffee Cart",
                    "amount": "-4.50",
                    "isReviewed": true,
                    "categoryId": "c2",
                    "notes": null,
                    "tagIds": ["g1"],
                    "recurringId": null
                }
            }),
        );
        write_json(
            &self.fixtures().join("categories.json"),
            &json!({
                "c1": { "name": "Groceries", "emoji": "🛒", "excluded": false },
                "c2": { "name": "Dining", "emoji": "🍜", "excluded": false }
            }),
        );
        write_json(
            &self.fixtures().join("tags.json"),
            &json!({
                "g1": { "name": "work", "color": "blue" }
            }),
        );
        write_json(&self.fixtures().join("recurrings.json"), &json!({}));
    }

    /// A `tally` command isolated from the host environment.
    fn tally(&self) -> Command {
        let mut cmd = Command::cargo_bin("tally").unwrap();
        cmd.env_clear()
            .env("HOME", self.tmp.path())
            .arg("--fixtures-dir")
            .arg(self.fixtures())
            .arg("--journal")
            .arg(self.journal());
        cmd
    }

    fn transaction_field(&self, id: &str, wire_field: &str) -> Value {
        let doc: Value = serde_json::from_str(
            &std::fs::read_to_string(self.fixtures().join("transactions.json")).unwrap(),
        )
        .unwrap();
        doc[id][wire_field].clone()
    }

    fn set_transaction_field(&self, id: &str, wire_field: &str, value: Value) {
        let path = self.fixtures().join("transactions.json");
        let mut doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc[id][wire_field] = value;
        write_json(&path, &doc);
    }

    fn journal_entries(&self) -> usize {
        match std::fs::read_to_string(self.journal()) {
            Ok(raw) => serde_json::from_str::<Value>(&raw).unwrap()["entries"]
                .as_array()
                .map(|a| a.len())
                .unwrap_or(0),
            Err(_) => 0,
        }
    }
}

fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn help_and_version_exit_0() {
    let env = Env::new();
    env.tally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("undoable writes"));
    env.tally()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tally"));
}

#[test]
fn list_renders_fixture_transactions() {
    let env = Env::new();
    env.tally()
        .args(["transactions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Corner Grocer"))
        .stdout(predicate::str::contains("-$42.10"));
}

#[test]
fn review_applies_journals_and_undo_restores() {
    let env = Env::new();

    env.tally()
        .args(["--yes", "transactions", "review", "t1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("applied"))
        .stdout(predicate::str::contains("reviewed: false -> true"));
    assert_eq!(env.transaction_field("t1", "isReviewed"), json!(true));
    assert_eq!(env.journal_entries(), 1);

    env.tally()
        .args(["--yes", "undo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"));
    assert_eq!(env.transaction_field("t1", "isReviewed"), json!(false));
    // The undo itself is journaled.
    assert_eq!(env.journal_entries(), 2);
}

#[test]
fn dry_run_previews_without_any_side_effects() {
    let env = Env::new();

    env.tally()
        .args(["--dry-run", "transactions", "review", "t1", "t2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry-run"))
        .stdout(predicate::str::contains("reviewed=true"));

    assert_eq!(env.transaction_field("t1", "isReviewed"), json!(false));
    assert_eq!(env.journal_entries(), 0);
}

#[test]
fn non_interactive_write_without_yes_refuses() {
    let env = Env::new();
    env.tally()
        .args(["transactions", "review", "t1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("refusing to write"));
    assert_eq!(env.transaction_field("t1", "isReviewed"), json!(false));
}

#[test]
fn batch_with_missing_id_is_partial_failure_exit_2() {
    let env = Env::new();
    env.tally()
        .args(["--yes", "transactions", "review", "t1", "missing", "t2"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("not found"));

    // t1 applied, t2 was already reviewed (no-op): exactly one entry.
    assert_eq!(env.transaction_field("t1", "isReviewed"), json!(true));
    assert_eq!(env.journal_entries(), 1);
}

#[test]
fn reapplying_reports_noop_and_adds_no_entry() {
    let env = Env::new();
    env.tally()
        .args(["--yes", "transactions", "review", "t1"])
        .assert()
        .success();
    env.tally()
        .args(["--yes", "transactions", "review", "t1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no-op"));
    assert_eq!(env.journal_entries(), 1);
}

#[test]
fn drifted_field_makes_undo_exit_3_with_conflict() {
    let env = Env::new();

    env.tally()
        .args([
            "--yes",
            "transactions",
            "set-category",
            "t1",
            "--category-id",
            "c2",
        ])
        .assert()
        .success();

    // A second, untracked writer moves the category to a third value.
    env.set_transaction_field("t1", "categoryId", json!("c3"));

    env.tally()
        .args(["--yes", "undo"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("conflict"))
        .stdout(predicate::str::contains("expected c2, found c3"));

    // The drifted value was not clobbered.
    assert_eq!(env.transaction_field("t1", "categoryId"), json!("c3"));
}

#[test]
fn undoing_a_superseded_entry_fails_with_explanation() {
    let env = Env::new();

    env.tally()
        .args([
            "--yes", "transactions", "set-category", "t1", "--category-id", "c2",
        ])
        .assert()
        .success();
    env.tally()
        .args([
            "--yes", "transactions", "set-category", "t1", "--category-id", "c1",
        ])
        .assert()
        .success();

    env.tally()
        .args(["--yes", "undo", "--seq", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("superseded"));
}

#[test]
fn set_category_by_name_resolves_and_applies() {
    let env = Env::new();
    env.tally()
        .args([
            "--yes",
            "transactions",
            "set-category",
            "t1",
            "--category",
            "dining",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("category_id: c1 -> c2"));
    assert_eq!(env.transaction_field("t1", "categoryId"), json!("c2"));
}

#[test]
fn tags_add_mode_merges_with_current_set() {
    let env = Env::new();
    env.tally()
        .args([
            "--yes",
            "transactions",
            "set-tags",
            "t2",
            "--mode",
            "add",
            "--tag-id",
            "g2",
        ])
        .assert()
        .success();
    let tags = env.transaction_field("t2", "tagIds");
    let tags: Vec<String> = serde_json::from_value(tags).unwrap();
    assert!(tags.contains(&"g1".to_string()));
    assert!(tags.contains(&"g2".to_string()));
}

#[test]
fn history_lists_entries_and_json_parses() {
    let env = Env::new();
    env.tally()
        .args(["--yes", "transactions", "review", "t1"])
        .assert()
        .success();

    env.tally()
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("transaction:t1"));

    let output = env
        .tally()
        .args(["--output", "json", "history"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["entries"][0]["seq"], json!(1));
    assert_eq!(parsed["entries"][0]["entity"]["id"], json!("t1"));
}

#[test]
fn undo_with_empty_journal_reports_nothing_to_undo() {
    let env = Env::new();
    env.tally()
        .args(["--yes", "undo"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nothing to undo"));
}

#[test]
fn json_outcomes_carry_per_id_status() {
    let env = Env::new();
    let output = env
        .tally()
        .args([
            "--yes",
            "--output",
            "json",
            "transactions",
            "review",
            "t1",
            "t2",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).unwrap();
    let outcomes = parsed["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["status"], json!("applied"));
    // t2 was already reviewed.
    assert_eq!(outcomes[1]["status"], json!("no-op"));
}

#[test]
fn category_edit_round_trips_through_undo() {
    let env = Env::new();
    env.tally()
        .args([
            "--yes",
            "categories",
            "edit",
            "c1",
            "--name",
            "Food & Groceries",
        ])
        .assert()
        .success();

    let doc: Value = serde_json::from_str(
        &std::fs::read_to_string(env.fixtures().join("categories.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["c1"]["name"], json!("Food & Groceries"));

    env.tally().args(["--yes", "undo"]).assert().success();
    let doc: Value = serde_json::from_str(
        &std::fs::read_to_string(env.fixtures().join("categories.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["c1"]["name"], json!("Groceries"));
}
