//! Command-line parsing and end-to-end runs against a file-backed SQLite store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::path::Path;

use clap::Parser;
use eventclean::{Cli, Command, commands::execute};

const ALICE: &str = "00000000-0000-4000-8000-00000000000a";
const BOB: &str = "00000000-0000-4000-8000-00000000000b";

fn write_sources(dir: &Path) {
    let data = dir.join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("users.csv"),
        format!("userid,subscriber,category\n{ALICE},1,A\n{BOB},0,B\n"),
    )
    .unwrap();
    std::fs::write(
        data.join("event_performance.csv"),
        format!(
            "userid,event_date,hour,points\n{ALICE},1/24/19,17,50\n{BOB},19/24/2019,9,12\n{BOB},12/31/22,12,45?\n"
        ),
    )
    .unwrap();
}

fn cli(dir: &Path, args: &[&str]) -> Cli {
    let url = format!("sqlite://{}", dir.join("events.db").display());
    let working_dir = dir.display().to_string();
    let mut argv = vec![
        "eventclean",
        "-q",
        "--database-url",
        url.as_str(),
        "--working-dir",
        working_dir.as_str(),
    ];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments parse")
}

#[test]
fn test_subcommand_is_required() {
    assert!(Cli::try_parse_from(["eventclean"]).is_err());
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["eventclean", "collect"]).is_err());
}

#[test]
fn test_password_flags_conflict() {
    let result = Cli::try_parse_from([
        "eventclean",
        "--password",
        "x",
        "--ask-password",
        "test",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_malformed_date_rejected_by_parser() {
    let result = Cli::try_parse_from(["eventclean", "--founding-date", "1/1/13", "run"]);
    assert!(result.is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["eventclean", "inspect", "-vv", "--report", "out.json"]).unwrap();
    assert_eq!(cli.global.verbose, 2);
    match cli.command {
        Command::Inspect(args) => assert_eq!(args.report.unwrap().to_str(), Some("out.json")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn test_run_writes_summary_and_backup() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let report = dir.path().join("summary.json");
    let report_arg = report.display().to_string();

    execute(&cli(dir.path(), &["run", "--report", report_arg.as_str()]))
        .await
        .expect("run succeeds");

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(summary["stage"], "CANONICAL");
    assert_eq!(summary["events"]["loaded"], 3);
    assert_eq!(summary["events"]["repaired"], 1);
    assert_eq!(summary["events"]["rejected"], 1);
    assert_eq!(summary["events"]["rejections"]["unparseable_date"], 1);

    let backup = dir.path().join("data/clean/event_performance_clean.csv");
    let contents = std::fs::read_to_string(backup).unwrap();
    assert!(contents.starts_with("userid,event_date,hour,points\n"));
    assert!(contents.contains(&format!("{BOB},2022-12-31,12,45")));
}

#[tokio::test]
async fn test_report_write_failure_still_releases_store() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let report = dir.path().join("missing/summary.json");
    let report_arg = report.display().to_string();

    let error = execute(&cli(dir.path(), &["run", "--report", report_arg.as_str()]))
        .await
        .unwrap_err();
    assert!(format!("{error:#}").contains("Failed to write report"), "{error:#}");

    // The committed store is usable by the next run
    execute(&cli(dir.path(), &["run", "--no-export"]))
        .await
        .expect("second run succeeds");
}

#[tokio::test]
async fn test_nulls_fail_run_unless_rows_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    std::fs::write(
        dir.path().join("data/users.csv"),
        format!("userid,subscriber,category\n{ALICE},1,A\n{BOB},,B\n"),
    )
    .unwrap();

    let error = execute(&cli(dir.path(), &["run"])).await.unwrap_err();
    assert!(
        format!("{error:#}").contains("Run failed at stage VALIDATED"),
        "{error:#}"
    );

    execute(&cli(dir.path(), &["run", "--reject-null-rows"]))
        .await
        .expect("run with per-row rejection succeeds");
}

#[tokio::test]
async fn test_inspect_writes_validation_report() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let report = dir.path().join("report.json");
    let report_arg = report.display().to_string();

    execute(&cli(dir.path(), &["inspect", "--report", report_arg.as_str()]))
        .await
        .expect("inspect succeeds");

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(value["events"]["row_count"], 3);
    assert!(!dir.path().join("data/clean").exists());
}

#[tokio::test]
async fn test_failed_run_names_stage() {
    let dir = tempfile::tempdir().unwrap();
    // No source files at all
    let error = execute(&cli(dir.path(), &["run"])).await.unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("Run failed at stage STAGED"), "{message}");
}

#[tokio::test]
async fn test_inverted_window_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let error = execute(&cli(
        dir.path(),
        &["--founding-date", "2024-01-01", "--cutoff-date", "2020-01-01", "test"],
    ))
    .await
    .unwrap_err();

    assert!(format!("{error:#}").contains("Invalid configuration"));
    assert!(!dir.path().join("events.db").exists());
}
