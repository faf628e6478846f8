mod common;

use regex::Regex;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    dir: TempDir,
    model_path: PathBuf,
}

impl TestContext {
    fn new(model: serde_json::Value) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let model_path = dir.path().join("model.json");
        std::fs::write(&model_path, model.to_string()).unwrap();
        Self { dir, model_path }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_stockforge"))
            .arg("run")
            .arg("--config")
            .arg(&self.model_path)
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to execute binary")
    }
}

fn with_reports(reports: serde_json::Value) -> serde_json::Value {
    let mut value = common::base_json();
    value["reports"] = reports;
    value
}

#[test]
fn test_basic_run_prints_reports_to_stdout() {
    let ctx = TestContext::new(with_reports(serde_json::json!([
        { "label": "header", "type": "standard_header" },
        { "label": "obj", "type": "objective_function" }
    ])));
    let output = ctx.run(&["--mode", "basic"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("*stockforge\n"), "{}", stdout);
    let total = Regex::new(r"total_score: -?\d+(\.\d+)?").unwrap();
    assert!(total.is_match(&stdout), "{}", stdout);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("RUN SUMMARY (basic)"));
}

#[test]
fn test_tabular_flag_switches_process_report() {
    let ctx = TestContext::new(with_reports(serde_json::json!([
        { "label": "fishing", "type": "process", "process": "Fishing" }
    ])));
    let output = ctx.run(&["--tabular", "--quiet"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "*process[fishing]");
    assert_eq!(lines[1], "values {d}");
    let header = Regex::new(r"^actual_catches\[Fishing\]\[2000\] ").unwrap();
    assert!(header.is_match(lines[2]), "{}", lines[2]);
    assert_eq!(*lines.last().unwrap(), "*end");
}

#[test]
fn test_mcmc_writes_sample_file() {
    let ctx = TestContext::new(with_reports(serde_json::json!([
        { "label": "samples", "type": "mcmc_sample", "file_name": "samples.txt" }
    ])));
    let output = ctx.run(&["-m", "mcmc", "-t", "2", "-q"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = std::fs::read_to_string(ctx.dir.path().join("samples.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "*mcmc_sample[samples]");
    assert_eq!(lines[2], "process[Recruitment].r0");
    // header lines, 25 kept samples, end marker
    assert_eq!(lines.len(), 3 + 25 + 1);
}

#[test]
fn test_configuration_errors_exit_with_failure() {
    let mut value = common::base_json();
    value["processes"][0]["categories"] = serde_json::json!(["ghost"]);
    let ctx = TestContext::new(value);
    let output = ctx.run(&[]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration Error"), "{}", stderr);
    assert!(stderr.contains("category ghost does not exist"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_model_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_stockforge"))
        .args(["run", "--config", "/definitely/not/here.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FATAL ERROR LOADING MODEL"));
}

#[test]
fn test_query_describes_parameters() {
    let output = Command::new(env!("CARGO_BIN_EXE_stockforge"))
        .args(["query", "process.mortality_event_biomass"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("u_max"));
    assert!(stdout.contains("catches"));
}

#[test]
fn test_query_unknown_type_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_stockforge"))
        .args(["query", "spawning"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Known types"));
}

#[test]
fn test_projection_mode_is_rejected() {
    let ctx = TestContext::new(common::base_json());
    let output = ctx.run(&["--mode", "projection"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("projection"));
}
