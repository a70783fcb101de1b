//! Architecture checks over the evaluator crates

use std::path::PathBuf;

use architectural_enforcement::{find_violations, workspace_root, Violation};

fn production_dirs() -> Vec<PathBuf> {
    let evaluator = workspace_root().join("evaluator");
    vec![evaluator.join("core").join("src"), evaluator.join("cli").join("src")]
}

fn scan(patterns: &[&str]) -> Vec<Violation> {
    production_dirs()
        .iter()
        .flat_map(|dir| find_violations(dir, patterns))
        .collect()
}

fn report(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn no_blocking_sleep_in_production_code() {
    let violations = scan(&["std::thread::sleep", "thread::sleep("]);
    assert!(
        violations.is_empty(),
        "blocking sleep stalls the async runtime, use tokio::time::sleep:\n{}",
        report(&violations)
    );
}

#[test]
fn no_unwrap_in_production_code() {
    let violations = scan(&[".unwrap()", ".expect("]);
    assert!(
        violations.is_empty(),
        "propagate errors instead of panicking:\n{}",
        report(&violations)
    );
}

#[test]
fn core_library_uses_typed_errors() {
    let root = workspace_root().join("evaluator").join("core").join("src");
    let violations = find_violations(&root, &["anyhow"]);
    assert!(
        violations.is_empty(),
        "evaluator-core exposes thiserror types, anyhow belongs in the CLI:\n{}",
        report(&violations)
    );
}

#[test]
fn production_sources_are_found() {
    let files: Vec<PathBuf> = production_dirs()
        .iter()
        .flat_map(|dir| architectural_enforcement::rust_files(dir))
        .collect();
    assert!(files.iter().any(|f| f.ends_with("core/src/engine.rs")));
    assert!(files.iter().any(|f| f.ends_with("cli/src/main.rs")));
}
