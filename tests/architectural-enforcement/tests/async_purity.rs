//! Integration Test: Async Purity
//!
//! Production code in the client crates runs inside an async executor and
//! must not block it.

use architectural_enforcement::{check_directory, workspace_root, Rule, Violation};

const CLIENT_RULES: &[Rule] = &[
    Rule {
        pattern: "reqwest::blocking",
        reason: "Blocking HTTP client",
        allow: &[],
    },
    Rule {
        pattern: "std::thread::sleep",
        reason: "Blocking sleep",
        allow: &[],
    },
    Rule {
        pattern: "std::net::",
        reason: "Blocking network I/O",
        allow: &[],
    },
    Rule {
        pattern: "std::fs::",
        reason: "Blocking file I/O",
        allow: &["config/mod.rs"],
    },
];

fn report(violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!(
        "\nFound {} violation(s) in production code",
        violations.len()
    );
}

#[test]
fn test_core_does_not_block() {
    let dir = workspace_root().join("client/core/src");
    assert!(dir.exists(), "missing {}", dir.display());
    report(&check_directory(&dir, CLIENT_RULES));
}

#[test]
fn test_cli_does_not_block() {
    let dir = workspace_root().join("client/probe/src");
    assert!(dir.exists(), "missing {}", dir.display());
    report(&check_directory(&dir, CLIENT_RULES));
}
