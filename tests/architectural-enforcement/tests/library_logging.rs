//! Integration Test: Library Logging
//!
//! The core library reports through `tracing`. Writing to stdout or stderr
//! is left to binaries.

use architectural_enforcement::{check_directory, workspace_root, Rule};

const PRINT_RULES: &[Rule] = &[
    Rule {
        pattern: "println!",
        reason: "Library writes to stdout",
        allow: &[],
    },
    Rule {
        pattern: "eprintln!",
        reason: "Library writes to stderr",
        allow: &[],
    },
    Rule {
        pattern: "dbg!",
        reason: "Leftover debug macro",
        allow: &[],
    },
];

#[test]
fn test_core_logs_through_tracing() {
    let violations = check_directory(&workspace_root().join("client/core/src"), PRINT_RULES);

    for violation in &violations {
        eprintln!("  {violation}");
    }
    assert!(violations.is_empty(), "{} print(s) in client/core", violations.len());
}
