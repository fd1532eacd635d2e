//! Architectural Enforcement
//!
//! Source scanners backing the workspace's architecture tests:
//! - No blocking HTTP or thread sleeps in production code
//! - Library code logs through `tracing`, never stdout
//! - Blocking file I/O only where configuration is loaded
//!
//! Only production code is scanned. Everything from a file's first
//! `#[cfg(test)]` onward is skipped, as are `//` comments.

use std::fs;
use std::path::{Path, PathBuf};

/// A forbidden pattern
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Substring that must not appear in production code
    pub pattern: &'static str,
    /// Shown next to each violation
    pub reason: &'static str,
    /// Path suffixes where the pattern is tolerated
    pub allow: &'static [&'static str],
}

/// One offending line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The rule's reason
    pub reason: &'static str,
    /// The trimmed source line
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.reason,
            self.text
        )
    }
}

/// Workspace root, resolved from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Production lines of a source file as `(line_number, code)` pairs
pub fn production_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| (idx + 1, strip_comment(line)))
}

/// Code part of a line, cut at the first `//` outside a string literal
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            // '"' and '\"' char literals
            b'\'' if !in_string => {
                let rest = &bytes[i + 1..];
                if rest.starts_with(b"\"'") {
                    i += 2;
                } else if rest.starts_with(b"\\\"'") {
                    i += 3;
                }
            }
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
        i += 1;
    }
    line
}

/// Check one file's content against `rules`
#[must_use]
pub fn check_source(path: &Path, content: &str, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (line, code) in production_lines(content) {
        for rule in rules {
            let allowed = rule.allow.iter().any(|suffix| path.ends_with(suffix));
            if !allowed && code.contains(rule.pattern) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line,
                    reason: rule.reason,
                    text: code.trim().to_string(),
                });
            }
        }
    }
    violations
}

/// Check every `.rs` file below `dir`
///
/// A missing directory yields no violations.
#[must_use]
pub fn check_directory(dir: &Path, rules: &[Rule]) -> Vec<Violation> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|entry| {
            let content = fs::read_to_string(entry.path()).ok()?;
            Some(check_source(entry.path(), &content, rules))
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLEEP: Rule = Rule {
        pattern: "std::thread::sleep",
        reason: "Blocking sleep",
        allow: &[],
    };

    #[test]
    fn test_comments_and_tests_are_skipped() {
        let source = "fn a() {}\n// std::thread::sleep\n#[cfg(test)]\nmod tests { std::thread::sleep(d); }\n";
        assert!(check_source(Path::new("src/a.rs"), source, &[SLEEP]).is_empty());
    }

    #[test]
    fn test_url_in_string_does_not_hide_code() {
        let source = "let u = \"http://x\"; std::thread::sleep(d);\nlet q = '\"'; // std::thread::sleep\n";
        let violations = check_source(Path::new("src/a.rs"), source, &[SLEEP]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 1);
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("let a = 1; // note"), "let a = 1; ");
        assert_eq!(strip_comment(r#"let u = "http://x";"#), r#"let u = "http://x";"#);
        assert_eq!(strip_comment(r#"let e = "a\"//b"; // c"#), r#"let e = "a\"//b"; "#);
        assert_eq!(strip_comment("// whole line"), "");
    }

    #[test]
    fn test_violation_reports_line() {
        let source = "fn a() {\n    std::thread::sleep(d);\n}\n";
        let violations = check_source(Path::new("src/a.rs"), source, &[SLEEP]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
        assert_eq!(violations[0].text, "std::thread::sleep(d);");
    }

    #[test]
    fn test_allow_list_by_suffix() {
        let rule = Rule {
            pattern: "std::fs::",
            reason: "Blocking file I/O",
            allow: &["config/mod.rs"],
        };
        let source = "let s = std::fs::read_to_string(p);\n";
        assert!(check_source(Path::new("core/src/config/mod.rs"), source, &[rule]).is_empty());
        assert_eq!(check_source(Path::new("core/src/client.rs"), source, &[rule]).len(), 1);
    }
}
