//! Architectural Enforcement Integration Tests
//!
//! Source scanners backing the tests in `tests/`. They enforce:
//! - The UI loop never blocks on a stream (no blocking receive, no sleeps)
//! - Async code never performs blocking I/O
//!
//! The scan is textual. Comments and test code are skipped; everything
//! after the first `#[cfg(test)]` in a file counts as test code.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A forbidden pattern and why
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Substring that must not appear in production code
    pub pattern: &'static str,
    /// Shown in the failure report
    pub description: &'static str,
    /// Only flag occurrences inside `async fn` bodies
    pub async_only: bool,
}

/// One rule hit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the hit
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Rule description
    pub description: &'static str,
    /// Offending line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.description,
            self.text
        )
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Scan every `.rs` file under `dir` (relative to the workspace root)
pub fn scan_dir(dir: &str, rules: &[Rule]) -> Vec<Violation> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    for entry in walkdir::WalkDir::new(&path)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            violations.extend(scan_file(entry.path(), rules));
        }
    }
    violations
}

/// Scan one file (relative to the workspace root when not absolute)
pub fn scan_file(path: &Path, rules: &[Rule]) -> Vec<Violation> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root().join(path)
    };
    match fs::read_to_string(&full) {
        Ok(content) => scan_source(&full, &content, rules),
        Err(_) => Vec::new(),
    }
}

/// Scan source text
pub fn scan_source(path: &Path, content: &str, rules: &[Rule]) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let test_start = lines
        .iter()
        .position(|l| l.trim().starts_with("#[cfg(test)]"))
        .unwrap_or(lines.len());

    let mut violations = Vec::new();
    for (idx, line) in lines.iter().enumerate().take(test_start) {
        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        if is_in_test_function(&lines, idx) {
            continue;
        }

        for rule in rules {
            if !code_part.contains(rule.pattern) {
                continue;
            }
            if rule.async_only && !is_in_async_function(&lines, idx) {
                continue;
            }
            violations.push(Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                description: rule.description,
                text: line.trim().to_string(),
            });
        }
    }
    violations
}

/// Check if line is inside a test function
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    // Scan backwards to find the enclosing function
    let mut found_fn_idx = None;
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("fn ") || line.contains(" fn ") {
            found_fn_idx = Some(i);
            break;
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }

    let Some(fn_idx) = found_fn_idx else {
        return false;
    };

    // Attributes directly above the signature
    for i in (0..fn_idx).rev() {
        let line = lines[i].trim();
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !line.starts_with("#[") && !line.starts_with("///") {
            break;
        }
    }
    false
}

/// Check if line is inside an async function
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    // The line itself may be the signature
    for i in (0..=current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return true;
        }
        if line.starts_with("fn ") || line.contains(" fn ") {
            return false;
        }

        // Stop at module/impl boundaries
        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLEEP: Rule = Rule {
        pattern: "std::thread::sleep",
        description: "Blocking sleep",
        async_only: false,
    };

    const FS: Rule = Rule {
        pattern: "std::fs::",
        description: "Blocking file I/O",
        async_only: true,
    };

    #[test]
    fn test_flags_production_line() {
        let src = "fn tick() {\n    std::thread::sleep(d);\n}\n";
        let hits = scan_source(Path::new("x.rs"), src, &[SLEEP]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 2);
    }

    #[test]
    fn test_skips_comments_and_test_module() {
        let src = "fn tick() {\n    // std::thread::sleep(d);\n}\n#[cfg(test)]\nmod tests {\n    fn t() { std::thread::sleep(d); }\n}\n";
        assert!(scan_source(Path::new("x.rs"), src, &[SLEEP]).is_empty());
    }

    #[test]
    fn test_skips_test_functions() {
        let lines = vec!["#[tokio::test]", "async fn test_it() {", "    std::thread::sleep(d);", "}"];
        assert!(is_in_test_function(&lines, 2));
    }

    #[test]
    fn test_async_only_rule() {
        let sync_src = "fn load() {\n    std::fs::read_to_string(p);\n}\n";
        assert!(scan_source(Path::new("x.rs"), sync_src, &[FS]).is_empty());

        let async_src = "async fn load() {\n    std::fs::read_to_string(p);\n}\n";
        assert_eq!(scan_source(Path::new("x.rs"), async_src, &[FS]).len(), 1);
    }
}
