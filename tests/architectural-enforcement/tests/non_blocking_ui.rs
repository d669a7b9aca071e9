//! Integration Test: Non-Blocking UI Loop
//!
//! The terminal loop and everything it calls while a reply streams must
//! only ever check for data. A blocking receive or a sleep on that path
//! freezes input and redraw until the daemon sends the next chunk.
//!
//! **Required**: `try_recv` for the stream channels, `tokio::time` deadlines
//! in the event loop, async I/O everywhere inside `async fn`.

use architectural_enforcement::{scan_dir, scan_file, Rule, Violation};
use std::path::Path;

const UI_LOOP_RULES: &[Rule] = &[
    Rule {
        pattern: "blocking_recv",
        description: "Blocking channel receive",
        async_only: false,
    },
    Rule {
        pattern: "blocking_send",
        description: "Blocking channel send",
        async_only: false,
    },
    Rule {
        pattern: "std::thread::sleep",
        description: "Thread sleep",
        async_only: false,
    },
    Rule {
        pattern: "block_on(",
        description: "Nested runtime block_on",
        async_only: false,
    },
    Rule {
        pattern: "reqwest::blocking",
        description: "Blocking HTTP client",
        async_only: false,
    },
];

const POLL_PATH_RULES: &[Rule] = &[Rule {
    pattern: ".recv().await",
    description: "Awaiting a stream channel on the poll path",
    async_only: false,
}];

const ASYNC_IO_RULES: &[Rule] = &[
    Rule {
        pattern: "std::fs::",
        description: "Blocking file I/O in async code",
        async_only: true,
    },
    Rule {
        pattern: "std::net::",
        description: "Blocking network I/O in async code",
        async_only: true,
    },
];

fn report(violations: &[Violation], headline: &str) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n{headline}\n");
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("\nFound {} violation(s). Fix these before merging!", violations.len());
}

#[test]
fn test_ui_loop_never_blocks() {
    let mut violations = scan_dir("tui/src", UI_LOOP_RULES);
    violations.extend(scan_dir("dashboard/core/src", UI_LOOP_RULES));
    report(&violations, "Blocking calls found on the UI path:");
}

#[test]
fn test_poll_path_only_tries() {
    let mut violations = Vec::new();
    for file in [
        "dashboard/core/src/consumer.rs",
        "dashboard/core/src/session.rs",
    ] {
        violations.extend(scan_file(Path::new(file), POLL_PATH_RULES));
    }
    report(&violations, "The consumer must use try_recv, never an awaited receive:");
}

#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = scan_dir("tui/src", ASYNC_IO_RULES);
    violations.extend(scan_dir("dashboard/core/src", ASYNC_IO_RULES));
    report(&violations, "Blocking I/O found inside async functions:");
}

#[test]
fn test_scanned_sources_exist() {
    // A moved tree would make every scan pass vacuously
    for file in [
        "tui/src/app.rs",
        "dashboard/core/src/consumer.rs",
        "dashboard/core/src/session.rs",
    ] {
        assert!(
            architectural_enforcement::workspace_root().join(file).exists(),
            "{file} not found"
        );
    }
}
