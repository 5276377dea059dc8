// File: src/test_runner.rs
//
// Golden-file test runner for MacroCalc scripts.
//
// Every `*.mc` file in a directory is run with a fresh interpreter and its
// printed output compared against the sibling `*.out` snapshot. A script that
// fails contributes a final `error: <summary>` line, so expected failures are
// snapshotted too. Missing snapshots are written from the actual output.

use crate::interpreter::Interpreter;
use crate::program::run_source;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

pub const SCRIPT_EXTENSION: &str = "mc";
pub const SNAPSHOT_EXTENSION: &str = "out";

/// One script and the snapshot it is checked against
#[derive(Clone, Debug)]
pub struct TestCase {
    pub name: String,
    pub script: PathBuf,
    pub snapshot: PathBuf,
}

/// Result from executing a single script
#[derive(Clone, Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
    pub duration_ms: u128,
}

/// Runs a script and returns everything it printed, plus an `error:` line if
/// it failed.
pub fn run_script(source: &str, precision: usize) -> String {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut interp = Interpreter::new();
    interp.set_precision(precision);
    interp.set_output(buffer.clone());

    let result = run_source(source, &mut interp);

    let mut output = {
        let lock = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&lock).into_owned()
    };
    if let Err(err) = result {
        output.push_str(&format!("error: {}\n", err.summary()));
    }
    output
}

/// Test runner for a directory of golden scripts
pub struct TestRunner {
    pub tests: Vec<TestCase>,
    pub results: Vec<TestResult>,
    update_snapshots: bool,
    precision: usize,
}

impl TestRunner {
    pub fn new(update_snapshots: bool, precision: usize) -> Self {
        TestRunner { tests: Vec::new(), results: Vec::new(), update_snapshots, precision }
    }

    /// Collect all scripts in `dir`, sorted by file name
    pub fn collect_tests(&mut self, dir: &Path) -> std::io::Result<()> {
        let mut scripts: Vec<PathBuf> = fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|e| e == SCRIPT_EXTENSION).unwrap_or(false))
            .collect();
        scripts.sort();

        for script in scripts {
            let name = script
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| script.display().to_string());
            let snapshot = script.with_extension(SNAPSHOT_EXTENSION);
            self.tests.push(TestCase { name, script, snapshot });
        }
        tracing::debug!(count = self.tests.len(), dir = %dir.display(), "collected golden scripts");
        Ok(())
    }

    /// Run all collected tests and return a report
    pub fn run_all(&mut self) -> TestReport {
        let start_time = Instant::now();

        let results: Vec<TestResult> = self.tests.iter().map(|test| self.run_single_test(test)).collect();
        self.results = results;

        TestReport {
            total: self.results.len(),
            passed: self.results.iter().filter(|r| r.passed).count(),
            failed: self.results.iter().filter(|r| !r.passed).count(),
            duration_ms: start_time.elapsed().as_millis(),
            results: self.results.clone(),
        }
    }

    fn run_single_test(&self, test: &TestCase) -> TestResult {
        let start_time = Instant::now();
        let failed = |message: String| TestResult {
            name: test.name.clone(),
            passed: false,
            message: Some(message),
            duration_ms: start_time.elapsed().as_millis(),
        };

        let source = match fs::read_to_string(&test.script) {
            Ok(source) => source,
            Err(e) => return failed(format!("Failed to read {}: {}", test.script.display(), e)),
        };
        let actual = run_script(&source, self.precision);

        if self.update_snapshots || !test.snapshot.exists() {
            if let Err(e) = fs::write(&test.snapshot, &actual) {
                return failed(format!("Failed to write {}: {}", test.snapshot.display(), e));
            }
            tracing::debug!(snapshot = %test.snapshot.display(), "wrote snapshot");
        } else {
            let expected = match fs::read_to_string(&test.snapshot) {
                Ok(expected) => expected,
                Err(e) => return failed(format!("Failed to read {}: {}", test.snapshot.display(), e)),
            };
            if actual.trim_end() != expected.trim_end() {
                return failed(format!("Expected:\n{}\nGot:\n{}", expected.trim_end(), actual.trim_end()));
            }
        }

        TestResult {
            name: test.name.clone(),
            passed: true,
            message: None,
            duration_ms: start_time.elapsed().as_millis(),
        }
    }
}

/// Summary report of test execution
#[derive(Debug)]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u128,
    pub results: Vec<TestResult>,
}

impl TestReport {
    /// Print the test report to stdout with colored output
    pub fn print(&self) {
        for result in &self.results {
            if result.passed {
                println!("  {} {} ({}ms)", "✓".green().bold(), result.name.green(), result.duration_ms);
            } else {
                println!("  {} {} ({}ms)", "✗".red().bold(), result.name.red(), result.duration_ms);
                if let Some(msg) = &result.message {
                    for line in msg.lines() {
                        println!("    {}", line.dimmed());
                    }
                }
            }
        }

        println!();
        println!(
            "Scripts: {} total, {} passed, {} failed ({}ms)",
            self.total,
            self.passed.to_string().green().bold(),
            self.failed.to_string().red().bold(),
            self.duration_ms
        );
    }

    /// Get exit code (0 for success, 1 for failure)
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::DEFAULT_PRECISION;

    #[test]
    fn test_run_script_captures_output_and_error() {
        let output = run_script("print(1); print(2 / 0); print(3);", DEFAULT_PRECISION);
        assert_eq!(output, "1\nerror: Division By Zero: Division by zero (line 1)\n");
    }

    #[test]
    fn test_run_script_reports_compile_errors() {
        let output = run_script("print(1);\nprint(nope);", DEFAULT_PRECISION);
        assert_eq!(output, "error: Undefined Variable: Variable 'nope' is not defined (line 2)\n");
    }

    #[test]
    fn test_snapshot_round_trip_in_temp_dir() {
        let dir = std::env::temp_dir().join(format!("macrocalc_runner_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("count.mc"), "var i = 0; while (i < 3) { print(i); i = i + 1; }").unwrap();
        let _ = fs::remove_file(dir.join("count.out"));

        // first run writes the snapshot
        let mut runner = TestRunner::new(false, DEFAULT_PRECISION);
        runner.collect_tests(&dir).unwrap();
        assert_eq!(runner.run_all().failed, 0);
        assert_eq!(fs::read_to_string(dir.join("count.out")).unwrap(), "0\n1\n2\n");

        // a stale snapshot fails
        fs::write(dir.join("count.out"), "0\n1\n").unwrap();
        let mut runner = TestRunner::new(false, DEFAULT_PRECISION);
        runner.collect_tests(&dir).unwrap();
        let report = runner.run_all();
        assert_eq!(report.failed, 1);
        assert_eq!(report.exit_code(), 1);

        // --update rewrites it
        let mut runner = TestRunner::new(true, DEFAULT_PRECISION);
        runner.collect_tests(&dir).unwrap();
        assert_eq!(runner.run_all().passed, 1);

        fs::remove_dir_all(&dir).unwrap();
    }
}
