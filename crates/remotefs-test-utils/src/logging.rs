// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-test log files
//!
//! Every logged test writes its diagnostics to its own file under
//! `target/test-logs/<date>/`. Passing tests print a single line; failing
//! tests print the log path and size so the file can be opened directly.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Overrides the directory that receives test logs.
pub const LOG_DIR_ENV: &str = "REMOTEFS_TEST_LOG_DIR";

const MAX_TEST_NAME_LEN: usize = 200;
const HEX_PREVIEW_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum TestLogError {
    #[error("test log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write test log {path}")]
    Write { path: PathBuf },

    #[error("invalid test name: {name}")]
    InvalidTestName { name: String },
}

pub struct TestLogger {
    log_path: PathBuf,
    writer: BufWriter<File>,
    test_name: String,
    start_time: DateTime<Utc>,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        validate_test_name(test_name)?;

        let log_path = create_unique_test_log(test_name)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)?;

        let mut logger = Self {
            log_path,
            writer: BufWriter::new(file),
            test_name: test_name.to_string(),
            start_time: Utc::now(),
        };
        logger.write_header()?;
        Ok(logger)
    }

    /// Append one timestamped line.
    pub fn log(&mut self, message: &str) -> Result<(), TestLogError> {
        let timestamp = Utc::now().format("%H:%M:%S%.3f");
        writeln!(self.writer, "[{}] {}", timestamp, message).map_err(|_| self.write_error())?;
        self.writer.flush().map_err(|_| self.write_error())
    }

    /// Append a labelled JSON rendering of `data`.
    pub fn log_json<T: serde::Serialize>(
        &mut self,
        label: &str,
        data: &T,
    ) -> Result<(), TestLogError> {
        let json = serde_json::to_string_pretty(data).map_err(|_| self.write_error())?;
        self.log(&format!("{}: {}", label, json))
    }

    /// Append a labelled hex preview of a wire message.
    pub fn log_bytes(&mut self, label: &str, bytes: &[u8]) -> Result<(), TestLogError> {
        let shown = &bytes[..bytes.len().min(HEX_PREVIEW_LEN)];
        let hex: Vec<String> = shown.iter().map(|b| format!("{:02x}", b)).collect();
        let ellipsis = if bytes.len() > shown.len() { " .." } else { "" };
        self.log(&format!(
            "{} ({} bytes): {}{}",
            label,
            bytes.len(),
            hex.join(" "),
            ellipsis
        ))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        let elapsed = self.elapsed_secs();
        self.log(&format!("Test passed in {:.3}s", elapsed))?;
        self.writer.flush().map_err(|_| self.write_error())?;
        drop(self.writer);

        println!("✅ {} passed", self.test_name);
        Ok(self.log_path)
    }

    pub fn finish_failure(mut self, error_message: &str) -> Result<PathBuf, TestLogError> {
        let elapsed = self.elapsed_secs();
        self.log(&format!(
            "Test failed after {:.3}s: {}",
            elapsed, error_message
        ))?;
        self.writer.flush().map_err(|_| self.write_error())?;
        drop(self.writer);

        match fs::metadata(&self.log_path) {
            Ok(metadata) => println!(
                "❌ {} failed - Log: {} ({} bytes)",
                self.test_name,
                self.log_path.display(),
                metadata.len()
            ),
            Err(_) => println!(
                "❌ {} failed - Log: {}",
                self.test_name,
                self.log_path.display()
            ),
        }
        Ok(self.log_path)
    }

    fn elapsed_secs(&self) -> f64 {
        Utc::now().signed_duration_since(self.start_time).num_milliseconds() as f64 / 1000.0
    }

    fn write_error(&self) -> TestLogError {
        TestLogError::Write {
            path: self.log_path.clone(),
        }
    }

    fn write_header(&mut self) -> Result<(), TestLogError> {
        writeln!(self.writer, "=== RemoteFS Test Log ===")?;
        writeln!(self.writer, "Test: {}", self.test_name)?;
        writeln!(
            self.writer,
            "Started: {}",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(self.writer, "Process: {}", std::process::id())?;
        writeln!(
            self.writer,
            "Thread: {}",
            std::thread::current().name().unwrap_or("unknown")
        )?;
        writeln!(self.writer, "=== Log Output ===")?;
        writeln!(self.writer)?;
        self.writer.flush().map_err(|_| self.write_error())
    }
}

/// Reserve a unique log file path for `test_name`, creating its directory.
///
/// Layout: `<root>/<YYYY-MM-DD>/<test-name>-<HH-MM-SS>-<uuid>.log`, where root
/// is `$REMOTEFS_TEST_LOG_DIR` or `target/test-logs` in the workspace.
pub fn create_unique_test_log(test_name: &str) -> Result<PathBuf, TestLogError> {
    let now = Utc::now();
    let root = match env::var_os(LOG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => find_workspace_root()?.join("target").join("test-logs"),
    };
    let log_dir = root.join(now.format("%Y-%m-%d").to_string());
    fs::create_dir_all(&log_dir)?;

    let filename = format!(
        "{}-{}-{}.log",
        sanitize_filename(test_name),
        now.format("%H-%M-%S"),
        Uuid::new_v4()
    );
    Ok(log_dir.join(filename))
}

fn find_workspace_root() -> Result<PathBuf, TestLogError> {
    let current_dir = env::current_dir()?;
    let mut dir = current_dir.as_path();
    loop {
        let manifest = dir.join("Cargo.toml");
        if let Ok(content) = fs::read_to_string(&manifest) {
            if content.contains("[workspace]") {
                return Ok(dir.to_path_buf());
            }
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Ok(current_dir),
        }
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

fn validate_test_name(name: &str) -> Result<(), TestLogError> {
    if name.is_empty() {
        return Err(TestLogError::InvalidTestName {
            name: name.to_string(),
        });
    }
    if name.len() > MAX_TEST_NAME_LEN {
        return Err(TestLogError::InvalidTestName {
            name: format!("name too long: {} chars", name.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[crate::logged_test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("lookup_known_name"), "lookup_known_name");
        assert_eq!(sanitize_filename("list dir"), "list_dir");
        assert_eq!(sanitize_filename("client::read"), "client__read");
    }

    #[crate::logged_test]
    fn test_validate_test_name() {
        assert!(validate_test_name("mount_returns_root").is_ok());
        assert!(validate_test_name("").is_err());
        assert!(validate_test_name(&"x".repeat(MAX_TEST_NAME_LEN + 1)).is_err());
    }

    #[crate::logged_test]
    fn test_unique_paths() {
        let first = create_unique_test_log("same_name").unwrap();
        let second = create_unique_test_log("same_name").unwrap();
        assert_ne!(first, second);
        assert!(first.to_string_lossy().contains("same_name"));
    }

    #[test]
    fn test_hex_preview_is_bounded() {
        let mut logger = TestLogger::new("test_hex_preview_is_bounded").unwrap();
        logger.log_bytes("response", &[0xabu8; 200]).unwrap();
        let path = logger.finish_success().unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("response (200 bytes): ab ab"));
        assert!(content.contains(" .."));
    }
}
