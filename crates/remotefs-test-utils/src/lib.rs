// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RemoteFS Test Utilities
//!
//! Gives every test its own log file and a `logger` handle via
//! `#[logged_test]`, keeping console output to one line per passing test.

extern crate self as remotefs_test_utils;

pub mod guard;
pub mod logging;

pub use guard::TestLoggerGuard;
pub use logging::{create_unique_test_log, TestLogError, TestLogger, LOG_DIR_ENV};
pub use remotefs_test_utils_macros::logged_test;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_guard_records_failure_on_drop() {
        let guard = TestLoggerGuard::new("test_guard_records_failure_on_drop").unwrap();
        let path = guard.log_path().clone();
        drop(guard);
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("Test failed"));
        assert!(content.contains("without finishing its log"));
    }

    #[logged_test]
    fn test_macro_exposes_logger() {
        logger.log("logger is reachable from the test body").unwrap();
        assert!(logger.log_path().exists());
    }

    #[logged_test]
    fn test_macro_propagates_result() -> Result<(), TestLogError> {
        logger.log("returning Ok")?;
        Ok(())
    }
}
