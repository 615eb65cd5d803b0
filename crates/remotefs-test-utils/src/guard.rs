// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RAII guard used by `#[logged_test]`.

use std::path::PathBuf;

use crate::{TestLogError, TestLogger};

/// Finalizes a [`TestLogger`] exactly once.
///
/// Dropping the guard without calling `finish_success` (including while a
/// test panics) records a failure.
pub struct TestLoggerGuard {
    logger: Option<TestLogger>,
    log_path: PathBuf,
}

impl TestLoggerGuard {
    pub fn new(test_name: &str) -> Result<Self, TestLogError> {
        let logger = TestLogger::new(test_name)?;
        let log_path = logger.log_path().to_path_buf();
        Ok(Self {
            logger: Some(logger),
            log_path,
        })
    }

    /// Logger for the running test.
    ///
    /// Panics if called after the guard was finalized, which the macro
    /// expansion never does.
    pub fn logger(&mut self) -> &mut TestLogger {
        match self.logger.as_mut() {
            Some(logger) => logger,
            None => panic!("test logger for {} already finalized", self.log_path.display()),
        }
    }

    pub fn finish_success(mut self) -> Result<PathBuf, TestLogError> {
        match self.logger.take() {
            Some(logger) => logger.finish_success(),
            None => Ok(self.log_path.clone()),
        }
    }

    pub fn finish_failure<S: AsRef<str>>(mut self, message: S) -> Result<PathBuf, TestLogError> {
        match self.logger.take() {
            Some(logger) => logger.finish_failure(message.as_ref()),
            None => Ok(self.log_path.clone()),
        }
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }
}

impl Drop for TestLoggerGuard {
    fn drop(&mut self) {
        let Some(logger) = self.logger.take() else {
            return;
        };
        let reason = if std::thread::panicking() {
            "test panicked"
        } else {
            "test exited without finishing its log"
        };
        if let Err(err) = logger.finish_failure(reason) {
            eprintln!(
                "failed to finalize test log {}: {}",
                self.log_path.display(),
                err
            );
        }
    }
}
