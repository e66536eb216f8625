use autosnap_common::Result;

use crate::logger::{self, RunLogger};
use crate::snapshot_job::RunReport;

/// How the process ends after a run.
///
/// A failed run exits 0 by default: the error line in the log is the signal.
/// `fail_on_error` turns it into a non-zero exit. Configuration problems
/// always exit 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Success,
    Failure,
    ConfigError,
}

impl RunExit {
    pub fn code(self) -> u8 {
        match self {
            RunExit::Success => 0,
            RunExit::Failure => 1,
            RunExit::ConfigError => 2,
        }
    }
}

/// Logs a failed run as one error line and picks the exit status.
pub fn finish_run(result: &Result<RunReport>, fail_on_error: bool, logger: &RunLogger) -> RunExit {
    match result {
        Ok(_) => RunExit::Success,
        Err(e) => {
            logger.log_error(logger::ACTION_RUN, e);
            if fail_on_error {
                RunExit::Failure
            } else {
                RunExit::Success
            }
        }
    }
}
