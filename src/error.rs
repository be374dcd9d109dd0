//! Error types for process orchestration

use std::io;
use thiserror::Error;

/// Result type for procbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating child processes
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Pipeline stage {stage} failed to launch: {source}")]
    Pipeline {
        stage: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl Error {
    /// Wrap a launch failure with the pipeline stage it occurred at
    pub(crate) fn at_stage(self, stage: usize) -> Self {
        Error::Pipeline {
            stage,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Resource("pipe creation failed".to_string());
        assert_eq!(err.to_string(), "Resource error: pipe creation failed");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_pipeline_error_reports_stage() {
        let err = Error::Spawn("fork failed".to_string()).at_stage(2);
        let msg = err.to_string();
        assert!(msg.contains("stage 2"));
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
