use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Build and run recipe shared by every submission in a project.
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub compile_command: String,
    /// Whitespace-separated file names every submission must contain.
    pub source_code: String,
    pub compile_parameters: String,
    pub run_command: String,
}

/// How the test input is delivered to a running submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputMethod {
    Manual,
    File,
    Script,
    Other(String),
}

impl InputMethod {
    pub fn as_str(&self) -> &str {
        match self {
            InputMethod::Manual => "manual",
            InputMethod::File => "file",
            InputMethod::Script => "script",
            InputMethod::Other(other) => other,
        }
    }
}

impl From<&str> for InputMethod {
    fn from(value: &str) -> Self {
        match value {
            "manual" => InputMethod::Manual,
            "file" => InputMethod::File,
            "script" => InputMethod::Script,
            other => InputMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InputMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the expected output is obtained for comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputMethod {
    Manual,
    File,
    Script,
    Other(String),
}

impl OutputMethod {
    pub fn as_str(&self) -> &str {
        match self {
            OutputMethod::Manual => "manual",
            OutputMethod::File => "file",
            OutputMethod::Script => "script",
            OutputMethod::Other(other) => other,
        }
    }
}

impl From<&str> for OutputMethod {
    fn from(value: &str) -> Self {
        match value {
            "manual" => OutputMethod::Manual,
            "file" => OutputMethod::File,
            "script" => OutputMethod::Script,
            other => OutputMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for OutputMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single test case applied to every submission in a project.
///
/// For `OutputMethod::File` the `expected_output` already holds the file
/// contents, resolved when the configuration was saved.
#[derive(Clone, Debug)]
pub struct TestConfig {
    pub input_method: InputMethod,
    pub input: String,
    pub output_method: OutputMethod,
    pub expected_output: Option<String>,
}

/// Persisted progress marker for a submission.
///
/// `Ready` is stored as the empty string and is the only state the pipeline
/// picks up; everything else either sits mid-pipeline (`Compiled`,
/// `Executed`) or is terminal for the current run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionStatus {
    Ready,
    ZipError,
    ExtractionFailed,
    Compiled,
    CompileError,
    Executed,
    RuntimeError,
    Success,
    Failed,
    Skipped,
    Error,
    TimeExceeded,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Ready => "",
            SubmissionStatus::ZipError => "zip_error",
            SubmissionStatus::ExtractionFailed => "extraction_failed",
            SubmissionStatus::Compiled => "compiled",
            SubmissionStatus::CompileError => "compile_error",
            SubmissionStatus::Executed => "executed",
            SubmissionStatus::RuntimeError => "runtime_error",
            SubmissionStatus::Success => "success",
            SubmissionStatus::Failed => "failed",
            SubmissionStatus::Skipped => "skipped",
            SubmissionStatus::Error => "error",
            SubmissionStatus::TimeExceeded => "time_exceeded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SubmissionStatus::Ready | SubmissionStatus::Compiled | SubmissionStatus::Executed
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student's extracted attempt, keyed uniquely by
/// `(project_id, student_id)`.
#[derive(Clone, Debug)]
pub struct Submission {
    pub id: Uuid,
    pub project_id: Uuid,
    pub student_id: String,
    pub status: SubmissionStatus,
    pub path: Option<PathBuf>,
    pub error_message: Option<String>,
    pub actual_output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a submission; the gateway assigns id and timestamps.
#[derive(Clone, Debug)]
pub struct NewSubmission {
    pub project_id: Uuid,
    pub student_id: String,
    pub status: SubmissionStatus,
    pub path: Option<PathBuf>,
    pub error_message: Option<String>,
}

/// Aggregate counters for one orchestrator run. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    pub total: usize,
    pub compiled: usize,
    pub compile_errors: usize,
    pub executed: usize,
    pub runtime_errors: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub timeouts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_strings_round_out_the_state_machine() {
        assert_eq!(SubmissionStatus::Ready.as_str(), "");
        assert_eq!(SubmissionStatus::ZipError.as_str(), "zip_error");
        assert_eq!(SubmissionStatus::TimeExceeded.as_str(), "time_exceeded");
        assert_eq!(SubmissionStatus::CompileError.as_str(), "compile_error");
    }

    #[test]
    fn only_in_flight_statuses_are_non_terminal() {
        assert!(!SubmissionStatus::Ready.is_terminal());
        assert!(!SubmissionStatus::Compiled.is_terminal());
        assert!(!SubmissionStatus::Executed.is_terminal());

        for terminal in [
            SubmissionStatus::ZipError,
            SubmissionStatus::ExtractionFailed,
            SubmissionStatus::CompileError,
            SubmissionStatus::RuntimeError,
            SubmissionStatus::Success,
            SubmissionStatus::Failed,
            SubmissionStatus::Skipped,
            SubmissionStatus::Error,
            SubmissionStatus::TimeExceeded,
        ] {
            assert!(terminal.is_terminal(), "{terminal:?} should be terminal");
        }
    }

    #[test]
    fn unknown_methods_are_preserved_not_rejected() {
        assert_eq!(InputMethod::from("manual"), InputMethod::Manual);
        assert_eq!(
            InputMethod::from("carrier-pigeon"),
            InputMethod::Other("carrier-pigeon".to_string())
        );
        assert_eq!(OutputMethod::from("file"), OutputMethod::File);
        assert_eq!(
            OutputMethod::from("regex"),
            OutputMethod::Other("regex".to_string())
        );
    }
}
