use std::process::Stdio;

use itertools::Itertools;
use tokio::process::Command;

use crate::core::domain::{Configuration, Submission};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("missing source file(s): {}", .files.iter().join(", "))]
    MissingSources { files: Vec<String> },
    #[error("{msg}")]
    CompilationFailed { msg: String },
}

/// Builds one submission according to the project configuration.
///
/// A blank `compile_command` means the submission is already runnable
/// (interpreted languages). Source files are checked before anything is
/// spawned; the compile command is invoked argument-vector style with the
/// resolved source paths and extra parameters appended, never through a
/// shell. Persisted status is untouched here.
#[tracing::instrument(skip(config))]
pub async fn compile_submission(
    submission: &Submission,
    config: &Configuration,
) -> Result<(), CompileError> {
    let sources: Vec<&str> = config.source_code.split_whitespace().collect();

    if !sources.is_empty() {
        let missing: Vec<String> = match submission.path.as_deref() {
            Some(dir) => sources
                .iter()
                .filter(|name| !dir.join(name).exists())
                .map(|name| name.to_string())
                .collect(),
            None => sources.iter().map(|name| name.to_string()).collect(),
        };
        if !missing.is_empty() {
            tracing::debug!(
                "source not found for {}: {}",
                submission.student_id,
                missing.iter().join(", ")
            );
            return Err(CompileError::MissingSources { files: missing });
        }
    }

    if config.compile_command.trim().is_empty() {
        tracing::debug!(
            "{} marked as compiled (no compilation needed)",
            submission.student_id
        );
        return Ok(());
    }

    let Some(dir) = submission.path.as_deref() else {
        return Err(CompileError::CompilationFailed {
            msg: "submission has no extracted directory".to_string(),
        });
    };

    let mut parts = config.compile_command.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CompileError::CompilationFailed {
            msg: "compile command is empty".to_string(),
        });
    };

    let mut cmd = Command::new(program);
    cmd.args(parts)
        .args(sources.iter().map(|name| dir.join(name)))
        .args(config.compile_parameters.split_whitespace())
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!("compiling submission for {}", submission.student_id);
    let output = cmd
        .output()
        .await
        .map_err(|e| CompileError::CompilationFailed { msg: e.to_string() })?;

    if !output.status.success() {
        return Err(CompileError::CompilationFailed {
            msg: failure_message(&output.stdout, &output.stderr, output.status),
        });
    }

    tracing::debug!("{} compiled successfully", submission.student_id);
    Ok(())
}

/// stderr first, then stdout, then a generic exit description.
fn failure_message(stdout: &[u8], stderr: &[u8], status: std::process::ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("compile command exited with {status}")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;
    use tempfile::tempdir;
    use uuid::Uuid;

    use super::*;
    use crate::core::domain::SubmissionStatus;

    fn submission_at(path: Option<PathBuf>) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            student_id: "alice".to_string(),
            status: SubmissionStatus::Ready,
            path,
            error_message: None,
            actual_output: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config(compile_command: &str, source_code: &str, compile_parameters: &str) -> Configuration {
        Configuration {
            compile_command: compile_command.to_string(),
            source_code: source_code.to_string(),
            compile_parameters: compile_parameters.to_string(),
            run_command: String::new(),
        }
    }

    #[tokio::test]
    async fn blank_compile_command_is_a_no_op_success() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "print('hi')").unwrap();

        let submission = submission_at(Some(dir.path().to_path_buf()));
        let result = compile_submission(&submission, &config("", "main.py", "")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_sources_fail_before_any_spawn() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.c"), "int main(){}").unwrap();

        let submission = submission_at(Some(dir.path().to_path_buf()));
        let result =
            compile_submission(&submission, &config("cc", "main.c util.c util.h", "")).await;

        match result {
            Err(CompileError::MissingSources { files }) => {
                assert_eq!(files, vec!["util.c".to_string(), "util.h".to_string()]);
            }
            other => panic!("expected MissingSources, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submission_without_a_path_reports_every_source_missing() {
        let submission = submission_at(None);
        let result = compile_submission(&submission, &config("cc", "main.c", "")).await;
        assert!(matches!(
            result,
            Err(CompileError::MissingSources { files }) if files == vec!["main.c".to_string()]
        ));
    }

    #[tokio::test]
    async fn failing_build_captures_stderr() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.txt"), "no greeting here").unwrap();
        std::fs::write(
            dir.path().join("build.sh"),
            "grep -q hello \"$1\" || { echo \"missing hello\" >&2; exit 1; }\n",
        )
        .unwrap();

        let submission = submission_at(Some(dir.path().to_path_buf()));
        let result = compile_submission(&submission, &config("sh build.sh", "main.txt", "")).await;

        match result {
            Err(CompileError::CompilationFailed { msg }) => assert_eq!(msg, "missing hello"),
            other => panic!("expected CompilationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_build_runs_with_submission_cwd() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.txt"), "hello grader").unwrap();
        std::fs::write(
            dir.path().join("build.sh"),
            "grep -q hello \"$1\" && touch built.flag\n",
        )
        .unwrap();

        let submission = submission_at(Some(dir.path().to_path_buf()));
        let result = compile_submission(&submission, &config("sh build.sh", "main.txt", "")).await;

        assert!(result.is_ok());
        assert!(dir.path().join("built.flag").is_file());
    }

    #[tokio::test]
    async fn silent_nonzero_exit_gets_a_generic_message() {
        let dir = tempdir().unwrap();
        let submission = submission_at(Some(dir.path().to_path_buf()));
        let result = compile_submission(&submission, &config("false", "", "")).await;

        match result {
            Err(CompileError::CompilationFailed { msg }) => {
                assert!(msg.contains("exited with"), "unexpected message: {msg}");
            }
            other => panic!("expected CompilationFailed, got {other:?}"),
        }
    }
}
