use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::domain::{Configuration, InputMethod, Submission, TestConfig};

/// Captured result of a successful run.
#[derive(Clone, Debug)]
pub struct RunOutput {
    /// Trimmed stdout of the submission process.
    pub stdout: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("failed to resolve test input: {msg}")]
    InputResolution { msg: String },
    #[error("unsupported input method: {method}")]
    UnsupportedInputMethod { method: String },
    #[error("{msg}")]
    Runtime { msg: String },
}

/// Executes one compiled (or interpreted) submission with the configured
/// test input.
///
/// The resolved input payload is delivered twice over: tokenized onto the
/// argument list for programs that read argv, and written to stdin followed
/// by a newline for programs that read input. No timeout is enforced here;
/// the orchestrator owns the clock.
#[tracing::instrument(skip(config, test))]
pub async fn run_submission(
    submission: &Submission,
    test: &TestConfig,
    config: &Configuration,
) -> Result<RunOutput, RunError> {
    let Some(dir) = submission.path.as_deref() else {
        return Err(RunError::Runtime {
            msg: "submission has no extracted directory".to_string(),
        });
    };

    let mut parts = config.run_command.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(RunError::Runtime {
            msg: "run command is empty".to_string(),
        });
    };
    let base_args: Vec<&str> = parts.collect();

    let payload = resolve_input(dir, test).await?;
    let program = resolve_program(dir, program);

    let mut cmd = Command::new(&program);
    cmd.args(&base_args)
        .args(payload.split_whitespace())
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!("running submission for {}", submission.student_id);
    let mut child = cmd.spawn().map_err(|e| RunError::Runtime {
        msg: format!("failed to launch {}: {}", program.display(), e),
    })?;

    if !payload.is_empty() {
        if let Some(mut stdin) = child.stdin.take() {
            let delivery = async {
                stdin.write_all(payload.as_bytes()).await?;
                stdin.write_all(b"\n").await
            };
            if let Err(e) = delivery.await {
                // A process that exits without reading its stdin closes the
                // pipe; that is not a delivery failure.
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    let _ = child.kill().await;
                    return Err(RunError::Runtime {
                        msg: format!("failed to write test input to stdin: {e}"),
                    });
                }
            }
            // Dropping the handle closes stdin and signals EOF.
        }
    } else {
        drop(child.stdin.take());
    }

    let output = child.wait_with_output().await.map_err(|e| RunError::Runtime {
        msg: format!("failed to collect process output: {e}"),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        tracing::debug!("{} executed successfully", submission.student_id);
        return Ok(RunOutput { stdout });
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let msg = if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        format!("run command exited with {}", output.status)
    };
    Err(RunError::Runtime { msg })
}

/// A program name present inside the submission directory runs as that
/// artifact; anything else resolves through PATH.
fn resolve_program(dir: &Path, program: &str) -> PathBuf {
    let candidate = dir.join(program);
    if candidate.exists() {
        candidate
    } else {
        PathBuf::from(program)
    }
}

async fn resolve_input(dir: &Path, test: &TestConfig) -> Result<String, RunError> {
    match &test.input_method {
        InputMethod::Manual => Ok(test.input.clone()),
        InputMethod::File => tokio::fs::read_to_string(&test.input)
            .await
            .map(|content| content.trim().to_string())
            .map_err(|e| RunError::InputResolution {
                msg: format!("failed to read input file {}: {}", test.input, e),
            }),
        InputMethod::Script => run_input_script(dir, &test.input).await,
        InputMethod::Other(method) => Err(RunError::UnsupportedInputMethod {
            method: method.clone(),
        }),
    }
}

/// Runs a staff-authored input script and captures its trimmed stdout.
///
/// This is the one place a shell is involved; the command string comes from
/// the project's test configuration, never from submission files.
async fn run_input_script(dir: &Path, script: &str) -> Result<String, RunError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(script)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RunError::InputResolution {
            msg: format!("failed to run input script: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(RunError::InputResolution {
            msg: if stderr.is_empty() {
                format!("input script exited with {}", output.status)
            } else {
                stderr
            },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
