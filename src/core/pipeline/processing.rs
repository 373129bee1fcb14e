use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT, SEMAPHORE_CLOSED_ERR};
use crate::core::domain::{
    Configuration, ProcessingResult, Submission, SubmissionStatus, TestConfig,
};
use crate::core::pipeline::comparing::{VerdictStatus, compare_output};
use crate::core::pipeline::compiling::compile_submission;
use crate::core::pipeline::extracting::{ExtractionError, extract_and_save_submissions};
use crate::core::pipeline::running::{RunError, run_submission};
use crate::core::traits::gateway::{Gateway, GatewayError};

#[derive(Clone, Debug)]
pub struct ProcessOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("submissions directory not found: {}", .path.display())]
    MissingSubmissionsDir { path: PathBuf },
    #[error("failed to read submissions directory: {msg}")]
    UnreadableSubmissionsDir { msg: String },
    #[error("no configuration found for project {project_id}")]
    MissingConfiguration { project_id: Uuid },
    #[error("no test configuration found for project {project_id}")]
    MissingTestConfig { project_id: Uuid },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ExtractionError> for ProcessError {
    fn from(value: ExtractionError) -> Self {
        match value {
            ExtractionError::MissingSubmissionsDir { path } => {
                ProcessError::MissingSubmissionsDir { path }
            }
            ExtractionError::Unreadable { msg } => ProcessError::UnreadableSubmissionsDir { msg },
            ExtractionError::Gateway(e) => ProcessError::Gateway(e),
        }
    }
}

/// How one submission's trip through the pipeline ended. `compiled` and
/// `executed` record stage passages even when a later stage failed.
#[derive(Clone, Debug)]
pub struct SubmissionOutcome {
    pub student_id: String,
    pub compiled: bool,
    pub executed: bool,
    pub status: SubmissionStatus,
    pub message: Option<String>,
}

/// Grades every submission of a project: extract all archives, then drive
/// each ready submission through compile, run and compare with at most
/// `options.concurrency` pipelines in flight.
///
/// Submissions never interfere with each other; the only fatal conditions
/// are a missing submissions directory, a missing project or test
/// configuration, and gateway failures outside the per-submission path.
#[tracing::instrument(skip(gateway))]
pub async fn process_project(
    gateway: Arc<dyn Gateway>,
    project_id: Uuid,
    submissions_path: &Path,
    options: ProcessOptions,
) -> Result<ProcessingResult, ProcessError> {
    tracing::info!(
        "starting extraction of all submissions for project {}",
        project_id
    );
    let output_dir = submissions_path.join("..").join("output");
    let records =
        extract_and_save_submissions(gateway.as_ref(), submissions_path, &output_dir, project_id)
            .await?;
    for record in &records {
        tracing::debug!(
            "archive for {} classified as {:?}",
            record.student_id,
            record.outcome
        );
    }
    tracing::info!("extraction complete ({} archives)", records.len());

    let submissions = gateway.submissions_for_project(project_id).await?;
    let configuration = gateway
        .configuration_for_project(project_id)
        .await?
        .ok_or(ProcessError::MissingConfiguration { project_id })?;
    let test_config = gateway
        .test_config_for_project(project_id)
        .await?
        .ok_or(ProcessError::MissingTestConfig { project_id })?;

    let mut results = ProcessingResult {
        total: submissions.len(),
        ..Default::default()
    };

    // Archive-stage failures (zip_error, extraction_failed) are already
    // terminal; only untouched submissions enter the pipeline.
    let ready: Vec<Submission> = submissions
        .into_iter()
        .filter(|s| s.status == SubmissionStatus::Ready)
        .collect();

    tracing::info!(
        "processing {} submissions ({} ready) with concurrency of {}",
        results.total,
        ready.len(),
        options.concurrency
    );

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let configuration = Arc::new(configuration);
    let test_config = Arc::new(test_config);

    let mut pipelines = FuturesUnordered::new();
    for submission in ready {
        let gateway = gateway.clone();
        let configuration = configuration.clone();
        let test_config = test_config.clone();
        let semaphore = semaphore.clone();
        let budget = options.timeout;

        pipelines.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect(SEMAPHORE_CLOSED_ERR);
            run_pipeline_with_deadline(gateway, submission, configuration, test_config, budget)
                .await
        }));
    }

    while let Some(joined) = pipelines.next().await {
        match joined {
            Ok(outcome) => {
                match &outcome.message {
                    Some(msg) => tracing::info!(
                        "{} finished with status '{}': {}",
                        outcome.student_id,
                        outcome.status,
                        msg
                    ),
                    None => tracing::info!(
                        "{} finished with status '{}'",
                        outcome.student_id,
                        outcome.status
                    ),
                }
                tally(&mut results, &outcome);
            }
            Err(e) => {
                tracing::error!("submission pipeline task failed: {}", e);
                results.errors += 1;
            }
        }
    }

    Ok(results)
}

/// Wraps one pipeline in the wall-clock budget. On expiry the in-flight
/// future is dropped, which kills any spawned child process, and the
/// submission is marked `time_exceeded` exactly once.
async fn run_pipeline_with_deadline(
    gateway: Arc<dyn Gateway>,
    submission: Submission,
    configuration: Arc<Configuration>,
    test_config: Arc<TestConfig>,
    budget: Duration,
) -> SubmissionOutcome {
    let id = submission.id;
    let student_id = submission.student_id.clone();

    let pipeline = process_submission(gateway.as_ref(), &submission, &configuration, &test_config);
    match tokio::time::timeout(budget, pipeline).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                "{} exceeded the processing deadline ({:?})",
                student_id,
                budget
            );
            if let Err(e) = gateway
                .update_submission_status(id, SubmissionStatus::TimeExceeded, None)
                .await
            {
                tracing::error!("failed to persist timeout status for {}: {}", student_id, e);
            }
            SubmissionOutcome {
                student_id,
                compiled: false,
                executed: false,
                status: SubmissionStatus::TimeExceeded,
                message: None,
            }
        }
    }
}

/// Drives one submission through compile, run and compare, persisting a
/// status at every stage boundary. Also the entry point for grading a
/// single submission again outside a full project run.
#[tracing::instrument(skip(gateway, configuration, test_config))]
pub async fn process_submission(
    gateway: &dyn Gateway,
    submission: &Submission,
    configuration: &Configuration,
    test_config: &TestConfig,
) -> SubmissionOutcome {
    let student_id = submission.student_id.clone();
    let mut compiled = false;
    let mut executed = false;

    match compile_submission(submission, configuration).await {
        Ok(()) => {
            if let Err(e) = gateway
                .update_submission_status(submission.id, SubmissionStatus::Compiled, None)
                .await
            {
                return persistence_failure(student_id, compiled, executed, e);
            }
            compiled = true;
        }
        Err(e) => {
            let msg = e.to_string();
            tracing::info!("compilation failed for {}: {}", student_id, msg);
            return finish(
                gateway,
                submission.id,
                student_id,
                compiled,
                executed,
                SubmissionStatus::CompileError,
                Some(msg),
            )
            .await;
        }
    }

    let run_output = match run_submission(submission, test_config, configuration).await {
        Ok(output) => output,
        Err(RunError::UnsupportedInputMethod { method }) => {
            tracing::warn!("unsupported input method for {}: {}", student_id, method);
            return finish(
                gateway,
                submission.id,
                student_id,
                compiled,
                executed,
                SubmissionStatus::Skipped,
                Some(format!("unsupported input method: {method}")),
            )
            .await;
        }
        Err(e) => {
            let msg = e.to_string();
            tracing::info!("runtime error for {}: {}", student_id, msg);
            return finish(
                gateway,
                submission.id,
                student_id,
                compiled,
                executed,
                SubmissionStatus::RuntimeError,
                Some(msg),
            )
            .await;
        }
    };

    if let Err(e) = gateway
        .update_submission_output(submission.id, run_output.stdout.clone())
        .await
    {
        return persistence_failure(student_id, compiled, executed, e);
    }
    if let Err(e) = gateway
        .update_submission_status(submission.id, SubmissionStatus::Executed, None)
        .await
    {
        return persistence_failure(student_id, compiled, executed, e);
    }
    executed = true;

    let verdict = compare_output(Some(&run_output.stdout), test_config);
    let status = match verdict.status {
        VerdictStatus::Success => SubmissionStatus::Success,
        VerdictStatus::Failed => SubmissionStatus::Failed,
        VerdictStatus::Skipped => SubmissionStatus::Skipped,
        VerdictStatus::Error => SubmissionStatus::Error,
    };
    finish(
        gateway,
        submission.id,
        student_id,
        compiled,
        executed,
        status,
        verdict.message,
    )
    .await
}

/// Persists the terminal status; a failed write downgrades the outcome to
/// `error` but never aborts the batch.
async fn finish(
    gateway: &dyn Gateway,
    id: Uuid,
    student_id: String,
    compiled: bool,
    executed: bool,
    status: SubmissionStatus,
    message: Option<String>,
) -> SubmissionOutcome {
    if let Err(e) = gateway
        .update_submission_status(id, status.clone(), message.clone())
        .await
    {
        return persistence_failure(student_id, compiled, executed, e);
    }
    SubmissionOutcome {
        student_id,
        compiled,
        executed,
        status,
        message,
    }
}

fn persistence_failure(
    student_id: String,
    compiled: bool,
    executed: bool,
    e: GatewayError,
) -> SubmissionOutcome {
    tracing::error!("failed to persist state for {}: {}", student_id, e);
    SubmissionOutcome {
        student_id,
        compiled,
        executed,
        status: SubmissionStatus::Error,
        message: Some(format!("failed to persist submission state: {e}")),
    }
}

fn tally(results: &mut ProcessingResult, outcome: &SubmissionOutcome) {
    debug_assert!(outcome.status.is_terminal());
    if outcome.compiled {
        results.compiled += 1;
    }
    if outcome.executed {
        results.executed += 1;
    }
    match outcome.status {
        SubmissionStatus::CompileError => results.compile_errors += 1,
        SubmissionStatus::RuntimeError => results.runtime_errors += 1,
        SubmissionStatus::Success => results.success += 1,
        SubmissionStatus::Failed => results.failed += 1,
        SubmissionStatus::Skipped => results.skipped += 1,
        SubmissionStatus::TimeExceeded => results.timeouts += 1,
        _ => results.errors += 1,
    }
}
