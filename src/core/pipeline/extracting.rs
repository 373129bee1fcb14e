use std::fs::File;
use std::path::{Path, PathBuf};

use uuid::Uuid;
use zip::ZipArchive;

use crate::core::domain::{NewSubmission, SubmissionStatus};
use crate::core::traits::gateway::{Gateway, GatewayError};

/// Per-archive classification produced by one extraction pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Extracted { path: PathBuf },
    AlreadyExists,
    ZipError { msg: String },
    ExtractionFailed,
}

#[derive(Clone, Debug)]
pub struct ExtractionRecord {
    pub student_id: String,
    pub outcome: ExtractionOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("submissions directory not found: {}", .path.display())]
    MissingSubmissionsDir { path: PathBuf },
    #[error("failed to read submissions directory: {msg}")]
    Unreadable { msg: String },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Unpacks every `<student_id>.zip` under `submissions_dir` into
/// `output_dir/<student_id>/` and records a submission for each archive.
///
/// Archives are handled independently: a corrupt one gets a `zip_error`
/// submission and the pass moves on. A student already known for this
/// project is skipped entirely, so re-running extraction is a no-op for
/// existing submissions. Only a missing source directory (or a gateway
/// failure) aborts the whole call.
#[tracing::instrument(skip(gateway))]
pub async fn extract_and_save_submissions(
    gateway: &dyn Gateway,
    submissions_dir: &Path,
    output_dir: &Path,
    project_id: Uuid,
) -> Result<Vec<ExtractionRecord>, ExtractionError> {
    if !submissions_dir.is_dir() {
        return Err(ExtractionError::MissingSubmissionsDir {
            path: submissions_dir.to_path_buf(),
        });
    }

    let mut records = Vec::new();
    for archive in list_archives(submissions_dir).await? {
        let Some(student_id) = archive.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!("skipping archive with unusable name: {}", archive.display());
            continue;
        };
        let student_id = student_id.to_string();

        if gateway.submission_exists(project_id, &student_id).await? {
            tracing::debug!("submission for {} already exists, skipping", student_id);
            records.push(ExtractionRecord {
                student_id,
                outcome: ExtractionOutcome::AlreadyExists,
            });
            continue;
        }

        let destination = output_dir.join(&student_id);
        let outcome = match unzip_archive(&archive, &destination).await {
            Err(msg) => {
                tracing::error!("failed to extract {}: {}", archive.display(), msg);
                gateway
                    .create_submission(NewSubmission {
                        project_id,
                        student_id: student_id.clone(),
                        status: SubmissionStatus::ZipError,
                        path: None,
                        error_message: Some(msg.clone()),
                    })
                    .await?;
                ExtractionOutcome::ZipError { msg }
            }
            Ok(()) => {
                if dir_is_nonempty(&destination).await {
                    tracing::debug!(
                        "extracted {} into {}",
                        archive.display(),
                        destination.display()
                    );
                    gateway
                        .create_submission(NewSubmission {
                            project_id,
                            student_id: student_id.clone(),
                            status: SubmissionStatus::Ready,
                            path: Some(destination.clone()),
                            error_message: None,
                        })
                        .await?;
                    ExtractionOutcome::Extracted { path: destination }
                } else {
                    tracing::error!(
                        "extraction of {} produced no files at {}",
                        archive.display(),
                        destination.display()
                    );
                    gateway
                        .create_submission(NewSubmission {
                            project_id,
                            student_id: student_id.clone(),
                            status: SubmissionStatus::ExtractionFailed,
                            path: None,
                            error_message: Some("extracted folder not found".to_string()),
                        })
                        .await?;
                    ExtractionOutcome::ExtractionFailed
                }
            }
        };

        records.push(ExtractionRecord {
            student_id,
            outcome,
        });
    }

    Ok(records)
}

async fn list_archives(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archives = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ExtractionError::Unreadable { msg: e.to_string() })?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("zip") {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// Decodes one archive on the blocking pool; the zip crate is synchronous.
async fn unzip_archive(archive: &Path, destination: &Path) -> Result<(), String> {
    let archive = archive.to_path_buf();
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || unzip_blocking(&archive, &destination))
        .await
        .map_err(|e| format!("extraction task failed: {e}"))?
}

fn unzip_blocking(archive_path: &Path, destination: &Path) -> Result<(), String> {
    let file = File::open(archive_path).map_err(|e| e.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|e| e.to_string())?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
        // Reject entries that would land outside the destination (zip slip).
        let Some(relative) = entry.enclosed_name() else {
            return Err(format!("archive contains invalid path: {}", entry.name()));
        };
        let outpath = destination.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| e.to_string())?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            let mut outfile = File::create(&outpath).map_err(|e| e.to_string())?;
            std::io::copy(&mut entry, &mut outfile).map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}

async fn dir_is_nonempty(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}
