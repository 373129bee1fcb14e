use uuid::Uuid;

use crate::core::domain::{
    Configuration, NewSubmission, Submission, SubmissionStatus, TestConfig,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("not found: {what}")]
    NotFound { what: String },
    #[error("submission already exists for student {student_id}")]
    Duplicate { student_id: String },
    #[error("persistence backend failure: {msg}")]
    Backend { msg: String },
}

/// Persistence seam for the grading pipeline.
///
/// The orchestrator is the only writer of submission statuses; everything
/// behind this trait (schema, queries, serialization) is somebody else's
/// problem.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Gateway: std::fmt::Debug + Send + Sync {
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, GatewayError>;

    async fn submissions_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<Submission>, GatewayError>;

    async fn configuration_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<Configuration>, GatewayError>;

    async fn test_config_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<TestConfig>, GatewayError>;

    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        message: Option<String>,
    ) -> Result<(), GatewayError>;

    async fn update_submission_output(&self, id: Uuid, output: String)
    -> Result<(), GatewayError>;

    async fn submission_exists(
        &self,
        project_id: Uuid,
        student_id: &str,
    ) -> Result<bool, GatewayError>;
}
