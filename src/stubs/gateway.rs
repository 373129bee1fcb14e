use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::core::domain::{
    Configuration, NewSubmission, Submission, SubmissionStatus, TestConfig,
};
use crate::core::traits::gateway::{Gateway, GatewayError};

/// In-memory persistence gateway.
///
/// Backs the demo wiring in `main` and the integration-style tests; a real
/// deployment plugs a database behind the same trait.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    configurations: DashMap<Uuid, Configuration>,
    test_configs: DashMap<Uuid, TestConfig>,
    submissions: DashMap<Uuid, Submission>,
    students: DashMap<(Uuid, String), Uuid>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project's configuration and test case, returning the
    /// freshly assigned project id.
    pub fn seed_project(&self, configuration: Configuration, test_config: TestConfig) -> Uuid {
        let project_id = Uuid::new_v4();
        self.configurations.insert(project_id, configuration);
        self.test_configs.insert(project_id, test_config);
        project_id
    }

    pub fn submission(&self, id: Uuid) -> Option<Submission> {
        self.submissions.get(&id).map(|entry| entry.clone())
    }

    pub fn submission_for_student(&self, project_id: Uuid, student_id: &str) -> Option<Submission> {
        self.students
            .get(&(project_id, student_id.to_string()))
            .and_then(|id| self.submission(*id))
    }
}

#[async_trait::async_trait]
impl Gateway for MemoryGateway {
    #[tracing::instrument]
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, GatewayError> {
        let id = Uuid::new_v4();
        match self.students.entry((new.project_id, new.student_id.clone())) {
            Entry::Occupied(_) => {
                return Err(GatewayError::Duplicate {
                    student_id: new.student_id,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = Utc::now();
        let submission = Submission {
            id,
            project_id: new.project_id,
            student_id: new.student_id,
            status: new.status,
            path: new.path,
            error_message: new.error_message,
            actual_output: None,
            created_at: now,
            updated_at: now,
        };
        self.submissions.insert(id, submission.clone());
        Ok(submission)
    }

    async fn submissions_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<Submission>, GatewayError> {
        let mut submissions: Vec<Submission> = self
            .submissions
            .iter()
            .filter(|entry| entry.project_id == project_id)
            .map(|entry| entry.clone())
            .collect();
        submissions.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        Ok(submissions)
    }

    async fn configuration_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<Configuration>, GatewayError> {
        Ok(self.configurations.get(&project_id).map(|c| c.clone()))
    }

    async fn test_config_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<TestConfig>, GatewayError> {
        Ok(self.test_configs.get(&project_id).map(|t| t.clone()))
    }

    #[tracing::instrument]
    async fn update_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        message: Option<String>,
    ) -> Result<(), GatewayError> {
        let mut submission = self.submissions.get_mut(&id).ok_or(GatewayError::NotFound {
            what: format!("submission {id}"),
        })?;
        submission.status = status;
        submission.error_message = message;
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn update_submission_output(
        &self,
        id: Uuid,
        output: String,
    ) -> Result<(), GatewayError> {
        let mut submission = self.submissions.get_mut(&id).ok_or(GatewayError::NotFound {
            what: format!("submission {id}"),
        })?;
        submission.actual_output = Some(output);
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn submission_exists(
        &self,
        project_id: Uuid,
        student_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self
            .students
            .contains_key(&(project_id, student_id.to_string())))
    }
}
