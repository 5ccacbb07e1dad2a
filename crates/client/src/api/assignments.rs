use async_trait::async_trait;
use campus_shared::{
    ApiError, Assignment, AssignmentFilter, AssignmentPatch, AssignmentStats, Grade, NewAssignment,
    NewSubmission, Submission,
};
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::crud::{CrudApi, Resource};

#[derive(Debug, Clone)]
pub struct AssignmentsApi {
    client: ApiClient,
    resource: Resource,
}

impl AssignmentsApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: Resource::new("/assignments"),
        }
    }

    pub async fn submit(&self, assignment_id: &Uuid, submission: &NewSubmission) -> Result<Submission, ApiError> {
        self.client
            .post_json(&self.resource.action_path(assignment_id, "submit"), submission)
            .await
    }

    /// The caller's own submission, `None` when they have not submitted yet.
    pub async fn my_submission(&self, assignment_id: &Uuid) -> Result<Option<Submission>, ApiError> {
        match self
            .client
            .get_json(&self.resource.action_path(assignment_id, "my-submission"))
            .await
        {
            Ok(submission) => Ok(submission),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn stats(&self, assignment_id: &Uuid) -> Result<AssignmentStats, ApiError> {
        self.client
            .get_json(&self.resource.action_path(assignment_id, "stats"))
            .await
    }

    /// Every submission for an assignment (instructor view).
    pub async fn submissions(&self, assignment_id: &Uuid) -> Result<Vec<Submission>, ApiError> {
        self.client
            .get_json(&self.resource.action_path(assignment_id, "submissions"))
            .await
    }

    pub async fn grade_submission(&self, submission_id: &Uuid, grade: &Grade) -> Result<Submission, ApiError> {
        self.client
            .post_json(
                &format!("{}/submissions/{}/grade", self.resource.path(), submission_id),
                grade,
            )
            .await
    }
}

#[async_trait]
impl CrudApi for AssignmentsApi {
    type Id = Uuid;
    type Item = Assignment;
    type Create = NewAssignment;
    type Patch = AssignmentPatch;
    type Filter = AssignmentFilter;

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submission_json(id: Uuid, assignment: Uuid) -> serde_json::Value {
        json!({
            "id": id,
            "assignment_id": assignment,
            "student_id": Uuid::nil(),
            "content": "my essay",
            "attachment_url": null,
            "status": "submitted",
            "grade": null,
            "feedback": null,
            "submitted_at": "2026-03-01T09:30:00Z"
        })
    }

    #[tokio::test]
    async fn missing_submission_is_none() {
        let server = MockServer::start().await;
        let assignment = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path(format!("/assignments/{assignment}/my-submission")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = AssignmentsApi::new(ApiClient::new().with_base_url(server.uri()));
        assert_eq!(api.my_submission(&assignment).await.unwrap(), None);
    }

    #[tokio::test]
    async fn submit_posts_body() {
        let server = MockServer::start().await;
        let assignment = Uuid::new_v4();
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path(format!("/assignments/{assignment}/submit")))
            .and(body_json(json!({"content": "my essay"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(submission_json(id, assignment)))
            .expect(1)
            .mount(&server)
            .await;

        let api = AssignmentsApi::new(ApiClient::new().with_base_url(server.uri()));
        let submission = api
            .submit(
                &assignment,
                &NewSubmission {
                    content: "my essay".into(),
                    attachment_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(submission.id, id);
    }

    #[tokio::test]
    async fn stats_server_error_passes_through() {
        let server = MockServer::start().await;
        let assignment = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path(format!("/assignments/{assignment}/stats")))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let api = AssignmentsApi::new(ApiClient::new().with_base_url(server.uri()));
        let err = api.stats(&assignment).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 503,
                body: "maintenance".into()
            }
        );
    }
}
