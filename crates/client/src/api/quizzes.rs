use async_trait::async_trait;
use campus_shared::{ApiError, AttemptSubmission, NewQuiz, Quiz, QuizAttempt, QuizPatch};
use serde::Serialize;
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::crud::{CrudApi, Resource};

/// Quizzes are listed per course.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuizFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct QuizzesApi {
    client: ApiClient,
    resource: Resource,
    attempts: Resource,
}

impl QuizzesApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: Resource::new("/quiz/quizzes"),
            attempts: Resource::new("/quiz/attempts"),
        }
    }

    /// Open a new attempt for the signed-in student.
    pub async fn start_attempt(&self, quiz_id: &Uuid) -> Result<QuizAttempt, ApiError> {
        self.client
            .post_json(&self.resource.action_path(quiz_id, "attempts"), &serde_json::json!({}))
            .await
    }

    pub async fn attempt(&self, attempt_id: &Uuid) -> Result<QuizAttempt, ApiError> {
        self.client.get_json(&self.attempts.item_path(attempt_id)).await
    }

    pub async fn submit_attempt(
        &self,
        attempt_id: &Uuid,
        submission: &AttemptSubmission,
    ) -> Result<QuizAttempt, ApiError> {
        self.client
            .post_json(&self.attempts.action_path(attempt_id, "submit"), submission)
            .await
    }

    pub async fn my_attempts(&self, quiz_id: &Uuid) -> Result<Vec<QuizAttempt>, ApiError> {
        self.client
            .get_json(&self.resource.action_path(quiz_id, "attempts"))
            .await
    }
}

#[async_trait]
impl CrudApi for QuizzesApi {
    type Id = Uuid;
    type Item = Quiz;
    type Create = NewQuiz;
    type Patch = QuizPatch;
    type Filter = QuizFilter;

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
    use campus_shared::{AttemptStatus, QuizAnswer};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attempt_json(id: Uuid, quiz: Uuid, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "quiz_id": quiz,
            "student_id": Uuid::nil(),
            "status": status,
            "answers": [],
            "score": null,
            "started_at": "2026-04-01T08:00:00Z",
            "submitted_at": null
        })
    }

    #[tokio::test]
    async fn attempt_lifecycle_paths() {
        let server = MockServer::start().await;
        let quiz = Uuid::new_v4();
        let attempt = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path(format!("/quiz/quizzes/{quiz}/attempts")))
            .respond_with(ResponseTemplate::new(201).set_body_json(attempt_json(attempt, quiz, "in_progress")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/quiz/attempts/{attempt}/submit")))
            .respond_with(ResponseTemplate::new(200).set_body_json(attempt_json(attempt, quiz, "submitted")))
            .expect(1)
            .mount(&server)
            .await;

        let api = QuizzesApi::new(ApiClient::new().with_base_url(server.uri()));
        let started = api.start_attempt(&quiz).await.unwrap();
        assert_eq!(started.status, AttemptStatus::InProgress);

        let done = api
            .submit_attempt(
                &attempt,
                &AttemptSubmission {
                    answers: vec![QuizAnswer {
                        question_id: Uuid::new_v4(),
                        answer: "b".into(),
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, AttemptStatus::Submitted);
    }
}
