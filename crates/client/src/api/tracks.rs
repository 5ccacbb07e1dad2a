use async_trait::async_trait;
use campus_shared::{
    ApiError, LearningTrack, LearningTrackPatch, NewLearningTrack, NewTopic, Topic, TopicPatch,
    TopicProgress,
};
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::crud::{CrudApi, NestedCrudApi, NestedResource, Resource};

#[derive(Debug, Clone)]
pub struct LearningTracksApi {
    client: ApiClient,
    resource: Resource,
}

impl LearningTracksApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: Resource::new("/learning-tracks"),
        }
    }

    fn topic_path(&self, topic_id: &Uuid, action: &str) -> String {
        format!("{}/topics/{}/{}", self.resource.path(), topic_id, action)
    }

    pub async fn topic_progress(&self, topic_id: &Uuid) -> Result<TopicProgress, ApiError> {
        self.client.get_json(&self.topic_path(topic_id, "progress")).await
    }

    pub async fn complete_topic(&self, topic_id: &Uuid) -> Result<TopicProgress, ApiError> {
        self.client
            .post_json(&self.topic_path(topic_id, "complete"), &serde_json::json!({}))
            .await
    }
}

#[async_trait]
impl CrudApi for LearningTracksApi {
    type Id = Uuid;
    type Item = LearningTrack;
    type Create = NewLearningTrack;
    type Patch = LearningTrackPatch;
    type Filter = ();

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// `/learning-tracks/{track_id}/topics`
#[derive(Debug, Clone)]
pub struct TopicsApi {
    client: ApiClient,
    resource: NestedResource,
}

impl TopicsApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: NestedResource::new("/learning-tracks", "topics"),
        }
    }
}

#[async_trait]
impl NestedCrudApi for TopicsApi {
    type ParentId = Uuid;
    type Id = Uuid;
    type Item = Topic;
    type Create = NewTopic;
    type Patch = TopicPatch;

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &NestedResource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn complete_topic_returns_progress() {
        let server = MockServer::start().await;
        let topic = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path(format!("/learning-tracks/topics/{topic}/complete")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "topic_id": topic,
                "completed": true,
                "completed_at": "2026-06-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = LearningTracksApi::new(ApiClient::new().with_base_url(server.uri()));
        let progress = api.complete_topic(&topic).await.unwrap();
        assert!(progress.completed);
    }

    #[tokio::test]
    async fn topics_are_nested_under_track() {
        let server = MockServer::start().await;
        let track = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path(format!("/learning-tracks/{track}/topics")))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": Uuid::nil(),
                "track_id": track,
                "title": "Traits",
                "position": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = TopicsApi::new(ApiClient::new().with_base_url(server.uri()));
        let topic = api
            .create(
                &track,
                &NewTopic {
                    title: "Traits".into(),
                    position: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(topic.track_id, track);
    }
}
