use async_trait::async_trait;
use campus_shared::{ApiError, Notification, NotificationFilter, NotificationPatch, UnreadCount};
use serde::de::IgnoredAny;
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::crud::{CrudApi, Resource};

#[derive(Debug, Clone)]
pub struct NotificationsApi {
    client: ApiClient,
    resource: Resource,
}

impl NotificationsApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: Resource::new("/notifications"),
        }
    }

    pub async fn mark_read(&self, id: &Uuid) -> Result<Notification, ApiError> {
        self.patch(id, &NotificationPatch { is_read: true }).await
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .post_json(
                &format!("{}/mark-all-read", self.resource.path()),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    pub async fn unread_count(&self) -> Result<UnreadCount, ApiError> {
        self.client
            .get_json(&format!("{}/unread-count", self.resource.path()))
            .await
    }
}

#[async_trait]
impl CrudApi for NotificationsApi {
    type Id = Uuid;
    type Item = Notification;
    /// Notifications are created server-side; the body is passed through.
    type Create = serde_json::Value;
    type Patch = NotificationPatch;
    type Filter = NotificationFilter;

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Only the signed-in user's notifications are listable.
    async fn get_all(&self, params: Option<&NotificationFilter>) -> Result<Vec<Notification>, ApiError> {
        let path = format!("{}/me", self.resource.path());
        match params {
            Some(params) => self.client.get_json_with_query(&path, params).await,
            None => self.client.get_json(&path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_all_goes_to_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notifications/me"))
            .and(query_param("unread_only", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": Uuid::nil(),
                "kind": "grade",
                "title": "Essay graded",
                "body": null,
                "link": null,
                "is_read": false,
                "created_at": "2026-05-01T12:00:00Z"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let api = NotificationsApi::new(ApiClient::new().with_base_url(server.uri()));
        let list = api
            .get_all(Some(&NotificationFilter { unread_only: true }))
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert!(!list[0].is_read);
    }

    #[tokio::test]
    async fn mark_read_patches_flag_and_mark_all_ignores_body() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("PATCH"))
            .and(path(format!("/notifications/{id}")))
            .and(body_json(json!({"is_read": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "kind": "grade",
                "title": "t",
                "body": null,
                "link": null,
                "is_read": true,
                "created_at": "2026-05-01T12:00:00Z"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/notifications/mark-all-read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updated": 4})))
            .mount(&server)
            .await;

        let api = NotificationsApi::new(ApiClient::new().with_base_url(server.uri()));
        assert!(api.mark_read(&id).await.unwrap().is_read);
        api.mark_all_read().await.unwrap();
    }
}
