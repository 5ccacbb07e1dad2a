//! Generic CRUD surface over REST resources.
//!
//! A domain API implements [`CrudApi`] by naming its types and base path and
//! gets `get_all / get_one / create / update / patch / delete` for free. Any
//! default can be overridden in the domain impl; custom operations live in the
//! domain's inherent impl. Every operation is a pass-through to
//! [`ApiClient`]: no retries, errors surface unchanged.

use std::fmt;

use async_trait::async_trait;
use campus_shared::{ApiError, BatchResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api_client::ApiClient;

/// Extra query parameters for `create`.
pub type QueryParams<'a> = &'a [(&'a str, &'a str)];

/// A REST collection identified by its base path, e.g. `/courses`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    base_path: String,
}

impl Resource {
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        let base_path = format!("/{}", base_path.trim_matches('/'));
        Self { base_path }
    }

    pub fn path(&self) -> &str {
        &self.base_path
    }

    pub fn item_path(&self, id: &impl fmt::Display) -> String {
        format!("{}/{}", self.base_path, id)
    }

    /// Path of a sub-operation on one item, e.g. `/courses/{id}/enroll`.
    pub fn action_path(&self, id: &impl fmt::Display, action: &str) -> String {
        format!("{}/{}/{}", self.base_path, id, action.trim_matches('/'))
    }
}

/// A collection that only exists under a parent item, e.g.
/// `/courses/{course_id}/lessons`. The parent id is passed on every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedResource {
    parent: Resource,
    child: String,
}

impl NestedResource {
    pub fn new(parent_path: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: Resource::new(parent_path),
            child: child.into().trim_matches('/').to_string(),
        }
    }

    pub fn collection_path(&self, parent_id: &impl fmt::Display) -> String {
        self.parent.action_path(parent_id, &self.child)
    }

    pub fn item_path(&self, parent_id: &impl fmt::Display, id: &impl fmt::Display) -> String {
        format!("{}/{}", self.collection_path(parent_id), id)
    }
}

#[async_trait]
pub trait CrudApi: Send + Sync {
    type Id: fmt::Display + Serialize + Send + Sync;
    type Item: DeserializeOwned + Send;
    /// Body for `create` and the full replace done by `update`.
    type Create: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;
    /// Query parameters accepted by `get_all`.
    type Filter: Serialize + Send + Sync;

    fn client(&self) -> &ApiClient;

    fn resource(&self) -> &Resource;

    /// GET the collection, optionally filtered.
    async fn get_all(&self, params: Option<&Self::Filter>) -> Result<Vec<Self::Item>, ApiError> {
        let path = self.resource().path();
        match params {
            Some(params) => self.client().get_json_with_query(path, params).await,
            None => self.client().get_json(path).await,
        }
    }

    /// GET one item. A missing item is [`ApiError::NotFound`].
    async fn get_one(&self, id: &Self::Id) -> Result<Self::Item, ApiError> {
        self.client().get_json(&self.resource().item_path(id)).await
    }

    /// POST a new item; returns the server representation with its id.
    async fn create(
        &self,
        data: &Self::Create,
        params: Option<QueryParams<'_>>,
    ) -> Result<Self::Item, ApiError> {
        let path = self.resource().path();
        match params {
            Some(params) => self.client().post_json_with_query(path, data, params).await,
            None => self.client().post_json(path, data).await,
        }
    }

    /// PUT a full replacement.
    async fn update(&self, id: &Self::Id, data: &Self::Create) -> Result<Self::Item, ApiError> {
        self.client().put_json(&self.resource().item_path(id), data).await
    }

    /// PATCH a partial update.
    async fn patch(&self, id: &Self::Id, data: &Self::Patch) -> Result<Self::Item, ApiError> {
        self.client().patch_json(&self.resource().item_path(id), data).await
    }

    async fn delete(&self, id: &Self::Id) -> Result<(), ApiError> {
        self.client().delete(&self.resource().item_path(id)).await
    }
}

/// Opt-in batch endpoints: `POST {base}/batch` and `POST {base}/batch-delete`.
#[async_trait]
pub trait BatchApi: CrudApi {
    async fn batch_create(&self, items: &[Self::Create]) -> Result<Vec<Self::Item>, ApiError> {
        let path = format!("{}/batch", self.resource().path());
        self.client().post_json(&path, items).await
    }

    async fn batch_delete(&self, ids: &[Self::Id]) -> Result<BatchResult, ApiError> {
        let path = format!("{}/batch-delete", self.resource().path());
        self.client()
            .post_json(&path, &serde_json::json!({ "ids": ids }))
            .await
    }
}

/// CRUD over a [`NestedResource`]. Nothing about the parent is remembered
/// between calls.
#[async_trait]
pub trait NestedCrudApi: Send + Sync {
    type ParentId: fmt::Display + Send + Sync;
    type Id: fmt::Display + Send + Sync;
    type Item: DeserializeOwned + Send;
    type Create: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    fn client(&self) -> &ApiClient;

    fn resource(&self) -> &NestedResource;

    async fn get_all(&self, parent_id: &Self::ParentId) -> Result<Vec<Self::Item>, ApiError> {
        self.client()
            .get_json(&self.resource().collection_path(parent_id))
            .await
    }

    async fn get_one(&self, parent_id: &Self::ParentId, id: &Self::Id) -> Result<Self::Item, ApiError> {
        self.client()
            .get_json(&self.resource().item_path(parent_id, id))
            .await
    }

    async fn create(&self, parent_id: &Self::ParentId, data: &Self::Create) -> Result<Self::Item, ApiError> {
        self.client()
            .post_json(&self.resource().collection_path(parent_id), data)
            .await
    }

    async fn update(
        &self,
        parent_id: &Self::ParentId,
        id: &Self::Id,
        data: &Self::Create,
    ) -> Result<Self::Item, ApiError> {
        self.client()
            .put_json(&self.resource().item_path(parent_id, id), data)
            .await
    }

    async fn patch(
        &self,
        parent_id: &Self::ParentId,
        id: &Self::Id,
        data: &Self::Patch,
    ) -> Result<Self::Item, ApiError> {
        self.client()
            .patch_json(&self.resource().item_path(parent_id, id), data)
            .await
    }

    async fn delete(&self, parent_id: &Self::ParentId, id: &Self::Id) -> Result<(), ApiError> {
        self.client()
            .delete(&self.resource().item_path(parent_id, id))
            .await
    }
}
