use async_trait::async_trait;
use campus_shared::{NewNote, Note, NoteFilter, NotePatch};
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::crud::{BatchApi, CrudApi, Resource};

/// Personal notes. The only domain with batch endpoints.
#[derive(Debug, Clone)]
pub struct NotesApi {
    client: ApiClient,
    resource: Resource,
}

impl NotesApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: Resource::new("/notes"),
        }
    }
}

#[async_trait]
impl CrudApi for NotesApi {
    type Id = Uuid;
    type Item = Note;
    type Create = NewNote;
    type Patch = NotePatch;
    type Filter = NoteFilter;

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl BatchApi for NotesApi {}
