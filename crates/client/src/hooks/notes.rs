use std::time::Duration;

use campus_shared::{ApiError, BatchResult, NewNote, Note, NoteFilter, NotePatch};
use uuid::Uuid;

use super::{api_query, missing};
use crate::context::ClientContext;
use crate::crud::{BatchApi, CrudApi};
use crate::query::{Query, QueryKey, QueryState};
use crate::query_key;

pub const NOTES_STALE: Duration = Duration::from_secs(60);

pub fn notes_key(filter: &NoteFilter) -> QueryKey {
    query_key!["notes", filter]
}

pub fn note_key(id: Option<Uuid>) -> QueryKey {
    query_key!["note", id]
}

pub fn notes_query(ctx: &ClientContext, filter: NoteFilter) -> Query<Vec<Note>> {
    api_query(notes_key(&filter), NOTES_STALE, &ctx.api.notes, move |api| {
        let filter = filter.clone();
        async move { api.get_all(Some(&filter)).await }
    })
}

pub async fn use_notes(ctx: &ClientContext, filter: NoteFilter) -> QueryState<Vec<Note>> {
    ctx.queries.fetch(&notes_query(ctx, filter)).await
}

pub fn note_query(ctx: &ClientContext, id: Option<Uuid>) -> Query<Note> {
    api_query(note_key(id), NOTES_STALE, &ctx.api.notes, move |api| async move {
        match id {
            Some(id) => api.get_one(&id).await,
            None => missing("note id"),
        }
    })
    .enabled(id.is_some())
}

pub async fn use_note(ctx: &ClientContext, id: Option<Uuid>) -> QueryState<Note> {
    ctx.queries.fetch(&note_query(ctx, id)).await
}

// --- mutations ---

pub async fn create_note(ctx: &ClientContext, data: &NewNote) -> Result<Note, ApiError> {
    ctx.queries
        .mutate(&[query_key!["notes"]], ctx.api.notes.create(data, None))
        .await
}

pub async fn update_note(ctx: &ClientContext, id: Uuid, data: &NotePatch) -> Result<Note, ApiError> {
    ctx.queries
        .mutate(&[query_key!["notes"], note_key(Some(id))], ctx.api.notes.patch(&id, data))
        .await
}

/// Full replace through PUT.
pub async fn replace_note(ctx: &ClientContext, id: Uuid, data: &NewNote) -> Result<Note, ApiError> {
    ctx.queries
        .mutate(&[query_key!["notes"], note_key(Some(id))], ctx.api.notes.update(&id, data))
        .await
}

pub async fn delete_note(ctx: &ClientContext, id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(&[query_key!["notes"], note_key(Some(id))], ctx.api.notes.delete(&id))
        .await
}

pub async fn create_notes(ctx: &ClientContext, items: &[NewNote]) -> Result<Vec<Note>, ApiError> {
    ctx.queries
        .mutate(&[query_key!["notes"]], ctx.api.notes.batch_create(items))
        .await
}

pub async fn delete_notes(ctx: &ClientContext, ids: &[Uuid]) -> Result<BatchResult, ApiError> {
    let mut keys = vec![query_key!["notes"]];
    keys.extend(ids.iter().map(|id| note_key(Some(*id))));
    ctx.queries.mutate(&keys, ctx.api.notes.batch_delete(ids)).await
}
