use std::time::Duration;

use campus_shared::{
    ApiError, LearningTrack, LearningTrackPatch, NewLearningTrack, NewTopic, Topic, TopicPatch,
    TopicProgress,
};
use uuid::Uuid;

use super::{api_query, missing};
use crate::context::ClientContext;
use crate::crud::{CrudApi, NestedCrudApi};
use crate::query::{Query, QueryKey, QueryState};
use crate::query_key;

/// Track metadata rarely changes.
pub const TRACKS_STALE: Duration = Duration::from_secs(5 * 60);
pub const TOPIC_PROGRESS_STALE: Duration = Duration::from_secs(30);

pub fn tracks_key() -> QueryKey {
    query_key!["learningTracks"]
}

pub fn track_key(id: Option<Uuid>) -> QueryKey {
    query_key!["learningTrack", id]
}

pub fn topics_key(track_id: Option<Uuid>) -> QueryKey {
    query_key!["topics", track_id]
}

pub fn topic_progress_key(topic_id: Option<Uuid>) -> QueryKey {
    query_key!["topicProgress", topic_id]
}

pub fn tracks_query(ctx: &ClientContext) -> Query<Vec<LearningTrack>> {
    api_query(tracks_key(), TRACKS_STALE, &ctx.api.tracks, |api| async move {
        api.get_all(None).await
    })
}

pub async fn use_tracks(ctx: &ClientContext) -> QueryState<Vec<LearningTrack>> {
    ctx.queries.fetch(&tracks_query(ctx)).await
}

pub fn track_query(ctx: &ClientContext, id: Option<Uuid>) -> Query<LearningTrack> {
    api_query(track_key(id), TRACKS_STALE, &ctx.api.tracks, move |api| async move {
        match id {
            Some(id) => api.get_one(&id).await,
            None => missing("track id"),
        }
    })
    .enabled(id.is_some())
}

pub async fn use_track(ctx: &ClientContext, id: Option<Uuid>) -> QueryState<LearningTrack> {
    ctx.queries.fetch(&track_query(ctx, id)).await
}

pub fn topics_query(ctx: &ClientContext, track_id: Option<Uuid>) -> Query<Vec<Topic>> {
    api_query(topics_key(track_id), TRACKS_STALE, &ctx.api.topics, move |api| async move {
        match track_id {
            Some(id) => api.get_all(&id).await,
            None => missing("track id"),
        }
    })
    .enabled(track_id.is_some())
}

pub async fn use_topics(ctx: &ClientContext, track_id: Option<Uuid>) -> QueryState<Vec<Topic>> {
    ctx.queries.fetch(&topics_query(ctx, track_id)).await
}

pub fn topic_progress_query(ctx: &ClientContext, topic_id: Option<Uuid>) -> Query<TopicProgress> {
    api_query(
        topic_progress_key(topic_id),
        TOPIC_PROGRESS_STALE,
        &ctx.api.tracks,
        move |api| async move {
            match topic_id {
                Some(id) => api.topic_progress(&id).await,
                None => missing("topic id"),
            }
        },
    )
    .enabled(topic_id.is_some())
}

pub async fn use_topic_progress(ctx: &ClientContext, topic_id: Option<Uuid>) -> QueryState<TopicProgress> {
    ctx.queries.fetch(&topic_progress_query(ctx, topic_id)).await
}

// --- mutations ---

pub async fn create_track(ctx: &ClientContext, data: &NewLearningTrack) -> Result<LearningTrack, ApiError> {
    ctx.queries
        .mutate(&[tracks_key()], ctx.api.tracks.create(data, None))
        .await
}

pub async fn update_track(
    ctx: &ClientContext,
    id: Uuid,
    data: &LearningTrackPatch,
) -> Result<LearningTrack, ApiError> {
    ctx.queries
        .mutate(&[tracks_key(), track_key(Some(id))], ctx.api.tracks.patch(&id, data))
        .await
}

pub async fn delete_track(ctx: &ClientContext, id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[tracks_key(), track_key(Some(id)), topics_key(Some(id))],
            ctx.api.tracks.delete(&id),
        )
        .await
}

/// Topic writes also change the parent track's topic count.
fn topic_keys(track_id: Uuid) -> [QueryKey; 3] {
    [topics_key(Some(track_id)), track_key(Some(track_id)), tracks_key()]
}

pub async fn create_topic(ctx: &ClientContext, track_id: Uuid, data: &NewTopic) -> Result<Topic, ApiError> {
    ctx.queries
        .mutate(&topic_keys(track_id), ctx.api.topics.create(&track_id, data))
        .await
}

pub async fn update_topic(
    ctx: &ClientContext,
    track_id: Uuid,
    topic_id: Uuid,
    data: &TopicPatch,
) -> Result<Topic, ApiError> {
    ctx.queries
        .mutate(
            &[topics_key(Some(track_id))],
            ctx.api.topics.patch(&track_id, &topic_id, data),
        )
        .await
}

pub async fn delete_topic(ctx: &ClientContext, track_id: Uuid, topic_id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[
                topics_key(Some(track_id)),
                track_key(Some(track_id)),
                tracks_key(),
                topic_progress_key(Some(topic_id)),
            ],
            ctx.api.topics.delete(&track_id, &topic_id),
        )
        .await
}

pub async fn complete_topic(ctx: &ClientContext, topic_id: Uuid) -> Result<TopicProgress, ApiError> {
    ctx.queries
        .mutate(&[topic_progress_key(Some(topic_id))], ctx.api.tracks.complete_topic(&topic_id))
        .await
}
