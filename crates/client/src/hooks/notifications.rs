use std::time::Duration;

use campus_shared::{ApiError, Notification, NotificationFilter, UnreadCount};
use uuid::Uuid;

use super::api_query;
use crate::context::ClientContext;
use crate::crud::CrudApi;
use crate::query::{Query, QueryKey, QueryState};
use crate::query_key;

pub const NOTIFICATIONS_STALE: Duration = Duration::from_secs(30);

pub fn notifications_key(unread_only: bool) -> QueryKey {
    query_key!["notifications", unread_only]
}

/// Shares the `notifications` prefix, so every notification write refreshes it.
pub fn unread_count_key() -> QueryKey {
    query_key!["notifications", "unreadCount"]
}

pub fn notifications_query(ctx: &ClientContext, unread_only: bool) -> Query<Vec<Notification>> {
    api_query(
        notifications_key(unread_only),
        NOTIFICATIONS_STALE,
        &ctx.api.notifications,
        move |api| async move { api.get_all(Some(&NotificationFilter { unread_only })).await },
    )
}

pub async fn use_notifications(ctx: &ClientContext, unread_only: bool) -> QueryState<Vec<Notification>> {
    ctx.queries.fetch(&notifications_query(ctx, unread_only)).await
}

pub fn unread_count_query(ctx: &ClientContext) -> Query<UnreadCount> {
    api_query(unread_count_key(), NOTIFICATIONS_STALE, &ctx.api.notifications, |api| async move {
        api.unread_count().await
    })
}

pub async fn use_unread_count(ctx: &ClientContext) -> QueryState<UnreadCount> {
    ctx.queries.fetch(&unread_count_query(ctx)).await
}

// --- mutations ---

pub async fn mark_notification_read(ctx: &ClientContext, id: Uuid) -> Result<Notification, ApiError> {
    ctx.queries
        .mutate(&[query_key!["notifications"]], ctx.api.notifications.mark_read(&id))
        .await
}

pub async fn mark_all_notifications_read(ctx: &ClientContext) -> Result<(), ApiError> {
    ctx.queries
        .mutate(&[query_key!["notifications"]], ctx.api.notifications.mark_all_read())
        .await
}

pub async fn delete_notification(ctx: &ClientContext, id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(&[query_key!["notifications"]], ctx.api.notifications.delete(&id))
        .await
}
