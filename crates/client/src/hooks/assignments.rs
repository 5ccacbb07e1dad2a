use std::time::Duration;

use campus_shared::{
    ApiError, Assignment, AssignmentFilter, AssignmentPatch, AssignmentStats, Grade, NewAssignment,
    NewSubmission, Submission,
};
use uuid::Uuid;

use super::{api_query, missing};
use crate::context::ClientContext;
use crate::crud::CrudApi;
use crate::query::{Query, QueryKey, QueryState};
use crate::query_key;

pub const ASSIGNMENTS_STALE: Duration = Duration::from_secs(2 * 60);
pub const MY_SUBMISSION_STALE: Duration = Duration::from_secs(30);
pub const ASSIGNMENT_STATS_STALE: Duration = Duration::from_secs(60);
pub const SUBMISSIONS_STALE: Duration = Duration::from_secs(30);

pub fn assignments_key(filter: &AssignmentFilter) -> QueryKey {
    query_key!["assignments", filter.course_id, filter.include_unpublished]
}

pub fn assignment_key(id: Option<Uuid>) -> QueryKey {
    query_key!["assignment", id]
}

pub fn my_submission_key(assignment_id: Option<Uuid>) -> QueryKey {
    query_key!["mySubmission", assignment_id]
}

pub fn assignment_stats_key(assignment_id: Option<Uuid>) -> QueryKey {
    query_key!["assignmentStats", assignment_id]
}

pub fn submissions_key(assignment_id: Option<Uuid>) -> QueryKey {
    query_key!["submissions", assignment_id]
}

/// Everything a write to one assignment's submissions can stale.
fn submission_keys(assignment_id: Uuid) -> [QueryKey; 3] {
    [
        my_submission_key(Some(assignment_id)),
        assignment_stats_key(Some(assignment_id)),
        submissions_key(Some(assignment_id)),
    ]
}

pub fn assignments_query(ctx: &ClientContext, filter: AssignmentFilter) -> Query<Vec<Assignment>> {
    api_query(assignments_key(&filter), ASSIGNMENTS_STALE, &ctx.api.assignments, move |api| {
        let filter = filter.clone();
        async move { api.get_all(Some(&filter)).await }
    })
}

pub async fn use_assignments(ctx: &ClientContext, filter: AssignmentFilter) -> QueryState<Vec<Assignment>> {
    ctx.queries.fetch(&assignments_query(ctx, filter)).await
}

pub fn assignment_query(ctx: &ClientContext, id: Option<Uuid>) -> Query<Assignment> {
    api_query(assignment_key(id), ASSIGNMENTS_STALE, &ctx.api.assignments, move |api| async move {
        match id {
            Some(id) => api.get_one(&id).await,
            None => missing("assignment id"),
        }
    })
    .enabled(id.is_some())
}

pub async fn use_assignment(ctx: &ClientContext, id: Option<Uuid>) -> QueryState<Assignment> {
    ctx.queries.fetch(&assignment_query(ctx, id)).await
}

pub fn my_submission_query(ctx: &ClientContext, assignment_id: Option<Uuid>) -> Query<Option<Submission>> {
    api_query(
        my_submission_key(assignment_id),
        MY_SUBMISSION_STALE,
        &ctx.api.assignments,
        move |api| async move {
            match assignment_id {
                Some(id) => api.my_submission(&id).await,
                None => missing("assignment id"),
            }
        },
    )
    .enabled(assignment_id.is_some())
}

pub async fn use_my_submission(ctx: &ClientContext, assignment_id: Option<Uuid>) -> QueryState<Option<Submission>> {
    ctx.queries.fetch(&my_submission_query(ctx, assignment_id)).await
}

pub fn assignment_stats_query(ctx: &ClientContext, assignment_id: Option<Uuid>) -> Query<AssignmentStats> {
    api_query(
        assignment_stats_key(assignment_id),
        ASSIGNMENT_STATS_STALE,
        &ctx.api.assignments,
        move |api| async move {
            match assignment_id {
                Some(id) => api.stats(&id).await,
                None => missing("assignment id"),
            }
        },
    )
    .enabled(assignment_id.is_some())
}

pub async fn use_assignment_stats(ctx: &ClientContext, assignment_id: Option<Uuid>) -> QueryState<AssignmentStats> {
    ctx.queries.fetch(&assignment_stats_query(ctx, assignment_id)).await
}

pub fn submissions_query(ctx: &ClientContext, assignment_id: Option<Uuid>) -> Query<Vec<Submission>> {
    api_query(
        submissions_key(assignment_id),
        SUBMISSIONS_STALE,
        &ctx.api.assignments,
        move |api| async move {
            match assignment_id {
                Some(id) => api.submissions(&id).await,
                None => missing("assignment id"),
            }
        },
    )
    .enabled(assignment_id.is_some())
}

pub async fn use_submissions(ctx: &ClientContext, assignment_id: Option<Uuid>) -> QueryState<Vec<Submission>> {
    ctx.queries.fetch(&submissions_query(ctx, assignment_id)).await
}

// --- mutations ---

pub async fn create_assignment(ctx: &ClientContext, data: &NewAssignment) -> Result<Assignment, ApiError> {
    ctx.queries
        .mutate(&[query_key!["assignments"]], ctx.api.assignments.create(data, None))
        .await
}

pub async fn update_assignment(
    ctx: &ClientContext,
    id: Uuid,
    data: &AssignmentPatch,
) -> Result<Assignment, ApiError> {
    ctx.queries
        .mutate(
            &[query_key!["assignments"], assignment_key(Some(id))],
            ctx.api.assignments.patch(&id, data),
        )
        .await
}

pub async fn delete_assignment(ctx: &ClientContext, id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[query_key!["assignments"], assignment_key(Some(id))],
            ctx.api.assignments.delete(&id),
        )
        .await
}

pub async fn submit_assignment(
    ctx: &ClientContext,
    assignment_id: Uuid,
    submission: &NewSubmission,
) -> Result<Submission, ApiError> {
    ctx.queries
        .mutate(
            &submission_keys(assignment_id),
            ctx.api.assignments.submit(&assignment_id, submission),
        )
        .await
}

pub async fn grade_submission(
    ctx: &ClientContext,
    submission_id: Uuid,
    grade: &Grade,
) -> Result<Submission, ApiError> {
    ctx.queries
        .mutate_with(ctx.api.assignments.grade_submission(&submission_id, grade), |graded| {
            submission_keys(graded.assignment_id).to_vec()
        })
        .await
}
