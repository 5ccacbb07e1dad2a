use std::time::Duration;

use campus_shared::{ApiError, AttemptSubmission, NewQuiz, Quiz, QuizAttempt, QuizPatch};
use uuid::Uuid;

use super::{api_query, missing};
use crate::api::quizzes::QuizFilter;
use crate::context::ClientContext;
use crate::crud::CrudApi;
use crate::query::{Query, QueryKey, QueryState};
use crate::query_key;

pub const QUIZZES_STALE: Duration = Duration::from_secs(5 * 60);
/// Attempts change while the student answers.
pub const ATTEMPT_STALE: Duration = Duration::from_secs(30);

pub fn quizzes_key(course_id: Option<Uuid>) -> QueryKey {
    query_key!["quizzes", course_id]
}

pub fn quiz_key(id: Option<Uuid>) -> QueryKey {
    query_key!["quiz", id]
}

pub fn quiz_attempt_key(attempt_id: Option<Uuid>) -> QueryKey {
    query_key!["quizAttempt", attempt_id]
}

pub fn my_attempts_key(quiz_id: Option<Uuid>) -> QueryKey {
    query_key!["quizAttempts", quiz_id]
}

pub fn quizzes_query(ctx: &ClientContext, course_id: Option<Uuid>) -> Query<Vec<Quiz>> {
    api_query(quizzes_key(course_id), QUIZZES_STALE, &ctx.api.quizzes, move |api| async move {
        api.get_all(Some(&QuizFilter { course_id })).await
    })
}

pub async fn use_quizzes(ctx: &ClientContext, course_id: Option<Uuid>) -> QueryState<Vec<Quiz>> {
    ctx.queries.fetch(&quizzes_query(ctx, course_id)).await
}

pub fn quiz_query(ctx: &ClientContext, id: Option<Uuid>) -> Query<Quiz> {
    api_query(quiz_key(id), QUIZZES_STALE, &ctx.api.quizzes, move |api| async move {
        match id {
            Some(id) => api.get_one(&id).await,
            None => missing("quiz id"),
        }
    })
    .enabled(id.is_some())
}

pub async fn use_quiz(ctx: &ClientContext, id: Option<Uuid>) -> QueryState<Quiz> {
    ctx.queries.fetch(&quiz_query(ctx, id)).await
}

pub fn quiz_attempt_query(ctx: &ClientContext, attempt_id: Option<Uuid>) -> Query<QuizAttempt> {
    api_query(quiz_attempt_key(attempt_id), ATTEMPT_STALE, &ctx.api.quizzes, move |api| async move {
        match attempt_id {
            Some(id) => api.attempt(&id).await,
            None => missing("attempt id"),
        }
    })
    .enabled(attempt_id.is_some())
}

pub async fn use_quiz_attempt(ctx: &ClientContext, attempt_id: Option<Uuid>) -> QueryState<QuizAttempt> {
    ctx.queries.fetch(&quiz_attempt_query(ctx, attempt_id)).await
}

pub fn my_attempts_query(ctx: &ClientContext, quiz_id: Option<Uuid>) -> Query<Vec<QuizAttempt>> {
    api_query(my_attempts_key(quiz_id), ATTEMPT_STALE, &ctx.api.quizzes, move |api| async move {
        match quiz_id {
            Some(id) => api.my_attempts(&id).await,
            None => missing("quiz id"),
        }
    })
    .enabled(quiz_id.is_some())
}

pub async fn use_my_attempts(ctx: &ClientContext, quiz_id: Option<Uuid>) -> QueryState<Vec<QuizAttempt>> {
    ctx.queries.fetch(&my_attempts_query(ctx, quiz_id)).await
}

// --- mutations ---

pub async fn create_quiz(ctx: &ClientContext, data: &NewQuiz) -> Result<Quiz, ApiError> {
    ctx.queries
        .mutate_with(ctx.api.quizzes.create(data, None), |quiz| {
            vec![quizzes_key(Some(quiz.course_id)), quizzes_key(None)]
        })
        .await
}

pub async fn update_quiz(ctx: &ClientContext, id: Uuid, data: &QuizPatch) -> Result<Quiz, ApiError> {
    ctx.queries
        .mutate(&[query_key!["quizzes"], quiz_key(Some(id))], ctx.api.quizzes.patch(&id, data))
        .await
}

pub async fn delete_quiz(ctx: &ClientContext, id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[query_key!["quizzes"], quiz_key(Some(id)), my_attempts_key(Some(id))],
            ctx.api.quizzes.delete(&id),
        )
        .await
}

pub async fn start_attempt(ctx: &ClientContext, quiz_id: Uuid) -> Result<QuizAttempt, ApiError> {
    ctx.queries
        .mutate(&[my_attempts_key(Some(quiz_id))], ctx.api.quizzes.start_attempt(&quiz_id))
        .await
}

pub async fn submit_attempt(
    ctx: &ClientContext,
    attempt_id: Uuid,
    submission: &AttemptSubmission,
) -> Result<QuizAttempt, ApiError> {
    ctx.queries
        .mutate_with(ctx.api.quizzes.submit_attempt(&attempt_id, submission), |attempt| {
            vec![quiz_attempt_key(Some(attempt.id)), my_attempts_key(Some(attempt.quiz_id))]
        })
        .await
}
