use std::time::Duration;

use campus_shared::{
    ApiError, Course, CourseFilter, CoursePatch, Enrollment, Lesson, LessonPatch, NewCourse,
    NewLesson,
};
use uuid::Uuid;

use super::{api_query, missing};
use crate::context::ClientContext;
use crate::crud::{CrudApi, NestedCrudApi};
use crate::query::{Query, QueryKey, QueryState};
use crate::query_key;

pub const COURSES_STALE: Duration = Duration::from_secs(5 * 60);

pub fn courses_key(filter: &CourseFilter) -> QueryKey {
    query_key!["courses", filter]
}

pub fn course_key(id: Option<Uuid>) -> QueryKey {
    query_key!["course", id]
}

pub fn my_courses_key() -> QueryKey {
    query_key!["myCourses"]
}

pub fn lessons_key(course_id: Option<Uuid>) -> QueryKey {
    query_key!["lessons", course_id]
}

pub fn courses_query(ctx: &ClientContext, filter: CourseFilter) -> Query<Vec<Course>> {
    api_query(courses_key(&filter), COURSES_STALE, &ctx.api.courses, move |api| {
        let filter = filter.clone();
        async move { api.get_all(Some(&filter)).await }
    })
}

pub async fn use_courses(ctx: &ClientContext, filter: CourseFilter) -> QueryState<Vec<Course>> {
    ctx.queries.fetch(&courses_query(ctx, filter)).await
}

pub fn course_query(ctx: &ClientContext, id: Option<Uuid>) -> Query<Course> {
    api_query(course_key(id), COURSES_STALE, &ctx.api.courses, move |api| async move {
        match id {
            Some(id) => api.get_one(&id).await,
            None => missing("course id"),
        }
    })
    .enabled(id.is_some())
}

pub async fn use_course(ctx: &ClientContext, id: Option<Uuid>) -> QueryState<Course> {
    ctx.queries.fetch(&course_query(ctx, id)).await
}

pub fn my_courses_query(ctx: &ClientContext) -> Query<Vec<Course>> {
    api_query(my_courses_key(), COURSES_STALE, &ctx.api.courses, |api| async move {
        api.my_courses().await
    })
}

pub async fn use_my_courses(ctx: &ClientContext) -> QueryState<Vec<Course>> {
    ctx.queries.fetch(&my_courses_query(ctx)).await
}

pub fn lessons_query(ctx: &ClientContext, course_id: Option<Uuid>) -> Query<Vec<Lesson>> {
    api_query(lessons_key(course_id), COURSES_STALE, &ctx.api.lessons, move |api| async move {
        match course_id {
            Some(course_id) => api.get_all(&course_id).await,
            None => missing("course id"),
        }
    })
    .enabled(course_id.is_some())
}

pub async fn use_lessons(ctx: &ClientContext, course_id: Option<Uuid>) -> QueryState<Vec<Lesson>> {
    ctx.queries.fetch(&lessons_query(ctx, course_id)).await
}

// --- mutations ---

pub async fn create_course(ctx: &ClientContext, data: &NewCourse) -> Result<Course, ApiError> {
    ctx.queries
        .mutate(&[query_key!["courses"]], ctx.api.courses.create(data, None))
        .await
}

pub async fn update_course(ctx: &ClientContext, id: Uuid, data: &CoursePatch) -> Result<Course, ApiError> {
    ctx.queries
        .mutate(
            &[query_key!["courses"], course_key(Some(id)), my_courses_key()],
            ctx.api.courses.patch(&id, data),
        )
        .await
}

pub async fn delete_course(ctx: &ClientContext, id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[
                query_key!["courses"],
                course_key(Some(id)),
                my_courses_key(),
                lessons_key(Some(id)),
            ],
            ctx.api.courses.delete(&id),
        )
        .await
}

pub async fn enroll(ctx: &ClientContext, course_id: Uuid) -> Result<Enrollment, ApiError> {
    ctx.queries
        .mutate(
            &[my_courses_key(), course_key(Some(course_id)), query_key!["courses"]],
            ctx.api.courses.enroll(&course_id),
        )
        .await
}

pub async fn unenroll(ctx: &ClientContext, course_id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[my_courses_key(), course_key(Some(course_id)), query_key!["courses"]],
            ctx.api.courses.unenroll(&course_id),
        )
        .await
}

pub async fn create_lesson(ctx: &ClientContext, course_id: Uuid, data: &NewLesson) -> Result<Lesson, ApiError> {
    ctx.queries
        .mutate(&[lessons_key(Some(course_id))], ctx.api.lessons.create(&course_id, data))
        .await
}

pub async fn update_lesson(
    ctx: &ClientContext,
    course_id: Uuid,
    lesson_id: Uuid,
    data: &LessonPatch,
) -> Result<Lesson, ApiError> {
    ctx.queries
        .mutate(
            &[lessons_key(Some(course_id))],
            ctx.api.lessons.patch(&course_id, &lesson_id, data),
        )
        .await
}

pub async fn delete_lesson(ctx: &ClientContext, course_id: Uuid, lesson_id: Uuid) -> Result<(), ApiError> {
    ctx.queries
        .mutate(
            &[lessons_key(Some(course_id))],
            ctx.api.lessons.delete(&course_id, &lesson_id),
        )
        .await
}
