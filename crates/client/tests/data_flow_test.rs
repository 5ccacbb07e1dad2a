//! End-to-end data flow through `ClientContext`
//!
//! Runs the hooks against a wiremock backend with a manual clock:
//! - cached list reads inside the staleness window
//! - write, invalidate and refetch of mounted lists
//! - invalidation sets of the assignment, course, notification and track hooks
//! - restored sessions, identity switches and the sockets they unlock

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_client::auth_session::ProviderSession;
use campus_client::hooks::{self, note_key, note_query, notes_query};
use campus_client::query::ManualClock;
use campus_client::{AuthSession, ClientConfig, ClientContext, ConnectionState, IdentityProvider, Storage};
use campus_shared::{
    ApiError, CourseFilter, Grade, NewNote, NewSubmission, Note, NoteFilter, NotePatch, Role,
    SubmissionStatus, User,
};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context(server: &MockServer, clock: &ManualClock, storage: Option<Storage>) -> ClientContext {
    context_with(server, clock, storage, None)
}

fn context_with(
    server: &MockServer,
    clock: &ManualClock,
    storage: Option<Storage>,
    provider: Option<Arc<dyn IdentityProvider>>,
) -> ClientContext {
    let config = ClientConfig {
        api_url: server.uri(),
        ..ClientConfig::default()
    };
    ClientContext::with_parts(config, storage, provider, Arc::new(clock.clone()))
}

/// Answer `first` once, then `then` for every later request.
async fn mount_changing(server: &MockServer, verb: &str, route: &str, first: Value, then: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(then))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

fn user(email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.into(),
        full_name: None,
        role: Role::Student,
        avatar_url: None,
    }
}

fn course_json(title: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "title": title,
        "description": null,
        "instructor_id": Uuid::new_v4(),
        "is_public": true,
        "enrolled_count": 3,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": null
    })
}

fn note_json(id: Uuid, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": "",
        "course_id": null,
        "tags": [],
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": null
    })
}

// =============================================================================
// Cached reads
// =============================================================================

#[tokio::test]
async fn course_list_is_served_from_cache_while_fresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([course_json("Rust 101")])))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);

    let first = hooks::use_courses(&ctx, CourseFilter::default()).await;
    assert!(first.is_success());
    assert_eq!(first.data.as_ref().map(Vec::len), Some(1));

    clock.advance(Duration::from_secs(4 * 60));
    let second = hooks::use_courses(&ctx, CourseFilter::default()).await;
    assert_eq!(second.data, first.data);
    assert!(!second.is_stale);
    assert!(!second.is_fetching);
}

#[tokio::test]
async fn differently_filtered_lists_are_cached_apart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let public = CourseFilter {
        is_public: Some(true),
        ..Default::default()
    };

    hooks::use_courses(&ctx, CourseFilter::default()).await;
    hooks::use_courses(&ctx, public.clone()).await;
    hooks::use_courses(&ctx, public).await;
}

// =============================================================================
// Writes and invalidation
// =============================================================================

#[tokio::test]
async fn created_note_shows_up_in_mounted_list() {
    let server = MockServer::start().await;
    let existing = Uuid::new_v4();
    let created = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([note_json(existing, "Old")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            note_json(existing, "Old"),
            note_json(created, "Lecture 3")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(note_json(created, "Lecture 3")))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let watcher = ctx.queries.watch(notes_query(&ctx, NoteFilter::default()));
    assert_eq!(watcher.fetch().await.data.map(|n| n.len()), Some(1));

    let note = hooks::create_note(
        &ctx,
        &NewNote {
            title: "Lecture 3".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(note.id, created);

    // The refetch already settled when the mutation returned.
    let notes = watcher.state().data.unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().any(|n| n.title == "Lecture 3"));
}

#[tokio::test]
async fn failed_create_leaves_cached_list_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(422).set_body_string("title is required"))
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    hooks::use_notes(&ctx, NoteFilter::default()).await;

    let err = hooks::create_note(&ctx, &NewNote::default()).await.unwrap_err();
    assert_eq!(err.status(), Some(422));

    let state = ctx
        .queries
        .state::<Vec<Note>>(&hooks::notes_key(&NoteFilter::default()));
    assert!(!state.is_stale);
}

#[tokio::test]
async fn updated_note_is_refetched_after_invalidation() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let item = format!("/notes/{}", id);

    Mock::given(method("GET"))
        .and(path(item.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(note_json(id, "Draft")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(item.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(note_json(id, "Final")))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(item.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(note_json(id, "Final")))
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let before = hooks::use_note(&ctx, Some(id)).await;
    assert_eq!(before.data.unwrap().title, "Draft");

    let patch = NotePatch {
        title: Some("Final".into()),
        ..Default::default()
    };
    hooks::update_note(&ctx, id, &patch).await.unwrap();
    assert!(ctx.queries.state::<Note>(&note_key(Some(id))).is_stale);

    let after = ctx.queries.refetch(&note_query(&ctx, Some(id))).await;
    assert_eq!(after.data.unwrap().title, "Final");
    assert!(!after.is_stale);
}

#[tokio::test]
async fn note_without_id_never_fetches() {
    let server = MockServer::start().await;
    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);

    let state = hooks::use_note(&ctx, None).await;
    assert!(state.data.is_none());
    assert!(!state.is_fetching);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// =============================================================================
// Sessions and sockets
// =============================================================================

#[tokio::test]
async fn restored_session_unlocks_sockets() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::at(dir.path());
    let session = AuthSession {
        user: User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            full_name: Some("Ada".into()),
            role: Role::Student,
            avatar_url: None,
        },
        access_token: "token-1".into(),
        refresh_token: None,
        csrf_token: "csrf-1".into(),
    };
    assert!(storage.save("campus_session", &session));

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, Some(storage));
    assert!(ctx.socket("course-1").is_none());

    let restored = ctx.restore_session().unwrap();
    assert_eq!(restored.user.email, "ada@example.com");
    assert_eq!(ctx.http.credentials().access_token.as_deref(), Some("token-1"));

    let socket = ctx.socket("course-1").unwrap();
    assert_eq!(socket.state(), ConnectionState::Idle);
    // Nothing is queued while the socket is down.
    assert!(!socket.send("chat", json!({ "text": "hi" })));

    // Same scope, same socket.
    ctx.socket("course-1").unwrap();
    assert_eq!(ctx.sockets.len(), 1);
}

// =============================================================================
// Hook invalidation sets
// =============================================================================

fn submission_json(id: Uuid, assignment_id: Uuid, status: &str, grade: Option<f32>) -> Value {
    json!({
        "id": id,
        "assignment_id": assignment_id,
        "student_id": Uuid::new_v4(),
        "content": "my essay",
        "attachment_url": null,
        "status": status,
        "grade": grade,
        "feedback": null,
        "submitted_at": "2024-03-01T12:00:00Z"
    })
}

fn stats_json(assignment_id: Uuid, submitted: u32, graded: u32) -> Value {
    json!({
        "assignment_id": assignment_id,
        "total_students": 10,
        "submitted": submitted,
        "graded": graded,
        "average_grade": null
    })
}

#[tokio::test]
async fn submitting_refreshes_submission_views_of_that_assignment_only() {
    let server = MockServer::start().await;
    let assignment = Uuid::new_v4();
    let other = Uuid::new_v4();
    let submission = Uuid::new_v4();
    let submitted = submission_json(submission, assignment, "submitted", None);

    mount_changing(
        &server,
        "GET",
        &format!("/assignments/{assignment}/my-submission"),
        Value::Null,
        submitted.clone(),
    )
    .await;
    mount_changing(
        &server,
        "GET",
        &format!("/assignments/{assignment}/stats"),
        stats_json(assignment, 0, 0),
        stats_json(assignment, 1, 0),
    )
    .await;
    mount_changing(
        &server,
        "GET",
        &format!("/assignments/{assignment}/submissions"),
        json!([]),
        json!([submitted.clone()]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/assignments/{other}/stats")))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(other, 4, 4)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/assignments/{assignment}/submit")))
        .respond_with(ResponseTemplate::new(201).set_body_json(submitted))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let mine = ctx.queries.watch(hooks::my_submission_query(&ctx, Some(assignment)));
    let stats = ctx.queries.watch(hooks::assignment_stats_query(&ctx, Some(assignment)));
    let list = ctx.queries.watch(hooks::submissions_query(&ctx, Some(assignment)));
    let other_stats = ctx.queries.watch(hooks::assignment_stats_query(&ctx, Some(other)));
    assert_eq!(mine.fetch().await.data, Some(None));
    assert_eq!(stats.fetch().await.data.map(|s| s.submitted), Some(0));
    assert_eq!(list.fetch().await.data.map(|l| l.len()), Some(0));
    assert!(other_stats.fetch().await.is_success());

    let created = hooks::submit_assignment(
        &ctx,
        assignment,
        &NewSubmission {
            content: "my essay".into(),
            attachment_url: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(created.id, submission);

    assert_eq!(mine.state().data.flatten().map(|s| s.id), Some(submission));
    assert_eq!(stats.state().data.map(|s| s.submitted), Some(1));
    assert_eq!(list.state().data.map(|l| l.len()), Some(1));
    assert!(!other_stats.state().is_stale);
}

#[tokio::test]
async fn grading_refreshes_views_of_the_graded_submissions_assignment() {
    let server = MockServer::start().await;
    let assignment = Uuid::new_v4();
    let submission = Uuid::new_v4();
    let graded = submission_json(submission, assignment, "graded", Some(9.5));

    mount_changing(
        &server,
        "GET",
        &format!("/assignments/{assignment}/submissions"),
        json!([submission_json(submission, assignment, "submitted", None)]),
        json!([graded.clone()]),
    )
    .await;
    mount_changing(
        &server,
        "GET",
        &format!("/assignments/{assignment}/stats"),
        stats_json(assignment, 1, 0),
        stats_json(assignment, 1, 1),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/assignments/submissions/{submission}/grade")))
        .respond_with(ResponseTemplate::new(200).set_body_json(graded))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let list = ctx.queries.watch(hooks::submissions_query(&ctx, Some(assignment)));
    let stats = ctx.queries.watch(hooks::assignment_stats_query(&ctx, Some(assignment)));
    list.fetch().await;
    stats.fetch().await;

    // Only the submission id is known up front; the keys come from the reply.
    let result = hooks::grade_submission(
        &ctx,
        submission,
        &Grade {
            grade: 9.5,
            feedback: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(result.status, SubmissionStatus::Graded);

    let submissions = list.state().data.unwrap();
    assert_eq!(submissions[0].status, SubmissionStatus::Graded);
    assert_eq!(submissions[0].grade, Some(9.5));
    assert_eq!(stats.state().data.map(|s| s.graded), Some(1));
}

#[tokio::test]
async fn enrolling_refreshes_my_courses() {
    let server = MockServer::start().await;
    let course = course_json("Rust 101");
    let course_id: Uuid = serde_json::from_value(course["id"].clone()).unwrap();

    mount_changing(&server, "GET", "/courses/my", json!([]), json!([course])).await;
    Mock::given(method("POST"))
        .and(path(format!("/courses/{course_id}/enroll")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "course_id": course_id,
            "user_id": Uuid::new_v4(),
            "enrolled_at": "2024-03-01T12:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let mine = ctx.queries.watch(hooks::my_courses_query(&ctx));
    assert_eq!(mine.fetch().await.data.map(|c| c.len()), Some(0));

    let enrollment = hooks::enroll(&ctx, course_id).await.unwrap();
    assert_eq!(enrollment.course_id, course_id);
    assert_eq!(mine.state().data.map(|c| c.len()), Some(1));
}

#[tokio::test]
async fn marking_read_refreshes_list_and_unread_count() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let notification = |is_read: bool| {
        json!({
            "id": id,
            "kind": "grade",
            "title": "Essay graded",
            "body": null,
            "link": null,
            "is_read": is_read,
            "created_at": "2024-03-01T12:00:00Z"
        })
    };

    mount_changing(
        &server,
        "GET",
        "/notifications/me",
        json!([notification(false)]),
        json!([notification(true)]),
    )
    .await;
    mount_changing(
        &server,
        "GET",
        "/notifications/unread-count",
        json!({ "count": 1 }),
        json!({ "count": 0 }),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/notifications/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(notification(true)))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let list = ctx.queries.watch(hooks::notifications_query(&ctx, false));
    let unread = ctx.queries.watch(hooks::unread_count_query(&ctx));
    list.fetch().await;
    assert_eq!(unread.fetch().await.data.map(|c| c.count), Some(1));

    assert!(hooks::mark_notification_read(&ctx, id).await.unwrap().is_read);
    assert!(list.state().data.unwrap()[0].is_read);
    assert_eq!(unread.state().data.map(|c| c.count), Some(0));
}

#[tokio::test]
async fn completing_topic_refreshes_its_progress() {
    let server = MockServer::start().await;
    let topic = Uuid::new_v4();
    let route = format!("/learning-tracks/topics/{topic}/progress");
    let done = json!({ "topic_id": topic, "completed": true, "completed_at": "2024-03-01T12:00:00Z" });

    mount_changing(
        &server,
        "GET",
        &route,
        json!({ "topic_id": topic, "completed": false, "completed_at": null }),
        done.clone(),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/learning-tracks/topics/{topic}/complete")))
        .respond_with(ResponseTemplate::new(200).set_body_json(done))
        .expect(1)
        .mount(&server)
        .await;

    let clock = ManualClock::default();
    let ctx = context(&server, &clock, None);
    let progress = ctx.queries.watch(hooks::topic_progress_query(&ctx, Some(topic)));
    assert_eq!(progress.fetch().await.data.map(|p| p.completed), Some(false));

    hooks::complete_topic(&ctx, topic).await.unwrap();
    assert_eq!(progress.state().data.map(|p| p.completed), Some(true));
    assert_eq!(requests_to(&server, &route).await, 2);
}

// =============================================================================
// Identity switches
// =============================================================================

/// Identity provider that always issues `token`.
struct StaticProvider {
    token: &'static str,
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<ProviderSession, ApiError> {
        Ok(ProviderSession {
            access_token: self.token.to_string(),
            refresh_token: None,
            expires_in: Some(3600),
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

#[tokio::test]
async fn signing_in_as_someone_else_drops_old_sockets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user("grace@example.com"),
            "csrf_token": "csrf-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::at(dir.path());
    let old = AuthSession {
        user: user("ada@example.com"),
        access_token: "token-1".into(),
        refresh_token: None,
        csrf_token: "csrf-1".into(),
    };
    assert!(storage.save("campus_session", &old));

    let clock = ManualClock::default();
    let provider: Arc<dyn IdentityProvider> = Arc::new(StaticProvider { token: "token-2" });
    let ctx = context_with(&server, &clock, Some(storage), Some(provider));
    ctx.restore_session().unwrap();

    let old_socket = ctx.socket("course-1").unwrap();
    old_socket.on("chat", |_| {});
    assert_eq!(ctx.sockets.len(), 1);

    let session = ctx.sign_in("grace@example.com", "pw").await.unwrap();
    assert_eq!(session.access_token, "token-2");
    assert!(ctx.sockets.is_empty());
    assert_eq!(old_socket.state(), ConnectionState::Idle);

    ctx.socket("course-1").unwrap();
    assert_eq!(ctx.sockets.len(), 1);
}
