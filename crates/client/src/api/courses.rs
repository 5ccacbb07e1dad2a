use async_trait::async_trait;
use campus_shared::{
    ApiError, Course, CourseFilter, CoursePatch, Enrollment, Lesson, LessonPatch, NewCourse,
    NewLesson,
};
use uuid::Uuid;

use crate::api_client::ApiClient;
use crate::crud::{CrudApi, NestedCrudApi, NestedResource, Resource};

#[derive(Debug, Clone)]
pub struct CoursesApi {
    client: ApiClient,
    resource: Resource,
}

impl CoursesApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: Resource::new("/courses"),
        }
    }

    pub async fn enroll(&self, course_id: &Uuid) -> Result<Enrollment, ApiError> {
        self.client
            .post_json(&self.resource.action_path(course_id, "enroll"), &serde_json::json!({}))
            .await
    }

    pub async fn unenroll(&self, course_id: &Uuid) -> Result<(), ApiError> {
        self.client
            .delete(&self.resource.action_path(course_id, "enroll"))
            .await
    }

    /// Courses the signed-in user is enrolled in.
    pub async fn my_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.client
            .get_json(&format!("{}/my", self.resource.path()))
            .await
    }

    /// Ask the server to publish or hide a course without sending the rest
    /// of it.
    pub async fn set_visibility(&self, course_id: &Uuid, is_public: bool) -> Result<Course, ApiError> {
        let patch = CoursePatch {
            is_public: Some(is_public),
            ..CoursePatch::default()
        };
        self.patch(course_id, &patch).await
    }
}

#[async_trait]
impl CrudApi for CoursesApi {
    type Id = Uuid;
    type Item = Course;
    type Create = NewCourse;
    type Patch = CoursePatch;
    type Filter = CourseFilter;

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// `/courses/{course_id}/lessons`
#[derive(Debug, Clone)]
pub struct LessonsApi {
    client: ApiClient,
    resource: NestedResource,
}

impl LessonsApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            resource: NestedResource::new("/courses", "lessons"),
        }
    }
}

#[async_trait]
impl NestedCrudApi for LessonsApi {
    type ParentId = Uuid;
    type Id = Uuid;
    type Item = Lesson;
    type Create = NewLesson;
    type Patch = LessonPatch;

    fn client(&self) -> &ApiClient {
        &self.client
    }

    fn resource(&self) -> &NestedResource {
        &self.resource
    }
}
