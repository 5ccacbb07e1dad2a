//! Domain API modules. Each one binds a base path to its wire types through
//! [`CrudApi`](crate::crud::CrudApi) and adds the domain's own operations.

pub mod assignments;
pub mod courses;
pub mod notes;
pub mod notifications;
pub mod quizzes;
pub mod tracks;

pub use assignments::AssignmentsApi;
pub use courses::{CoursesApi, LessonsApi};
pub use notes::NotesApi;
pub use notifications::NotificationsApi;
pub use quizzes::QuizzesApi;
pub use tracks::{LearningTracksApi, TopicsApi};

use crate::api_client::ApiClient;

/// Every domain API over one shared transport.
#[derive(Debug, Clone)]
pub struct Apis {
    pub courses: CoursesApi,
    pub lessons: LessonsApi,
    pub assignments: AssignmentsApi,
    pub quizzes: QuizzesApi,
    pub notes: NotesApi,
    pub notifications: NotificationsApi,
    pub tracks: LearningTracksApi,
    pub topics: TopicsApi,
}

impl Apis {
    pub fn new(client: &ApiClient) -> Self {
        Self {
            courses: CoursesApi::new(client.clone()),
            lessons: LessonsApi::new(client.clone()),
            assignments: AssignmentsApi::new(client.clone()),
            quizzes: QuizzesApi::new(client.clone()),
            notes: NotesApi::new(client.clone()),
            notifications: NotificationsApi::new(client.clone()),
            tracks: LearningTracksApi::new(client.clone()),
            topics: TopicsApi::new(client.clone()),
        }
    }
}
