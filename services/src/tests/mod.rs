mod scheduler_tests;

use crate::completion_service::ResultPayload;
use crate::task_service::{QuestionSpec, TaskService};
use db::models::{paper, user};
use sea_orm::DatabaseConnection;
use serde_json::json;

/// Register a paper whose questions 1..=n are all version 1, one page each.
pub(crate) async fn register_paper_with_questions(
    db: &DatabaseConnection,
    paper_number: i64,
    n_questions: i64,
) -> paper::Model {
    let specs: Vec<QuestionSpec> = (1..=n_questions)
        .map(|question_index| QuestionSpec {
            question_index,
            version: 1,
            expected_pages: 1,
        })
        .collect();
    TaskService::register_paper(db, paper_number, &specs)
        .await
        .unwrap()
}

pub(crate) fn marking_payload(score: i64) -> ResultPayload {
    marking_payload_timed(score, 30)
}

pub(crate) fn marking_payload_timed(score: i64, marking_time_seconds: i64) -> ResultPayload {
    ResultPayload::Marking {
        score,
        annotation: json!({ "rubrics": [], "strokes": [] }),
        marking_time_seconds,
        image_path: None,
    }
}

pub(crate) fn identify_payload(student_id: &str, student_name: &str) -> ResultPayload {
    ResultPayload::Identify {
        student_id: student_id.to_string(),
        student_name: student_name.to_string(),
        valid: true,
    }
}

pub(crate) async fn new_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::Model::create(db, username, username, false)
        .await
        .unwrap()
}

pub(crate) async fn new_manager(db: &DatabaseConnection, username: &str) -> user::Model {
    user::Model::create(db, username, username, true)
        .await
        .unwrap()
}
