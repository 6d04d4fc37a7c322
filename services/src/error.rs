use db::models::task::TaskStatus;
use sea_orm::DbErr;
use util::task_code::MalformedCodeError;

pub type ServiceResult<T> = Result<T, TaskError>;

/// Every business-rule violation the scheduler can surface.
///
/// Lost same-task races come back as the specific domain error
/// (`TaskAlreadyAssigned`, not a raw conflict); callers react by asking for
/// a different task. `CorruptTask` marks invariant violations that should
/// never occur and is a bug signal, not a recoverable condition.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("malformed task code: {0}")]
    MalformedCode(#[from] MalformedCodeError),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task {task_id} is already assigned")]
    TaskAlreadyAssigned { task_id: i64 },

    #[error("task {task_id} cannot be claimed while {status}")]
    TaskNotClaimable { task_id: i64, status: TaskStatus },

    #[error("task {task_id} does not belong to user {user_id}")]
    NotYourTask { task_id: i64, user_id: i64 },

    #[error("task {task_id} has no completed work to revert")]
    NothingToRevert { task_id: i64 },

    #[error("no question-version map entry for paper {paper_number} question {question_index}")]
    NoVersionMap {
        paper_number: i64,
        question_index: i64,
    },

    #[error("a live task already exists for paper {paper_number} question {question_index}")]
    DuplicateTask {
        paper_number: i64,
        question_index: i64,
    },

    #[error("paper {0} is already registered")]
    PaperAlreadyRegistered(i64),

    #[error("paper {0} is not registered")]
    PaperNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("user {0} is not a manager")]
    NotAManager(i64),

    #[error("invalid result payload: {0}")]
    InvalidPayload(String),

    #[error("task {task_id} is in an inconsistent state: {reason}")]
    CorruptTask { task_id: i64, reason: String },

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}
