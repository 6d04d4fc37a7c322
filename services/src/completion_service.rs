use crate::claim_service::ClaimService;
use crate::error::{ServiceResult, TaskError};
use db::models::task::{self, TaskKind};
use db::models::task_result::{self, NewResult};
use db::models::user;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The finished unit of work a client hands back, tagged by task kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultPayload {
    Marking {
        score: i64,
        /// Opaque stroke/rubric data; stored as-is and returned as-is.
        annotation: Value,
        marking_time_seconds: i64,
        image_path: Option<String>,
    },
    Identify {
        student_id: String,
        student_name: String,
        valid: bool,
    },
}

impl ResultPayload {
    fn kind(&self) -> TaskKind {
        match self {
            ResultPayload::Marking { .. } => TaskKind::Marking,
            ResultPayload::Identify { .. } => TaskKind::Identify,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            ResultPayload::Marking {
                score,
                marking_time_seconds,
                ..
            } => {
                if *score < 0 {
                    return Err(format!("score must be non-negative, got {score}"));
                }
                if *marking_time_seconds < 0 {
                    return Err(format!(
                        "marking time must be non-negative, got {marking_time_seconds}"
                    ));
                }
                Ok(())
            }
            ResultPayload::Identify { student_id, .. } => {
                if student_id.trim().is_empty() {
                    return Err("student id must not be empty".into());
                }
                Ok(())
            }
        }
    }

    fn into_new_result(self) -> NewResult {
        match self {
            ResultPayload::Marking {
                score,
                annotation,
                marking_time_seconds,
                image_path,
            } => NewResult {
                score: Some(score),
                annotation_data: Some(annotation),
                marking_time_seconds: Some(marking_time_seconds),
                image_path,
                ..Default::default()
            },
            ResultPayload::Identify {
                student_id,
                student_name,
                valid,
            } => NewResult {
                student_id: Some(student_id),
                student_name: Some(student_name),
                identity_valid: Some(valid),
                ..Default::default()
            },
        }
    }
}

pub struct CompletionService;

impl CompletionService {
    /// Accept a finished result for a claimed (or previously-completed, by
    /// the same user) task.
    ///
    /// The permission check, the edition increment, the result insert, and
    /// the latest-pointer advance all run in one transaction; the unique
    /// (task, edition) index backstops the increment, so concurrent
    /// resubmissions can never share an edition number. Resubmission
    /// appends — earlier editions stay in history untouched.
    pub async fn submit_result(
        db: &DatabaseConnection,
        user_id: i64,
        task_id: i64,
        payload: ResultPayload,
    ) -> ServiceResult<(task::Model, task_result::Model)> {
        payload.validate().map_err(TaskError::InvalidPayload)?;

        let txn = db.begin().await?;

        let task = task::Model::get_by_id(&txn, task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))?;

        if payload.kind() != task.kind {
            return Err(TaskError::InvalidPayload(format!(
                "{} payload submitted for a {} task",
                payload.kind(),
                task.kind
            )));
        }

        if !ClaimService::can_update(&txn, user_id, &task).await? {
            return Err(TaskError::NotYourTask { task_id, user_id });
        }

        let edition = task_result::Model::max_edition(&txn, task_id)
            .await?
            .unwrap_or(0)
            + 1;
        let result =
            task_result::Model::create(&txn, task_id, user_id, edition, payload.into_new_result())
                .await?;

        if !task::Model::try_complete(&txn, task_id, result.id).await? {
            return Err(TaskError::CorruptTask {
                task_id,
                reason: "status changed while the submission transaction held the row".into(),
            });
        }

        txn.commit().await?;
        log::info!(
            "task {} completed by user {} (edition {})",
            task_id,
            user_id,
            edition
        );

        let task = task::Model::get_by_id(db, task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))?;
        Ok((task, result))
    }

    /// Give a claimed task back to the pool. Results are untouched.
    pub async fn surrender_task(
        db: &DatabaseConnection,
        user_id: i64,
        task_id: i64,
    ) -> ServiceResult<task::Model> {
        if task::Model::try_surrender(db, task_id, user_id).await? {
            log::info!("task {} surrendered by user {}", task_id, user_id);
            return Self::reload(db, task_id).await;
        }

        match task::Model::get_by_id(db, task_id).await? {
            None => Err(TaskError::TaskNotFound(task_id.to_string())),
            Some(_) => Err(TaskError::NotYourTask { task_id, user_id }),
        }
    }

    /// Surrender on the assignee's behalf. The core has no claim timeout;
    /// whatever external policy decides a task has been held too long calls
    /// this with a manager account.
    pub async fn surrender_task_for(
        db: &DatabaseConnection,
        manager_id: i64,
        task_id: i64,
    ) -> ServiceResult<task::Model> {
        let manager = user::Model::get_by_id(db, manager_id)
            .await?
            .ok_or(TaskError::UserNotFound(manager_id))?;
        if !manager.is_manager {
            return Err(TaskError::NotAManager(manager_id));
        }

        if task::Model::force_surrender(db, task_id).await? {
            log::info!(
                "task {} surrendered administratively by user {}",
                task_id,
                manager_id
            );
            return Self::reload(db, task_id).await;
        }

        match task::Model::get_by_id(db, task_id).await? {
            None => Err(TaskError::TaskNotFound(task_id.to_string())),
            Some(_) => Err(TaskError::NotYourTask {
                task_id,
                user_id: manager_id,
            }),
        }
    }

    /// Reopen a completed task for remarking. History and the latest-result
    /// pointer stay; only a fresh submission moves the pointer.
    pub async fn revert_task(
        db: &DatabaseConnection,
        user_id: i64,
        task_id: i64,
    ) -> ServiceResult<task::Model> {
        if task::Model::try_revert(db, task_id).await? {
            log::info!("task {} reverted to the pool by user {}", task_id, user_id);
            return Self::reload(db, task_id).await;
        }

        match task::Model::get_by_id(db, task_id).await? {
            None => Err(TaskError::TaskNotFound(task_id.to_string())),
            Some(_) => Err(TaskError::NothingToRevert { task_id }),
        }
    }

    async fn reload(db: &DatabaseConnection, task_id: i64) -> ServiceResult<task::Model> {
        task::Model::get_by_id(db, task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))
    }
}
