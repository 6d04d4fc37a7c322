use crate::error::{ServiceResult, TaskError};
use db::models::task::{self, TaskStatus};
use db::models::task_result;
use sea_orm::{ConnectionTrait, DatabaseConnection};

/// How many times a lost claim race is retried against a fresh candidate
/// before telling the caller the pool came up empty this round.
const MAX_CLAIM_ATTEMPTS: usize = 32;

pub struct ClaimService;

impl ClaimService {
    /// Peek at the next claimable task without taking it.
    pub async fn get_first_available_task(
        db: &DatabaseConnection,
        question_index: Option<i64>,
        question_version: Option<i64>,
    ) -> ServiceResult<Option<task::Model>> {
        Ok(task::Model::first_available(db, question_index, question_version).await?)
    }

    /// Claim one specific task for a user.
    ///
    /// The claim is a single compare-and-set against `to_do`, so of any
    /// number of concurrent callers exactly one wins; the rest learn why
    /// they lost. A duplicate request from the winner races itself like
    /// anyone else and gets `TaskAlreadyAssigned`.
    pub async fn assign_task_to_user(
        db: &DatabaseConnection,
        user_id: i64,
        task_id: i64,
    ) -> ServiceResult<task::Model> {
        // Two rounds: a claim lost to a claim-then-surrender interleave may
        // legitimately find the task `to_do` again.
        for _ in 0..2 {
            if task::Model::try_claim(db, task_id, user_id).await? {
                let task = Self::fetch_checked(db, task_id).await?;
                log::info!("task {} claimed by user {}", task_id, user_id);
                return Ok(task);
            }

            let Some(task) = task::Model::get_by_id(db, task_id).await? else {
                return Err(TaskError::TaskNotFound(task_id.to_string()));
            };
            match task.status {
                TaskStatus::Out => return Err(TaskError::TaskAlreadyAssigned { task_id }),
                TaskStatus::ToDo => continue,
                status => return Err(TaskError::TaskNotClaimable { task_id, status }),
            }
        }
        Err(TaskError::TaskAlreadyAssigned { task_id })
    }

    /// Select-and-claim in one call: take the first available task under the
    /// filters, retrying with the next candidate when another worker gets
    /// there first. `None` means the pool is empty for these filters.
    pub async fn claim_next_task(
        db: &DatabaseConnection,
        user_id: i64,
        question_index: Option<i64>,
        question_version: Option<i64>,
    ) -> ServiceResult<Option<task::Model>> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let Some(candidate) =
                task::Model::first_available(db, question_index, question_version).await?
            else {
                return Ok(None);
            };

            match Self::assign_task_to_user(db, user_id, candidate.id).await {
                Ok(task) => return Ok(Some(task)),
                Err(TaskError::TaskAlreadyAssigned { .. })
                | Err(TaskError::TaskNotClaimable { .. }) => continue,
                Err(err) => return Err(err),
            }
        }

        log::warn!(
            "user {} lost {} claim races in a row; returning empty-handed",
            user_id,
            MAX_CLAIM_ATTEMPTS
        );
        Ok(None)
    }

    /// Whether a user may submit work for this task right now: the task is
    /// out to them, or it is complete and the latest result is theirs.
    pub async fn user_can_update_task(
        db: &DatabaseConnection,
        user_id: i64,
        task_id: i64,
    ) -> ServiceResult<bool> {
        let task = task::Model::get_by_id(db, task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))?;
        Self::can_update(db, user_id, &task).await
    }

    /// Permission check against an already-loaded task row. Verifies the
    /// assignment invariant on the way: a claimed task without an assignee
    /// (or the converse) is corrupt, not merely forbidden.
    pub(crate) async fn can_update<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        task: &task::Model,
    ) -> ServiceResult<bool> {
        match task.status {
            TaskStatus::Out => {
                let assignee = task.assigned_user_id.ok_or_else(|| TaskError::CorruptTask {
                    task_id: task.id,
                    reason: "status is `out` but no user is assigned".into(),
                })?;
                Ok(assignee == user_id)
            }
            TaskStatus::Complete => {
                if task.assigned_user_id.is_some() {
                    return Err(TaskError::CorruptTask {
                        task_id: task.id,
                        reason: "assignee still set after completion".into(),
                    });
                }
                let latest_result_id =
                    task.latest_result_id.ok_or_else(|| TaskError::CorruptTask {
                        task_id: task.id,
                        reason: "complete with no latest result".into(),
                    })?;
                let latest = task_result::Model::get_by_id(db, latest_result_id)
                    .await?
                    .ok_or_else(|| TaskError::CorruptTask {
                        task_id: task.id,
                        reason: format!("latest result {latest_result_id} is missing"),
                    })?;
                Ok(latest.user_id == user_id)
            }
            _ => {
                if task.assigned_user_id.is_some() {
                    return Err(TaskError::CorruptTask {
                        task_id: task.id,
                        reason: format!("assignee set while status is {}", task.status),
                    });
                }
                Ok(false)
            }
        }
    }

    /// Reload a task and check the assignment invariant.
    async fn fetch_checked(db: &DatabaseConnection, task_id: i64) -> ServiceResult<task::Model> {
        let task = task::Model::get_by_id(db, task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))?;
        if task.status == TaskStatus::Out && task.assigned_user_id.is_none() {
            return Err(TaskError::CorruptTask {
                task_id,
                reason: "status is `out` but no user is assigned".into(),
            });
        }
        Ok(task)
    }
}
