use crate::error::{ServiceResult, TaskError};
use db::models::task::{self, TaskStatus};
use db::models::task_result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select};

/// Read-only aggregates over the task store. Nothing in here mutates state.
pub struct ProgressService;

impl ProgressService {
    /// (completed, total) under the optional filters. Retired tasks belong
    /// to neither count — they are no longer work.
    pub async fn progress_counts(
        db: &DatabaseConnection,
        question_index: Option<i64>,
        question_version: Option<i64>,
    ) -> ServiceResult<(u64, u64)> {
        let completed = Self::filtered(question_index, question_version)
            .filter(task::Column::Status.eq(TaskStatus::Complete))
            .count(db)
            .await?;
        let total = Self::filtered(question_index, question_version)
            .filter(task::Column::Status.ne(TaskStatus::OutOfDate))
            .count(db)
            .await?;
        Ok((completed, total))
    }

    /// Completed tasks whose latest result this user owns, each paired with
    /// that latest result, in paper order.
    pub async fn done_tasks_for_user(
        db: &DatabaseConnection,
        user_id: i64,
        question_index: Option<i64>,
        question_version: Option<i64>,
    ) -> ServiceResult<Vec<(task::Model, task_result::Model)>> {
        let completed = Self::filtered(question_index, question_version)
            .filter(task::Column::Status.eq(TaskStatus::Complete))
            .order_by_asc(task::Column::PaperNumber)
            .order_by_asc(task::Column::QuestionIndex)
            .all(db)
            .await?;

        let mut done = Vec::new();
        for task in completed {
            let latest = Self::latest_result(db, &task).await?;
            if latest.user_id == user_id {
                done.push((task, latest));
            }
        }
        Ok(done)
    }

    /// Seconds of marking believed to remain for a question, extrapolated
    /// from the average marking time of its completed tasks. `None` while
    /// nothing is complete — no data is not the same as no work left.
    pub async fn estimated_time_remaining(
        db: &DatabaseConnection,
        question_index: i64,
    ) -> ServiceResult<Option<f64>> {
        let completed = Self::filtered(Some(question_index), None)
            .filter(task::Column::Status.eq(TaskStatus::Complete))
            .all(db)
            .await?;

        let mut times = Vec::new();
        for task in &completed {
            let latest = Self::latest_result(db, task).await?;
            if let Some(seconds) = latest.marking_time_seconds {
                times.push(seconds as f64);
            }
        }
        if times.is_empty() {
            return Ok(None);
        }
        let average = times.iter().sum::<f64>() / times.len() as f64;

        let remaining = Self::filtered(Some(question_index), None)
            .filter(task::Column::Status.is_in([TaskStatus::ToDo, TaskStatus::Out]))
            .count(db)
            .await?;

        Ok(Some(average * remaining as f64))
    }

    fn filtered(question_index: Option<i64>, question_version: Option<i64>) -> Select<task::Entity> {
        let mut query = task::Entity::find();
        if let Some(question_index) = question_index {
            query = query.filter(task::Column::QuestionIndex.eq(question_index));
        }
        if let Some(question_version) = question_version {
            query = query.filter(task::Column::QuestionVersion.eq(question_version));
        }
        query
    }

    async fn latest_result(
        db: &DatabaseConnection,
        task: &task::Model,
    ) -> ServiceResult<task_result::Model> {
        let latest_result_id = task.latest_result_id.ok_or_else(|| TaskError::CorruptTask {
            task_id: task.id,
            reason: "complete with no latest result".into(),
        })?;
        task_result::Model::get_by_id(db, latest_result_id)
            .await?
            .ok_or_else(|| TaskError::CorruptTask {
                task_id: task.id,
                reason: format!("latest result {latest_result_id} is missing"),
            })
    }
}
