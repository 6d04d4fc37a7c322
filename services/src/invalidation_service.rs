use crate::error::{ServiceResult, TaskError};
use crate::task_service::TaskService;
use db::models::{page_image, paper, task};
use sea_orm::DatabaseConnection;

pub struct InvalidationService;

impl InvalidationService {
    /// Retire the live task for an identity because its pages changed.
    ///
    /// `None` when nothing live exists — discarding a page for a question
    /// that never got a task is a valid no-op, and so is a second
    /// invalidation of the same identity. Result history on the retired row
    /// is left exactly as it was: who did what, and when it was superseded,
    /// must survive page corrections.
    pub async fn invalidate_task_for(
        db: &DatabaseConnection,
        paper_number: i64,
        question_index: i64,
    ) -> ServiceResult<Option<task::Model>> {
        let Some(live) = task::Model::find_live(db, paper_number, question_index).await? else {
            return Ok(None);
        };

        if task::Model::try_retire(db, live.id).await? {
            log::info!(
                "task {} for paper {} question {} marked out of date",
                live.id,
                paper_number,
                question_index
            );
            Ok(task::Model::get_by_id(db, live.id).await?)
        } else {
            // Someone else retired it between the read and the flip.
            Ok(None)
        }
    }

    /// Create a fresh task for an identity whose image set is complete
    /// again. Idempotent: a live task already in place (or a lost creation
    /// race) comes back as `None`, never as a duplicate.
    pub async fn recreate_task_if_pages_present(
        db: &DatabaseConnection,
        paper_number: i64,
        question_index: i64,
    ) -> ServiceResult<Option<task::Model>> {
        if task::Model::find_live(db, paper_number, question_index)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let Some(paper) = paper::Model::get_by_number(db, paper_number).await? else {
            return Ok(None);
        };

        if !Self::pages_complete(db, &paper, question_index).await? {
            return Ok(None);
        }

        match TaskService::create_task(db, paper_number, question_index).await {
            Ok(task) => Ok(Some(task)),
            Err(TaskError::DuplicateTask { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Scanning event: a page image for this slot was uploaded or replaced.
    /// Returns the task that became claimable because of it, if any.
    pub async fn record_page_arrived(
        db: &DatabaseConnection,
        paper_number: i64,
        question_index: i64,
        page_number: i64,
    ) -> ServiceResult<Option<task::Model>> {
        let paper = paper::Model::get_by_number(db, paper_number)
            .await?
            .ok_or(TaskError::PaperNotFound(paper_number))?;

        page_image::Model::set_presence(db, paper.id, question_index, page_number, true).await?;
        log::debug!(
            "page {} arrived for paper {} question {}",
            page_number,
            paper_number,
            question_index
        );

        Self::recreate_task_if_pages_present(db, paper_number, question_index).await
    }

    /// Scanning event: a page image was discarded or reassigned elsewhere.
    /// Any live task for the slot no longer reflects physical reality and is
    /// retired; the retired task is returned, if there was one.
    pub async fn record_page_discarded(
        db: &DatabaseConnection,
        paper_number: i64,
        question_index: i64,
        page_number: i64,
    ) -> ServiceResult<Option<task::Model>> {
        let paper = paper::Model::get_by_number(db, paper_number)
            .await?
            .ok_or(TaskError::PaperNotFound(paper_number))?;

        page_image::Model::set_presence(db, paper.id, question_index, page_number, false).await?;
        log::debug!(
            "page {} discarded for paper {} question {}",
            page_number,
            paper_number,
            question_index
        );

        Self::invalidate_task_for(db, paper_number, question_index).await
    }

    async fn pages_complete(
        db: &DatabaseConnection,
        paper: &paper::Model,
        question_index: i64,
    ) -> ServiceResult<bool> {
        let expected = db::models::paper_question::Model::get(db, paper.id, question_index)
            .await?
            .map(|question| question.expected_pages)
            // Slots outside the map (the identification page, usually) are
            // complete with a single page.
            .unwrap_or(1);

        let present = page_image::Model::present_count(db, paper.id, question_index).await? as i64;
        Ok(present >= expected)
    }
}
