use crate::error::{ServiceResult, TaskError};
use db::models::task::{TaskKind, TaskStatus};
use db::models::{paper, paper_question, task};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};
use util::task_code::decode_task_code;

/// One slot of a paper's question-version map, as supplied at registration.
#[derive(Debug, Clone)]
pub struct QuestionSpec {
    pub question_index: i64,
    pub version: i64,
    pub expected_pages: i64,
}

/// Read filters for [`TaskService::list_tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub kind: Option<TaskKind>,
    pub question_index: Option<i64>,
    pub question_version: Option<i64>,
    pub assigned_user_id: Option<i64>,
}

pub struct TaskService;

impl TaskService {
    /// Register a paper together with its question-version map.
    ///
    /// Tasks can only exist for registered papers; the map rows written here
    /// are what `create_task` consults for the question version.
    pub async fn register_paper(
        db: &DatabaseConnection,
        paper_number: i64,
        questions: &[QuestionSpec],
    ) -> ServiceResult<paper::Model> {
        if paper_number < 1 {
            return Err(TaskError::InvalidPayload(format!(
                "paper number must be positive, got {paper_number}"
            )));
        }
        if questions.is_empty() {
            return Err(TaskError::InvalidPayload(
                "a paper needs at least one question-version entry".into(),
            ));
        }
        for question in questions {
            if question.question_index < 0 || question.version < 1 || question.expected_pages < 1 {
                return Err(TaskError::InvalidPayload(format!(
                    "bad question spec: index {}, version {}, expected pages {}",
                    question.question_index, question.version, question.expected_pages
                )));
            }
        }

        let txn = db.begin().await?;

        if paper::Model::get_by_number(&txn, paper_number).await?.is_some() {
            return Err(TaskError::PaperAlreadyRegistered(paper_number));
        }

        let paper = paper::Model::create(&txn, paper_number).await?;
        for question in questions {
            paper_question::Model::create(
                &txn,
                paper.id,
                question.question_index,
                question.version,
                question.expected_pages,
            )
            .await?;
        }

        txn.commit().await?;
        log::info!(
            "registered paper {} with {} question(s)",
            paper_number,
            questions.len()
        );
        Ok(paper)
    }

    /// Create the live task for a (paper, question) identity.
    ///
    /// Question index 0 creates an identification task; anything else is a
    /// marking task and must have a version-map entry. At most one
    /// non-retired task may exist per identity, so the duplicate check and
    /// the insert share a transaction.
    pub async fn create_task(
        db: &DatabaseConnection,
        paper_number: i64,
        question_index: i64,
    ) -> ServiceResult<task::Model> {
        if question_index < 0 {
            return Err(TaskError::InvalidPayload(format!(
                "question index must be non-negative, got {question_index}"
            )));
        }

        let kind = if question_index == 0 {
            TaskKind::Identify
        } else {
            TaskKind::Marking
        };

        let txn = db.begin().await?;

        let paper = paper::Model::get_by_number(&txn, paper_number)
            .await?
            .ok_or(TaskError::NoVersionMap {
                paper_number,
                question_index,
            })?;

        let question_version = match kind {
            TaskKind::Marking => {
                paper_question::Model::get(&txn, paper.id, question_index)
                    .await?
                    .ok_or(TaskError::NoVersionMap {
                        paper_number,
                        question_index,
                    })?
                    .version
            }
            // The identification page is not versioned.
            TaskKind::Identify => 1,
        };

        if task::Model::find_live(&txn, paper_number, question_index)
            .await?
            .is_some()
        {
            return Err(TaskError::DuplicateTask {
                paper_number,
                question_index,
            });
        }

        let created = task::Model::create(
            &txn,
            kind.clone(),
            paper.id,
            paper_number,
            question_index,
            question_version,
        )
        .await?;

        txn.commit().await?;
        log::info!(
            "created {} task {} for paper {} question {}",
            kind,
            created.id,
            paper_number,
            question_index
        );
        Ok(created)
    }

    /// Create the identification task and one marking task per mapped
    /// question, skipping identities that already have a live task.
    pub async fn create_all_tasks_for_paper(
        db: &DatabaseConnection,
        paper_number: i64,
    ) -> ServiceResult<Vec<task::Model>> {
        let paper = paper::Model::get_by_number(db, paper_number)
            .await?
            .ok_or(TaskError::PaperNotFound(paper_number))?;

        let mut indices = vec![0];
        for question in paper_question::Model::for_paper(db, paper.id).await? {
            if question.question_index >= 1 {
                indices.push(question.question_index);
            }
        }

        let mut created = Vec::new();
        for question_index in indices {
            match Self::create_task(db, paper_number, question_index).await {
                Ok(task) => created.push(task),
                Err(TaskError::DuplicateTask { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(created)
    }

    pub async fn get_task(db: &DatabaseConnection, task_id: i64) -> ServiceResult<task::Model> {
        task::Model::get_by_id(db, task_id)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))
    }

    /// Resolve a wire code to the live task for that identity.
    pub async fn get_task_by_code(
        db: &DatabaseConnection,
        code: &str,
    ) -> ServiceResult<task::Model> {
        let (paper_number, question_index) = decode_task_code(code)?;
        task::Model::find_live(db, paper_number, question_index)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(code.to_string()))
    }

    pub async fn list_tasks(
        db: &DatabaseConnection,
        filter: &TaskFilter,
    ) -> ServiceResult<Vec<task::Model>> {
        let mut query = task::Entity::find();

        if let Some(ref status) = filter.status {
            query = query.filter(task::Column::Status.eq(status.clone()));
        }
        if let Some(ref kind) = filter.kind {
            query = query.filter(task::Column::Kind.eq(kind.clone()));
        }
        if let Some(question_index) = filter.question_index {
            query = query.filter(task::Column::QuestionIndex.eq(question_index));
        }
        if let Some(question_version) = filter.question_version {
            query = query.filter(task::Column::QuestionVersion.eq(question_version));
        }
        if let Some(assigned_user_id) = filter.assigned_user_id {
            query = query.filter(task::Column::AssignedUserId.eq(assigned_user_id));
        }

        Ok(query
            .order_by_asc(task::Column::PaperNumber)
            .order_by_asc(task::Column::QuestionIndex)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?)
    }

    /// Override the claim-ordering hint for one task.
    pub async fn set_task_priority(
        db: &DatabaseConnection,
        task_id: i64,
        priority: f64,
    ) -> ServiceResult<task::Model> {
        task::Model::set_priority(db, task_id, priority)
            .await?
            .ok_or_else(|| TaskError::TaskNotFound(task_id.to_string()))
    }
}
