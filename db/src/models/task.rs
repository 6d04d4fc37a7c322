use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `OutOfDate` is a soft retirement: the row (and its result history) stays
/// queryable forever, and a fresh row may take over the same
/// (paper, question) identity.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "task_status_enum")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed.
    #[sea_orm(string_value = "to_do")]
    ToDo,
    /// Claimed by exactly one user.
    #[sea_orm(string_value = "out")]
    Out,
    /// Has at least one submitted result.
    #[sea_orm(string_value = "complete")]
    Complete,
    /// Retired because the underlying pages changed.
    #[sea_orm(string_value = "out_of_date")]
    OutOfDate,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::ToDo
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            TaskStatus::ToDo => "to_do",
            TaskStatus::Out => "out",
            TaskStatus::Complete => "complete",
            TaskStatus::OutOfDate => "out_of_date",
        };
        write!(f, "{}", status_str)
    }
}

/// Discriminant of the task payload union: marking work or identification
/// work. Question index 0 is identification; 1..N are marking questions.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "task_kind_enum")]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[sea_orm(string_value = "marking")]
    Marking,
    #[sea_orm(string_value = "identify")]
    Identify,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind_str = match self {
            TaskKind::Marking => "marking",
            TaskKind::Identify => "identify",
        };
        write!(f, "{}", kind_str)
    }
}

/// One unit of claimable work in the `tasks` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: TaskKind,
    pub paper_id: i64,
    /// Copied from the paper at creation; claim order and codes derive
    /// from it.
    pub paper_number: i64,
    pub question_index: i64,
    pub question_version: i64,
    pub status: TaskStatus,
    /// Non-null exactly while the status is `Out`.
    pub assigned_user_id: Option<i64>,
    /// Claim ordering hint; higher claims first. Defaults to the negated
    /// paper number so unprioritized pools hand out papers in order.
    pub priority: f64,
    /// Advances to strictly higher editions only; never reset.
    pub latest_result_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::PaperId",
        to = "super::paper::Column::Id"
    )]
    Paper,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedUserId",
        to = "super::user::Column::Id"
    )]
    AssignedUser,

    #[sea_orm(has_many = "super::task_result::Entity")]
    TaskResult,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paper.def()
    }
}

impl Related<super::task_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Default claim priority for a paper.
    pub fn default_priority(paper_number: i64) -> f64 {
        -(paper_number as f64)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        kind: TaskKind,
        paper_id: i64,
        paper_number: i64,
        question_index: i64,
        question_version: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            kind: Set(kind),
            paper_id: Set(paper_id),
            paper_number: Set(paper_number),
            question_index: Set(question_index),
            question_version: Set(question_version),
            status: Set(TaskStatus::ToDo),
            assigned_user_id: Set(None),
            priority: Set(Self::default_priority(paper_number)),
            latest_result_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// The one non-retired task for a (paper, question) identity, if any.
    pub async fn find_live<C: ConnectionTrait>(
        db: &C,
        paper_number: i64,
        question_index: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::PaperNumber.eq(paper_number))
            .filter(Column::QuestionIndex.eq(question_index))
            .filter(Column::Status.ne(TaskStatus::OutOfDate))
            .one(db)
            .await
    }

    /// Every task ever created for a (paper, question) identity, retired
    /// rows included, oldest first.
    pub async fn history_for<C: ConnectionTrait>(
        db: &C,
        paper_number: i64,
        question_index: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::PaperNumber.eq(paper_number))
            .filter(Column::QuestionIndex.eq(question_index))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Next claimable task under the optional filters: highest priority
    /// first, paper number (then question index) as the deterministic
    /// tiebreak. Pure read; claiming is a separate step.
    pub async fn first_available<C: ConnectionTrait>(
        db: &C,
        question_index: Option<i64>,
        question_version: Option<i64>,
    ) -> Result<Option<Self>, DbErr> {
        let mut query = Entity::find().filter(Column::Status.eq(TaskStatus::ToDo));

        if let Some(question_index) = question_index {
            query = query.filter(Column::QuestionIndex.eq(question_index));
        }
        if let Some(question_version) = question_version {
            query = query.filter(Column::QuestionVersion.eq(question_version));
        }

        query
            .order_by_desc(Column::Priority)
            .order_by_asc(Column::PaperNumber)
            .order_by_asc(Column::QuestionIndex)
            .one(db)
            .await
    }

    /// Claim compare-and-set: `to_do` → `out` for `user_id`. Returns whether
    /// this caller won; a lost race leaves the row untouched.
    pub async fn try_claim<C: ConnectionTrait>(
        db: &C,
        id: i64,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(TaskStatus::Out),
                assigned_user_id: Set(Some(user_id)),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(TaskStatus::ToDo))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// `out` → `to_do`, guarded on the current assignee.
    pub async fn try_surrender<C: ConnectionTrait>(
        db: &C,
        id: i64,
        user_id: i64,
    ) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(TaskStatus::ToDo),
                assigned_user_id: Set(None),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(TaskStatus::Out))
            .filter(Column::AssignedUserId.eq(user_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// `out` → `to_do` regardless of assignee (administrative path).
    pub async fn force_surrender<C: ConnectionTrait>(db: &C, id: i64) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(TaskStatus::ToDo),
                assigned_user_id: Set(None),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(TaskStatus::Out))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// `out`/`complete` → `complete`, advancing the latest-result pointer.
    /// The assignee is cleared; ownership of completed work is carried by
    /// the result row itself.
    pub async fn try_complete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        latest_result_id: i64,
    ) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(TaskStatus::Complete),
                assigned_user_id: Set(None),
                latest_result_id: Set(Some(latest_result_id)),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.is_in([TaskStatus::Out, TaskStatus::Complete]))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// `complete` → `to_do`. Result history and the latest-result pointer
    /// stay as they are; only a fresh submission moves the pointer.
    pub async fn try_revert<C: ConnectionTrait>(db: &C, id: i64) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(TaskStatus::ToDo),
                assigned_user_id: Set(None),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(TaskStatus::Complete))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Any live status → `out_of_date`, clearing the assignee. Retirement is
    /// terminal for the row.
    pub async fn try_retire<C: ConnectionTrait>(db: &C, id: i64) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(TaskStatus::OutOfDate),
                assigned_user_id: Set(None),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.ne(TaskStatus::OutOfDate))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn set_priority<C: ConnectionTrait>(
        db: &C,
        id: i64,
        priority: f64,
    ) -> Result<Option<Self>, DbErr> {
        let Some(task) = Self::get_by_id(db, id).await? else {
            return Ok(None);
        };

        let mut active: ActiveModel = task.into();
        active.priority = Set(priority);
        active.updated_at = Set(Utc::now());
        active.update(db).await.map(Some)
    }
}
