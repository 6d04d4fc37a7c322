use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;

/// One submitted unit of work in the `task_results` table.
///
/// Rows are immutable once inserted and are never deleted: resubmission
/// appends a higher edition instead of overwriting, so the full history of
/// who did what survives invalidation and revert.
///
/// The payload columns are a union keyed by the owning task's kind —
/// marking rows fill `score`/`annotation_data`/`marking_time_seconds`/
/// `image_path`, identification rows fill `student_id`/`student_name`/
/// `identity_valid`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "task_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub task_id: i64,
    /// The user who submitted this edition.
    pub user_id: i64,
    /// 1, 2, 3, … per task; unique per (task, edition).
    pub edition: i64,
    pub score: Option<i64>,
    /// Opaque stroke/rubric payload owned by the annotation client.
    pub annotation_data: Option<Json>,
    pub marking_time_seconds: Option<i64>,
    /// Reference to the rendered annotation image, if the client made one.
    pub image_path: Option<String>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub identity_valid: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::task::Entity",
        from = "Column::TaskId",
        to = "super::task::Column::Id"
    )]
    Task,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Column values for a new result row; the edition is decided by the caller
/// inside its transaction.
#[derive(Debug, Clone, Default)]
pub struct NewResult {
    pub score: Option<i64>,
    pub annotation_data: Option<Json>,
    pub marking_time_seconds: Option<i64>,
    pub image_path: Option<String>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub identity_valid: Option<bool>,
}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        user_id: i64,
        edition: i64,
        fields: NewResult,
    ) -> Result<Self, DbErr> {
        let active = ActiveModel {
            task_id: Set(task_id),
            user_id: Set(user_id),
            edition: Set(edition),
            score: Set(fields.score),
            annotation_data: Set(fields.annotation_data),
            marking_time_seconds: Set(fields.marking_time_seconds),
            image_path: Set(fields.image_path),
            student_id: Set(fields.student_id),
            student_name: Set(fields.student_name),
            identity_valid: Set(fields.identity_valid),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Highest edition submitted for a task so far, if any.
    pub async fn max_edition<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Option<i64>, DbErr> {
        let latest = Entity::find()
            .filter(Column::TaskId.eq(task_id))
            .order_by_desc(Column::Edition)
            .one(db)
            .await?;
        Ok(latest.map(|row| row.edition))
    }

    /// Full submission history of a task, oldest edition first.
    pub async fn history_for_task<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::TaskId.eq(task_id))
            .order_by_asc(Column::Edition)
            .all(db)
            .await
    }
}
