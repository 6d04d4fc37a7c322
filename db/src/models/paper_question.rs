use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;

/// One slot of a paper's question-version map (`paper_questions` table).
///
/// `question_index` 0 describes the identification page; marking questions
/// start at 1. `version` records which printed variant this paper carries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "paper_questions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub paper_id: i64,
    pub question_index: i64,
    pub version: i64,
    /// Number of scanned pages that make the slot's image set complete.
    pub expected_pages: i64,
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
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paper.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        paper_id: i64,
        question_index: i64,
        version: i64,
        expected_pages: i64,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            paper_id: Set(paper_id),
            question_index: Set(question_index),
            version: Set(version),
            expected_pages: Set(expected_pages),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get<C: ConnectionTrait>(
        db: &C,
        paper_id: i64,
        question_index: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::PaperId.eq(paper_id))
            .filter(Column::QuestionIndex.eq(question_index))
            .one(db)
            .await
    }

    /// All map slots for a paper, in question order.
    pub async fn for_paper<C: ConnectionTrait>(
        db: &C,
        paper_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::PaperId.eq(paper_id))
            .order_by_asc(Column::QuestionIndex)
            .all(db)
            .await
    }
}
