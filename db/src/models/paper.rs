use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, Set};
use serde::Serialize;

/// A physical exam paper, registered in the `papers` table.
///
/// The paper number is stable once a number has been assigned to a printed
/// paper; tasks and codes reference it, never the row id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub paper_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper_question::Entity")]
    PaperQuestion,

    #[sea_orm(has_many = "super::task::Entity")]
    Task,
}

impl Related<super::paper_question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaperQuestion.def()
    }
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(db: &C, paper_number: i64) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = ActiveModel {
            paper_number: Set(paper_number),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn get_by_number<C: ConnectionTrait>(
        db: &C,
        paper_number: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::PaperNumber.eq(paper_number))
            .one(db)
            .await
    }
}
