use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set};
use serde::Serialize;

/// Presence record for one scanned page of a (paper, question) slot.
///
/// Rows are written by the scanning collaborator's events and are never
/// deleted; a discarded page flips `present` back to false.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "page_images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub paper_id: i64,
    pub question_index: i64,
    pub page_number: i64,
    pub present: bool,
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
    /// Record a page as present or absent, inserting the row on first sight.
    pub async fn set_presence<C: ConnectionTrait>(
        db: &C,
        paper_id: i64,
        question_index: i64,
        page_number: i64,
        present: bool,
    ) -> Result<Self, DbErr> {
        let existing = Entity::find()
            .filter(Column::PaperId.eq(paper_id))
            .filter(Column::QuestionIndex.eq(question_index))
            .filter(Column::PageNumber.eq(page_number))
            .one(db)
            .await?;

        let now = Utc::now();
        match existing {
            Some(row) => {
                let mut active = row.into_active_model();
                active.present = Set(present);
                active.updated_at = Set(now);
                active.update(db).await
            }
            None => {
                let active = ActiveModel {
                    paper_id: Set(paper_id),
                    question_index: Set(question_index),
                    page_number: Set(page_number),
                    present: Set(present),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(db).await
            }
        }
    }

    /// Number of pages currently present for a (paper, question) slot.
    pub async fn present_count<C: ConnectionTrait>(
        db: &C,
        paper_id: i64,
        question_index: i64,
    ) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::PaperId.eq(paper_id))
            .filter(Column::QuestionIndex.eq(question_index))
            .filter(Column::Present.eq(true))
            .count(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::Model as PageImage;
    use crate::models::paper::Model as Paper;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_set_presence_inserts_then_updates() {
        let db = setup_test_db().await;
        let paper = Paper::create(&db, 3).await.unwrap();

        let row = PageImage::set_presence(&db, paper.id, 1, 1, true)
            .await
            .unwrap();
        assert!(row.present);
        assert_eq!(PageImage::present_count(&db, paper.id, 1).await.unwrap(), 1);

        let row = PageImage::set_presence(&db, paper.id, 1, 1, false)
            .await
            .unwrap();
        assert!(!row.present);
        assert_eq!(PageImage::present_count(&db, paper.id, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_present_count_is_per_question() {
        let db = setup_test_db().await;
        let paper = Paper::create(&db, 4).await.unwrap();

        PageImage::set_presence(&db, paper.id, 1, 1, true)
            .await
            .unwrap();
        PageImage::set_presence(&db, paper.id, 1, 2, true)
            .await
            .unwrap();
        PageImage::set_presence(&db, paper.id, 2, 1, true)
            .await
            .unwrap();

        assert_eq!(PageImage::present_count(&db, paper.id, 1).await.unwrap(), 2);
        assert_eq!(PageImage::present_count(&db, paper.id, 2).await.unwrap(), 1);
    }
}
