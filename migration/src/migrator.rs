use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608070001_create_users::Migration),
            Box::new(migrations::m202608070002_create_papers::Migration),
            Box::new(migrations::m202608070003_create_paper_questions::Migration),
            Box::new(migrations::m202608070004_create_page_images::Migration),
            Box::new(migrations::m202608070005_create_tasks::Migration),
            Box::new(migrations::m202608070006_create_task_results::Migration),
        ]
    }
}
