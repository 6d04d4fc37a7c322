pub mod m202608070001_create_users;
pub mod m202608070002_create_papers;
pub mod m202608070003_create_paper_questions;
pub mod m202608070004_create_page_images;
pub mod m202608070005_create_tasks;
pub mod m202608070006_create_task_results;
