use super::{
    identify_payload, marking_payload, new_manager, new_user, register_paper_with_questions,
};
use crate::claim_service::ClaimService;
use crate::completion_service::CompletionService;
use crate::error::TaskError;
use crate::task_service::{TaskFilter, TaskService};
use db::models::task::{TaskKind, TaskStatus};
use db::models::task_result;
use db::test_utils::setup_test_db;
use util::task_code::encode_task_code;

#[tokio::test]
async fn test_claim_and_submit_flow() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 7, 2).await;
    let task = TaskService::create_task(&db, 7, 2).await.unwrap();
    let alice = new_user(&db, "alice").await;
    let bob = new_user(&db, "bob").await;

    let first = ClaimService::get_first_available_task(&db, None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, task.id);

    let claimed = ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();
    assert_eq!(claimed.status, TaskStatus::Out);
    assert_eq!(claimed.assigned_user_id, Some(alice.id));

    let lost = ClaimService::assign_task_to_user(&db, bob.id, task.id)
        .await
        .unwrap_err();
    assert!(matches!(lost, TaskError::TaskAlreadyAssigned { .. }));

    let (task, result) = CompletionService::submit_result(&db, alice.id, task.id, marking_payload(4))
        .await
        .unwrap();
    assert_eq!(result.edition, 1);
    assert_eq!(result.score, Some(4));
    assert_eq!(task.status, TaskStatus::Complete);
    assert_eq!(task.assigned_user_id, None);
    assert_eq!(task.latest_result_id, Some(result.id));
}

#[tokio::test]
async fn test_duplicate_claim_by_same_user_is_rejected() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 1, 1).await;
    let task = TaskService::create_task(&db, 1, 1).await.unwrap();
    let alice = new_user(&db, "alice").await;

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();
    let again = ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap_err();
    assert!(matches!(again, TaskError::TaskAlreadyAssigned { .. }));
}

#[tokio::test]
async fn test_available_tasks_come_in_paper_order_with_priority_override() {
    let db = setup_test_db().await;
    for paper_number in [5, 2, 9] {
        register_paper_with_questions(&db, paper_number, 1).await;
        TaskService::create_task(&db, paper_number, 1).await.unwrap();
    }

    let first = ClaimService::get_first_available_task(&db, None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.paper_number, 2);

    let boosted = TaskService::get_task_by_code(&db, &encode_task_code(9, 1))
        .await
        .unwrap();
    TaskService::set_task_priority(&db, boosted.id, 50.0)
        .await
        .unwrap();

    let first = ClaimService::get_first_available_task(&db, None, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.paper_number, 9);
}

#[tokio::test]
async fn test_ownership_gate_leaves_task_untouched() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 3, 1).await;
    let task = TaskService::create_task(&db, 3, 1).await.unwrap();
    let alice = new_user(&db, "alice").await;
    let bob = new_user(&db, "bob").await;

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();

    let rejected = CompletionService::submit_result(&db, bob.id, task.id, marking_payload(9))
        .await
        .unwrap_err();
    assert!(matches!(rejected, TaskError::NotYourTask { .. }));

    let unchanged = TaskService::get_task(&db, task.id).await.unwrap();
    assert_eq!(unchanged.status, TaskStatus::Out);
    assert_eq!(unchanged.assigned_user_id, Some(alice.id));
    assert!(
        task_result::Model::history_for_task(&db, task.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_owner_may_revise_completed_work_but_others_may_not() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 4, 1).await;
    let task = TaskService::create_task(&db, 4, 1).await.unwrap();
    let alice = new_user(&db, "alice").await;
    let bob = new_user(&db, "bob").await;

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();
    CompletionService::submit_result(&db, alice.id, task.id, marking_payload(3))
        .await
        .unwrap();

    assert!(
        ClaimService::user_can_update_task(&db, alice.id, task.id)
            .await
            .unwrap()
    );
    assert!(
        !ClaimService::user_can_update_task(&db, bob.id, task.id)
            .await
            .unwrap()
    );

    let (task_after, revision) =
        CompletionService::submit_result(&db, alice.id, task.id, marking_payload(5))
            .await
            .unwrap();
    assert_eq!(revision.edition, 2);
    assert_eq!(task_after.latest_result_id, Some(revision.id));

    let rejected = CompletionService::submit_result(&db, bob.id, task.id, marking_payload(1))
        .await
        .unwrap_err();
    assert!(matches!(rejected, TaskError::NotYourTask { .. }));
}

#[tokio::test]
async fn test_surrender_returns_task_to_pool() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 6, 1).await;
    let task = TaskService::create_task(&db, 6, 1).await.unwrap();
    let alice = new_user(&db, "alice").await;
    let bob = new_user(&db, "bob").await;

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();

    let not_yours = CompletionService::surrender_task(&db, bob.id, task.id)
        .await
        .unwrap_err();
    assert!(matches!(not_yours, TaskError::NotYourTask { .. }));

    let surrendered = CompletionService::surrender_task(&db, alice.id, task.id)
        .await
        .unwrap();
    assert_eq!(surrendered.status, TaskStatus::ToDo);
    assert_eq!(surrendered.assigned_user_id, None);

    // Back in the pool for anyone.
    let reclaimed = ClaimService::assign_task_to_user(&db, bob.id, task.id)
        .await
        .unwrap();
    assert_eq!(reclaimed.assigned_user_id, Some(bob.id));
}

#[tokio::test]
async fn test_manager_may_surrender_on_behalf_of_assignee() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 6, 1).await;
    let task = TaskService::create_task(&db, 6, 1).await.unwrap();
    let alice = new_user(&db, "alice").await;
    let bob = new_user(&db, "bob").await;
    let lead = new_manager(&db, "lead").await;

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();

    let denied = CompletionService::surrender_task_for(&db, bob.id, task.id)
        .await
        .unwrap_err();
    assert!(matches!(denied, TaskError::NotAManager(_)));

    let freed = CompletionService::surrender_task_for(&db, lead.id, task.id)
        .await
        .unwrap();
    assert_eq!(freed.status, TaskStatus::ToDo);
    assert_eq!(freed.assigned_user_id, None);
}

#[tokio::test]
async fn test_revert_reopens_completed_task_without_touching_history() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 8, 1).await;
    let task = TaskService::create_task(&db, 8, 1).await.unwrap();
    let alice = new_user(&db, "alice").await;
    let bob = new_user(&db, "bob").await;
    let lead = new_manager(&db, "lead").await;

    let nothing = CompletionService::revert_task(&db, lead.id, task.id)
        .await
        .unwrap_err();
    assert!(matches!(nothing, TaskError::NothingToRevert { .. }));

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();
    let (_, first) = CompletionService::submit_result(&db, alice.id, task.id, marking_payload(2))
        .await
        .unwrap();

    let reverted = CompletionService::revert_task(&db, lead.id, task.id)
        .await
        .unwrap();
    assert_eq!(reverted.status, TaskStatus::ToDo);
    assert_eq!(reverted.assigned_user_id, None);
    // Revert does not retroactively unset the pointer; only a fresh
    // submission moves it.
    assert_eq!(reverted.latest_result_id, Some(first.id));

    ClaimService::assign_task_to_user(&db, bob.id, task.id)
        .await
        .unwrap();
    let (task_after, second) =
        CompletionService::submit_result(&db, bob.id, task.id, marking_payload(7))
            .await
            .unwrap();
    assert_eq!(second.edition, 2);
    assert_eq!(task_after.latest_result_id, Some(second.id));

    let editions: Vec<i64> = task_result::Model::history_for_task(&db, task.id)
        .await
        .unwrap()
        .iter()
        .map(|result| result.edition)
        .collect();
    assert_eq!(editions, vec![1, 2]);
}

#[tokio::test]
async fn test_task_codes_resolve_to_live_tasks() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 7, 2).await;
    let task = TaskService::create_task(&db, 7, 2).await.unwrap();

    let found = TaskService::get_task_by_code(&db, "q0007g2").await.unwrap();
    assert_eq!(found.id, task.id);

    let malformed = TaskService::get_task_by_code(&db, "g0007q2")
        .await
        .unwrap_err();
    assert!(matches!(malformed, TaskError::MalformedCode(_)));

    let unknown = TaskService::get_task_by_code(&db, "q0007g1")
        .await
        .unwrap_err();
    assert!(matches!(unknown, TaskError::TaskNotFound(_)));
}

#[tokio::test]
async fn test_task_creation_requires_version_map() {
    let db = setup_test_db().await;

    let unregistered = TaskService::create_task(&db, 42, 1).await.unwrap_err();
    assert!(matches!(unregistered, TaskError::NoVersionMap { .. }));

    register_paper_with_questions(&db, 42, 2).await;
    let unmapped = TaskService::create_task(&db, 42, 5).await.unwrap_err();
    assert!(matches!(unmapped, TaskError::NoVersionMap { .. }));

    TaskService::create_task(&db, 42, 1).await.unwrap();
    let duplicate = TaskService::create_task(&db, 42, 1).await.unwrap_err();
    assert!(matches!(duplicate, TaskError::DuplicateTask { .. }));
}

#[tokio::test]
async fn test_create_all_tasks_for_paper_is_idempotent() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 11, 3).await;

    let created = TaskService::create_all_tasks_for_paper(&db, 11).await.unwrap();
    assert_eq!(created.len(), 4); // identification page plus 3 questions

    let identify: Vec<_> = created
        .iter()
        .filter(|task| task.kind == TaskKind::Identify)
        .collect();
    assert_eq!(identify.len(), 1);
    assert_eq!(identify[0].question_index, 0);

    let again = TaskService::create_all_tasks_for_paper(&db, 11).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_identify_task_accepts_only_identify_payloads() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 12, 1).await;
    let task = TaskService::create_task(&db, 12, 0).await.unwrap();
    assert_eq!(task.kind, TaskKind::Identify);
    let alice = new_user(&db, "alice").await;

    ClaimService::assign_task_to_user(&db, alice.id, task.id)
        .await
        .unwrap();

    let mismatched = CompletionService::submit_result(&db, alice.id, task.id, marking_payload(3))
        .await
        .unwrap_err();
    assert!(matches!(mismatched, TaskError::InvalidPayload(_)));

    let (task, result) = CompletionService::submit_result(
        &db,
        alice.id,
        task.id,
        identify_payload("u20250001", "Dina Mokoena"),
    )
    .await
    .unwrap();
    assert_eq!(task.status, TaskStatus::Complete);
    assert_eq!(result.student_id.as_deref(), Some("u20250001"));
    assert_eq!(result.identity_valid, Some(true));
}

#[tokio::test]
async fn test_list_tasks_filters_by_status_and_assignee() {
    let db = setup_test_db().await;
    register_paper_with_questions(&db, 1, 2).await;
    let first = TaskService::create_task(&db, 1, 1).await.unwrap();
    TaskService::create_task(&db, 1, 2).await.unwrap();
    let alice = new_user(&db, "alice").await;

    ClaimService::assign_task_to_user(&db, alice.id, first.id)
        .await
        .unwrap();

    let out = TaskService::list_tasks(
        &db,
        &TaskFilter {
            status: Some(TaskStatus::Out),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, first.id);

    let alices = TaskService::list_tasks(
        &db,
        &TaskFilter {
            assigned_user_id: Some(alice.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(alices.len(), 1);

    let to_do = TaskService::list_tasks(
        &db,
        &TaskFilter {
            status: Some(TaskStatus::ToDo),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(to_do.len(), 1);
    assert_eq!(to_do[0].question_index, 2);
}
