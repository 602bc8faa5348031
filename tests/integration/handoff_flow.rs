//! Handoff lifecycle scenarios: auto-phase inference, dependency chains,
//! and todo reconciliation.

use recall::models::{Agent, HandoffStatus, Phase, TodoItem, TodoStatus, TriedOutcome};
use recall::store::HandoffOps;

use super::helpers::test_store;

#[test]
fn auto_phase_bump_then_auto_complete() {
    let (_temp, store) = test_store();
    let id = store
        .handoff_add(
            "Websocket reconnect",
            Some("Reconnect drops queued frames"),
            vec![],
            Phase::Research,
            Agent::User,
        )
        .unwrap();

    store
        .handoff_add_tried(&id, TriedOutcome::Success, "Implement websocket reconnect")
        .unwrap();
    let handoff = store.handoff_get(&id).unwrap().unwrap();
    assert_eq!(handoff.phase, Phase::Implementing);
    assert_eq!(handoff.status, HandoffStatus::NotStarted);

    store
        .handoff_add_tried(&id, TriedOutcome::Success, "Final: ship v1")
        .unwrap();
    let handoff = store.handoff_get(&id).unwrap().unwrap();
    assert_eq!(handoff.status, HandoffStatus::Completed);
    assert_eq!(handoff.phase, Phase::Review);
}

#[test]
fn dependency_chain_ready_progression() {
    let (_temp, store) = test_store();
    let a = store
        .handoff_add("Chain A", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    let b = store
        .handoff_add("Chain B", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    let c = store
        .handoff_add("Chain C", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    store.handoff_update_blocked_by(&b, vec![a.clone()]).unwrap();
    store.handoff_update_blocked_by(&c, vec![b.clone()]).unwrap();

    let ready_ids = |store: &recall::store::Recall| -> Vec<String> {
        store
            .handoff_ready()
            .unwrap()
            .iter()
            .map(|h| h.id.clone())
            .collect()
    };

    assert_eq!(ready_ids(&store), vec![a.clone()]);

    store
        .handoff_update_status(&a, HandoffStatus::Completed)
        .unwrap();
    assert_eq!(ready_ids(&store), vec![b.clone()]);

    store
        .handoff_update_status(&b, HandoffStatus::Completed)
        .unwrap();
    assert_eq!(ready_ids(&store), vec![c]);
}

#[test]
fn sync_todos_creates_and_populates_handoff() {
    let (_temp, store) = test_store();
    let todos = vec![
        TodoItem {
            content: "Refactor parser".to_string(),
            status: TodoStatus::InProgress,
            active_form: Some("Refactoring parser".to_string()),
        },
        TodoItem {
            content: "Add tests".to_string(),
            status: TodoStatus::Pending,
            active_form: None,
        },
    ];

    let id = store.handoff_sync_todos(&todos).unwrap().unwrap();
    let handoff = store.handoff_get(&id).unwrap().unwrap();
    assert_eq!(handoff.title, "Refactor parser");
    assert_eq!(handoff.checkpoint, "Refactor parser");
    assert_eq!(handoff.next_steps, "Add tests");
    assert_eq!(handoff.status, HandoffStatus::InProgress);

    // A later sync reuses the same handoff and records completions.
    let todos = vec![
        TodoItem {
            content: "Refactor parser".to_string(),
            status: TodoStatus::Completed,
            active_form: None,
        },
        TodoItem {
            content: "Add tests".to_string(),
            status: TodoStatus::InProgress,
            active_form: None,
        },
    ];
    let second_id = store.handoff_sync_todos(&todos).unwrap().unwrap();
    assert_eq!(second_id, id);

    let handoff = store.handoff_get(&id).unwrap().unwrap();
    assert_eq!(handoff.tried.len(), 1);
    assert_eq!(handoff.tried[0].description, "Refactor parser");
    assert_eq!(handoff.checkpoint, "Add tests");
}

#[test]
fn completed_and_stale_handoffs_leave_active_file() {
    let (_temp, store) = test_store();
    let stale = store
        .handoff_add("Went quiet", None, vec![], Phase::Research, Agent::User)
        .unwrap();
    let fresh = store
        .handoff_add("Still moving", None, vec![], Phase::Research, Agent::User)
        .unwrap();

    store
        .set_handoff_updated(
            &stale,
            chrono::Local::now().date_naive() - chrono::Duration::days(90),
        )
        .unwrap();

    let policy = recall::models::constants::HandoffPolicy::default();
    let output = store.handoff_inject(&policy).unwrap();
    assert!(!output.contains("Went quiet"));
    assert!(output.contains("Still moving"));

    // The stale entry survives in the archive with its note.
    assert!(store.handoff_get(&stale).unwrap().is_none());
    assert!(store.handoff_get(&fresh).unwrap().is_some());
}
