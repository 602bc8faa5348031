//! Lesson lifecycle scenarios: citation to promotion, decay behavior, and
//! id allocation.

use recall::models::{LessonCategory, LessonLevel, LessonSource, RecallError};
use recall::store::LessonOps;

use super::helpers::{test_store, touch_session_marker};

fn add_project_lesson(store: &impl LessonOps, title: &str) -> String {
    store
        .add_lesson(
            LessonLevel::Project,
            LessonCategory::Pattern,
            title,
            "lesson content",
            LessonSource::Human,
            false,
            true,
        )
        .expect("add failed")
}

#[test]
fn cite_to_promotion() {
    let (_temp, store) = test_store();
    let id = add_project_lesson(&store, "Heavily used pattern");

    let mut last = None;
    for _ in 0..50 {
        last = Some(store.cite_lesson(&id).expect("cite failed"));
    }
    let result = last.unwrap();
    assert!(result.promotion_ready);
    assert_eq!(result.uses, 51);
    assert_eq!(result.velocity, 50.0);

    let new_id = store.promote_lesson(&id).expect("promote failed");
    assert!(new_id.starts_with('S'));

    // Metrics survive the scope change; the project copy is gone.
    let promoted = store.get_lesson(&new_id).unwrap().unwrap();
    assert_eq!(promoted.uses, 51);
    assert_eq!(promoted.velocity, 50.0);
    assert_eq!(promoted.level, LessonLevel::System);
    assert!(store.get_lesson(&id).unwrap().is_none());
}

#[test]
fn vacation_mode_decay_is_idempotent() {
    let (_temp, store) = test_store();
    let id = add_project_lesson(&store, "Decay subject");
    for _ in 0..4 {
        store.cite_lesson(&id).unwrap();
    }
    touch_session_marker(&store, "session-1");

    let first = store.decay_lessons(30).unwrap();
    assert!(!first.skipped);
    let after_first = store.get_lesson(&id).unwrap().unwrap();
    assert_eq!(after_first.velocity, 2.0);

    // No new sessions: the second pass reports zero changes.
    let second = store.decay_lessons(30).unwrap();
    assert!(second.skipped);
    assert_eq!(second.decayed_uses, 0);
    assert_eq!(second.decayed_velocity, 0);

    let after_second = store.get_lesson(&id).unwrap().unwrap();
    assert_eq!(after_second.velocity, after_first.velocity);
    assert_eq!(after_second.uses, after_first.uses);

    // A new session re-arms the pass. The marker comparison is
    // mtime-based, so make sure the clock has moved on.
    std::thread::sleep(std::time::Duration::from_millis(20));
    touch_session_marker(&store, "session-2");
    let third = store.decay_lessons(30).unwrap();
    assert!(!third.skipped);
    assert_eq!(store.get_lesson(&id).unwrap().unwrap().velocity, 1.0);
}

#[test]
fn ids_are_monotonic_per_scope() {
    let (_temp, store) = test_store();
    let ids: Vec<String> = (0..4)
        .map(|i| add_project_lesson(&store, &format!("Distinct lesson number {i}")))
        .collect();
    assert_eq!(ids, vec!["L001", "L002", "L003", "L004"]);

    // Deleting the middle does not cause reuse of the tail id.
    store.delete_lesson("L002").unwrap();
    let next = add_project_lesson(&store, "A later lesson entirely");
    assert_eq!(next, "L005");
}

#[test]
fn duplicate_rejected_then_forced() {
    let (_temp, store) = test_store();
    add_project_lesson(&store, "Normalize inputs at the boundary");

    let err = store
        .add_lesson(
            LessonLevel::Project,
            LessonCategory::Pattern,
            "Normalize inputs, at the boundary!",
            "other content",
            LessonSource::Human,
            false,
            true,
        )
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RecallError>(),
        Some(RecallError::Duplicate(_))
    ));

    store
        .add_lesson(
            LessonLevel::Project,
            LessonCategory::Pattern,
            "Normalize inputs, at the boundary!",
            "other content",
            LessonSource::Human,
            true,
            true,
        )
        .expect("forced add failed");
}
