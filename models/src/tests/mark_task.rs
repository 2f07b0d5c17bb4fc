use crate::{ClientId, MarkTask, MarkTaskStatus, ModelError};

use chrono::Utc;

/// **VALUE**: Verifies the happy path `pending -> assigned -> completed`.
///
/// **WHY THIS MATTERS**: The router reports task outcomes back to the UI from
/// these fields.
///
/// **BUG THIS CATCHES**: Would catch `assign` forgetting the assignee or timestamp.
#[test]
fn given_pending_task_when_assigned_and_finished_then_status_is_completed() {
    // GIVEN: A new task
    let now = Utc::now();
    let mut task = MarkTask::new("t1", "do X", now);
    assert_eq!(task.status, MarkTaskStatus::Pending);

    // WHEN: Assigning then completing
    task.assign(ClientId::from("b"), now).unwrap();
    task.finish(true, "done").unwrap();

    // THEN: Terminal with the recorded outcome
    assert_eq!(task.status, MarkTaskStatus::Completed);
    assert_eq!(task.assigned_to, Some(ClientId::from("b")));
    assert_eq!(task.assigned_at, Some(now));
    assert_eq!(task.result_message.as_deref(), Some("done"));
    assert!(task.status.is_terminal());
}

/// **VALUE**: Verifies status never moves backwards or skips `assigned`.
///
/// **WHY THIS MATTERS**: A late duplicate notify must not reopen a finished task.
///
/// **BUG THIS CATCHES**: Would catch missing guards on either transition.
#[test]
fn given_task_when_transition_is_out_of_order_then_invalid_transition() {
    // GIVEN: A pending task and a failed task
    let now = Utc::now();
    let mut pending = MarkTask::new("t1", "do X", now);
    let mut failed = MarkTask::new("t2", "do Y", now);
    failed.assign(ClientId::from("a"), now).unwrap();
    failed.finish(false, "boom").unwrap();

    // WHEN / THEN: Finishing before assignment fails
    assert!(matches!(
        pending.finish(true, "early"),
        Err(ModelError::InvalidTransition { .. })
    ));

    // AND: Reassigning a terminal task fails
    assert!(matches!(
        failed.assign(ClientId::from("b"), now),
        Err(ModelError::InvalidTransition { .. })
    ));
    assert_eq!(failed.status, MarkTaskStatus::Failed);
}
