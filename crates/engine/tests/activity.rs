use chrono::Utc;

use engine::{ActivityKind, AddExpenseCmd, Destination, EngineError};

mod common;
use common::{engine_with_db, user};

#[tokio::test]
async fn activity_is_newest_first_and_limited() {
    let h = engine_with_db().await;
    let alice = user(&h.engine, "alice").await;
    let bob = user(&h.engine, "bob").await;
    let group = h.engine.create_group(&alice.id, "Trip", None).await.unwrap();
    h.engine.join_group(&group.join_code, &bob.id).await.unwrap();
    h.engine
        .add_expense(
            AddExpenseCmd::new(&group.id, &bob.id, 42.0, "Dinner", Utc::now())
                .equal([&alice.id, &bob.id]),
        )
        .await
        .unwrap();

    let entries = h.engine.activity(&group.id, &alice.id, None).await.unwrap();
    let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActivityKind::AddExpense,
            ActivityKind::JoinGroup,
            ActivityKind::CreateGroup
        ]
    );
    assert_eq!(entries[0].author_id, bob.id);
    assert_eq!(entries[0].content, "I just added the expense {Dinner}.");
    assert_eq!(entries[1].content, "I just joined the group!");
    assert!(entries.windows(2).all(|w| w[0].date >= w[1].date));

    let latest = h.engine.activity(&group.id, &alice.id, Some(2)).await.unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].id, entries[0].id);
}

#[tokio::test]
async fn outsiders_cannot_read_activity() {
    let h = engine_with_db().await;
    let alice = user(&h.engine, "alice").await;
    let mallory = user(&h.engine, "mallory").await;
    let group = h.engine.create_group(&alice.id, "Trip", None).await.unwrap();

    let err = h
        .engine
        .activity(&group.id, &mallory.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotMember(_)));

    let err = h.engine.activity("missing", &alice.id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn entries_are_broadcast_to_other_members() {
    let h = engine_with_db().await;
    let alice = user(&h.engine, "alice").await;
    let bob = user(&h.engine, "bob").await;
    let group = h.engine.create_group(&alice.id, "Trip", None).await.unwrap();
    h.engine.join_group(&group.join_code, &bob.id).await.unwrap();

    h.engine
        .add_expense(AddExpenseCmd::new(&group.id, &alice.id, 9.0, "Tickets", Utc::now()))
        .await
        .unwrap();

    let last = h.notifier.sent().pop().unwrap();
    assert_eq!(last.title, "Trip");
    assert_eq!(last.body, "alice: I just added the expense Tickets.");
    assert_eq!(
        last.destination,
        Destination::Many(vec!["device-bob".to_string()])
    );
}

#[tokio::test]
async fn broadcast_failures_do_not_fail_the_operation() {
    let h = engine_with_db().await;
    let alice = user(&h.engine, "alice").await;
    let bob = user(&h.engine, "bob").await;
    let group = h.engine.create_group(&alice.id, "Trip", None).await.unwrap();
    h.notifier.set_failing(true);

    h.engine.join_group(&group.join_code, &bob.id).await.unwrap();
    let expense = h
        .engine
        .add_expense(AddExpenseCmd::new(&group.id, &bob.id, 3.0, "Water", Utc::now()))
        .await
        .unwrap();

    assert!(h.notifier.sent().is_empty());
    h.engine
        .expense(&group.id, expense.id, &alice.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn users_need_unique_names() {
    let h = engine_with_db().await;
    user(&h.engine, "alice").await;

    let err = h.engine.create_user(" alice ", None).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = h.engine.create_user("  ", None).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
