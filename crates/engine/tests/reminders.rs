use chrono::{Duration, TimeZone, Utc};

use engine::{
    ActivityKind, AmountOwed, Destination, EngineError, REMINDER_COOLDOWN_MS, ReminderCmd, User,
};

mod common;
use common::{Harness, engine_with_db, user};

struct Debt {
    h: Harness,
    group_id: String,
    alice: User,
    bob: User,
}

async fn debt() -> Debt {
    let h = engine_with_db().await;
    let alice = user(&h.engine, "alice").await;
    let bob = user(&h.engine, "bob").await;
    let group = h.engine.create_group(&alice.id, "Trip", None).await.unwrap();
    h.engine.join_group(&group.join_code, &bob.id).await.unwrap();
    Debt {
        h,
        group_id: group.id,
        alice,
        bob,
    }
}

fn owed() -> Vec<AmountOwed> {
    vec![AmountOwed::new("alice", 12.5), AmountOwed::new("carol", 17.5)]
}

#[tokio::test]
async fn reminder_is_handed_to_the_debtor_device() {
    let d = debt().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let receipt = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, owed()).at(now))
        .await
        .unwrap();

    assert_eq!(receipt.sent_at, now);
    assert_eq!(receipt.notification.title, "Trip");
    assert_eq!(receipt.notification.body, "You owe 30 to carol and 1 other!");
    assert_eq!(
        receipt.notification.destination,
        Destination::Single("device-bob".to_string())
    );
    assert_eq!(d.h.notifier.direct(), vec![receipt.notification]);

    let members = d.h.engine.members(&d.group_id, &d.alice.id).await.unwrap();
    let bob = members.iter().find(|m| m.user_id == d.bob.id).unwrap();
    assert_eq!(bob.last_notification_date, Some(now));

    let latest = d
        .h
        .engine
        .activity(&d.group_id, &d.alice.id, Some(1))
        .await
        .unwrap();
    assert_eq!(latest[0].kind, ActivityKind::Reminder);
    assert_eq!(
        latest[0].content,
        "I just reminded {bob} of a total of {30} owed."
    );
}

#[tokio::test]
async fn second_reminder_within_a_day_is_throttled() {
    let d = debt().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let cmd = || ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, owed());

    d.h.engine.send_reminder(cmd().at(now)).await.unwrap();

    let just_before = now + Duration::milliseconds(REMINDER_COOLDOWN_MS - 1);
    let err = d
        .h
        .engine
        .send_reminder(cmd().at(just_before))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cooldown(_)));
    assert_eq!(d.h.notifier.direct().len(), 1);

    let window_elapsed = now + Duration::milliseconds(REMINDER_COOLDOWN_MS);
    d.h.engine
        .send_reminder(cmd().at(window_elapsed))
        .await
        .unwrap();
    assert_eq!(d.h.notifier.direct().len(), 2);
}

#[tokio::test]
async fn cooldown_is_per_debtor() {
    let d = debt().await;
    let carol = user(&d.h.engine, "carol").await;
    let group = d.h.engine.group(&d.group_id, &d.alice.id).await.unwrap();
    d.h.engine
        .join_group(&group.join_code, &carol.id)
        .await
        .unwrap();
    let now = Utc::now();

    d.h.engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, owed()).at(now))
        .await
        .unwrap();
    d.h.engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &carol.id, owed()).at(now))
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_handoff_does_not_consume_the_cooldown() {
    let d = debt().await;
    let now = Utc::now();
    let cmd = || ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, owed()).at(now);

    d.h.notifier.set_failing(true);
    let err = d.h.engine.send_reminder(cmd()).await.unwrap_err();
    assert!(matches!(err, EngineError::Notification(_)));

    let members = d.h.engine.members(&d.group_id, &d.bob.id).await.unwrap();
    let bob = members.iter().find(|m| m.user_id == d.bob.id).unwrap();
    assert_eq!(bob.last_notification_date, None);
    let reminders = d
        .h
        .engine
        .activity(&d.group_id, &d.bob.id, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == ActivityKind::Reminder)
        .count();
    assert_eq!(reminders, 0);

    d.h.notifier.set_failing(false);
    d.h.engine.send_reminder(cmd()).await.unwrap();
}

#[tokio::test]
async fn debtor_without_device_cannot_be_reminded() {
    let d = debt().await;
    d.h.engine.set_device_token(&d.bob.id, None).await.unwrap();

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, owed()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoDevice(_)));
}

#[tokio::test]
async fn both_parties_must_be_members() {
    let d = debt().await;
    let mallory = user(&d.h.engine, "mallory").await;

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &mallory.id, owed()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotMember(_)));

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &mallory.id, &d.bob.id, owed()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotMember(_)));
}

#[tokio::test]
async fn malformed_debts_are_rejected() {
    let d = debt().await;

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(
            &d.group_id,
            &d.alice.id,
            &d.alice.id,
            owed(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(d.h.notifier.direct().is_empty());
}

#[tokio::test]
async fn membership_and_cooldown_are_checked_before_the_debts() {
    let d = debt().await;
    let mallory = user(&d.h.engine, "mallory").await;
    let now = Utc::now();

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &mallory.id, &d.bob.id, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotMember(_)));

    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(
            &d.group_id,
            &d.alice.id,
            &mallory.id,
            vec![AmountOwed::new("alice", -1.0)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotMember(_)));

    d.h.engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, owed()).at(now))
        .await
        .unwrap();
    let err = d
        .h
        .engine
        .send_reminder(ReminderCmd::new(&d.group_id, &d.alice.id, &d.bob.id, Vec::new()).at(now))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cooldown(_)));
}
