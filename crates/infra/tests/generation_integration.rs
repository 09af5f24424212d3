//! End-to-end generation against a real SQLite file.
//!
//! Each test runs the generation service over the production schema so the
//! unique instance index, the transactional commit and the cascade rules are
//! exercised together with the service logic.

mod support;

use cadence_core::{EventRepository, FixedClock, RecurrenceRuleRepository, RuleOutcome};
use cadence_domain::{
    CadenceError, EventDetails, EventStatus, GenerationBatch, MonthlyPattern, NewEvent,
    NewRecurrenceRule, RecurrencePattern, RuleBounds, RuleProgress, WeekdaySet,
};
use chrono::Weekday;
use support::{date, dates, TestDatabase};

fn saturdays() -> RecurrencePattern {
    RecurrencePattern::Weekly { days: WeekdaySet::from_weekdays([Weekday::Sat]) }
}

fn instance_of(parent_id: i64, on: chrono::NaiveDate) -> NewEvent {
    NewEvent {
        parent_event_id: Some(parent_id),
        ..NewEvent::standalone(on, EventDetails::named("Saturday Run"))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn weekly_rule_fills_horizon_and_reruns_are_idempotent() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    let rule = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();
    let clock = FixedClock::new(date(2024, 3, 1));
    let service = db.service(&clock);

    let first = service.generate().await.unwrap();
    assert_eq!(first.outcome_for(rule.id), Some(&RuleOutcome::Generated { count: 4 }));

    let instances = db.events.list_instances(parent.id).await.unwrap();
    assert_eq!(
        dates(&instances),
        vec![date(2024, 3, 9), date(2024, 3, 16), date(2024, 3, 23), date(2024, 3, 30)]
    );
    assert!(instances.iter().all(|event| {
        event.status == EventStatus::Upcoming
            && !event.is_recurring
            && event.details.name == "Saturday Run"
    }));

    let second = service.generate().await.unwrap();
    assert_eq!(second.outcome_for(rule.id), Some(&RuleOutcome::UpToDate));
    assert_eq!(db.events.list_instances(parent.id).await.unwrap().len(), 4);

    let stored = db.rules.find_by_id(rule.id).await.unwrap().unwrap();
    assert_eq!(
        stored.progress,
        RuleProgress { occurrences_created: 4, last_generated_date: Some(date(2024, 3, 30)) }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn later_runs_continue_from_last_generated_date() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    let rule = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();
    let clock = FixedClock::new(date(2024, 3, 1));
    let service = db.service(&clock);

    service.generate().await.unwrap();
    clock.advance_days(7);
    let report = service.generate().await.unwrap();

    assert_eq!(report.outcome_for(rule.id), Some(&RuleOutcome::Generated { count: 1 }));
    let instances = db.events.list_instances(parent.id).await.unwrap();
    assert_eq!(instances.last().map(|event| event.date), Some(date(2024, 4, 6)));
    assert_eq!(instances.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn manually_created_instance_is_not_duplicated() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    let rule = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();
    db.events.insert_event(instance_of(parent.id, date(2024, 3, 16))).await.unwrap();

    let service = db.service(&FixedClock::new(date(2024, 3, 1)));
    let report = service.generate().await.unwrap();

    assert_eq!(report.outcome_for(rule.id), Some(&RuleOutcome::Generated { count: 3 }));
    assert_eq!(db.events.list_instances(parent.id).await.unwrap().len(), 4);

    let stored = db.rules.find_by_id(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.progress.occurrences_created, 3);
    assert_eq!(stored.progress.last_generated_date, Some(date(2024, 3, 30)));
}

#[tokio::test(flavor = "multi_thread")]
async fn max_occurrences_caps_total_instances() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    let bounds = RuleBounds { end_date: None, max_occurrences: Some(2) };
    let rule = db
        .rules
        .create(NewRecurrenceRule::new(parent.id, saturdays()).with_bounds(bounds))
        .await
        .unwrap();
    let service = db.service(&FixedClock::new(date(2024, 3, 1)));

    let first = service.generate().await.unwrap();
    let second = service.generate().await.unwrap();

    assert_eq!(first.outcome_for(rule.id), Some(&RuleOutcome::Generated { count: 2 }));
    assert_eq!(second.outcome_for(rule.id), Some(&RuleOutcome::SkippedExhausted));
    assert_eq!(
        dates(&db.events.list_instances(parent.id).await.unwrap()),
        vec![date(2024, 3, 9), date(2024, 3, 16)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn month_end_day_is_clamped() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Month End Social", date(2024, 1, 31)).await;
    let pattern = RecurrencePattern::Monthly(MonthlyPattern::DayOfMonth(31));
    db.rules.create(NewRecurrenceRule::new(parent.id, pattern)).await.unwrap();

    let service = db.service(&FixedClock::new(date(2024, 1, 31)));
    service.generate().await.unwrap();

    assert_eq!(
        dates(&db.events.list_instances(parent.id).await.unwrap()),
        vec![date(2024, 2, 28)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unique_index_rejects_second_instance_on_same_day() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;

    db.events.insert_event(instance_of(parent.id, date(2024, 3, 9))).await.unwrap();
    let err = db.events.insert_event(instance_of(parent.id, date(2024, 3, 9))).await.unwrap_err();

    match err {
        CadenceError::Database(message) => assert!(message.contains("unique"), "{message}"),
        other => panic!("expected database error, got {other:?}"),
    }

    // Standalone events share dates freely.
    let details = EventDetails::named("Open Day");
    db.events.insert_event(NewEvent::standalone(date(2024, 3, 9), details.clone())).await.unwrap();
    db.events.insert_event(NewEvent::standalone(date(2024, 3, 9), details)).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commit_persists_nothing() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    let rule = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();

    // Second instance collides with the first inside the same transaction.
    let colliding = GenerationBatch {
        rule_id: rule.id,
        instances: vec![
            instance_of(parent.id, date(2024, 3, 9)),
            instance_of(parent.id, date(2024, 3, 9)),
        ],
        progress: RuleProgress { occurrences_created: 2, last_generated_date: Some(date(2024, 3, 9)) },
    };
    assert!(db.rules.commit_generation(colliding).await.is_err());

    // Unknown rule: the instance insert succeeds, the progress update does not.
    let orphaned = GenerationBatch {
        rule_id: rule.id + 1_000,
        instances: vec![instance_of(parent.id, date(2024, 3, 16))],
        progress: RuleProgress { occurrences_created: 1, last_generated_date: Some(date(2024, 3, 16)) },
    };
    assert!(matches!(
        db.rules.commit_generation(orphaned).await,
        Err(CadenceError::NotFound(_))
    ));

    assert!(db.events.list_instances(parent.id).await.unwrap().is_empty());
    let stored = db.rules.find_by_id(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.progress, RuleProgress::default());
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_parent_removes_rule_and_unlinks_instances() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();
    db.service(&FixedClock::new(date(2024, 3, 1))).generate().await.unwrap();
    let instances = db.events.list_instances(parent.id).await.unwrap();

    db.events.delete_event(parent.id).await.unwrap();

    assert!(db.rules.find_by_event(parent.id).await.unwrap().is_none());
    assert!(db.rules.list_active().await.unwrap().is_empty());
    let survivor = db.events.find_event(instances[0].id).await.unwrap().unwrap();
    assert_eq!(survivor.parent_event_id, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_rule_row_fails_alone() {
    let db = TestDatabase::new();
    let broken_parent = db.insert_parent("Broken", date(2024, 3, 2)).await;
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    db.execute_batch(&format!(
        "INSERT INTO event_recurrence_rules (event_id, recurrence_type, week_of_month)
         VALUES ({}, 'monthly', 9);",
        broken_parent.id
    ));
    let rule = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();

    let report = db.service(&FixedClock::new(date(2024, 3, 1))).generate().await.unwrap();

    assert_eq!(report.failed_rules(), 1);
    assert_eq!(report.outcome_for(rule.id), Some(&RuleOutcome::Generated { count: 4 }));
    assert!(db.events.list_instances(broken_parent.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_bounds_columns_fail_only_their_rule() {
    let db = TestDatabase::new();
    let negative_cap = db.insert_parent("Negative Cap", date(2024, 3, 2)).await;
    let bad_end = db.insert_parent("Bad End Date", date(2024, 3, 2)).await;
    let bad_anchor = db.insert_parent("Bad Anchor", date(2024, 3, 2)).await;
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    db.execute_batch(&format!(
        "INSERT INTO event_recurrence_rules (event_id, recurrence_type, max_occurrences)
         VALUES ({}, 'biweekly', -1);
         INSERT INTO event_recurrence_rules (event_id, recurrence_type, end_date)
         VALUES ({}, 'biweekly', 'someday');
         INSERT INTO event_recurrence_rules (event_id, recurrence_type, last_generated_date)
         VALUES ({}, 'biweekly', 20240302);",
        negative_cap.id, bad_end.id, bad_anchor.id
    ));
    let rule = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();

    let loaded = db.rules.list_active().await.unwrap();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.iter().filter(|rule| rule.is_err()).count(), 3);

    let report = db.service(&FixedClock::new(date(2024, 3, 1))).generate().await.unwrap();

    assert_eq!(report.failed_rules(), 3);
    assert_eq!(report.outcome_for(rule.id), Some(&RuleOutcome::Generated { count: 4 }));
    assert_eq!(db.events.list_instances(parent.id).await.unwrap().len(), 4);
    for broken in [&negative_cap, &bad_end, &bad_anchor] {
        assert!(db.events.list_instances(broken.id).await.unwrap().is_empty());
    }

    let lookup = db.rules.find_by_event(negative_cap.id).await;
    assert!(matches!(lookup, Err(CadenceError::InvalidInput(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_operations_round_trip() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    let created = db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();
    db.service(&FixedClock::new(date(2024, 3, 1))).generate().await.unwrap();

    let found = db.rules.find_by_event(parent.id).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.pattern, saturdays());

    let bounds = RuleBounds { end_date: Some(date(2024, 12, 31)), max_occurrences: Some(20) };
    let updated = db.rules.update_settings(created.id, RecurrencePattern::Biweekly, bounds).await.unwrap();
    assert_eq!(updated.pattern, RecurrencePattern::Biweekly);
    assert_eq!(updated.bounds, bounds);
    assert_eq!(updated.progress.occurrences_created, 4);

    db.rules.set_active(created.id, false).await.unwrap();
    assert!(db.rules.list_active().await.unwrap().is_empty());

    let missing = db.rules.set_active(created.id + 1_000, true).await;
    assert!(matches!(missing, Err(CadenceError::NotFound(_))));

    let report = db.service(&FixedClock::new(date(2024, 4, 1))).generate().await.unwrap();
    assert!(report.rules.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_rule_for_same_event_is_rejected() {
    let db = TestDatabase::new();
    let parent = db.insert_parent("Saturday Run", date(2024, 3, 2)).await;
    db.rules.create(NewRecurrenceRule::new(parent.id, saturdays())).await.unwrap();

    let duplicate = db.rules.create(NewRecurrenceRule::new(parent.id, RecurrencePattern::Biweekly)).await;

    assert!(matches!(duplicate, Err(CadenceError::Database(_))));
}
