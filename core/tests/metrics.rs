//! Metric aggregation tests.

use chrono::NaiveDate;
use rfm_core::{
    config::MissingActivityPolicy,
    customer::CustomerOrderRecord,
    metrics::{aggregate, consolidate, derive},
    RfmError,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn reference() -> NaiveDate {
    date(2021, 6, 1)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// frequency and monetary sum both channels; recency counts whole days.
#[test]
fn metrics_sum_channels_and_count_days() {
    let records = vec![
        CustomerOrderRecord::new("a", date(2021, 5, 22))
            .with_online(4, 799.38)
            .with_offline(1, 139.99),
    ];

    let metrics = aggregate(&records, reference(), MissingActivityPolicy::Fail).unwrap();

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].customer_id, "a");
    assert_eq!(metrics[0].recency, 10);
    assert_eq!(metrics[0].frequency, 5);
    assert!((metrics[0].monetary - 939.37).abs() < 1e-9);
}

/// A last order on the reference date itself is recency 0, not an error.
#[test]
fn same_day_order_is_zero_recency() {
    let records = vec![CustomerOrderRecord::new("a", reference()).with_online(1, 10.0)];
    let metrics = aggregate(&records, reference(), MissingActivityPolicy::Fail).unwrap();
    assert_eq!(metrics[0].recency, 0);
}

/// A reference date before any last order is rejected, naming the customer.
#[test]
fn reference_before_last_order_is_invalid() {
    let records = vec![
        CustomerOrderRecord::new("early", date(2021, 5, 1)).with_online(1, 10.0),
        CustomerOrderRecord::new("late", date(2021, 6, 2)).with_online(1, 10.0),
    ];

    let err = aggregate(&records, reference(), MissingActivityPolicy::Fail).unwrap_err();
    match err {
        RfmError::InvalidReference { customer_id, reference: r, last_order } => {
            assert_eq!(customer_id, "late");
            assert_eq!(r, reference());
            assert_eq!(last_order, date(2021, 6, 2));
        }
        other => panic!("expected InvalidReference, got {other:?}"),
    }
}

/// Under the fail policy a customer with no orders aborts aggregation.
#[test]
fn no_activity_fails_under_fail_policy() {
    let records = vec![
        CustomerOrderRecord::new("ok", date(2021, 5, 1)).with_online(1, 10.0),
        CustomerOrderRecord::new("idle", date(2021, 5, 1)),
    ];

    let err = consolidate(&records, MissingActivityPolicy::Fail).unwrap_err();
    assert!(
        matches!(err, RfmError::MissingActivity { ref customer_id, .. } if customer_id == "idle"),
        "unexpected error: {err:?}"
    );
}

/// Under the exclude policy the inactive record is dropped and the rest kept.
#[test]
fn no_activity_is_dropped_under_exclude_policy() {
    let records = vec![
        CustomerOrderRecord::new("ok", date(2021, 5, 1)).with_online(1, 10.0),
        CustomerOrderRecord::new("idle", date(2021, 5, 1)),
        CustomerOrderRecord::new("refund", date(2021, 5, 1)).with_online(1, -5.0),
    ];

    let kept = consolidate(&records, MissingActivityPolicy::Exclude).unwrap();
    let ids: Vec<_> = kept.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["ok"]);
}

/// Duplicate ids merge into one customer in first-seen order.
#[test]
fn duplicate_ids_are_merged() {
    let records = vec![
        CustomerOrderRecord::new("a", date(2021, 3, 1))
            .with_online(2, 100.0)
            .with_categories(["KADIN"]),
        CustomerOrderRecord::new("b", date(2021, 4, 1)).with_online(1, 50.0),
        CustomerOrderRecord::new("a", date(2021, 5, 1))
            .with_offline(3, 60.0)
            .with_categories(["ERKEK"]),
    ];

    let customers = consolidate(&records, MissingActivityPolicy::Fail).unwrap();
    assert_eq!(customers.len(), 2);
    assert_eq!(customers[0].id, "a");
    assert_eq!(customers[0].total_orders(), 5);
    assert!((customers[0].total_spend() - 160.0).abs() < 1e-9);
    assert_eq!(customers[0].last_order_date, date(2021, 5, 1));
    assert_eq!(customers[0].category_interest.len(), 2);

    let metrics = derive(&customers, reference()).unwrap();
    assert_eq!(metrics[0].recency, 31);
}

/// Aggregation leaves its input untouched.
#[test]
fn aggregation_does_not_mutate_input() {
    let records = vec![
        CustomerOrderRecord::new("a", date(2021, 3, 1)).with_online(2, 100.0),
        CustomerOrderRecord::new("a", date(2021, 5, 1)).with_online(1, 10.0),
    ];
    let before = records.clone();

    let _ = aggregate(&records, reference(), MissingActivityPolicy::Fail).unwrap();

    assert_eq!(records, before);
}

/// Two full channels do not overflow the order total.
#[test]
fn saturated_channel_counts_sum_without_overflow() {
    let records = vec![
        CustomerOrderRecord::new("bulk", date(2021, 5, 31))
            .with_online(u32::MAX, 10.0)
            .with_offline(1, 10.0),
    ];

    let metrics = aggregate(&records, reference(), MissingActivityPolicy::Fail).unwrap();

    assert_eq!(metrics[0].frequency, u64::from(u32::MAX) + 1);
}

/// Merging duplicates past the channel counter's range is an error, not a wrap.
#[test]
fn duplicate_merge_overflow_is_reported() {
    let records = vec![
        CustomerOrderRecord::new("bulk", date(2021, 5, 30)).with_online(u32::MAX, 10.0),
        CustomerOrderRecord::new("bulk", date(2021, 5, 31)).with_online(1, 10.0),
    ];

    let err = consolidate(&records, MissingActivityPolicy::Fail).unwrap_err();
    assert!(
        matches!(err, RfmError::CountOverflow { ref customer_id } if customer_id == "bulk"),
        "unexpected: {err:?}"
    );
}
