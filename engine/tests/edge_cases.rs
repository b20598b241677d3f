//! Edge case tests for torgi-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde_json::json;
use std::time::Duration;
use torgi_engine::statement::{self, MAX_PLACEHOLDERS};
use torgi_engine::{
    decode_batch, nearest_event, ColumnSet, JoinKind, KeyKind, OnConflict, PurchaseRecord,
    QueryIntent, QueryPlan, ReferenceMap, SchedulerState, Schema, SelectStatement, SqlValue,
    Table, Timing,
};

fn decode(value: serde_json::Value) -> Vec<PurchaseRecord> {
    decode_batch(&serde_json::to_vec(&value).unwrap()).unwrap()
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 7)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

// ============================================================================
// Decoding Edge Cases
// ============================================================================

#[test]
fn empty_array_decodes_to_nothing() {
    assert!(decode_batch(b"[]").unwrap().is_empty());
}

#[test]
fn null_and_absent_optionals() {
    let records = decode(json!([{
        "registry_number": "1",
        "purchase_subject": "",
        "region": null,
        "winner_price": null,
        "bidding_datetime": null,
        "approval_datetime": ""
    }]));

    let r = &records[0];
    assert_eq!(r.purchase_subject, "");
    assert_eq!(r.region, None);
    assert_eq!(r.winner_price, None);
    assert_eq!(r.bidding, None);
    assert_eq!(r.approval, None);
    assert_eq!(r.max_price, 0.0);
    assert_eq!(r.intent, None);
}

#[test]
fn zero_time_means_unset() {
    let records = decode(json!([
        {"registry_number": "1", "purchase_subject": "s", "bidding_datetime": "0001-01-01T00:00:00Z"},
        {"registry_number": "2", "purchase_subject": "s", "bidding_datetime": "0001-01-01T00:00:00"}
    ]));
    assert!(records.iter().all(|r| r.bidding.is_none()));
}

#[test]
fn offsets_keep_wall_clock() {
    let records = decode(json!([
        {"registry_number": "1", "purchase_subject": "s", "bidding_datetime": "2024-06-07T12:00:00+03:00"},
        {"registry_number": "2", "purchase_subject": "s", "bidding_datetime": "2024-06-07T12:00:00-05:00"},
        {"registry_number": "3", "purchase_subject": "s", "bidding_datetime": "2024-06-07T12:00:00.250"}
    ]));

    assert_eq!(records[0].bidding, Some(noon()));
    assert_eq!(records[1].bidding, Some(noon()));
    assert_eq!(
        records[2].bidding,
        Some(noon() + chrono::Duration::milliseconds(250))
    );
}

#[test]
fn malformed_timestamp_fails_the_batch() {
    let payload = br#"[{"registry_number": "1", "purchase_subject": "s", "bidding_datetime": "tomorrow"}]"#;
    assert!(decode_batch(payload).is_err());
}

#[test]
fn wrong_top_level_shape() {
    assert!(decode_batch(b"{}").is_err());
    assert!(decode_batch(b"null").is_err());
    assert!(decode_batch(b"").is_err());
}

#[test]
fn unknown_fields_are_ignored() {
    let records = decode(json!([{
        "registry_number": "1",
        "purchase_subject": "s",
        "purchase_id": 99,
        "brand_new_field": {"nested": true}
    }]));
    assert_eq!(records[0].purchase_id, 99);
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_natural_keys() {
    let mut map = ReferenceMap::new();
    let names = [
        "Санкт-Петербург",
        "日本語テスト",
        "مرحبا",
        "🎉🚀",
        "Hello\nWorld\tTab",
    ];
    for (i, name) in names.iter().enumerate() {
        map.insert(Table::Regions, *name, i as i64 + 1);
    }

    let mut records: Vec<PurchaseRecord> = names
        .iter()
        .map(|name| {
            let mut r = PurchaseRecord::new(*name, "s");
            r.region = Some(name.to_string());
            r
        })
        .collect();

    assert!(map.apply(&mut records).is_empty());
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.region_id, Some(i as i64 + 1));
    }
}

#[test]
fn natural_keys_are_case_sensitive() {
    let mut map = ReferenceMap::new();
    map.insert(Table::Statuses, "идем", 1);

    let mut r = PurchaseRecord::new("1", "s");
    r.status = Some("Идем".into());
    let pending = map.apply(std::slice::from_mut(&mut r));

    assert_eq!(pending.first(), Some((Table::Statuses, "Идем")));
}

#[test]
fn short_number_of_short_and_multibyte_numbers() {
    assert_eq!(PurchaseRecord::new("", "s").short_number(), "");
    assert_eq!(PurchaseRecord::new("12", "s").short_number(), "");
    assert_eq!(PurchaseRecord::new("123", "s").short_number(), "123");
    assert_eq!(PurchaseRecord::new("№0859-ёжик", "s").short_number(), "жик");
}

#[test]
fn very_long_values_pass_through_untouched() {
    let subject = "x".repeat(100_000);
    let r = PurchaseRecord::new("1", subject.clone());

    let args = r.write_args().unwrap();
    assert_eq!(args[1], SqlValue::Text(Some(subject)));
}

// ============================================================================
// Statement Boundaries
// ============================================================================

#[test]
fn largest_batch_within_placeholder_limit() {
    let table = Table::PurchaseRegistry;
    let columns = table.columns(ColumnSet::Write);
    let rows = MAX_PLACEHOLDERS / columns.len();

    let (sql, count) = statement::upsert(
        table.name(),
        table.primary_key(KeyKind::Natural),
        columns,
        rows,
        OnConflict::Update,
    );

    assert_eq!(count, rows * columns.len());
    assert!(count <= MAX_PLACEHOLDERS);
    assert!(sql.contains(&format!("${})", count)));
}

#[test]
fn single_column_single_row() {
    let (sql, count) = statement::insert_returning("regions", &["region_name"], 1, &[]);
    assert_eq!(count, 1);
    assert_eq!(sql, "INSERT INTO regions (region_name) VALUES ($1)");
}

#[test]
fn select_with_blank_filter_and_limit() {
    let columns = Table::Regions.columns(ColumnSet::Read);
    let sql = SelectStatement::new(Table::Regions.name(), columns)
        .filter("   ")
        .limit(0)
        .build();
    assert_eq!(sql, "SELECT region_id, region_name FROM regions LIMIT 0");
}

#[test]
fn lookup_tables_join_nothing() {
    assert_eq!(statement::from_clause(Table::Etp, JoinKind::Inner), "etp");
    assert_eq!(Table::Etp.join_on(Table::Regions), None);
    assert_eq!(Table::Regions.join_on(Table::PurchaseRegistry), None);
}

#[test]
fn unknown_table_names() {
    let schema = Schema::new();
    for name in ["", "Regions", "regions ", "purchase-registry"] {
        assert!(schema.table(name).is_err(), "{name:?} should not resolve");
    }
}

// ============================================================================
// Query Plans
// ============================================================================

#[test]
fn every_intent_plans_on_every_weekday() {
    let weekdays = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    for intent in QueryIntent::ALL {
        for day in weekdays {
            for limit in [0, 1, 30] {
                let plan = intent.plan(limit, day).unwrap();
                let placeholders = plan.sql.matches('$').count();
                assert_eq!(placeholders, plan.params.len(), "{intent} {day} {limit}");
                assert!(plan.sql.starts_with("SELECT "));
            }
        }
    }
}

#[test]
fn general_has_no_where_clause() {
    let plan = QueryIntent::General.plan(10, Weekday::Wed).unwrap();
    assert!(!plan.sql.contains("WHERE"));
    assert!(plan.params.is_empty());
}

#[test]
fn negative_ids_are_looked_up() {
    let plan = QueryPlan::by_id(-5).unwrap();
    assert_eq!(plan.params, vec![SqlValue::BigInt(Some(-5))]);
}

// ============================================================================
// Scheduling Boundaries
// ============================================================================

#[test]
fn auction_exactly_at_lead_moment_fires_now() {
    let mut r = PurchaseRecord::new("1", "s");
    r.bidding = Some(noon() + chrono::Duration::minutes(10));

    let next = nearest_event(&[r], noon(), Duration::from_secs(600), Duration::from_secs(60));
    assert_eq!(next.index, Some(0));
    assert_eq!(next.wait, Duration::ZERO);
}

#[test]
fn auction_starting_now_is_skipped() {
    let mut r = PurchaseRecord::new("1", "s");
    r.bidding = Some(noon());

    let next = nearest_event(&[r], noon(), Duration::from_secs(600), Duration::from_secs(60));
    assert_eq!(next.index, None);
    assert_eq!(next.wait, Duration::from_secs(60));
}

#[test]
fn records_sharing_a_bidding_time_each_fire() {
    let timing = Timing::default();
    let records: Vec<PurchaseRecord> = (0..3)
        .map(|i| {
            let mut r = PurchaseRecord::new(format!("rn-{i}"), "s");
            r.bidding = Some(noon() + chrono::Duration::hours(1));
            r
        })
        .collect();
    let mut state = SchedulerState::new(records);

    let mut fired = Vec::new();
    loop {
        let next = state.recompute(noon(), &timing);
        if next.index.is_none() {
            break;
        }
        fired.push(state.take_due().unwrap().registry_number);
    }

    assert_eq!(fired, vec!["rn-0", "rn-1", "rn-2"]);
}
