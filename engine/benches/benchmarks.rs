//! Performance benchmarks for torgi-engine

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use torgi_engine::{
    decode_batch, statement, ColumnSet, KeyKind, OnConflict, PurchaseRecord, QueryIntent,
    ReferenceMap, SchedulerState, Table, Timing,
};

const REGIONS: [&str; 5] = ["Москва", "Тверь", "Казань", "Омск", "Пермь"];

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn create_test_batch(size: usize) -> Vec<u8> {
    let records: Vec<_> = (0..size)
        .map(|i| {
            json!({
                "registry_number": format!("0859200001124{:06}", i),
                "purchase_subject": format!("Purchase {}", i),
                "region": REGIONS[i % REGIONS.len()],
                "status": "допущены",
                "max_price": 1000.0 * i as f64,
                "bidding_datetime": "2024-03-01T12:00:00+03:00"
            })
        })
        .collect();
    serde_json::to_vec(&records).unwrap()
}

fn bench_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("statements");
    let table = Table::PurchaseRegistry;

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("upsert", size), size, |b, &size| {
            b.iter(|| {
                statement::upsert(
                    black_box(table.name()),
                    table.primary_key(KeyKind::Natural),
                    table.columns(ColumnSet::Write),
                    black_box(size),
                    OnConflict::Update,
                )
            })
        });
    }

    group.bench_function("plan_today", |b| {
        b.iter(|| QueryIntent::Today.plan(black_box(0), black_box(Weekday::Fri)))
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    let mut map = ReferenceMap::new();
    for (i, region) in REGIONS.iter().enumerate() {
        map.insert(Table::Regions, *region, i as i64 + 1);
    }
    map.insert(Table::Statuses, "допущены", 1);

    for size in [100, 1000].iter() {
        let records = decode_batch(&create_test_batch(*size)).unwrap();
        group.bench_with_input(BenchmarkId::new("apply", size), &records, |b, records| {
            b.iter(|| {
                let mut records = records.clone();
                map.apply(black_box(&mut records))
            })
        });
        group.bench_with_input(BenchmarkId::new("write_args", size), &records, |b, records| {
            b.iter(|| {
                records
                    .iter()
                    .map(PurchaseRecord::write_args)
                    .collect::<Result<Vec<_>, _>>()
            })
        });
    }

    group.finish();
}

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding");

    for size in [10, 1000].iter() {
        let payload = create_test_batch(*size);
        group.bench_with_input(BenchmarkId::new("decode_batch", size), &payload, |b, payload| {
            b.iter(|| decode_batch(black_box(payload)))
        });
    }

    group.finish();
}

fn bench_scheduling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduling");
    let timing = Timing::default();

    group.bench_function("drain_500", |b| {
        let records: Vec<PurchaseRecord> = (0..500)
            .map(|i| {
                let mut r = PurchaseRecord::new(i.to_string(), "s");
                r.bidding = Some(t0() + chrono::Duration::minutes(i));
                r
            })
            .collect();

        b.iter(|| {
            let mut state = SchedulerState::new(records.clone());
            let mut fired = 0;
            while state.recompute(t0(), &timing).index.is_some() {
                state.take_due();
                fired += 1;
            }
            fired
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_statements,
    bench_resolution,
    bench_decoding,
    bench_scheduling,
);
criterion_main!(benches);
