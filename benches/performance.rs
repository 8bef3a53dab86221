use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use payline_core::core::{
    chain::ChainBuilder, project, reconcile, simulation::interpret, FixedClock, MonotonicSequence,
    SequenceGenerator,
};
use payline_core::domain::{
    common::Period,
    ledger::Ledger,
    payment_line::PaymentLine,
    simulation::{RawPayment, RawPosting, RawSimulationPeriod, RawSimulationResponse},
};
use payline_core::storage::json_backend::{load_ledger_from_path, save_ledger_to_path};
use tempfile::tempdir;
use uuid::Uuid;

const RECIPIENT: &str = "12345678901";

fn issued(sequence: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 1, 8, 0, 0).unwrap() + Duration::hours(sequence as i64)
}

/// One decision per month over `years`, each re-deciding the rest of its
/// year, with every fourth month suspended.
fn build_history(years: i32) -> Vec<PaymentLine> {
    let mut builder = ChainBuilder::new();
    let mut sequence = 0u64;
    for year in 2015..2015 + years {
        let year_end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap();
        for month in 1..=12 {
            sequence += 1;
            let valid = Period::new(Period::month(year, month).unwrap().from(), year_end).unwrap();
            let line = PaymentLine::new(
                Uuid::new_v4(),
                issued(sequence),
                sequence,
                valid,
                None,
                7000 + (sequence % 50) as i64 * 10,
            )
            .expect("new line");
            let new = builder.push(line).expect("push").clone();
            if month % 4 == 0 {
                sequence += 1;
                let suspended = Period::month(year, month).unwrap();
                builder
                    .push(PaymentLine::suspend(&new, suspended, issued(sequence), sequence).unwrap())
                    .expect("push suspend");
            }
        }
    }
    builder.into_lines()
}

fn sample_response(months: u32) -> RawSimulationResponse {
    let periods: Vec<RawSimulationPeriod> = (1..=months)
        .map(|month| {
            let period = Period::month(2025, month).unwrap();
            RawSimulationPeriod {
                period,
                payment: Some(RawPayment {
                    recipient_id: RECIPIENT.into(),
                    due_date: NaiveDate::from_ymd_opt(2025, month, 20).unwrap(),
                    postings: vec![RawPosting {
                        from: period.from(),
                        to: period.to(),
                        account: "2341000".into(),
                        amount: 9000,
                        reversal: false,
                        rate: 9000,
                        rate_type: "MND".into(),
                        rate_count: 1,
                        class_code: "SUUFORE".into(),
                        class_type: "YTEL".into(),
                    }],
                }),
            }
        })
        .collect();
    RawSimulationResponse {
        recipient_id: RECIPIENT.into(),
        computed_at: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        net_amount: 9000 * months as i64,
        requested_period: Period::new(periods[0].period.from(), periods[periods.len() - 1].period.to())
            .unwrap(),
        periods,
    }
}

fn bench_chain(c: &mut Criterion) {
    let history = build_history(black_box(10));

    c.bench_function("project_10y", |b| {
        b.iter(|| {
            let timeline = project(&history).expect("project");
            black_box(timeline);
        })
    });

    let last = history.last().map(PaymentLine::sequence);
    let tail_period = Period::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap();
    c.bench_function("reconcile_10y", |b| {
        b.iter_batched(
            || {
                let mut sequence = MonotonicSequence::after(last);
                let tail = vec![PaymentLine::new(
                    Uuid::new_v4(),
                    Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap(),
                    sequence.next(),
                    tail_period,
                    None,
                    8000,
                )
                .expect("tail")];
                (tail, sequence)
            },
            |(tail, mut sequence)| {
                let clock = FixedClock(Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap());
                let chain = reconcile(&history, tail, &clock, &mut sequence).expect("reconcile");
                black_box(chain);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_ledger_io(c: &mut Criterion) {
    let ledger = Ledger::new(RECIPIENT, build_history(black_box(10)), issued(0)).expect("ledger");
    let dir = tempdir().expect("tempdir");
    let file_path = dir.path().join("ledger.json");

    c.bench_function("ledger_save_10y", |b| {
        b.iter(|| {
            save_ledger_to_path(&ledger, &file_path).expect("save ledger");
        })
    });

    save_ledger_to_path(&ledger, &file_path).expect("seed");

    c.bench_function("ledger_load_10y", |b| {
        b.iter(|| {
            let loaded = load_ledger_from_path(&file_path).expect("load ledger");
            black_box(loaded);
        })
    });
}

fn bench_interpretation(c: &mut Criterion) {
    let response = sample_response(black_box(12));

    c.bench_function("interpret_12_months", |b| {
        b.iter(|| {
            let interpreted = interpret(&response).expect("interpret");
            black_box(interpreted.to_result().expect("typed result"));
        })
    });
}

criterion_group!(benches, bench_chain, bench_ledger_io, bench_interpretation);
criterion_main!(benches);
