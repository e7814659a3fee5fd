use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use forgelend_core::{AccountId, PoolId};
use forgelend_events::{EventEnvelope, InMemoryEventBus};
use forgelend_infra::{InMemoryAsset, PoolConfig, PoolService};
use forgelend_pool::{Amount, LendingPool, Mint, PoolCommand, PoolEvent, SCALE};
use std::sync::Arc;

type Service = PoolService<Arc<InMemoryAsset>, Arc<InMemoryEventBus<EventEnvelope<PoolEvent>>>>;

const FUNDING: Amount = 1_000_000_000 * SCALE;

/// Keeps the in-memory journal bounded during long measurement runs.
const COMPACT_EVERY: u64 = 1024;

fn setup() -> (Service, Arc<InMemoryAsset>) {
    let asset = Arc::new(InMemoryAsset::new("Underlying Token", "UTK", 18));
    let bus = Arc::new(InMemoryEventBus::new());
    let service = PoolService::new(PoolConfig::default(), PoolId::new(), asset.clone(), bus);
    (service, asset)
}

fn funded(service: &Service, asset: &InMemoryAsset) -> AccountId {
    let account = AccountId::new();
    asset.mint_to(account, FUNDING).unwrap();
    asset
        .approve(account, service.custody_account(), FUNDING)
        .unwrap();
    account
}

fn bench_operation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_latency");

    group.bench_function("mint_then_redeem", |b| {
        let (service, asset) = setup();
        let account = funded(&service, &asset);
        let mut ops = 0u64;
        b.iter(|| {
            let minted = service.mint(account, black_box(SCALE)).unwrap();
            service.redeem(account, minted).unwrap();
            ops += 1;
            if ops % COMPACT_EVERY == 0 {
                service.compact().unwrap();
            }
        });
    });

    group.bench_function("borrow_then_repay", |b| {
        let (service, asset) = setup();
        let lender = funded(&service, &asset);
        service.mint(lender, 1_000 * SCALE).unwrap();
        let borrower = funded(&service, &asset);
        let mut ops = 0u64;
        b.iter(|| {
            service.borrow(borrower, black_box(SCALE)).unwrap();
            service.repay_borrow(borrower, SCALE).unwrap();
            ops += 1;
            if ops % COMPACT_EVERY == 0 {
                service.compact().unwrap();
            }
        });
    });

    // Validation alone, without settlement or journaling.
    group.bench_function("decide_mint", |b| {
        let pool = LendingPool::empty(PoolId::new());
        let command = PoolCommand::Mint(Mint {
            account: AccountId::new(),
            amount: SCALE,
            occurred_at: Utc::now(),
        });
        b.iter(|| black_box(pool.decide(black_box(&command)).unwrap()));
    });

    group.finish();
}

fn bench_journal_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal_replay");

    for history_len in [10, 100, 1000].iter() {
        let (service, asset) = setup();
        let accounts: Vec<AccountId> = (0..8).map(|_| funded(&service, &asset)).collect();
        for i in 0..*history_len {
            service.mint(accounts[i % accounts.len()], SCALE).unwrap();
        }
        let history = service.history().unwrap();
        let pool_id = service.pool_id();

        group.throughput(Throughput::Elements(*history_len as u64));
        group.bench_with_input(
            BenchmarkId::new("replay", history_len),
            &history,
            |b, history| {
                b.iter(|| {
                    black_box(LendingPool::replay(
                        pool_id,
                        history.iter().map(|e| e.payload()),
                    ))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_operation_latency, bench_journal_replay);
criterion_main!(benches);
