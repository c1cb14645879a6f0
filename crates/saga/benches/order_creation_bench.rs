use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, OrderRequest, RequestedItem};
use order_store::InMemoryOrderStore;
use saga::{InMemoryInventoryService, OrderCreationWorkflow, RequestContext, SagaJournal, SagaEvent};

const PRODUCTS: u32 = 10;

fn workflow(
    rt: &tokio::runtime::Runtime,
) -> (
    OrderCreationWorkflow<InMemoryInventoryService, InMemoryOrderStore>,
    Arc<InMemoryInventoryService>,
) {
    let inventory = Arc::new(InMemoryInventoryService::new());
    rt.block_on(async {
        for i in 0..PRODUCTS {
            inventory
                .add_product(format!("SKU-{i:03}"), Money::from_cents(1000 + i64::from(i)), u32::MAX)
                .await;
        }
    });
    let store = Arc::new(InMemoryOrderStore::new());
    (
        OrderCreationWorkflow::new(Arc::clone(&inventory), store),
        inventory,
    )
}

fn request(items: u32) -> OrderRequest {
    OrderRequest::new(
        "bench-user",
        (0..items)
            .map(|i| RequestedItem::new(format!("SKU-{i:03}"), 1))
            .collect(),
    )
}

fn bench_create_order_single_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (workflow, _) = workflow(&rt);
    let ctx = RequestContext::background();

    c.bench_function("order_creation/single_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                workflow.create_order(request(1), &ctx).await.unwrap();
            });
        });
    });
}

fn bench_create_order_ten_items(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (workflow, _) = workflow(&rt);
    let ctx = RequestContext::background();

    c.bench_function("order_creation/ten_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                workflow.create_order(request(PRODUCTS), &ctx).await.unwrap();
            });
        });
    });
}

fn bench_create_order_with_compensation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (workflow, inventory) = workflow(&rt);
    rt.block_on(inventory.set_reject_reservations(true));
    let ctx = RequestContext::background();

    c.bench_function("order_creation/rejected_with_compensation", |b| {
        b.iter(|| {
            rt.block_on(async {
                let outcome = workflow.execute(request(3), &ctx).await;
                assert!(!outcome.is_success());
            });
        });
    });
}

fn bench_journal_replay(c: &mut Criterion) {
    let mut journal = SagaJournal::new("OrderCreation");
    for step in ["check_availability", "persist_order", "reserve_inventory"] {
        journal.record(SagaEvent::StepStarted { step: step.into() });
        journal.record(SagaEvent::StepCompleted { step: step.into() });
    }
    journal.record(SagaEvent::StepFailed {
        step: "link_reservation".into(),
        error: "storage unavailable".into(),
    });
    let entries = journal.entries().to_vec();

    c.bench_function("journal/replay_failed_run", |b| {
        b.iter(|| SagaJournal::replay("OrderCreation", entries.clone()));
    });
}

criterion_group!(
    benches,
    bench_create_order_single_item,
    bench_create_order_ten_items,
    bench_create_order_with_compensation,
    bench_journal_replay,
);
criterion_main!(benches);
