use common::RequestContext;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{AggregateSource, Event, EventStore, InMemoryEventStore, create_event};

struct BenchAggregate {
    sequence_no: i64,
    changes: Vec<Event>,
}

impl BenchAggregate {
    fn with_events(root_id: &str, count: i64) -> Self {
        let mut agg = Self {
            sequence_no: 0,
            changes: Vec::new(),
        };
        for i in 0..count {
            let mut event = create_event(
                root_id,
                "Blog",
                serde_json::json!({"title": format!("post {i}")}),
            );
            agg.sequence_no += 1;
            event.meta.sequence_no = agg.sequence_no;
            event.meta.root_id = root_id.to_string();
            agg.changes.push(event);
        }
        agg
    }
}

impl AggregateSource for BenchAggregate {
    fn uncommitted_events(&self) -> &[Event] {
        &self.changes
    }

    fn clear_uncommitted(&mut self) {
        self.changes.clear();
    }
}

fn bench_persist_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/persist_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let ctx = RequestContext::new().with_user("bench");
                let mut agg = BenchAggregate::with_events("blog-1", 1);
                store.persist(&ctx, &mut agg).await.unwrap();
            });
        });
    });
}

fn bench_persist_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/persist_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let ctx = RequestContext::new().with_user("bench");
                let mut agg = BenchAggregate::with_events("blog-1", 10);
                store.persist(&ctx, &mut agg).await.unwrap();
            });
        });
    });
}

fn bench_read_aggregate_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let store = InMemoryEventStore::new();
    rt.block_on(async {
        let ctx = RequestContext::new().with_user("bench");
        let mut agg = BenchAggregate::with_events("blog-1", 100);
        store.persist(&ctx, &mut agg).await.unwrap();
    });

    c.bench_function("event_store/get_by_aggregate_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_by_aggregate("blog-1").await.unwrap();
                assert_eq!(events.len(), 100);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_persist_single_event,
    bench_persist_batch_10,
    bench_read_aggregate_100
);
criterion_main!(benches);
