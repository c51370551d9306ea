//! Benchmarks for the recommenders
//!
//! Run with: cargo bench --package recommender
//!
//! Uses a synthetic dataset so no data files are needed.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use data_loader::{DataIndex, InteractionType, Item, LoadConfig, User};
use recommender::{ItemCf, SimilarityEngine, UserCf};
use std::sync::Arc;

const USERS: u32 = 2_000;
const ITEMS: u32 = 300;
const INTERACTIONS_PER_USER: u32 = 12;

fn build_synthetic_index() -> Arc<DataIndex> {
    let index = DataIndex::with_config(&LoadConfig::default().with_shard_count(64).with_log_shards(64));
    for id in 0..USERS {
        index.insert_user(User::with_id(id));
    }
    for id in 0..ITEMS {
        index.insert_item(Item::with_id(id));
    }
    for user in 0..USERS {
        for n in 0..INTERACTIONS_PER_USER {
            // Skewed towards low item IDs to get popular items
            let item = (user * 31 + n * n * 17) % ITEMS / (1 + n % 3);
            index
                .record_interaction(user, item, InteractionType::Click, i64::from(n))
                .expect("synthetic interaction");
        }
    }
    Arc::new(index)
}

fn bench_user_cf(c: &mut Criterion) {
    let data_index = build_synthetic_index();
    let user_cf = UserCf::new(data_index.clone());
    let user = data_index.get_user(1).expect("user 1");

    c.bench_function("user_cf_recommend", |b| {
        b.iter(|| black_box(user_cf.recommend(black_box(&user), black_box(20), black_box(30))))
    });
}

fn bench_item_cf(c: &mut Criterion) {
    let data_index = build_synthetic_index();
    let item_cf = ItemCf::new(data_index.clone());
    let user = data_index.get_user(1).expect("user 1");
    item_cf.engine().ensure_built(20).expect("similarity build");

    c.bench_function("item_cf_recommend", |b| {
        b.iter(|| black_box(item_cf.recommend(black_box(&user), black_box(20), black_box(30))))
    });
}

fn bench_similarity_build(c: &mut Criterion) {
    let data_index = build_synthetic_index();
    let engine = SimilarityEngine::new(data_index);

    let mut group = c.benchmark_group("similarity");
    group.sample_size(10);
    group.bench_function("build_all", |b| b.iter(|| black_box(engine.build_all(black_box(20)))));
    group.finish();
}

criterion_group!(benches, bench_user_cf, bench_item_cf, bench_similarity_build);
criterion_main!(benches);
