use criterion::{criterion_group, criterion_main, Criterion};
use harness::driver::Session;
use harness::{AccessorConfig, CountingAllocator};
use rusqlite_bench::RawAccessor;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn bench_raw(c: &mut Criterion) {
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

  let session = Session::from_env(RawAccessor::new(), AccessorConfig::unpooled).unwrap();
  session.bench(c);
  session.finish().unwrap();
}

criterion_group!(benches, bench_raw);
criterion_main!(benches);
