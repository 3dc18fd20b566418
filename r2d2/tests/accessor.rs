use harness::conformance::{self, Fixture, Setup, QUERY_MODES};
use harness::*;
use r2d2_bench::PoolAccessor;

fn config(source: String, mode: QueryMode) -> AccessorConfig {
  return AccessorConfig {
    max_conns: 8,
    min_conns: 2,
    query_mode: mode,
    ..AccessorConfig::pooled(source)
  };
}

fn setup(mode: QueryMode) -> Setup<PoolAccessor> {
  return conformance::setup(PoolAccessor::new(), |source| config(source, mode));
}

#[test]
fn round_trip() {
  for mode in QUERY_MODES {
    conformance::round_trip(&setup(mode).accessor);
    conformance::round_trip_bounds(&setup(mode).accessor);
    conformance::insert_assigns_distinct_ids(&setup(mode).accessor);
  }
}

#[test]
fn insert_batch() {
  for mode in QUERY_MODES {
    conformance::batch_row_count(&setup(mode).accessor);
    conformance::batch_content(&setup(mode).accessor);
  }
}

#[test]
fn update() {
  for mode in QUERY_MODES {
    conformance::update_then_read(&setup(mode).accessor);
    conformance::update_missing_row_is_noop(&setup(mode).accessor);
  }
}

#[test]
fn read() {
  for mode in QUERY_MODES {
    conformance::read_missing_row_fails(&setup(mode).accessor);
    conformance::read_many_respects_limit(&setup(mode).accessor);
  }
}

#[test]
fn lifecycle() {
  conformance::requires_initialization(&PoolAccessor::new());

  let mut s = setup(QueryMode::Prepared);
  let again = config(s.fixture.source(), QueryMode::Prepared);
  conformance::second_initialize_fails(&mut s, &again);
  conformance::shutdown_releases(s);

  conformance::invalid_config_is_rejected(PoolAccessor::new, |source| {
    config(source, QueryMode::Prepared)
  });
}

#[test]
fn injected_write_failure() {
  conformance::injected_write_failure(&setup(QueryMode::Prepared));
}

#[test]
fn full_suite() {
  conformance::full_suite(&setup(QueryMode::Prepared).accessor, 1);
  conformance::full_suite(&setup(QueryMode::Simple).accessor, 4);
}

#[test]
fn pool_is_sized_from_config() {
  let s = setup(QueryMode::Prepared);
  let pool = s.accessor.pool().unwrap();
  assert_eq!(pool.max_size(), 8);
  assert!(pool.state().connections >= 2);
}

#[test]
fn shutdown_with_checked_out_connection_fails() {
  let mut s = setup(QueryMode::Prepared);
  let held = s.accessor.pool().unwrap().get().unwrap();

  let err = s.accessor.shutdown().unwrap_err();
  assert!(matches!(err, AccessError::Release(_)), "{err:?}");
  drop(held);

  // Released either way.
  assert!(s.accessor.pool().is_none());
  conformance::requires_initialization(&s.accessor);
}

#[test]
fn file_uri_locator() {
  let fixture = Fixture::new("uri");
  let uri = format!("file:{}?mode=rw", fixture.source());

  let mut accessor = PoolAccessor::new();
  accessor.initialize(&config(uri, QueryMode::Prepared)).unwrap();
  conformance::round_trip(&accessor);
  accessor.shutdown().unwrap();
}

#[test]
fn shared_memory_session() {
  // One connection so nothing opens concurrently on the shared cache.
  conformance::shared_memory_session(PoolAccessor::new(), |source| AccessorConfig {
    max_conns: 1,
    min_conns: 1,
    ..AccessorConfig::pooled(source)
  });
}

#[test]
fn failures_fail_the_session() {
  conformance::failures_fail_the_session(PoolAccessor::new(), |source| {
    config(source, QueryMode::Prepared)
  });
}
