use std::time::Duration;

use harness::conformance::{self, Setup, QUERY_MODES};
use harness::*;
use rusqlite_bench::{RawAccessor, MAX_ROWS_PER_STATEMENT};

fn config(source: String, mode: QueryMode) -> AccessorConfig {
  return AccessorConfig {
    query_mode: mode,
    ..AccessorConfig::unpooled(source)
  };
}

fn setup(mode: QueryMode) -> Setup<RawAccessor> {
  return conformance::setup(RawAccessor::new(), |source| config(source, mode));
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
fn insert_batch_beyond_the_variable_limit() {
  let s = setup(QueryMode::Prepared);
  let records = vec![sample(); MAX_ROWS_PER_STATEMENT + 20];

  assert_eq!(s.accessor.insert_batch(&records).unwrap(), records.len());
  assert_eq!(s.accessor.count_rows().unwrap(), records.len() as u64);
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
  conformance::requires_initialization(&RawAccessor::new());

  let mut s = setup(QueryMode::Prepared);
  let again = config(s.fixture.source(), QueryMode::Prepared);
  conformance::second_initialize_fails(&mut s, &again);
  conformance::shutdown_releases(s);

  conformance::invalid_config_is_rejected(RawAccessor::new, |source| {
    config(source, QueryMode::Prepared)
  });
}

#[test]
fn injected_write_failure() {
  conformance::injected_write_failure(&setup(QueryMode::Simple));
}

#[test]
fn full_suite() {
  conformance::full_suite(&setup(QueryMode::Prepared).accessor, 1);
  conformance::full_suite(&setup(QueryMode::Simple).accessor, 4);
}

#[test]
fn expired_connection_is_replaced() {
  let s = conformance::setup(RawAccessor::new(), |source| AccessorConfig {
    max_conn_lifetime: Duration::from_millis(500),
    ..config(source, QueryMode::Prepared)
  });
  assert_eq!(s.accessor.connections_opened(), 1);

  let id = s.accessor.insert_one(&sample()).unwrap();
  assert_eq!(s.accessor.connections_opened(), 1);

  std::thread::sleep(Duration::from_millis(700));
  s.accessor.read_one(id).unwrap();
  assert_eq!(s.accessor.connections_opened(), 2);
}

#[test]
fn idle_connection_is_replaced() {
  let s = conformance::setup(RawAccessor::new(), |source| AccessorConfig {
    max_conn_idle_time: Duration::from_millis(500),
    ..config(source, QueryMode::Prepared)
  });

  s.accessor.count_rows().unwrap();
  s.accessor.count_rows().unwrap();
  assert_eq!(s.accessor.connections_opened(), 1);

  std::thread::sleep(Duration::from_millis(700));
  s.accessor.count_rows().unwrap();
  assert_eq!(s.accessor.connections_opened(), 2);
}

fn sample() -> Record {
  return Record {
    name: "n".to_string(),
    title: "t".to_string(),
    fax: "f".to_string(),
    web: "w".to_string(),
    ..Record::default()
  };
}

#[test]
fn shared_memory_session() {
  conformance::shared_memory_session(RawAccessor::new(), AccessorConfig::unpooled);
}

#[test]
fn failures_fail_the_session() {
  conformance::failures_fail_the_session(RawAccessor::new(), AccessorConfig::unpooled);
}

#[test]
fn default_idle_limit_outlasts_pause_between_phases() {
  let s = setup(QueryMode::Prepared);
  s.accessor.count_rows().unwrap();

  // Longer than the pooled strategy's 3s idle limit.
  std::thread::sleep(Duration::from_millis(3200));
  s.accessor.count_rows().unwrap();
  assert_eq!(s.accessor.connections_opened(), 1);
}
