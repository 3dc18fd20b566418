//! Behavior every [`Accessor`] must show, shared by the strategy crates' integration tests.
//!
//! Each check panics on violation. Run them against a freshly initialized accessor from [`setup`].

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use crate::driver::{DriverError, Session};
use crate::suite::{self, Window};
use crate::{
  AccessError, Accessor, AccessorConfig, CollectingSink, ErrorSink, Operation, QueryMode, Record,
  RunConfig, SyncConnection,
};

pub const QUERY_MODES: [QueryMode; 2] = [QueryMode::Prepared, QueryMode::Simple];

/// Database file with the benchmark schema in a temporary directory.
pub struct Fixture {
  _dir: TempDir,
  pub path: PathBuf,
}

impl Fixture {
  pub fn new(name: &str) -> Self {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(format!("{name}.sqlite"));
    rusqlite::Connection::open(&path)
      .unwrap()
      .create_schema()
      .unwrap();

    return Self { _dir: dir, path };
  }

  pub fn source(&self) -> String {
    return self.path.to_string_lossy().into_owned();
  }

  /// Side connection for inspecting or tampering with the database.
  pub fn conn(&self) -> rusqlite::Connection {
    return rusqlite::Connection::open(&self.path).unwrap();
  }
}

pub struct Setup<A> {
  pub fixture: Fixture,
  pub accessor: A,
}

pub fn setup<A: Accessor>(mut accessor: A, config: impl FnOnce(String) -> AccessorConfig) -> Setup<A> {
  let fixture = Fixture::new(accessor.identify());
  accessor.initialize(&config(fixture.source())).unwrap();
  return Setup { fixture, accessor };
}

fn rng() -> StdRng {
  return StdRng::seed_from_u64(0x5eed);
}

pub fn round_trip<A: Accessor>(accessor: &A) {
  let mut rng = rng();
  for _ in 0..10 {
    let record = Record::random(&mut rng);
    let id = accessor.insert_one(&record).unwrap();
    assert!(id > 0);

    let read = accessor.read_one(id).unwrap();
    assert_eq!(read, record.with_id(id));
  }
}

/// Extreme values survive storage unchanged.
pub fn round_trip_bounds<A: Accessor>(accessor: &A) {
  for (age, right, counter) in [(i8::MIN, false, i64::MIN), (i8::MAX, true, i64::MAX)] {
    let record = Record {
      name: "Ünïcødé 名前".to_string(),
      title: "x".repeat(4096),
      fax: "+1 (555) 0100".to_string(),
      web: "https://example.com/?q='quoted'".to_string(),
      age,
      right,
      counter,
      ..Record::default()
    };
    let id = accessor.insert_one(&record).unwrap();
    assert_eq!(accessor.read_one(id).unwrap(), record.with_id(id));
  }
}

pub fn insert_assigns_distinct_ids<A: Accessor>(accessor: &A) {
  let record = Record::random(&mut rng());
  let a = accessor.insert_one(&record).unwrap();
  let b = accessor.insert_one(&record).unwrap();
  assert_ne!(a, b);
}

pub fn batch_row_count<A: Accessor>(accessor: &A) {
  let mut rng = rng();
  for n in [1, 7, 100] {
    let records: Vec<Record> = (0..n).map(|_| Record::random(&mut rng)).collect();
    let before = accessor.count_rows().unwrap();

    assert_eq!(accessor.insert_batch(&records).unwrap(), n);
    assert_eq!(accessor.count_rows().unwrap(), before + n as u64);
  }

  let before = accessor.count_rows().unwrap();
  assert_eq!(accessor.insert_batch(&[]).unwrap(), 0);
  assert_eq!(accessor.count_rows().unwrap(), before);
}

/// A batch lands with the same content as N single inserts would.
pub fn batch_content<A: Accessor>(accessor: &A) {
  let mut rng = rng();
  let records: Vec<Record> = (0..25).map(|_| Record::random(&mut rng)).collect();
  accessor.insert_batch(&records).unwrap();

  let rows = accessor.read_many(100).unwrap();
  assert_eq!(rows.len(), records.len());
  for record in &records {
    assert!(rows.iter().any(|row| row.same_content(record)));
  }
}

pub fn update_then_read<A: Accessor>(accessor: &A) {
  let mut rng = rng();
  let original = Record::random(&mut rng);
  let id = accessor.insert_one(&original).unwrap();

  let updated = original.clone().with_id(id).mutated(&mut rng);
  accessor.update_one(&updated, id).unwrap();

  let read = accessor.read_one(id).unwrap();
  assert_eq!(read, updated);
  assert!(!read.same_content(&original));
}

pub fn update_missing_row_is_noop<A: Accessor>(accessor: &A) {
  let record = Record::random(&mut rng());
  accessor.update_one(&record, 4242).unwrap();
  assert_eq!(accessor.count_rows().unwrap(), 0);
}

pub fn read_missing_row_fails<A: Accessor>(accessor: &A) {
  let err = accessor.read_one(4242).unwrap_err();
  assert!(matches!(err, AccessError::Read(_)), "{err:?}");
}

pub fn read_many_respects_limit<A: Accessor>(accessor: &A) {
  assert!(accessor.read_many(100).unwrap().is_empty());

  let mut rng = rng();
  for _ in 0..100 {
    accessor.insert_one(&Record::random(&mut rng)).unwrap();
  }

  let rows = accessor.read_many(100).unwrap();
  assert_eq!(rows.len(), 100);
  assert!(rows.iter().all(|r| r.id > 0 && !r.name.is_empty() && !r.title.is_empty()));

  assert_eq!(accessor.read_many(10).unwrap().len(), 10);
  assert!(accessor.read_many(0).unwrap().is_empty());

  accessor.insert_one(&Record::random(&mut rng)).unwrap();
  assert_eq!(accessor.read_many(100).unwrap().len(), 100);
  assert_eq!(accessor.read_many(1000).unwrap().len(), 101);
}

/// Every operation fails with a connection error before initialize and after shutdown.
pub fn requires_initialization<A: Accessor>(accessor: &A) {
  let record = Record::random(&mut rng());
  let results = [
    accessor.insert_one(&record).map(|_| ()),
    accessor.insert_batch(std::slice::from_ref(&record)).map(|_| ()),
    accessor.update_one(&record, 1),
    accessor.read_one(1).map(|_| ()),
    accessor.read_many(1).map(|_| ()),
    accessor.count_rows().map(|_| ()),
  ];
  for result in results {
    assert!(matches!(result, Err(AccessError::Connection(_))), "{result:?}");
  }
}

pub fn second_initialize_fails<A: Accessor>(setup: &mut Setup<A>, config: &AccessorConfig) {
  let id = setup.accessor.insert_one(&Record::random(&mut rng())).unwrap();

  let err = setup.accessor.initialize(config).unwrap_err();
  assert!(matches!(err, AccessError::Connection(_)), "{err:?}");

  // The existing connection keeps working.
  assert!(setup.accessor.read_one(id).is_ok());
}

pub fn shutdown_releases<A: Accessor>(mut setup: Setup<A>) {
  setup.accessor.shutdown().unwrap();
  requires_initialization(&setup.accessor);
}

pub fn invalid_config_is_rejected<A: Accessor>(
  new: impl Fn() -> A,
  base: impl Fn(String) -> AccessorConfig,
) {
  let fixture = Fixture::new("invalid");

  for source in ["", "postgres://bench@localhost/bench"] {
    let err = new().initialize(&base(source.to_string())).unwrap_err();
    assert!(matches!(err, AccessError::Connection(_)), "{err:?}");
  }

  let config = AccessorConfig {
    min_conns: 10,
    max_conns: 2,
    ..base(fixture.source())
  };
  let err = new().initialize(&config).unwrap_err();
  assert!(matches!(err, AccessError::Connection(_)), "{err:?}");

  let missing = fixture.path.join("no/such/dir/bench.sqlite");
  let err = new()
    .initialize(&base(missing.to_string_lossy().into_owned()))
    .unwrap_err();
  assert!(matches!(err, AccessError::Connection(_)), "{err:?}");
}

/// One insert rejected by the database mid-loop is recorded against the right strategy and label,
/// and every other iteration still runs.
pub fn injected_write_failure<A: Accessor>(setup: &Setup<A>) {
  setup
    .fixture
    .conn()
    .execute_batch(
      r#"
      CREATE TRIGGER reject_marked BEFORE INSERT ON models
      WHEN NEW.name = 'reject'
      BEGIN
        SELECT RAISE(ABORT, 'injected failure');
      END;
      "#,
    )
    .unwrap();

  let mut rng = rng();
  let records: Vec<Record> = (0..10)
    .map(|i| {
      let r = Record::random(&mut rng);
      match i {
        3 => Record {
          name: "reject".to_string(),
          ..r
        },
        _ => r,
      }
    })
    .collect();

  let accessor = &setup.accessor;
  let sink = CollectingSink::new();
  let window = Window::new(
    accessor.identify(),
    Operation::Insert,
    records.len() as u64,
    1,
    &sink,
  );
  let sample = window.run(|i| accessor.insert_one(&records[i as usize]).map(|_| ()));

  assert_eq!(sample.iterations, 10);
  assert_eq!(sample.failures, 1);
  assert_eq!(sink.count(accessor.identify(), Operation::Insert), 1);
  assert!(sink.failures()[0].detail.contains("injected failure"));
  assert_eq!(accessor.count_rows().unwrap(), 9);
}

fn small_run(parallelism: usize) -> RunConfig {
  return RunConfig {
    parallelism,
    batch_size: 10,
    read_limit: 20,
    ..RunConfig::default()
  };
}

/// Every phase with a small iteration count: no failures, expected table growth.
pub fn full_suite<A: Accessor>(accessor: &A, parallelism: usize) {
  let sink = CollectingSink::new();
  let run = small_run(parallelism);

  for operation in Operation::ALL {
    let sample = suite::measure(accessor, operation, 8, &run, &sink);
    assert_eq!(sample.iterations, 8, "{operation}");
    assert_eq!(sample.failures, 0, "{operation}");
  }
  assert!(sink.is_empty(), "{:?}", sink.failures());

  // Insert + InsertMulti + Update seed + Read seed + ReadSlice seed.
  assert_eq!(accessor.count_rows().unwrap(), 8 + 8 * 10 + 1 + 1 + 20);
}

/// A session on a shared in-memory database keeps the schema alive from setup through teardown.
pub fn shared_memory_session<A: Accessor>(
  accessor: A,
  config: impl FnOnce(String) -> AccessorConfig,
) {
  let uri = format!(
    "file:{}_session?mode=memory&cache=shared",
    accessor.identify()
  );
  let session = Session::new(accessor, &config(uri), small_run(1)).unwrap();

  for operation in Operation::ALL {
    let sample = suite::measure(
      session.accessor(),
      operation,
      3,
      session.run_config(),
      session.sink(),
    );
    assert_eq!(sample.failures, 0, "{operation}: {:?}", session.sink().failures());
  }

  assert_eq!(session.finish().unwrap(), 3 + 3 * 10 + 1 + 1 + 20);
}

/// Recorded failures turn a finished run into an error.
pub fn failures_fail_the_session<A: Accessor>(
  accessor: A,
  config: impl FnOnce(String) -> AccessorConfig,
) {
  let fixture = Fixture::new("failing");
  let session = Session::new(accessor, &config(fixture.source()), RunConfig::default()).unwrap();

  let name = session.accessor().identify();
  session.sink().record(name, Operation::Read, "no rows");

  let err = session.finish().unwrap_err();
  assert!(matches!(err, DriverError::Failures(1)), "{err:?}");
}
