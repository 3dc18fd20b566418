use criterion::Criterion;
use rusqlite::Connection;
use tempfile::TempDir;

use crate::{
  suite, AccessError, Accessor, AccessorConfig, CollectingSink, ConfigError, RunConfig,
  SyncConnection,
};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("Failed to create temp dir: {0}")]
  TempDir(#[from] std::io::Error),
  #[error("Failed to prepare schema: {0}")]
  Schema(#[from] rusqlite::Error),
  #[error(transparent)]
  Access(#[from] AccessError),
  #[error("{0} operations failed")]
  Failures(usize),
}

/// One strategy's benchmark run: schema prepared, accessor initialized, failures collected.
///
/// Without `BENCH_DB_SOURCE` the database lives in a temporary directory removed on drop.
pub struct Session<A: Accessor> {
  accessor: A,
  run: RunConfig,
  sink: CollectingSink,
  // A shared in-memory database is gone once its last connection closes, so this outlives the
  // accessor's connections.
  _schema: Connection,
  _tmp_dir: Option<TempDir>,
}

impl<A: Accessor> Session<A> {
  pub fn from_env(
    accessor: A,
    defaults: impl FnOnce(String) -> AccessorConfig,
  ) -> Result<Self, DriverError> {
    let tmp_dir = TempDir::new()?;
    let fname = tmp_dir.path().join(format!("{}.sqlite", accessor.identify()));

    let config = AccessorConfig::from_env(defaults(fname.to_string_lossy().into_owned()))?;
    let run = RunConfig::from_env()?;

    return Self::open(accessor, &config, run, Some(tmp_dir));
  }

  pub fn new(accessor: A, config: &AccessorConfig, run: RunConfig) -> Result<Self, DriverError> {
    return Self::open(accessor, config, run, None);
  }

  fn open(
    mut accessor: A,
    config: &AccessorConfig,
    run: RunConfig,
    tmp_dir: Option<TempDir>,
  ) -> Result<Self, DriverError> {
    let name = accessor.identify();
    log::info!("[{name}] {config:?} {run:?}");

    let locator = config.validate()?;
    log::info!("[{name}] DB: {locator:?}");

    // The table is a precondition of every strategy, not part of what is measured.
    let schema = locator.open()?;
    let version: String = schema.query_row("SELECT sqlite_version()", (), |row| row.get(0))?;
    log::info!("[{name}] Sqlite v{version}");
    schema.create_schema()?;

    accessor.initialize(config)?;

    return Ok(Self {
      accessor,
      run,
      sink: CollectingSink::new(),
      _schema: schema,
      _tmp_dir: tmp_dir,
    });
  }

  pub fn accessor(&self) -> &A {
    return &self.accessor;
  }

  pub fn run_config(&self) -> &RunConfig {
    return &self.run;
  }

  pub fn sink(&self) -> &CollectingSink {
    return &self.sink;
  }

  pub fn bench(&self, c: &mut Criterion) {
    suite::bench(c, &self.accessor, &self.run, &self.sink);
  }

  /// Shuts the accessor down and returns the final row count. Fails if counting or shutdown
  /// failed, or if any operation failed during the run.
  pub fn finish(mut self) -> Result<u64, DriverError> {
    let name = self.accessor.identify();

    let rows = self.accessor.count_rows();
    let shutdown = self.accessor.shutdown();
    if let Err(err) = &shutdown {
      log::error!("[{name}] {err}");
    }

    let rows = rows?;
    let failures = self.sink.failures().len();
    log::info!("[{name}] {rows} rows, {failures} failures");

    shutdown?;
    if failures > 0 {
      return Err(DriverError::Failures(failures));
    }
    return Ok(rows);
  }
}
