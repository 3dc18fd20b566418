use harness::*;
use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{ToSql, TransactionBehavior};

pub const NAME: &str = "r2d2";

/// Statements kept per connection in prepared mode.
const STATEMENT_CACHE_CAPACITY: usize = 32;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Strategy backed by an `r2d2` connection pool. Batches go through one transaction reusing a
/// single prepared insert, SQLite's bulk-load path.
#[derive(Default)]
pub struct PoolAccessor {
  pool: Option<Pool>,
  mode: QueryMode,
}

impl PoolAccessor {
  pub fn new() -> Self {
    return Self::default();
  }

  pub fn pool(&self) -> Option<&Pool> {
    return self.pool.as_ref();
  }

  fn conn(&self, kind: fn(BoxError) -> AccessError) -> Result<PooledConnection, AccessError> {
    let pool = self.pool.as_ref().ok_or_else(|| AccessError::not_initialized(NAME))?;
    return pool.get().map_err(|err| kind(err.into()));
  }
}

fn new_pool(locator: &Locator, config: &AccessorConfig) -> Result<Pool, AccessError> {
  let cache_capacity = match config.query_mode {
    QueryMode::Prepared => STATEMENT_CACHE_CAPACITY,
    QueryMode::Simple => 0,
  };

  let manager = SqliteConnectionManager::file(locator.target()).with_init(move |c| {
    c.execute_batch(PRAGMAS)?;
    c.set_prepared_statement_cache_capacity(cache_capacity);
    Ok(())
  });

  // Fail fast on unreachable sources instead of waiting out the pool's connection timeout.
  manager.connect().map_err(AccessError::connection)?;

  return r2d2::Pool::builder()
    .max_size(config.max_conns)
    .min_idle(Some(config.min_conns))
    .max_lifetime(Some(config.max_conn_lifetime))
    .idle_timeout(Some(config.max_conn_idle_time))
    .build(manager)
    .map_err(AccessError::connection);
}

impl Accessor for PoolAccessor {
  fn identify(&self) -> &'static str {
    return NAME;
  }

  fn initialize(&mut self, config: &AccessorConfig) -> Result<(), AccessError> {
    if self.pool.is_some() {
      return Err(AccessError::connection(format!("{NAME} is already initialized")));
    }

    let locator = config.validate().map_err(AccessError::connection)?;
    if config.tls_verify {
      log::warn!("[{NAME}] TLS verification does not apply to local database files, ignoring");
    }

    let pool = new_pool(&locator, config)?;
    log::info!(
      "[{NAME}] Pool ready: {locator:?}, {state:?}, {mode:?}",
      state = pool.state(),
      mode = config.query_mode,
    );

    self.pool = Some(pool);
    self.mode = config.query_mode;
    return Ok(());
  }

  fn shutdown(&mut self) -> Result<(), AccessError> {
    let Some(pool) = self.pool.take() else {
      return Ok(());
    };

    let state = pool.state();
    let in_use = state.connections - state.idle_connections;
    drop(pool);

    if in_use > 0 {
      return Err(AccessError::release(format!(
        "{in_use} pooled connection(s) still checked out"
      )));
    }
    return Ok(());
  }

  fn insert_one(&self, record: &Record) -> Result<i64, AccessError> {
    let conn = self.conn(AccessError::Write)?;
    conn
      .run_statement(self.mode, INSERT_QUERY, |stmt| stmt.execute(record.params()))
      .map_err(AccessError::write)?;
    return Ok(conn.last_insert_rowid());
  }

  fn insert_batch(&self, records: &[Record]) -> Result<usize, AccessError> {
    if records.is_empty() {
      return Ok(0);
    }

    let mut conn = self.conn(AccessError::Write)?;
    let tx = conn
      .transaction_with_behavior(TransactionBehavior::Immediate)
      .map_err(AccessError::write)?;

    let written = tx
      .run_statement(self.mode, INSERT_QUERY, |stmt| {
        let mut written = 0;
        for record in records {
          written += stmt.execute(record.params())?;
        }
        Ok(written)
      })
      .map_err(AccessError::write)?;

    tx.commit().map_err(AccessError::write)?;
    return Ok(written);
  }

  fn update_one(&self, record: &Record, id: i64) -> Result<(), AccessError> {
    let conn = self.conn(AccessError::Write)?;
    let [name, title, fax, web, age, right, counter] = record.params();
    let params: [&dyn ToSql; 8] = [name, title, fax, web, age, right, counter, &id];

    conn
      .run_statement(self.mode, UPDATE_QUERY, |stmt| stmt.execute(params))
      .map_err(AccessError::write)?;
    return Ok(());
  }

  fn read_one(&self, id: i64) -> Result<Record, AccessError> {
    let conn = self.conn(AccessError::Read)?;
    return conn
      .run_statement(self.mode, SELECT_QUERY, |stmt| {
        stmt.query_row([id], Record::from_row)
      })
      .map_err(AccessError::read);
  }

  fn read_many(&self, limit: usize) -> Result<Vec<Record>, AccessError> {
    let conn = self.conn(AccessError::Read)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    return conn
      .run_statement(self.mode, SELECT_MULTI_QUERY, |stmt| {
        stmt.query_map([limit], Record::from_row)?.collect()
      })
      .map_err(AccessError::read);
  }

  fn count_rows(&self) -> Result<u64, AccessError> {
    let conn = self.conn(AccessError::Read)?;
    return conn.count_rows().map_err(AccessError::read);
  }
}
