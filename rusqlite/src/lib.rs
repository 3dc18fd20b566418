use harness::*;
use parking_lot::Mutex;
use rusqlite::{Connection, ToSql, TransactionBehavior};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub const NAME: &str = "raw";

const STATEMENT_CACHE_CAPACITY: usize = 32;

/// SQLite's default SQLITE_MAX_VARIABLE_NUMBER since 3.32.
const MAX_VARIABLES: usize = 32766;

/// Rows per multi-row INSERT before a batch is split.
pub const MAX_ROWS_PER_STATEMENT: usize = MAX_VARIABLES / INSERT_FIELDS;

/// Builds `INSERT ... VALUES (?1, .., ?7), (?8, .., ?14), ...` for `rows` rows.
pub fn insert_multi_query(rows: usize) -> String {
  let mut sql = String::with_capacity(INSERT_BASE_QUERY.len() + rows * 8 * INSERT_FIELDS);
  sql.push_str(INSERT_BASE_QUERY);

  let mut n = 1;
  for row in 0..rows {
    if row > 0 {
      sql.push_str(", ");
    }
    sql.push('(');
    for field in 0..INSERT_FIELDS {
      if field > 0 {
        sql.push_str(", ");
      }
      sql.push('?');
      sql.push_str(&n.to_string());
      n += 1;
    }
    sql.push(')');
  }

  return sql;
}

struct Slot {
  conn: Connection,
  opened: Instant,
  last_used: Instant,
}

struct State {
  slot: Option<Slot>,
  /// Multi-row insert text by row count.
  batch_sql: HashMap<usize, String>,
}

struct Inner {
  locator: Locator,
  config: AccessorConfig,
  state: Mutex<State>,
}

/// Strategy driving a single bare `rusqlite` connection, serialized by a mutex. The connection is
/// replaced once it outlives the configured lifetime or idle limit. Batches are written as one
/// hand-assembled multi-row INSERT.
#[derive(Default)]
pub struct RawAccessor {
  inner: Option<Inner>,
  opened: AtomicU64,
}

impl RawAccessor {
  pub fn new() -> Self {
    return Self::default();
  }

  pub fn connections_opened(&self) -> u64 {
    return self.opened.load(Ordering::Relaxed);
  }

  fn open(&self, locator: &Locator) -> rusqlite::Result<Slot> {
    let conn = locator.open()?;
    conn.execute_batch(PRAGMAS)?;
    conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    self.opened.fetch_add(1, Ordering::Relaxed);

    let now = Instant::now();
    return Ok(Slot {
      conn,
      opened: now,
      last_used: now,
    });
  }

  /// Runs `f` on the live connection, recycling it first if it expired.
  fn with_conn<T, F>(&self, kind: fn(BoxError) -> AccessError, f: F) -> Result<T, AccessError>
  where
    F: FnOnce(&mut Connection, QueryMode, &mut HashMap<usize, String>) -> rusqlite::Result<T>,
  {
    let inner = self.inner.as_ref().ok_or_else(|| AccessError::not_initialized(NAME))?;
    let mut guard = inner.state.lock();
    let state = &mut *guard;

    let expired = state.slot.as_ref().map_or(true, |slot| {
      slot.opened.elapsed() >= inner.config.max_conn_lifetime
        || slot.last_used.elapsed() >= inner.config.max_conn_idle_time
    });
    if expired {
      if let Some(old) = state.slot.take() {
        log::debug!("[{NAME}] Recycling connection");
        if let Err((_, err)) = old.conn.close() {
          log::warn!("[{NAME}] Closing expired connection: {err}");
        }
      }
      state.slot = Some(self.open(&inner.locator).map_err(|err| kind(err.into()))?);
    }

    let Some(slot) = state.slot.as_mut() else {
      return Err(AccessError::not_initialized(NAME));
    };
    let result = f(&mut slot.conn, inner.config.query_mode, &mut state.batch_sql);
    slot.last_used = Instant::now();

    return result.map_err(|err| kind(err.into()));
  }
}

impl Accessor for RawAccessor {
  fn identify(&self) -> &'static str {
    return NAME;
  }

  fn initialize(&mut self, config: &AccessorConfig) -> Result<(), AccessError> {
    if self.inner.is_some() {
      return Err(AccessError::connection(format!("{NAME} is already initialized")));
    }

    let locator = config.validate().map_err(AccessError::connection)?;
    if config.tls_verify {
      log::warn!("[{NAME}] TLS verification does not apply to local database files, ignoring");
    }

    let slot = self.open(&locator).map_err(AccessError::connection)?;
    log::info!(
      "[{NAME}] Connection ready: {locator:?}, {mode:?}",
      mode = config.query_mode
    );

    self.inner = Some(Inner {
      locator,
      config: config.clone(),
      state: Mutex::new(State {
        slot: Some(slot),
        batch_sql: HashMap::new(),
      }),
    });
    return Ok(());
  }

  fn shutdown(&mut self) -> Result<(), AccessError> {
    let Some(inner) = self.inner.take() else {
      return Ok(());
    };

    return match inner.state.into_inner().slot {
      Some(slot) => slot
        .conn
        .close()
        .map_err(|(_, err)| AccessError::release(err)),
      None => Ok(()),
    };
  }

  fn insert_one(&self, record: &Record) -> Result<i64, AccessError> {
    return self.with_conn(AccessError::Write, |conn, mode, _| {
      conn.run_statement(mode, INSERT_QUERY, |stmt| stmt.execute(record.params()))?;
      Ok(conn.last_insert_rowid())
    });
  }

  fn insert_batch(&self, records: &[Record]) -> Result<usize, AccessError> {
    if records.is_empty() {
      return Ok(0);
    }

    return self.with_conn(AccessError::Write, |conn, mode, batch_sql| {
      let mut insert = |conn: &Connection, chunk: &[Record]| {
        let sql = batch_sql
          .entry(chunk.len())
          .or_insert_with(|| insert_multi_query(chunk.len()));
        let params = chunk.iter().flat_map(|r| r.params());
        conn.run_statement(mode, sql, |stmt| {
          stmt.execute(rusqlite::params_from_iter(params))
        })
      };

      if records.len() <= MAX_ROWS_PER_STATEMENT {
        return insert(&*conn, records);
      }

      let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
      let mut written = 0;
      for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
        written += insert(&*tx, chunk)?;
      }
      tx.commit()?;
      Ok(written)
    });
  }

  fn update_one(&self, record: &Record, id: i64) -> Result<(), AccessError> {
    let [name, title, fax, web, age, right, counter] = record.params();
    let params: [&dyn ToSql; 8] = [name, title, fax, web, age, right, counter, &id];

    return self.with_conn(AccessError::Write, |conn, mode, _| {
      conn.run_statement(mode, UPDATE_QUERY, |stmt| stmt.execute(params))?;
      Ok(())
    });
  }

  fn read_one(&self, id: i64) -> Result<Record, AccessError> {
    return self.with_conn(AccessError::Read, |conn, mode, _| {
      conn.run_statement(mode, SELECT_QUERY, |stmt| {
        stmt.query_row([id], Record::from_row)
      })
    });
  }

  fn read_many(&self, limit: usize) -> Result<Vec<Record>, AccessError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    return self.with_conn(AccessError::Read, |conn, mode, _| {
      conn.run_statement(mode, SELECT_MULTI_QUERY, |stmt| {
        stmt.query_map([limit], Record::from_row)?.collect()
      })
    });
  }

  fn count_rows(&self) -> Result<u64, AccessError> {
    return self.with_conn(AccessError::Read, |conn, _, _| conn.count_rows());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn multi_row_query_numbers_every_placeholder() {
    assert_eq!(
      insert_multi_query(1),
      format!("{INSERT_BASE_QUERY}(?1, ?2, ?3, ?4, ?5, ?6, ?7)")
    );

    let sql = insert_multi_query(100);
    assert!(sql.starts_with(INSERT_BASE_QUERY));
    assert!(sql.ends_with("(?694, ?695, ?696, ?697, ?698, ?699, ?700)"));
    assert_eq!(sql.matches('(').count(), 101);
    assert_eq!(sql.matches('?').count(), 700);
  }

  #[test]
  fn split_point_stays_under_the_variable_limit() {
    assert!(MAX_ROWS_PER_STATEMENT * INSERT_FIELDS <= MAX_VARIABLES);
    assert_eq!(MAX_ROWS_PER_STATEMENT, 4680);
  }
}
