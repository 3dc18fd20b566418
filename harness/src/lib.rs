mod accessor;
mod alloc;
mod config;
pub mod driver;
mod error;
mod record;
mod sink;
pub mod suite;

#[cfg(feature = "conformance")]
pub mod conformance;

pub use accessor::Accessor;
pub use alloc::{AllocSnapshot, CountingAllocator};
pub use config::{AccessorConfig, ConfigError, Locator, QueryMode, RunConfig};
pub use error::{AccessError, BoxError};
pub use record::Record;
pub use sink::{CollectingSink, ErrorSink, Failure, LogSink, Operation};

pub fn num_tasks() -> usize {
  return std::thread::available_parallelism()
    .map(|n| n.get())
    .unwrap_or(1);
}

pub const PRAGMAS: &str = r#"
    PRAGMA busy_timeout       = 10000;
    PRAGMA journal_mode       = WAL;
    PRAGMA journal_size_limit = 200000000;
    PRAGMA synchronous        = NORMAL;
    PRAGMA foreign_keys       = ON;
    PRAGMA temp_store         = MEMORY;
    PRAGMA cache_size         = -16000;
"#;

pub const CREATE_TABLE_QUERY: &str = r#"
    CREATE TABLE IF NOT EXISTS models (
      id         INTEGER PRIMARY KEY AUTOINCREMENT,
      name       TEXT NOT NULL,
      title      TEXT NOT NULL,
      fax        TEXT NOT NULL,
      web        TEXT NOT NULL,
      age        INTEGER NOT NULL CHECK (age BETWEEN -128 AND 127),
      "right"    BOOLEAN NOT NULL,
      counter    INTEGER NOT NULL
    );
"#;

pub const INSERT_BASE_QUERY: &str =
  r#"INSERT INTO models (name, title, fax, web, age, "right", counter) VALUES "#;

pub const INSERT_QUERY: &str = r#"INSERT INTO models (name, title, fax, web, age, "right", counter) VALUES ($1, $2, $3, $4, $5, $6, $7)"#;

pub const UPDATE_QUERY: &str = r#"UPDATE models SET name = $1, title = $2, fax = $3, web = $4, age = $5, "right" = $6, counter = $7 WHERE id = $8"#;

pub const SELECT_QUERY: &str =
  r#"SELECT id, name, title, fax, web, age, "right", counter FROM models WHERE id = $1"#;

pub const SELECT_MULTI_QUERY: &str =
  r#"SELECT id, name, title, fax, web, age, "right", counter FROM models WHERE id > 0 LIMIT $1"#;

pub const COUNT_QUERY: &str = "SELECT COUNT(*) FROM models";

pub const INSERT_FIELDS: usize = 7;

/// Schema and statement helpers shared by every strategy operating on a raw `rusqlite` connection.
pub trait SyncConnection {
  fn create_schema(&self) -> rusqlite::Result<()>;

  fn count_rows(&self) -> rusqlite::Result<u64>;

  fn run_statement<T, F>(&self, mode: QueryMode, sql: &str, f: F) -> rusqlite::Result<T>
  where
    F: FnOnce(&mut rusqlite::Statement<'_>) -> rusqlite::Result<T>;
}

impl SyncConnection for rusqlite::Connection {
  fn create_schema(&self) -> rusqlite::Result<()> {
    return self.execute_batch(&format!("{PRAGMAS}\n{CREATE_TABLE_QUERY}"));
  }

  fn count_rows(&self) -> rusqlite::Result<u64> {
    return self.query_row(COUNT_QUERY, (), |row| row.get(0));
  }

  fn run_statement<T, F>(&self, mode: QueryMode, sql: &str, f: F) -> rusqlite::Result<T>
  where
    F: FnOnce(&mut rusqlite::Statement<'_>) -> rusqlite::Result<T>,
  {
    return match mode {
      QueryMode::Prepared => {
        let mut stmt = self.prepare_cached(sql)?;
        f(&mut *stmt)
      }
      QueryMode::Simple => f(&mut self.prepare(sql)?),
    };
  }
}
