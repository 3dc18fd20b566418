use crate::{AccessError, AccessorConfig, Record};

/// A data-access strategy that can be driven by the benchmark suite.
///
/// Every operation other than [`Accessor::identify`] fails with [`AccessError::Connection`] until
/// [`Accessor::initialize`] succeeded. Implementations must tolerate concurrent calls from the
/// harness' worker threads.
pub trait Accessor: Send + Sync {
  fn identify(&self) -> &'static str;

  /// Opens the underlying connection or pool. A second call fails and leaves the existing one in
  /// place.
  fn initialize(&mut self, config: &AccessorConfig) -> Result<(), AccessError>;

  /// Releases every held connection. The accessor is uninitialized afterwards, even on error.
  fn shutdown(&mut self) -> Result<(), AccessError>;

  fn insert_one(&self, record: &Record) -> Result<i64, AccessError>;

  /// Inserts all records in one logical operation and returns the number of rows written.
  fn insert_batch(&self, records: &[Record]) -> Result<usize, AccessError>;

  /// Overwrites every non-id column of row `id`. A missing row is a no-op.
  fn update_one(&self, record: &Record, id: i64) -> Result<(), AccessError>;

  fn read_one(&self, id: i64) -> Result<Record, AccessError>;

  /// Up to `limit` rows with a positive id, in backend order.
  fn read_many(&self, limit: usize) -> Result<Vec<Record>, AccessError>;

  fn count_rows(&self) -> Result<u64, AccessError>;
}
