use parking_lot::Mutex;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
  Insert,
  InsertMulti,
  Update,
  Read,
  ReadSlice,
}

impl Operation {
  pub const ALL: [Operation; 5] = [
    Operation::Insert,
    Operation::InsertMulti,
    Operation::Update,
    Operation::Read,
    Operation::ReadSlice,
  ];

  pub fn label(self) -> &'static str {
    return match self {
      Self::Insert => "Insert",
      Self::InsertMulti => "InsertMulti",
      Self::Update => "Update",
      Self::Read => "Read",
      Self::ReadSlice => "ReadSlice",
    };
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    return f.write_str(self.label());
  }
}

/// Receives per-iteration failures. Must not panic: the run continues after every call.
pub trait ErrorSink: Send + Sync {
  fn record(&self, strategy: &str, operation: Operation, detail: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
  pub strategy: String,
  pub operation: Operation,
  pub detail: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
  fn record(&self, strategy: &str, operation: Operation, detail: &str) {
    log::error!("[{strategy}] {operation}: {detail}");
  }
}

/// Logs failures and keeps them for the end-of-run report.
#[derive(Debug, Default)]
pub struct CollectingSink {
  failures: Mutex<Vec<Failure>>,
}

impl CollectingSink {
  pub fn new() -> Self {
    return Self::default();
  }

  pub fn failures(&self) -> Vec<Failure> {
    return self.failures.lock().clone();
  }

  pub fn count(&self, strategy: &str, operation: Operation) -> usize {
    return self
      .failures
      .lock()
      .iter()
      .filter(|f| f.strategy == strategy && f.operation == operation)
      .count();
  }

  pub fn is_empty(&self) -> bool {
    return self.failures.lock().is_empty();
  }
}

impl ErrorSink for CollectingSink {
  fn record(&self, strategy: &str, operation: Operation, detail: &str) {
    LogSink.record(strategy, operation, detail);
    self.failures.lock().push(Failure {
      strategy: strategy.to_string(),
      operation,
      detail: detail.to_string(),
    });
  }
}
