//! The timed phases every strategy is measured with, registered as criterion benchmarks.
//!
//! Each phase builds its fixtures first and only then opens the measured window, so criterion sees
//! nothing but the accessor calls. Fixture failures are recorded under the phase's label and the
//! timed loop still runs.

use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use criterion::Criterion;
use rand::Rng;

use crate::{AccessError, Accessor, AllocSnapshot, ErrorSink, Operation, Record, RunConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sample {
  pub iterations: u64,
  pub elapsed: Duration,
  pub allocs: AllocSnapshot,
  pub failures: u64,
}

impl Add for Sample {
  type Output = Sample;

  fn add(self, rhs: Self) -> Self {
    return Self {
      iterations: self.iterations + rhs.iterations,
      elapsed: self.elapsed + rhs.elapsed,
      allocs: self.allocs + rhs.allocs,
      failures: self.failures + rhs.failures,
    };
  }
}

/// Runs a phase body for a fixed number of iterations, optionally split over scoped threads, and
/// records failures without stopping.
pub struct Window<'a> {
  strategy: &'static str,
  operation: Operation,
  iterations: u64,
  parallelism: usize,
  sink: &'a dyn ErrorSink,
}

impl<'a> Window<'a> {
  pub fn new(
    strategy: &'static str,
    operation: Operation,
    iterations: u64,
    parallelism: usize,
    sink: &'a dyn ErrorSink,
  ) -> Self {
    return Self {
      strategy,
      operation,
      iterations,
      parallelism: parallelism.max(1),
      sink,
    };
  }

  pub fn fail(&self, err: &AccessError) {
    self.sink.record(self.strategy, self.operation, &err.to_string());
  }

  /// Times `iterations` calls of `f`, which receives the iteration index.
  pub fn run<F>(&self, f: F) -> Sample
  where
    F: Fn(u64) -> Result<(), AccessError> + Sync,
  {
    let n = self.iterations;
    let workers = (self.parallelism as u64).min(n).max(1);
    let failures = AtomicU64::new(0);

    let body = |from: u64, to: u64| {
      for i in from..to {
        if let Err(err) = f(i) {
          failures.fetch_add(1, Ordering::Relaxed);
          self.fail(&err);
        }
      }
    };
    let body = &body;

    let allocs = AllocSnapshot::now();
    let start = Instant::now();

    if workers == 1 {
      body(0, n);
    } else {
      let base = n / workers;
      let rem = n % workers;
      std::thread::scope(|scope| {
        let mut from = 0;
        for w in 0..workers {
          let to = from + base + u64::from(w < rem);
          scope.spawn(move || body(from, to));
          from = to;
        }
      });
    }

    let elapsed = start.elapsed();
    return Sample {
      iterations: n,
      elapsed,
      allocs: AllocSnapshot::now().since(allocs),
      failures: failures.into_inner(),
    };
  }
}

/// Seeds the fixtures of `operation`, then times `iterations` accessor calls.
pub fn measure<A: Accessor + ?Sized>(
  accessor: &A,
  operation: Operation,
  iterations: u64,
  run: &RunConfig,
  sink: &dyn ErrorSink,
) -> Sample {
  let window = Window::new(
    accessor.identify(),
    operation,
    iterations,
    run.parallelism,
    sink,
  );
  let mut rng = rand::thread_rng();

  return match operation {
    Operation::Insert => {
      let record = Record::random(&mut rng);
      window.run(|_| accessor.insert_one(&record).map(|_| ()))
    }
    Operation::InsertMulti => {
      let records: Vec<Record> = (0..run.batch_size).map(|_| Record::random(&mut rng)).collect();
      window.run(|_| accessor.insert_batch(&records).map(|_| ()))
    }
    Operation::Update => {
      let (id, updated) = seed_one(&window, accessor, &mut rng);
      window.run(|_| accessor.update_one(&updated, id))
    }
    Operation::Read => {
      let (id, _) = seed_one(&window, accessor, &mut rng);
      window.run(|_| accessor.read_one(id).map(|_| ()))
    }
    Operation::ReadSlice => {
      for _ in 0..run.read_limit {
        if let Err(err) = accessor.insert_one(&Record::random(&mut rng)) {
          window.fail(&err);
        }
      }
      window.run(|_| accessor.read_many(run.read_limit).map(|_| ()))
    }
  };
}

/// Inserts one fresh record. Returns its id and a differently-valued record for updates.
fn seed_one<A: Accessor + ?Sized, R: Rng>(
  window: &Window<'_>,
  accessor: &A,
  rng: &mut R,
) -> (i64, Record) {
  let record = Record::random(rng);
  let id = match accessor.insert_one(&record) {
    Ok(id) => id,
    Err(err) => {
      window.fail(&err);
      0
    }
  };
  return (id, record.with_id(id).mutated(rng));
}

/// Registers the group `<strategy>` with one benchmark per phase, reported by criterion as
/// `<strategy>/<Operation>`. Criterion picks the iteration counts. Allocation figures, which
/// criterion has no channel for, are logged after each benchmark.
pub fn bench<A: Accessor + ?Sized>(
  c: &mut Criterion,
  accessor: &A,
  run: &RunConfig,
  sink: &dyn ErrorSink,
) {
  let strategy = accessor.identify();
  let mut group = c.benchmark_group(strategy);
  group.sample_size(run.sample_size);

  for operation in Operation::ALL {
    let mut total = Sample::default();
    group.bench_function(operation.label(), |b| {
      b.iter_custom(|iters| {
        let sample = measure(accessor, operation, iters, run, sink);
        total = total + sample;
        sample.elapsed
      })
    });

    if total.iterations > 0 {
      log::info!(
        "{strategy}/{operation}: {allocs} allocs/op, {bytes} B/op, {failures} failures",
        allocs = total.allocs.allocs / total.iterations,
        bytes = total.allocs.bytes / total.iterations,
        failures = total.failures,
      );
    }
  }

  group.finish();
}
