use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCS: AtomicU64 = AtomicU64::new(0);
static BYTES: AtomicU64 = AtomicU64::new(0);

/// System allocator that counts allocations. Install it in a bench binary with:
///
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: harness::CountingAllocator = harness::CountingAllocator;
/// ```
///
/// Without it, every snapshot reads zero.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
  #[inline]
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    ALLOCS.fetch_add(1, Ordering::Relaxed);
    BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
    return System.alloc(layout);
  }

  #[inline]
  unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
    ALLOCS.fetch_add(1, Ordering::Relaxed);
    BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
    return System.alloc_zeroed(layout);
  }

  #[inline]
  unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
    System.dealloc(ptr, layout);
  }

  #[inline]
  unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
    ALLOCS.fetch_add(1, Ordering::Relaxed);
    BYTES.fetch_add(new_size as u64, Ordering::Relaxed);
    return System.realloc(ptr, layout, new_size);
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
  pub allocs: u64,
  pub bytes: u64,
}

impl AllocSnapshot {
  pub fn now() -> Self {
    return Self {
      allocs: ALLOCS.load(Ordering::Relaxed),
      bytes: BYTES.load(Ordering::Relaxed),
    };
  }

  pub fn since(self, earlier: AllocSnapshot) -> AllocSnapshot {
    return Self {
      allocs: self.allocs.saturating_sub(earlier.allocs),
      bytes: self.bytes.saturating_sub(earlier.bytes),
    };
  }
}

impl std::ops::Add for AllocSnapshot {
  type Output = AllocSnapshot;

  fn add(self, rhs: Self) -> Self {
    return Self {
      allocs: self.allocs + rhs.allocs,
      bytes: self.bytes + rhs.bytes,
    };
  }
}
