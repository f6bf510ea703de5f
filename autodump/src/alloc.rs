//! Allocation counters for heap reports.
//!
//! Rust has no built-in heap profile, so allocation totals are only known
//! when the host routes its allocations through [`CountingAllocator`]:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: autodump::alloc::CountingAllocator = autodump::alloc::CountingAllocator::system();
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

static INSTALLED: AtomicBool = AtomicBool::new(false);
static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOCATED_OBJECTS: AtomicU64 = AtomicU64::new(0);
static FREED_BYTES: AtomicU64 = AtomicU64::new(0);
static FREED_OBJECTS: AtomicU64 = AtomicU64::new(0);

/// Cumulative allocation totals since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocationStats {
    pub allocated_bytes: u64,
    pub freed_bytes: u64,
    pub in_use_bytes: u64,
    pub allocated_objects: u64,
    pub freed_objects: u64,
    pub in_use_objects: u64,
}

impl AllocationStats {
    /// Current totals, `None` unless the counting allocator is installed.
    pub fn current() -> Option<Self> {
        if !INSTALLED.load(Ordering::Relaxed) {
            return None;
        }
        Some(Self::from_totals(
            ALLOCATED_BYTES.load(Ordering::Relaxed),
            FREED_BYTES.load(Ordering::Relaxed),
            ALLOCATED_OBJECTS.load(Ordering::Relaxed),
            FREED_OBJECTS.load(Ordering::Relaxed),
        ))
    }

    pub fn from_totals(
        allocated_bytes: u64,
        freed_bytes: u64,
        allocated_objects: u64,
        freed_objects: u64,
    ) -> Self {
        Self {
            allocated_bytes,
            freed_bytes,
            in_use_bytes: allocated_bytes.saturating_sub(freed_bytes),
            allocated_objects,
            freed_objects,
            in_use_objects: allocated_objects.saturating_sub(freed_objects),
        }
    }
}

/// Global allocator wrapper counting allocations and frees.
pub struct CountingAllocator<A = System> {
    inner: A,
}

impl CountingAllocator<System> {
    pub const fn system() -> Self {
        Self { inner: System }
    }
}

impl<A> CountingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }

    fn record_alloc(size: usize) {
        INSTALLED.store(true, Ordering::Relaxed);
        ALLOCATED_BYTES.fetch_add(size as u64, Ordering::Relaxed);
        ALLOCATED_OBJECTS.fetch_add(1, Ordering::Relaxed);
    }

    fn record_free(size: usize) {
        FREED_BYTES.fetch_add(size as u64, Ordering::Relaxed);
        FREED_OBJECTS.fetch_add(1, Ordering::Relaxed);
    }
}

// SAFETY: every call is forwarded unchanged to the wrapped allocator, the
// counters are plain atomics which never allocate.
unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        Self::record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            Self::record_free(layout.size());
            Self::record_alloc(new_size);
        }
        new_ptr
    }
}
