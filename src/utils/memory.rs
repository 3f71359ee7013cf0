//! Heap usage accounting.
//!
//! `CountingAllocator` wraps the system allocator and keeps the number of
//! live bytes and the high-water mark in atomics. The binary installs it with
//! `#[global_allocator]`; when it is not installed (tests, embedding hosts)
//! `usage()` simply reports zeros.
//!
//! `MemoryReporter` turns the raw counters into change-only reports, the same
//! way the graph document is only emitted when the topology changed.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static MAXIMUM: AtomicUsize = AtomicUsize::new(0);

pub struct CountingAllocator;

impl CountingAllocator {
    fn record_alloc(size: usize) {
        let current = CURRENT.fetch_add(size, Ordering::Relaxed) + size;
        let mut max = MAXIMUM.load(Ordering::Relaxed);
        while current > max {
            match MAXIMUM.compare_exchange_weak(max, current, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }

    fn record_dealloc(size: usize) {
        CURRENT.fetch_sub(size, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            Self::record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        Self::record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            Self::record_dealloc(layout.size());
            Self::record_alloc(new_size);
        }
        new_ptr
    }
}

/// A point-in-time reading of the allocator counters, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryUsage {
    pub current: usize,
    pub maximum: usize,
}

/// Reads the counters maintained by `CountingAllocator`.
pub fn usage() -> MemoryUsage {
    MemoryUsage {
        current: CURRENT.load(Ordering::Relaxed),
        maximum: MAXIMUM.load(Ordering::Relaxed),
    }
}

#[derive(Debug, Default)]
pub struct MemoryReporter {
    last: Option<MemoryUsage>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `usage` if it differs from the previously reported value.
    pub fn poll(&mut self, usage: MemoryUsage) -> Option<MemoryUsage> {
        if self.last == Some(usage) {
            return None;
        }
        self.last = Some(usage);
        Some(usage)
    }
}
