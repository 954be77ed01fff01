//! Bounded object pools for encoders and in-memory parts.
//!
//! A pool keeps at most `capacity` idle instances. [`Pool::acquire`] never
//! waits: it pops an idle instance or builds a fresh one. Returning an
//! instance resets it and keeps it only while the pool has room, so the pool
//! never blocks and never grows past its capacity.
//!
//! # Example
//!
//! ```rust
//! use skulk_part::model::{RawRow, Tsid};
//! use skulk_part::pool::inmemory_part_pool;
//!
//! let rows = vec![RawRow::new(Tsid::from_metric_id(1), 1_000, 42.0, 64)];
//!
//! let mut part = inmemory_part_pool().acquire();
//! part.init_from_rows(&rows);
//! let view = part.new_part().unwrap();
//! assert_eq!(view.header().rows_count, 1);
//! drop(view);
//! part.release();
//! ```

use crate::block::BlockEncoder;
use crate::config::MAX_ROWS_PER_BLOCK;
use crate::part::InmemoryPart;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;
use tracing::debug;

/// An object that can be recycled through a [`Pool`].
pub trait Reusable {
    /// Builds a new instance with its scratch space preallocated.
    fn fresh() -> Self;

    /// Returns the instance to its empty state, keeping allocations.
    fn reset(&mut self);
}

impl Reusable for BlockEncoder {
    fn fresh() -> Self {
        BlockEncoder::default()
    }

    fn reset(&mut self) {
        BlockEncoder::reset(self);
    }
}

impl Reusable for InmemoryPart {
    fn fresh() -> Self {
        InmemoryPart::with_block_capacity(MAX_ROWS_PER_BLOCK)
    }

    fn reset(&mut self) {
        InmemoryPart::reset(self);
    }
}

/// Bounded, thread-safe free list.
#[derive(Debug)]
pub struct Pool<T: Reusable> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Reusable> Pool<T> {
    /// Creates a pool keeping at most `capacity` idle instances.
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Takes an idle instance, or builds a fresh one if none is idle.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let idle = self.idle.lock().pop();
        let value = idle.unwrap_or_else(T::fresh);
        Pooled {
            pool: self,
            value: Some(value),
        }
    }

    /// Number of idle instances.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Maximum number of idle instances kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn put(&self, mut value: T) {
        value.reset();
        let rejected = {
            let mut idle = self.idle.lock();
            if idle.len() < self.capacity {
                idle.push(value);
                None
            } else {
                Some(value)
            }
        };
        if rejected.is_some() {
            debug!("Pool full ({} idle), dropping released instance", self.capacity);
        }
    }
}

/// Checked-out pool instance.
///
/// Dereferences to the instance. Dropping the guard, or calling
/// [`Pooled::release`], resets the instance and hands it back to the pool.
#[derive(Debug)]
pub struct Pooled<'p, T: Reusable> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<T: Reusable> Pooled<'_, T> {
    /// Returns the instance to its pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Reusable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("pooled instance already released"),
        }
    }
}

impl<T: Reusable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("pooled instance already released"),
        }
    }
}

impl<T: Reusable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put(value);
        }
    }
}

static BLOCK_ENCODER_POOL: OnceLock<Pool<BlockEncoder>> = OnceLock::new();
static INMEMORY_PART_POOL: OnceLock<Pool<InmemoryPart>> = OnceLock::new();

/// Process-wide pool of block encoders.
pub fn block_encoder_pool() -> &'static Pool<BlockEncoder> {
    BLOCK_ENCODER_POOL.get_or_init(|| Pool::new(default_capacity()))
}

/// Process-wide pool of in-memory parts.
pub fn inmemory_part_pool() -> &'static Pool<InmemoryPart> {
    INMEMORY_PART_POOL.get_or_init(|| Pool::new(default_capacity()))
}

fn default_capacity() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FRESH: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Scratch {
        data: Vec<u8>,
    }

    impl Reusable for Scratch {
        fn fresh() -> Self {
            FRESH.fetch_add(1, Ordering::SeqCst);
            Scratch {
                data: Vec::with_capacity(16),
            }
        }

        fn reset(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn test_acquire_on_empty_pool_builds_fresh() {
        let pool: Pool<Scratch> = Pool::new(2);
        let before = FRESH.load(Ordering::SeqCst);
        let a = pool.acquire();
        let b = pool.acquire();
        assert!(FRESH.load(Ordering::SeqCst) >= before + 2);
        drop((a, b));
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_release_resets_and_reuses() {
        let pool: Pool<Scratch> = Pool::new(1);
        let mut item = pool.acquire();
        item.data.extend_from_slice(b"dirty");
        let ptr = item.data.as_ptr();
        item.release();

        let item = pool.acquire();
        assert!(item.data.is_empty());
        assert_eq!(item.data.as_ptr(), ptr);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let pool: Pool<Scratch> = Pool::new(2);
        let items: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(items);
        assert_eq!(pool.idle(), 2);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn test_zero_capacity_drops_everything() {
        let pool: Pool<Scratch> = Pool::new(0);
        pool.acquire().release();
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_global_pools_are_shared() {
        assert!(std::ptr::eq(block_encoder_pool(), block_encoder_pool()));
        assert!(inmemory_part_pool().capacity() >= 1);
    }

    #[test]
    fn test_pooled_part_is_reset() {
        let pool: Pool<InmemoryPart> = Pool::new(1);
        let mut part = pool.acquire();
        part.init_from_rows(&[crate::model::RawRow::new(
            crate::model::Tsid::from_metric_id(1),
            1,
            1.0,
            64,
        )]);
        assert!(part.size() > 0);
        part.release();
        assert_eq!(pool.acquire().size(), 0);
    }

    #[test]
    fn test_fresh_part_is_presized() {
        let pool: Pool<InmemoryPart> = Pool::new(1);
        let part = pool.acquire();
        assert!(part.values().capacity() >= MAX_ROWS_PER_BLOCK);
        assert!(part.timestamps().capacity() >= MAX_ROWS_PER_BLOCK);
    }
}
