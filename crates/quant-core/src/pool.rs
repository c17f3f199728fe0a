//! Internal object pools for hot containers (spec component C15, supplement
//! §4.11). Re-expressed idiomatically from the original's pointer-owning
//! `memory/pool_allocator.h`: Rust ownership makes "the pool owns the
//! backing memory, callers hold raw pointers into it" unsound to imitate
//! literally, so handles are indices into a `Vec`-backed free list instead.
//! Internally synchronized with `parking_lot::Mutex`, matching the
//! teacher's preference for `parking_lot` over `std::sync::Mutex`. Not part
//! of the public analytics surface — used by the rolling/resample hot paths
//! and the Monte-Carlo sampler's scratch buffers.

use parking_lot::Mutex;

/// An opaque handle into a `FixedBlockPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(usize);

struct Inner<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

/// Fixed-size object pool: every slot holds one `T`, reused via a free list
/// instead of returning to the allocator on every checkout/release cycle.
pub struct FixedBlockPool<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> FixedBlockPool<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { slots: Vec::new(), free: Vec::new() }) }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { slots: Vec::with_capacity(capacity), free: Vec::with_capacity(capacity) }),
        }
    }

    /// Check out a slot, initializing it with `value`.
    pub fn acquire(&self, value: T) -> PoolHandle {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.free.pop() {
            inner.slots[idx] = Some(value);
            PoolHandle(idx)
        } else {
            inner.slots.push(Some(value));
            PoolHandle(inner.slots.len() - 1)
        }
    }

    /// Release a slot back to the free list. Releasing a handle not
    /// currently checked out is a no-op, not undefined behavior — unlike the
    /// original's raw-pointer pool, there is no memory to corrupt.
    pub fn release(&self, handle: PoolHandle) -> Option<T> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(handle.0)?;
        let value = slot.take();
        if value.is_some() {
            inner.free.push(handle.0);
        }
        value
    }

    pub fn len_allocated(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.len() - inner.free.len()
    }
}

impl<T> Default for FixedBlockPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Variable-sized scratch-buffer pool, used by the Monte-Carlo sampler to
/// reuse `Vec<f64>` allocations across draws instead of allocating a fresh
/// buffer per call.
pub struct VariableBlockPool {
    buffers: Mutex<Vec<Vec<f64>>>,
}

impl VariableBlockPool {
    pub fn new() -> Self {
        Self { buffers: Mutex::new(Vec::new()) }
    }

    /// Take a buffer with at least `capacity` capacity, reusing a pooled one
    /// if available.
    pub fn acquire(&self, capacity: usize) -> Vec<f64> {
        let mut buffers = self.buffers.lock();
        if let Some(pos) = buffers.iter().position(|b| b.capacity() >= capacity) {
            let mut buf = buffers.swap_remove(pos);
            buf.clear();
            buf
        } else {
            Vec::with_capacity(capacity)
        }
    }

    /// Return a buffer to the pool for reuse.
    pub fn release(&self, buffer: Vec<f64>) {
        self.buffers.lock().push(buffer);
    }

    pub fn pooled_count(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl Default for VariableBlockPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_block_pool_reuses_released_slots() {
        let pool: FixedBlockPool<f64> = FixedBlockPool::new();
        let a = pool.acquire(1.0);
        let b = pool.acquire(2.0);
        assert_eq!(pool.len_allocated(), 2);
        pool.release(a);
        assert_eq!(pool.len_allocated(), 1);
        let c = pool.acquire(3.0);
        assert_eq!(pool.len_allocated(), 2);
        assert_eq!(pool.release(c), Some(3.0));
        assert_eq!(pool.release(b), Some(2.0));
    }

    #[test]
    fn releasing_an_unallocated_handle_is_a_no_op() {
        let pool: FixedBlockPool<f64> = FixedBlockPool::new();
        let handle = pool.acquire(1.0);
        pool.release(handle);
        assert_eq!(pool.release(handle), None);
    }

    #[test]
    fn variable_block_pool_reuses_capacity() {
        let pool = VariableBlockPool::new();
        let buf = pool.acquire(100);
        assert!(buf.capacity() >= 100);
        pool.release(buf);
        assert_eq!(pool.pooled_count(), 1);
        let reused = pool.acquire(50);
        assert_eq!(pool.pooled_count(), 0);
        assert!(reused.capacity() >= 50);
    }
}
