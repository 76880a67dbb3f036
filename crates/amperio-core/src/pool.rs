//! Pre-allocated scratch buffer pool.
//!
//! Real-time code must not allocate, so any buffer it might need is created
//! ahead of time and recycled. [`BufferPool`] owns a freelist of
//! identical-size `f32` buffers; [`acquire`](BufferPool::acquire) hands one
//! out as a [`PooledBuffer`] guard that returns it (zeroed) on drop.
//!
//! Acquiring from an exhausted pool allocates a fresh buffer, so callers
//! that care about real-time safety must acquire everything they need at
//! initialization time and hold the guards for the session.

use std::sync::{Arc, Mutex};

struct PoolInner {
    free: Vec<Box<[f32]>>,
    outstanding: usize,
}

/// Freelist of identical-size scratch buffers.
#[derive(Clone)]
pub struct BufferPool {
    buffer_len: usize,
    inner: Arc<Mutex<PoolInner>>,
}

impl BufferPool {
    /// Create a pool of `count` zeroed buffers, each `buffer_len` samples.
    pub fn new(buffer_len: usize, count: usize) -> Self {
        let free = (0..count)
            .map(|_| vec![0.0f32; buffer_len].into_boxed_slice())
            .collect();
        Self {
            buffer_len,
            inner: Arc::new(Mutex::new(PoolInner {
                free,
                outstanding: 0,
            })),
        }
    }

    /// Take a buffer from the freelist, allocating if the pool is empty.
    pub fn acquire(&self) -> PooledBuffer {
        let data = {
            let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.outstanding += 1;
            inner.free.pop()
        };
        let data =
            data.unwrap_or_else(|| vec![0.0f32; self.buffer_len].into_boxed_slice());
        PooledBuffer {
            data,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Length in samples of every buffer in the pool.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Buffers currently sitting in the freelist.
    pub fn available(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).free.len()
    }

    /// Buffers currently handed out.
    pub fn in_use(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .outstanding
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Dereferences to `[f32]`; the underlying storage is zeroed and returned
/// to the pool when the guard drops.
pub struct PooledBuffer {
    data: Box<[f32]>,
    pool: Arc<Mutex<PoolInner>>,
}

impl std::ops::Deref for PooledBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut data = std::mem::take(&mut self.data);
        data.fill(0.0);
        if let Ok(mut inner) = self.pool.lock() {
            inner.outstanding = inner.outstanding.saturating_sub(1);
            inner.free.push(data);
        }
    }
}
