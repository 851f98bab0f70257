// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reusable encode/decode state.
//!
//! A [`StreamHolder`] bundles the output buffer and both handle tables of one
//! codec session. [`StreamPool::acquire`] hands one out behind a
//! [`StreamGuard`] that returns it on drop, on every exit path.
//!
//! # Modes
//!
//! - **Per-thread** (`pool_size == 0`): each thread keeps one holder in a
//!   thread-local slot and reuses it across calls.
//! - **Shared** (`pool_size > 0`): a fixed set of holders circulates through a
//!   bounded `crossbeam` channel. Acquisition blocks while all holders are in
//!   use and can be cancelled through an [`InterruptHandle`].
//!
//! In both modes a nested acquisition on the same thread (a marshal call made
//! from inside another one) gets a fresh, unpooled holder so the outer call's
//! state is never touched.
//!
//! Thread-local slots are keyed by pool id. Dropping a pool clears its slot on
//! the dropping thread; other threads prune slots of dead pools the next time
//! they touch a new pool.

use crate::codec::{DataOutput, HandleReplay, HandleTable};
use crate::error::{MarshalError, MarshalResult};
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashSet;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Ids of pools that have not been dropped yet.
fn live_pools() -> &'static DashSet<u64> {
    static LIVE: OnceLock<DashSet<u64>> = OnceLock::new();
    LIVE.get_or_init(DashSet::new)
}

#[derive(Default)]
struct LocalSlot {
    holder: Option<StreamHolder>,
    depth: usize,
}

thread_local! {
    static LOCAL: RefCell<HashMap<u64, LocalSlot>> = RefCell::new(HashMap::new());
    static INTERRUPT: (Sender<()>, Receiver<()>) = channel::unbounded();
}

/// Output buffer and handle tables of one codec session.
#[derive(Default)]
pub struct StreamHolder {
    pub out: DataOutput,
    pub handles: HandleTable,
    pub replay: HandleReplay,
}

impl StreamHolder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: DataOutput::with_capacity(capacity),
            handles: HandleTable::new(),
            replay: HandleReplay::new(),
        }
    }

    fn reset(&mut self, capacity: usize) {
        self.out.reset();
        self.out.shrink_to(capacity);
        self.handles.clear();
        self.replay.clear();
    }
}

/// Cancels a blocked [`StreamPool::acquire`] on the thread it was taken on.
#[derive(Clone)]
pub struct InterruptHandle {
    tx: Sender<()>,
}

impl InterruptHandle {
    /// Handle for the calling thread.
    pub fn current() -> Self {
        Self {
            tx: INTERRUPT.with(|(tx, _)| tx.clone()),
        }
    }

    /// Interrupt the thread's current or next blocking acquisition.
    ///
    /// Interrupts do not queue: any number of calls before the thread consumes
    /// one fail a single acquisition.
    pub fn interrupt(&self) {
        // The receiver lives as long as its thread; a send after thread exit is moot.
        let _ = self.tx.send(());
    }
}

/// Diagnostic counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions that found the shared pool empty and had to wait.
    pub exhausted: u64,
    /// Nested acquisitions served with a fresh holder.
    pub nested: u64,
}

enum Origin {
    Nested,
    Local,
    Shared,
}

pub struct StreamPool {
    id: u64,
    buffer_capacity: usize,
    shared: Option<(Sender<StreamHolder>, Receiver<StreamHolder>)>,
    exhausted: AtomicU64,
    nested: AtomicU64,
}

impl StreamPool {
    /// `pool_size == 0` selects per-thread mode.
    pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        let shared = (pool_size > 0).then(|| {
            let (tx, rx) = channel::bounded(pool_size);
            for _ in 0..pool_size {
                // Capacity equals the number of holders; cannot be full.
                let _ = tx.try_send(StreamHolder::with_capacity(buffer_capacity));
            }
            (tx, rx)
        });
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        live_pools().insert(id);
        Self {
            id,
            buffer_capacity,
            shared,
            exhausted: AtomicU64::new(0),
            nested: AtomicU64::new(0),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    /// Holders currently idle in the shared pool (0 in per-thread mode).
    pub fn available(&self) -> usize {
        self.shared.as_ref().map_or(0, |(_, rx)| rx.len())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            exhausted: self.exhausted.load(Ordering::Relaxed),
            nested: self.nested.load(Ordering::Relaxed),
        }
    }

    /// Borrow a holder for one codec session.
    ///
    /// Fails only with [`MarshalError::Interrupted`], when a blocked shared-mode
    /// acquisition is cancelled.
    pub fn acquire(&self) -> MarshalResult<StreamGuard<'_>> {
        let depth = LOCAL.with(|local| {
            let mut local = local.borrow_mut();
            if !local.contains_key(&self.id) {
                let live = live_pools();
                local.retain(|id, _| live.contains(id));
            }
            let slot = local.entry(self.id).or_default();
            slot.depth += 1;
            slot.depth
        });

        if depth > 1 {
            self.nested.fetch_add(1, Ordering::Relaxed);
            return Ok(self.guard(StreamHolder::with_capacity(self.buffer_capacity), Origin::Nested));
        }

        match &self.shared {
            None => {
                let holder = LOCAL
                    .with(|local| {
                        local
                            .borrow_mut()
                            .get_mut(&self.id)
                            .and_then(|slot| slot.holder.take())
                    })
                    .unwrap_or_else(|| StreamHolder::with_capacity(self.buffer_capacity));
                Ok(self.guard(holder, Origin::Local))
            }
            Some((_, rx)) => match self.take_shared(rx) {
                Ok(holder) => Ok(self.guard(holder, Origin::Shared)),
                Err(err) => {
                    self.leave();
                    Err(err)
                }
            },
        }
    }

    fn take_shared(&self, rx: &Receiver<StreamHolder>) -> MarshalResult<StreamHolder> {
        let interrupts = INTERRUPT.with(|(_, rx)| rx.clone());
        if interrupts.try_iter().count() > 0 {
            return Err(MarshalError::Interrupted);
        }
        if let Ok(holder) = rx.try_recv() {
            return Ok(holder);
        }

        self.exhausted.fetch_add(1, Ordering::Relaxed);
        log::debug!("[stream-pool] pool {} exhausted, waiting", self.id);
        channel::select! {
            recv(rx) -> holder => holder.map_err(|_| MarshalError::Interrupted),
            recv(interrupts) -> _ => {
                let _ = interrupts.try_iter().count();
                log::debug!("[stream-pool] pool {} acquisition interrupted", self.id);
                Err(MarshalError::Interrupted)
            }
        }
    }

    fn guard(&self, holder: StreamHolder, origin: Origin) -> StreamGuard<'_> {
        StreamGuard {
            pool: self,
            holder,
            origin,
        }
    }

    fn leave(&self) {
        LOCAL.with(|local| {
            if let Some(slot) = local.borrow_mut().get_mut(&self.id) {
                slot.depth = slot.depth.saturating_sub(1);
            }
        });
    }

    fn release(&self, mut holder: StreamHolder, origin: Origin) {
        match origin {
            Origin::Nested => {}
            Origin::Local => {
                holder.reset(self.buffer_capacity);
                LOCAL.with(|local| {
                    if let Some(slot) = local.borrow_mut().get_mut(&self.id) {
                        slot.holder = Some(holder);
                    }
                });
            }
            Origin::Shared => {
                holder.reset(self.buffer_capacity);
                if let Some((tx, _)) = &self.shared {
                    let _ = tx.try_send(holder);
                }
            }
        }
        self.leave();
    }
}

impl Drop for StreamPool {
    fn drop(&mut self) {
        live_pools().remove(&self.id);
        // Thread-local storage may already be gone during thread teardown.
        let _ = LOCAL.try_with(|local| local.borrow_mut().remove(&self.id));
    }
}

#[cfg(test)]
fn local_slot_count() -> usize {
    LOCAL.with(|local| local.borrow().len())
}

/// Scoped holder loan; returns the holder to its pool on drop.
pub struct StreamGuard<'p> {
    pool: &'p StreamPool,
    holder: StreamHolder,
    origin: Origin,
}

impl Deref for StreamGuard<'_> {
    type Target = StreamHolder;

    fn deref(&self) -> &StreamHolder {
        &self.holder
    }
}

impl DerefMut for StreamGuard<'_> {
    fn deref_mut(&mut self) -> &mut StreamHolder {
        &mut self.holder
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        let holder = std::mem::take(&mut self.holder);
        let origin = std::mem::replace(&mut self.origin, Origin::Nested);
        self.pool.release(holder, origin);
    }
}
