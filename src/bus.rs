//! Hand-off primitives between the console, sensor and follower tasks.
//!
//! Settings travel as versioned snapshots: the value and its version are
//! swapped inside one critical section, so a consumer can never observe a
//! new version paired with an old value (or the other way round). Commands
//! and frames are discrete events and go through bounded channels instead.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::state::{ControlCommand, ControlSettings, ControlStatus, SensorFrame};

/// Pending operator commands. Edge-triggered, so none may be coalesced.
pub const COMMAND_QUEUE_DEPTH: usize = 4;
/// Frames waiting for the follower; newest is dropped when full.
pub const FRAME_QUEUE_DEPTH: usize = 2;

pub type CommandChannel = Channel<CriticalSectionRawMutex, ControlCommand, COMMAND_QUEUE_DEPTH>;
pub type FrameChannel = Channel<CriticalSectionRawMutex, SensorFrame, FRAME_QUEUE_DEPTH>;
pub type StatusChannel = Channel<CriticalSectionRawMutex, ControlStatus, 1>;
/// Latest frame for telemetry, separate from the follower queue.
pub type FrameTapChannel = Channel<CriticalSectionRawMutex, SensorFrame, 1>;
pub type SettingsStore = Published<ControlSettings>;

#[derive(Clone, Copy)]
struct Versioned<T> {
    version: u32,
    value: T,
}

/// Latest-value store with a change counter.
pub struct Published<T: Copy> {
    inner: Mutex<CriticalSectionRawMutex, Cell<Versioned<T>>>,
}

impl<T: Copy> Published<T> {
    /// Version starts at 1 so a fresh [`Watcher`] sees the initial value.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(Versioned { version: 1, value })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.lock(|c| c.get().value)
    }

    #[cfg(test)]
    fn version(&self) -> u32 {
        self.inner.lock(|c| c.get().version)
    }

    #[cfg(test)]
    fn update<F: FnOnce(&mut T)>(&self, f: F) -> T {
        self.inner.lock(|c| {
            let mut current = c.get();
            f(&mut current.value);
            current.version = current.version.wrapping_add(1);
            c.set(current);
            current.value
        })
    }

    /// Read-modify-write under a single lock, committed (and the version
    /// bumped) only when `f` succeeds. Returns the stored value.
    pub fn try_update<E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut T) -> Result<(), E>,
    {
        self.inner.lock(|c| {
            let mut current = c.get();
            f(&mut current.value)?;
            current.version = current.version.wrapping_add(1);
            c.set(current);
            Ok(current.value)
        })
    }
}

/// Consumer-side bookkeeping of the last version seen.
#[derive(Debug, Default)]
pub struct Watcher {
    seen: u32,
}

impl Watcher {
    pub const fn new() -> Self {
        Self { seen: 0 }
    }

    /// Snapshot if something was published since the last call.
    pub fn changed<T: Copy>(&mut self, store: &Published<T>) -> Option<T> {
        let current = store.inner.lock(|c| c.get());
        if current.version == self.seen {
            return None;
        }
        self.seen = current.version;
        Some(current.value)
    }
}

/// Post to a latest-value channel, replacing anything still queued.
pub fn send_latest<T, const N: usize>(channel: &Channel<CriticalSectionRawMutex, T, N>, value: T) {
    if let Err(TrySendError::Full(value)) = channel.try_send(value) {
        let _ = channel.try_receive();
        let _ = channel.try_send(value);
    }
}
