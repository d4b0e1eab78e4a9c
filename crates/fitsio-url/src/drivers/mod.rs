//! Component H — driver implementations (`SPEC_FULL.md` §2 row H).
//!
//! Every built-in driver is a small `struct` implementing [`crate::driver::Driver`],
//! registered once by [`crate::registry::DriverRegistry::init_library`]. Each
//! driver needs some interior-mutable table mapping the opaque
//! [`crate::driver::DriverHandle`] it hands out back to whatever its own
//! state actually is (an open `File`, a `Vec<u8>` buffer, ...) because
//! `Driver`'s methods all take `&self` — dispatch holds the registry
//! behind a single process-wide `OnceLock`, not an owned, uniquely
//! borrowed value. [`HandleTable`] is the one shared piece of plumbing
//! every driver below builds on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::driver::DriverHandle;

pub mod compress;
pub mod file;
pub mod mem;
pub mod stdio;

#[cfg(feature = "network")]
pub mod ftp;
#[cfg(feature = "network")]
pub mod http;
#[cfg(feature = "network")]
pub mod root;

#[cfg(feature = "shared-memory")]
pub mod shmem;

/// A minimal handle-to-state table, shared by every driver that needs to
/// mint opaque [`DriverHandle`]s for state it owns (an open file
/// descriptor, an in-memory buffer, ...).
pub(crate) struct HandleTable<T> {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        HandleTable {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> HandleTable<T> {
    pub(crate) fn insert(&self, value: T) -> DriverHandle {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().expect("driver handle table poisoned").insert(id, value);
        DriverHandle(id)
    }

    pub(crate) fn with<R>(&self, handle: DriverHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.entries
            .lock()
            .expect("driver handle table poisoned")
            .get_mut(&handle.0)
            .map(f)
    }

    pub(crate) fn remove(&self, handle: DriverHandle) -> Option<T> {
        self.entries
            .lock()
            .expect("driver handle table poisoned")
            .remove(&handle.0)
    }
}
