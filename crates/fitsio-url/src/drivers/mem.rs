//! The `mem://` and `memkeep://` drivers: an in-process byte buffer keyed
//! by URL, used for scratch files (row-select, histogram output) and for
//! [`crate::handle::open_memory`]'s fast path (`spec.md` §4.D/§4.F).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::HandleTable;
use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};

struct Buffer {
    data: Vec<u8>,
    cursor: usize,
}

/// Backs both `mem://` and `memkeep://`: the two prefixes share identical
/// mechanics (a named, growable byte buffer) and differ only in the
/// lifetime contract their name implies to callers — `memkeep://` is used
/// when the caller wants to keep owning the buffer it handed in via
/// `open_memory`, `mem://` is this crate's own scratch space.
pub struct MemDriver {
    prefix: &'static str,
    named: Mutex<HashMap<String, u64>>,
    table: HandleTable<Buffer>,
    counter: AtomicU64,
}

impl MemDriver {
    pub fn keep(keep: bool) -> Self {
        MemDriver {
            prefix: if keep { "memkeep://" } else { "mem://" },
            named: Mutex::new(HashMap::new()),
            table: HandleTable::default(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Driver for MemDriver {
    fn prefix(&self) -> &'static str {
        self.prefix
    }

    fn open(&self, url: &str, _mode: OpenMode) -> Result<DriverHandle> {
        let named = self.named.lock().expect("mem driver poisoned");
        named
            .get(url)
            .map(|&id| DriverHandle(id))
            .ok_or_else(|| Error::FileNotOpened(format!("no in-memory buffer named {url:?}")))
    }

    fn create(&self, url: &str) -> Result<DriverHandle> {
        let handle = self.table.insert(Buffer {
            data: Vec::new(),
            cursor: 0,
        });
        self.named
            .lock()
            .expect("mem driver poisoned")
            .insert(url.to_string(), handle.0);
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn close(&self, handle: DriverHandle) -> Result<()> {
        self.table.remove(handle);
        Ok(())
    }

    fn remove(&self, url: &str) -> Result<()> {
        let mut named = self.named.lock().expect("mem driver poisoned");
        if let Some(id) = named.remove(url) {
            self.table.remove(DriverHandle(id));
        }
        Ok(())
    }

    fn size(&self, handle: DriverHandle) -> Result<u64> {
        self.table
            .with(handle, |b| b.data.len() as u64)
            .ok_or(Error::BadFilePtr)
    }

    fn truncate(&self, handle: DriverHandle, size: u64) -> Result<()> {
        self.table
            .with(handle, |b| {
                b.data.resize(size as usize, 0);
                b.cursor = b.cursor.min(b.data.len());
            })
            .ok_or(Error::BadFilePtr)
    }

    fn seek(&self, handle: DriverHandle, offset: u64) -> Result<()> {
        self.table
            .with(handle, |b| b.cursor = offset as usize)
            .ok_or(Error::BadFilePtr)
    }

    fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
        self.table
            .with(handle, |b| {
                let end = b.cursor + buf.len();
                if end > b.data.len() {
                    return Err(Error::ReadError("read past end of memory buffer".to_string()));
                }
                buf.copy_from_slice(&b.data[b.cursor..end]);
                b.cursor = end;
                Ok(())
            })
            .ok_or(Error::BadFilePtr)?
    }

    fn write(&self, handle: DriverHandle, buf: &[u8]) -> Result<()> {
        self.table
            .with(handle, |b| {
                let end = b.cursor + buf.len();
                if end > b.data.len() {
                    b.data.resize(end, 0);
                }
                b.data[b.cursor..end].copy_from_slice(buf);
                b.cursor = end;
            })
            .ok_or(Error::BadFilePtr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_then_reopen_and_read() {
        let driver = MemDriver::keep(false);
        let h = driver.create("mem://scratch.fits").unwrap();
        driver.write(h, b"abcdef").unwrap();
        assert_eq!(driver.size(h).unwrap(), 6);

        let h2 = driver.open("mem://scratch.fits", OpenMode::ReadOnly).unwrap();
        driver.seek(h2, 0).unwrap();
        let mut buf = [0u8; 6];
        driver.read(h2, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn open_unknown_name_is_an_error() {
        let driver = MemDriver::keep(true);
        assert!(driver.open("memkeep://nope", OpenMode::ReadOnly).is_err());
    }

    #[test]
    fn remove_forgets_the_name() {
        let driver = MemDriver::keep(false);
        driver.create("mem://x").unwrap();
        driver.remove("mem://x").unwrap();
        assert!(driver.open("mem://x", OpenMode::ReadOnly).is_err());
    }
}
