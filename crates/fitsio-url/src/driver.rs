//! Component D — the driver virtual table (`spec.md` §4.D, `fitsdriver`).
//!
//! The reference implementation stores a table of 12 C function pointers
//! per driver, each of which may be null ("not supported"). A trait with
//! default method bodies is the idiomatic Rust rendering of that: a driver
//! overrides only the operations it actually implements, and dispatch
//! (`dispatch.rs`) only ever sees the trait object, never a raw table.

use crate::error::{Error, Result};

/// Whether a driver was asked to open a file for reading only or for
/// reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque handle a driver hands back from `open`/`create`; meaningful only
/// to the driver that issued it. Mirrors the reference implementation's
/// `int *driverhandle` out-parameter, but owned instead of borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverHandle(pub u64);

/// One I/O backend, addressed by URL prefix (`file://`, `mem://`, ...).
///
/// Every method defaults to reporting [`Error::Unsupported`]; a concrete
/// driver overrides only what it can do. `dispatch.rs` remaps
/// `Unsupported` into a more specific error for the operations
/// `spec.md` §4.E singles out, and treats it as a silent no-op for the
/// ones it doesn't.
pub trait Driver: Send + Sync {
    /// URL prefix this driver is registered under, including the `://`.
    fn prefix(&self) -> &'static str;

    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Returns `Ok(true)` if `url` (with the prefix already stripped)
    /// names a file this driver can actually open, `Ok(false)` otherwise.
    /// Drivers that can't cheaply check (e.g. `mem://`) just return
    /// `Ok(true)`.
    fn check_file(&self, _url: &str) -> Result<bool> {
        Ok(true)
    }

    fn open(&self, _url: &str, _mode: OpenMode) -> Result<DriverHandle> {
        Err(Error::Unsupported("open"))
    }

    fn create(&self, _url: &str) -> Result<DriverHandle> {
        Err(Error::Unsupported("create"))
    }

    fn truncate(&self, _handle: DriverHandle, _size: u64) -> Result<()> {
        Err(Error::Unsupported("truncate"))
    }

    fn close(&self, _handle: DriverHandle) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _url: &str) -> Result<()> {
        Err(Error::Unsupported("remove"))
    }

    fn size(&self, _handle: DriverHandle) -> Result<u64> {
        Err(Error::Unsupported("size"))
    }

    fn flush(&self, _handle: DriverHandle) -> Result<()> {
        Ok(())
    }

    fn seek(&self, _handle: DriverHandle, _offset: u64) -> Result<()> {
        Err(Error::Unsupported("seek"))
    }

    fn read(&self, _handle: DriverHandle, _buf: &mut [u8]) -> Result<()> {
        Err(Error::Unsupported("read"))
    }

    fn write(&self, _handle: DriverHandle, _buf: &[u8]) -> Result<()> {
        Err(Error::Unsupported("write"))
    }
}
