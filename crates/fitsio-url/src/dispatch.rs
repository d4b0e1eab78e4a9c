//! Component E — thin forwarding shims over [`Driver`] (`spec.md` §4.E).
//!
//! The reference implementation's `ffopen`/`ffread`/... each check whether
//! the resolved driver's function pointer is null before calling through
//! it, and each has its own idea of what "missing" means: for `open`/
//! `create` it's a hard failure, for `flush`/`truncate` it's silently
//! fine, and for `read`/`write` any failure (missing or otherwise) gets
//! wrapped in a driver-agnostic I/O error. These functions reproduce that
//! per-operation remapping in one place so `handle.rs` never has to think
//! about it.

use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};

pub fn open(driver: &dyn Driver, url: &str, mode: OpenMode) -> Result<DriverHandle> {
    driver.open(url, mode).map_err(|e| match e {
        Error::Unsupported(_) => Error::FileNotOpened(format!(
            "{} does not support opening existing files",
            driver.prefix()
        )),
        other => other,
    })
}

pub fn create(driver: &dyn Driver, url: &str) -> Result<DriverHandle> {
    driver.create(url).map_err(|e| match e {
        Error::Unsupported(_) => Error::FileNotCreated(format!(
            "{} does not support creating files",
            driver.prefix()
        )),
        other => other,
    })
}

pub fn close(driver: &dyn Driver, handle: DriverHandle) -> Result<()> {
    match driver.close(handle) {
        Err(Error::Unsupported(_)) => Ok(()),
        other => other,
    }
}

pub fn remove(driver: &dyn Driver, url: &str) -> Result<()> {
    driver.remove(url).map_err(|e| match e {
        Error::Unsupported(_) => Error::FileNotClosed(format!(
            "{} does not support deleting files",
            driver.prefix()
        )),
        other => other,
    })
}

pub fn size(driver: &dyn Driver, handle: DriverHandle) -> Result<u64> {
    match driver.size(handle) {
        Err(Error::Unsupported(_)) => Ok(0),
        other => other,
    }
}

/// Absent `flush` means "this driver has nothing to flush", not failure.
pub fn flush(driver: &dyn Driver, handle: DriverHandle) -> Result<()> {
    match driver.flush(handle) {
        Err(Error::Unsupported(_)) => Ok(()),
        other => other,
    }
}

/// Absent `truncate` means "this driver's files have no meaningful
/// length to shrink or grow", not failure.
pub fn truncate(driver: &dyn Driver, handle: DriverHandle, size: u64) -> Result<()> {
    match driver.truncate(handle, size) {
        Err(Error::Unsupported(_)) => Ok(()),
        other => other,
    }
}

pub fn seek(driver: &dyn Driver, handle: DriverHandle, offset: u64) -> Result<()> {
    driver
        .seek(handle, offset)
        .map_err(|e| Error::ReadError(format!("seek failed: {e}")))
}

pub fn read(driver: &dyn Driver, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
    driver
        .read(handle, buf)
        .map_err(|e| Error::ReadError(e.to_string()))
}

pub fn write(driver: &dyn Driver, handle: DriverHandle, buf: &[u8]) -> Result<()> {
    driver
        .write(handle, buf)
        .map_err(|e| Error::WriteError(e.to_string()))
}
