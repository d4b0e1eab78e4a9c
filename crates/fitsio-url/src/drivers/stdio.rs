//! The `stdin://` and `stdout://` drivers: one-shot, non-seekable access
//! to the process's standard streams (`spec.md` §4.D). Matching the
//! reference implementation, these support only the direction their name
//! implies: `stdin://` has no `write`, `stdout://` has no `read`, and
//! neither supports `seek` or `truncate`.

use std::io::{Read, Write};
use std::sync::Mutex;

use super::HandleTable;
use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct StdinDriver {
    buffers: HandleTable<Vec<u8>>,
}

impl Driver for StdinDriver {
    fn prefix(&self) -> &'static str {
        "stdin://"
    }

    fn open(&self, _url: &str, _mode: OpenMode) -> Result<DriverHandle> {
        let mut data = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut data)
            .map_err(|e| Error::FileNotOpened(format!("reading stdin: {e}")))?;
        Ok(self.buffers.insert(data))
    }

    fn close(&self, handle: DriverHandle) -> Result<()> {
        self.buffers.remove(handle);
        Ok(())
    }

    fn size(&self, handle: DriverHandle) -> Result<u64> {
        self.buffers
            .with(handle, |b| b.len() as u64)
            .ok_or(Error::BadFilePtr)
    }

    fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
        self.buffers
            .with(handle, |b| {
                if buf.len() > b.len() {
                    return Err(Error::ReadError("read past end of stdin".to_string()));
                }
                let (front, rest) = b.split_at(buf.len());
                buf.copy_from_slice(front);
                *b = rest.to_vec();
                Ok(())
            })
            .ok_or(Error::BadFilePtr)?
    }
}

pub struct StdoutDriver {
    out: Mutex<std::io::Stdout>,
}

impl Default for StdoutDriver {
    fn default() -> Self {
        StdoutDriver {
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl Driver for StdoutDriver {
    fn prefix(&self) -> &'static str {
        "stdout://"
    }

    fn create(&self, _url: &str) -> Result<DriverHandle> {
        Ok(DriverHandle(0))
    }

    fn close(&self, _handle: DriverHandle) -> Result<()> {
        Ok(())
    }

    fn write(&self, _handle: DriverHandle, buf: &[u8]) -> Result<()> {
        self.out
            .lock()
            .expect("stdout driver poisoned")
            .write_all(buf)
            .map_err(|e| Error::WriteError(e.to_string()))
    }

    fn flush(&self, _handle: DriverHandle) -> Result<()> {
        self.out
            .lock()
            .expect("stdout driver poisoned")
            .flush()
            .map_err(|e| Error::WriteError(e.to_string()))
    }
}
