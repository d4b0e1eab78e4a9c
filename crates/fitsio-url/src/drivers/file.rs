//! The `file://` driver: ordinary local filesystem I/O, plus the gzip
//! sniff that reroutes a compressed file to `compress://`
//! (`spec.md` §4.F step 6, `SPEC_FULL.md` §4.D/E).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use super::HandleTable;
use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Default)]
pub struct FileDriver;

impl FileDriver {
    fn table() -> &'static HandleTable<File> {
        use std::sync::OnceLock;
        static TABLE: OnceLock<HandleTable<File>> = OnceLock::new();
        TABLE.get_or_init(HandleTable::default)
    }
}

impl Driver for FileDriver {
    fn prefix(&self) -> &'static str {
        "file://"
    }

    fn check_file(&self, url: &str) -> Result<bool> {
        let mut f = match File::open(url) {
            Ok(f) => f,
            Err(_) => return Ok(true), // let `open` report the real error
        };
        let mut magic = [0u8; 2];
        if f.read_exact(&mut magic).is_err() {
            return Ok(true);
        }
        Ok(magic != GZIP_MAGIC)
    }

    fn open(&self, url: &str, mode: OpenMode) -> Result<DriverHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(url)
            .map_err(|e| Error::FileNotOpened(format!("{url}: {e}")))?;
        Ok(Self::table().insert(file))
    }

    fn create(&self, url: &str) -> Result<DriverHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(url)
            .map_err(|e| Error::FileNotCreated(format!("{url}: {e}")))?;
        Ok(Self::table().insert(file))
    }

    fn close(&self, handle: DriverHandle) -> Result<()> {
        Self::table().remove(handle);
        Ok(())
    }

    fn remove(&self, url: &str) -> Result<()> {
        std::fs::remove_file(url).map_err(|e| Error::FileNotClosed(format!("{url}: {e}")))
    }

    fn size(&self, handle: DriverHandle) -> Result<u64> {
        Self::table()
            .with(handle, |f| f.metadata().map(|m| m.len()))
            .ok_or(Error::BadFilePtr)?
            .map_err(|e| Error::ReadError(e.to_string()))
    }

    fn flush(&self, handle: DriverHandle) -> Result<()> {
        Self::table()
            .with(handle, |f| f.flush())
            .ok_or(Error::BadFilePtr)?
            .map_err(|e| Error::WriteError(e.to_string()))
    }

    fn truncate(&self, handle: DriverHandle, size: u64) -> Result<()> {
        Self::table()
            .with(handle, |f| f.set_len(size))
            .ok_or(Error::BadFilePtr)?
            .map_err(|e| Error::WriteError(e.to_string()))
    }

    fn seek(&self, handle: DriverHandle, offset: u64) -> Result<()> {
        Self::table()
            .with(handle, |f| f.seek(SeekFrom::Start(offset)))
            .ok_or(Error::BadFilePtr)?
            .map_err(|e| Error::ReadError(e.to_string()))?;
        Ok(())
    }

    fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
        Self::table()
            .with(handle, |f| f.read_exact(buf))
            .ok_or(Error::BadFilePtr)?
            .map_err(|e| Error::ReadError(e.to_string()))
    }

    fn write(&self, handle: DriverHandle, buf: &[u8]) -> Result<()> {
        Self::table()
            .with(handle, |f| f.write_all(buf))
            .ok_or(Error::BadFilePtr)?
            .map_err(|e| Error::WriteError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn roundtrip_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.bin");
        let driver = FileDriver;

        let h = driver.create(path.to_str().unwrap()).unwrap();
        driver.write(h, b"hello").unwrap();
        driver.flush(h).unwrap();
        assert_eq!(driver.size(h).unwrap(), 5);
        driver.close(h).unwrap();

        let h2 = driver.open(path.to_str().unwrap(), OpenMode::ReadOnly).unwrap();
        let mut buf = [0u8; 5];
        driver.read(h2, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        driver.close(h2).unwrap();
    }

    #[test]
    fn check_file_detects_gzip_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.gz");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&[0x1f, 0x8b, 0x08, 0x00]).unwrap();
        }
        let driver = FileDriver;
        assert!(!driver.check_file(path.to_str().unwrap()).unwrap());
    }

    #[test]
    fn check_file_passes_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.fits");
        std::fs::write(&path, b"SIMPLE  =").unwrap();
        let driver = FileDriver;
        assert!(driver.check_file(path.to_str().unwrap()).unwrap());
    }
}
