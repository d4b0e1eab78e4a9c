//! The `compress://` driver: transparent gzip decompression on open,
//! reached either directly or via `file://`'s `check_file` rewrite
//! (`spec.md` §4.D, `SPEC_FULL.md` §4.D/E). Grounded on the gzip usage in
//! `examples/other_examples/7f3c58f2_rekka-tectonic__src-io-mod.rs.rs`.

use std::fs::File;
use std::io::Read;

use flate2::read::GzDecoder;

use super::HandleTable;
use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};

struct Buffer {
    data: Vec<u8>,
    cursor: usize,
}

#[derive(Default)]
pub struct CompressDriver {
    buffers: HandleTable<Buffer>,
}

impl Driver for CompressDriver {
    fn prefix(&self) -> &'static str {
        "compress://"
    }

    fn open(&self, url: &str, _mode: OpenMode) -> Result<DriverHandle> {
        let file = File::open(url).map_err(|e| Error::FileNotOpened(format!("{url}: {e}")))?;
        let mut decoder = GzDecoder::new(file);
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|e| Error::FileNotOpened(format!("{url}: gzip decode failed: {e}")))?;
        Ok(self.buffers.insert(Buffer { data, cursor: 0 }))
    }

    fn close(&self, handle: DriverHandle) -> Result<()> {
        self.buffers.remove(handle);
        Ok(())
    }

    fn size(&self, handle: DriverHandle) -> Result<u64> {
        self.buffers
            .with(handle, |b| b.data.len() as u64)
            .ok_or(Error::BadFilePtr)
    }

    fn seek(&self, handle: DriverHandle, offset: u64) -> Result<()> {
        self.buffers
            .with(handle, |b| b.cursor = offset as usize)
            .ok_or(Error::BadFilePtr)
    }

    fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
        self.buffers
            .with(handle, |b| {
                let end = b.cursor + buf.len();
                if end > b.data.len() {
                    return Err(Error::ReadError(
                        "read past end of decompressed buffer".to_string(),
                    ));
                }
                buf.copy_from_slice(&b.data[b.cursor..end]);
                b.cursor = end;
                Ok(())
            })
            .ok_or(Error::BadFilePtr)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opens_and_decodes_a_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.fits.gz");
        {
            let f = File::create(&path).unwrap();
            let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
            enc.write_all(b"SIMPLE  = T").unwrap();
            enc.finish().unwrap();
        }

        let driver = CompressDriver::default();
        let h = driver.open(path.to_str().unwrap(), OpenMode::ReadOnly).unwrap();
        assert_eq!(driver.size(h).unwrap(), 11);
        let mut buf = [0u8; 11];
        driver.read(h, &mut buf).unwrap();
        assert_eq!(&buf, b"SIMPLE  = T");
    }
}
