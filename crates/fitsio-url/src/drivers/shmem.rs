//! The `shmem://` driver (feature `shared-memory`, Unix only): POSIX
//! shared-memory segments via `shm_open`/`mmap` (`spec.md` §4.D). On a
//! non-Unix target the feature still compiles but this driver registers
//! no working operations, matching "absence means not supported"
//! (`spec.md` §3).

use crate::driver::Driver;

#[cfg(unix)]
mod unix_impl {
    use std::ffi::CString;
    use std::sync::Mutex;

    use crate::driver::{Driver, DriverHandle, OpenMode};
    use crate::drivers::HandleTable;
    use crate::error::{Error, Result};

    struct Segment {
        fd: libc::c_int,
        ptr: *mut libc::c_void,
        len: usize,
        cursor: usize,
    }

    // SAFETY: the raw pointer only ever aliases memory owned exclusively by
    // this segment, accessed through the `HandleTable`'s mutex.
    unsafe impl Send for Segment {}

    #[derive(Default)]
    pub struct ShmemDriver {
        segments: HandleTable<Segment>,
        // Tracks segment length by name so a plain `open` (no prior size
        // known) can `fstat` it; POSIX shm segments have no directory
        // listing API, so this crate remembers what it created.
        names: Mutex<std::collections::HashMap<String, usize>>,
    }

    fn cname(url: &str) -> Result<CString> {
        let name = if let Some(stripped) = url.strip_prefix('/') {
            stripped.to_string()
        } else {
            url.to_string()
        };
        CString::new(format!("/{name}"))
            .map_err(|_| Error::UrlParse("shared-memory name contains a NUL byte".to_string()))
    }

    impl Driver for ShmemDriver {
        fn prefix(&self) -> &'static str {
            "shmem://"
        }

        fn create(&self, url: &str) -> Result<DriverHandle> {
            let name = cname(url)?;
            const INITIAL_LEN: usize = 4096;
            // SAFETY: `name` is a valid NUL-terminated C string; the fd
            // returned is checked below before any further use.
            let fd = unsafe {
                libc::shm_open(
                    name.as_ptr(),
                    libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC,
                    0o600,
                )
            };
            if fd < 0 {
                return Err(Error::FileNotCreated(format!("shm_open {url}: errno set")));
            }
            // SAFETY: fd is a valid, just-opened shared-memory descriptor.
            if unsafe { libc::ftruncate(fd, INITIAL_LEN as libc::off_t) } != 0 {
                unsafe { libc::close(fd) };
                return Err(Error::FileNotCreated(format!("ftruncate {url}: errno set")));
            }
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    INITIAL_LEN,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                unsafe { libc::close(fd) };
                return Err(Error::FileNotCreated(format!("mmap {url}: errno set")));
            }
            self.names
                .lock()
                .expect("shmem driver poisoned")
                .insert(url.to_string(), INITIAL_LEN);
            Ok(self.segments.insert(Segment {
                fd,
                ptr,
                len: INITIAL_LEN,
                cursor: 0,
            }))
        }

        fn open(&self, url: &str, _mode: OpenMode) -> Result<DriverHandle> {
            let name = cname(url)?;
            let len = *self
                .names
                .lock()
                .expect("shmem driver poisoned")
                .get(url)
                .ok_or_else(|| Error::FileNotOpened(format!("unknown shared-memory segment {url}")))?;
            let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, 0o600) };
            if fd < 0 {
                return Err(Error::FileNotOpened(format!("shm_open {url}: errno set")));
            }
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                unsafe { libc::close(fd) };
                return Err(Error::FileNotOpened(format!("mmap {url}: errno set")));
            }
            Ok(self.segments.insert(Segment {
                fd,
                ptr,
                len,
                cursor: 0,
            }))
        }

        fn close(&self, handle: DriverHandle) -> Result<()> {
            if let Some(seg) = self.segments.remove(handle) {
                unsafe {
                    libc::munmap(seg.ptr, seg.len);
                    libc::close(seg.fd);
                }
            }
            Ok(())
        }

        fn remove(&self, url: &str) -> Result<()> {
            let name = cname(url)?;
            self.names.lock().expect("shmem driver poisoned").remove(url);
            unsafe { libc::shm_unlink(name.as_ptr()) };
            Ok(())
        }

        fn size(&self, handle: DriverHandle) -> Result<u64> {
            self.segments
                .with(handle, |s| s.len as u64)
                .ok_or(Error::BadFilePtr)
        }

        fn seek(&self, handle: DriverHandle, offset: u64) -> Result<()> {
            self.segments
                .with(handle, |s| s.cursor = offset as usize)
                .ok_or(Error::BadFilePtr)
        }

        fn read(&self, handle: DriverHandle, buf: &mut [u8]) -> Result<()> {
            self.segments
                .with(handle, |s| {
                    if s.cursor + buf.len() > s.len {
                        return Err(Error::ReadError(
                            "read past end of shared-memory segment".to_string(),
                        ));
                    }
                    // SAFETY: bounds checked above; `ptr` is valid for `len`
                    // bytes for the lifetime of this mapping.
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            (s.ptr as *const u8).add(s.cursor),
                            buf.as_mut_ptr(),
                            buf.len(),
                        );
                    }
                    s.cursor += buf.len();
                    Ok(())
                })
                .ok_or(Error::BadFilePtr)?
        }

        fn write(&self, handle: DriverHandle, buf: &[u8]) -> Result<()> {
            self.segments
                .with(handle, |s| {
                    if s.cursor + buf.len() > s.len {
                        return Err(Error::WriteError(
                            "write past end of shared-memory segment".to_string(),
                        ));
                    }
                    // SAFETY: bounds checked above.
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            buf.as_ptr(),
                            (s.ptr as *mut u8).add(s.cursor),
                            buf.len(),
                        );
                    }
                    s.cursor += buf.len();
                    Ok(())
                })
                .ok_or(Error::BadFilePtr)?
        }
    }
}

#[cfg(unix)]
pub use unix_impl::ShmemDriver;

#[cfg(not(unix))]
#[derive(Default)]
pub struct ShmemDriver;

#[cfg(not(unix))]
impl Driver for ShmemDriver {
    fn prefix(&self) -> &'static str {
        "shmem://"
    }
}
