//! Component F — the file-handle lifecycle (`spec.md` §4.F), the largest
//! and most central component of this crate. `SharedFile` is the
//! reference-counted open-file state; `FileHandle` is the user-visible
//! cursor that may share one with sibling handles produced by reuse
//! detection or [`reopen`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::backend::{HduBackend, HistogramBackend, RowFilterBackend};
use crate::binspec::parse_binspec;
use crate::dispatch;
use crate::driver::{Driver, DriverHandle, OpenMode};
use crate::error::{Error, Result};
use crate::extspec::{parse_extspec, ExtensionSpec};
use crate::registry::{DriverRegistry, OpenFileRegistry};
use crate::url::{parse_input, parse_output, ParsedUrl};

/// The reference-counted, owning half of an open file (`spec.md` §3).
/// Never constructed directly by callers; always reached through a
/// [`SharedFile`] handle.
pub struct SharedFileInner {
    pub driver: Arc<dyn Driver>,
    pub driver_handle: DriverHandle,
    pub filename: String,
    pub urltype: String,
    pub infile: String,
    pub rowfilter: String,
    pub binspec: String,
    pub colspec: String,
    pub filesize: AtomicU64,
    pub logfilesize: AtomicU64,
    pub writemode: OpenMode,
    pub datastart: Mutex<Option<u64>>,
    open_count: AtomicU64,
}

/// A cloneable reference to an open [`SharedFileInner`]. Cloning bumps the
/// driver-level reference count the same way a second `Handle` sharing
/// the file would in the reference implementation; dropping the last
/// clone does *not* itself close the driver — callers must call
/// [`close`] explicitly, matching `spec.md` §4.F's "close is invoked only
/// when open_count reaches 0" (a destructor can't see the registry or
/// report `FILE_NOT_CLOSED`, so this crate never relies on `Drop` for the
/// user-observable close behavior).
#[derive(Clone)]
pub struct SharedFile {
    pub(crate) inner: Arc<SharedFileInner>,
}

impl SharedFile {
    pub(crate) fn from_weak(weak: &Weak<SharedFileInner>) -> Option<SharedFile> {
        weak.upgrade().map(|inner| SharedFile { inner })
    }

    pub fn filename(&self) -> &str {
        &self.inner.filename
    }

    pub fn urltype(&self) -> &str {
        &self.inner.urltype
    }

    pub fn open_count(&self) -> u64 {
        self.inner.open_count.load(Ordering::SeqCst)
    }

    fn same_identity(&self, urltype: &str, infile: &str) -> bool {
        self.inner.urltype == urltype && self.inner.infile == infile
    }
}

/// A user-visible cursor onto an open file: a [`SharedFile`] plus this
/// handle's own current HDU position. Multiple `FileHandle`s may share
/// one `SharedFile` (`spec.md` §3's `Handle`).
pub struct FileHandle {
    pub shared: SharedFile,
    pub hdu_position: u32,
}

fn trim_leading_spaces(s: &str) -> &str {
    s.trim_start_matches(' ')
}

/// The per-prefix reroute target `spec.md` §4.F step 6 names by example:
/// gzip detection switches `file://` to `compress://`; an HTTP HEAD probe
/// that finds the server can't serve byte ranges switches `http://` to
/// `httpfile://` so the whole body gets cached instead of streamed.
fn reroute_target(urltype: &str) -> Option<&'static str> {
    match urltype {
        "file://" => Some("compress://"),
        "http://" => Some("httpfile://"),
        _ => None,
    }
}

fn invoke_checkfile(
    registry: &DriverRegistry,
    driver: &mut Arc<dyn Driver>,
    urltype: &mut String,
    infile: &mut String,
) -> Result<()> {
    // `checkfile` is an optional rewriter (`spec.md` §4.F step 6):
    // `FileDriver::check_file` sniffs the leading bytes of `infile` for the
    // gzip magic number, and `HttpDriver::check_file` issues a HEAD probe;
    // either reports `false` when the URL needs a different prefix.
    if driver.check_file(infile)? {
        return Ok(());
    }
    if let Some(target) = reroute_target(urltype) {
        *urltype = target.to_string();
        *driver = registry.lookup(urltype)?;
    }
    Ok(())
}

/// Opens an existing file, running the full reuse-detection, extension
/// navigation, row-filter and binning pipeline described in `spec.md`
/// §4.F.
pub fn open<H: HduBackend, R: RowFilterBackend, B: HistogramBackend>(
    registry: &DriverRegistry,
    hdu: &mut H,
    rowfilter_backend: &mut R,
    histogram_backend: &mut B,
    name: &str,
    mode: OpenMode,
) -> Result<FileHandle> {
    let trimmed = trim_leading_spaces(name);
    if trimmed.is_empty() {
        return Err(Error::FileNotOpened("empty file name".to_string()));
    }

    let mut parsed = parse_input(trimmed)?;

    // Reuse detection (`spec.md` §4.F step 5): see if any currently open
    // `SharedFile` already names this transport+path.
    for candidate in registry.open_files() {
        if !candidate.same_identity(&parsed.urltype, &parsed.infile) {
            continue;
        }
        let no_transform_either_side = parsed.rowfilter.is_empty()
            && parsed.binspec.is_empty()
            && parsed.colspec.is_empty()
            && candidate.inner.rowfilter.is_empty()
            && candidate.inner.binspec.is_empty()
            && candidate.inner.colspec.is_empty();
        let transforms_match = parsed.rowfilter == candidate.inner.rowfilter
            && parsed.binspec == candidate.inner.binspec
            && parsed.colspec == candidate.inner.colspec;
        if no_transform_either_side || transforms_match {
            candidate.inner.open_count.fetch_add(1, Ordering::SeqCst);
            let mut handle = FileHandle {
                shared: candidate,
                hdu_position: 0,
            };
            if !parsed.binspec.is_empty() {
                parsed.extspec.clear();
            }
            move_to_extension(hdu, &mut handle, &parsed.extspec)?;
            return Ok(handle);
        }
    }

    let mut driver = registry.lookup(&parsed.urltype)?;
    invoke_checkfile(registry, &mut driver, &mut parsed.urltype, &mut parsed.infile)?;

    let driver_handle = dispatch::open(driver.as_ref(), &parsed.infile, mode)?;
    let filesize = match dispatch::size(driver.as_ref(), driver_handle) {
        Ok(n) => n,
        Err(e) => {
            dispatch::close(driver.as_ref(), driver_handle).ok();
            return Err(e);
        }
    };

    let inner = Arc::new(SharedFileInner {
        driver,
        driver_handle,
        filename: trimmed.to_string(),
        urltype: parsed.urltype.clone(),
        infile: parsed.infile.clone(),
        rowfilter: parsed.rowfilter.clone(),
        binspec: parsed.binspec.clone(),
        colspec: parsed.colspec.clone(),
        filesize: AtomicU64::new(filesize),
        logfilesize: AtomicU64::new(filesize),
        writemode: mode,
        datastart: Mutex::new(None),
        open_count: AtomicU64::new(1),
    });
    let shared = SharedFile { inner };
    registry.track_open_file(&shared);

    let mut handle = FileHandle {
        shared,
        hdu_position: 1,
    };
    hdu.move_to_first()?;

    move_to_extension(hdu, &mut handle, &parsed.extspec)?;

    if !parsed.rowfilter.is_empty() {
        select_and_replace(registry, rowfilter_backend, &mut handle, &parsed.rowfilter)?;
    }

    if !parsed.binspec.is_empty() {
        let spec = parse_binspec(&parsed.binspec)?;
        materialize_histogram(registry, histogram_backend, &mut handle, &spec)?;
    }

    Ok(handle)
}

/// Monotonic suffix for the scratch `mem://` names `select_and_replace` and
/// [`materialize_histogram`] mint, so concurrent opens never collide on the
/// in-memory driver's name table.
static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a fresh, empty `mem://` scratch file through the driver
/// registry and returns the pieces needed to build a [`SharedFileInner`]
/// around it: the driver, its driver handle, and the bare (prefix-less)
/// name the `mem://` driver keys it under.
fn create_mem_scratch(registry: &DriverRegistry, label: &str) -> Result<(Arc<dyn Driver>, DriverHandle, String)> {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
    let infile = format!("{label}-scratch-{n}.fits");
    let driver = registry.lookup("mem://")?;
    let driver_handle = dispatch::create(driver.as_ref(), &infile)?;
    Ok((driver, driver_handle, infile))
}

/// Closes the driver-level resource behind `inner` directly, bypassing the
/// `open_count` bookkeeping in [`close`]. Only safe to call on a
/// `SharedFileInner` known to have no other `FileHandle` sharing it — true
/// of the freshly opened file `select_and_replace`/`materialize_histogram`
/// are about to discard, since reuse-detection and `reopen` never produce
/// more than one reference before the row-filter/binning step runs.
fn close_source(inner: &SharedFileInner) -> Result<()> {
    dispatch::close(inner.driver.as_ref(), inner.driver_handle)
        .map_err(|_| Error::FileNotClosed(inner.filename.clone()))
}

fn move_to_extension<H: HduBackend>(
    hdu: &mut H,
    handle: &mut FileHandle,
    extspec: &str,
) -> Result<()> {
    if extspec.is_empty() {
        return Ok(());
    }
    match parse_extspec(extspec)? {
        ExtensionSpec::Index(n) => hdu.move_to_absolute(n + 1).map_err(|_| {
            Error::Collaborator(format!("could not move to extension index {n}"))
        })?,
        ExtensionSpec::Named { name, version, kind } => {
            hdu.move_to_named(&ExtensionSpec::Named {
                name: name.clone(),
                version,
                kind,
            })
            .map_err(|_| {
                Error::Collaborator(format!(
                    "could not find extension named {name:?} version {version} kind {kind:?}"
                ))
            })?
        }
    }
    handle.hdu_position = hdu.current_hdu_number();
    Ok(())
}

/// `spec.md` §4.F's `select_and_replace`: creates a scratch file at
/// `"mem://"`, asks `backend` to copy HDUs 1..current-1 verbatim, the
/// current HDU's header (with `NAXIS2=0`) and only the rows of the current
/// extension matching `rowfilter`, and the trailing HDUs (the HDU-copying
/// and header-rewrite steps are the `RowFilterBackend` collaborator's own
/// responsibility — `spec.md` §1 treats `select_rows` as already
/// implemented elsewhere; this function's job is the orchestration around
/// it: mint the scratch file, invoke the collaborator, close the source,
/// and re-point the caller's handle at the scratch, still positioned on
/// the originally selected HDU).
pub fn select_and_replace<R: RowFilterBackend>(
    registry: &DriverRegistry,
    backend: &mut R,
    handle: &mut FileHandle,
    rowfilter: &str,
) -> Result<()> {
    let expr = rowfilter.trim_start_matches('[').trim_end_matches(']');
    let source = handle.shared.inner.infile.clone();
    let extname = handle.hdu_position.to_string();

    let (driver, driver_handle, infile) = create_mem_scratch(registry, "rowselect")?;
    let dest_url = format!("mem://{infile}");

    backend.select_rows(&source, &extname, expr, &dest_url)?;

    let filesize = dispatch::size(driver.as_ref(), driver_handle)?;

    close_source(&handle.shared.inner)?;

    let inner = Arc::new(SharedFileInner {
        driver,
        driver_handle,
        filename: dest_url.clone(),
        urltype: "mem://".to_string(),
        infile,
        rowfilter: String::new(),
        binspec: String::new(),
        colspec: String::new(),
        filesize: AtomicU64::new(filesize),
        logfilesize: AtomicU64::new(filesize),
        writemode: OpenMode::ReadWrite,
        datastart: Mutex::new(None),
        open_count: AtomicU64::new(1),
    });
    registry.track_open_file(&SharedFile { inner: Arc::clone(&inner) });
    handle.shared = SharedFile { inner };
    // The filtered extension lands at the same HDU index in the scratch
    // file (HDUs 1..current-1 were copied verbatim ahead of it), so
    // `handle.hdu_position` already names the right HDU; nothing to move.
    Ok(())
}

/// `spec.md` §4.F step 13: parses and runs the binning specification,
/// replacing the caller's `SharedFile` with the synthesized histogram
/// image the same way [`select_and_replace`] replaces it with the
/// row-filtered scratch file ("the call replaces `*fptr` with the
/// histogram handle").
fn materialize_histogram<B: HistogramBackend>(
    registry: &DriverRegistry,
    backend: &mut B,
    handle: &mut FileHandle,
    spec: &crate::binspec::BinSpec,
) -> Result<()> {
    let source = handle.shared.inner.infile.clone();
    let (driver, driver_handle, infile) = create_mem_scratch(registry, "histogram")?;
    let dest_url = format!("mem://{infile}");

    backend.make_histogram(&source, spec, &dest_url)?;

    let filesize = dispatch::size(driver.as_ref(), driver_handle)?;

    close_source(&handle.shared.inner)?;

    let inner = Arc::new(SharedFileInner {
        driver,
        driver_handle,
        filename: dest_url.clone(),
        urltype: "mem://".to_string(),
        infile,
        rowfilter: String::new(),
        binspec: String::new(),
        colspec: String::new(),
        filesize: AtomicU64::new(filesize),
        logfilesize: AtomicU64::new(filesize),
        writemode: OpenMode::ReadWrite,
        datastart: Mutex::new(None),
        open_count: AtomicU64::new(1),
    });
    registry.track_open_file(&SharedFile { inner: Arc::clone(&inner) });
    handle.shared = SharedFile { inner };
    // The histogram is a freshly synthesized primary HDU.
    handle.hdu_position = 1;
    Ok(())
}

/// `spec.md` §4.F's `reopen`: a new handle sharing the same `SharedFile`,
/// `HDUposition` reset to 0, never duplicating the driver handle.
pub fn reopen(shared: &SharedFile) -> FileHandle {
    shared.inner.open_count.fetch_add(1, Ordering::SeqCst);
    FileHandle {
        shared: shared.clone(),
        hdu_position: 0,
    }
}

/// `spec.md` §4.F's `open_memory`: the URL is always `memkeep://`; the
/// in-core buffer is registered with the memory driver before the normal
/// open pipeline resumes from size/HDU-parse onward.
pub fn open_memory<H: HduBackend>(
    registry: &DriverRegistry,
    hdu: &mut H,
    driver_handle: DriverHandle,
) -> Result<FileHandle> {
    let driver = registry.lookup("memkeep://")?;
    let filesize = dispatch::size(driver.as_ref(), driver_handle)?;
    let inner = Arc::new(SharedFileInner {
        driver,
        driver_handle,
        filename: "memkeep://".to_string(),
        urltype: "memkeep://".to_string(),
        infile: String::new(),
        rowfilter: String::new(),
        binspec: String::new(),
        colspec: String::new(),
        filesize: AtomicU64::new(filesize),
        logfilesize: AtomicU64::new(filesize),
        writemode: OpenMode::ReadWrite,
        datastart: Mutex::new(None),
        open_count: AtomicU64::new(1),
    });
    let shared = SharedFile { inner };
    registry.track_open_file(&shared);
    hdu.move_to_first()?;
    Ok(FileHandle {
        shared,
        hdu_position: 1,
    })
}

/// `spec.md` §4.F's `create`: honors a leading `!` clobber marker, then
/// creates a brand-new, empty `SharedFile` in read-write mode.
pub fn create(registry: &DriverRegistry, name: &str) -> Result<FileHandle> {
    let trimmed = trim_leading_spaces(name);
    let (clobber, rest) = match trimmed.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (urltype, outfile) = parse_output(rest);
    let driver = registry.lookup(&urltype)?;

    if clobber {
        driver.remove(&outfile).ok();
    }

    let driver_handle = dispatch::create(driver.as_ref(), &outfile)?;

    let inner = Arc::new(SharedFileInner {
        driver,
        driver_handle,
        filename: trimmed.to_string(),
        urltype,
        infile: outfile,
        rowfilter: String::new(),
        binspec: String::new(),
        colspec: String::new(),
        filesize: AtomicU64::new(0),
        logfilesize: AtomicU64::new(0),
        writemode: OpenMode::ReadWrite,
        datastart: Mutex::new(None),
        open_count: AtomicU64::new(1),
    });
    let shared = SharedFile { inner };
    registry.track_open_file(&shared);

    Ok(FileHandle {
        shared,
        hdu_position: 1,
    })
}

/// `spec.md` §4.F's `create_from_template`: create the new file, then
/// replay the template's header cards, trying the format parse first and
/// falling back to line-oriented text on failure (`SPEC_FULL.md` §4.G).
pub fn create_from_template<T: crate::backend::TemplateCardParser>(
    registry: &DriverRegistry,
    parser: &mut T,
    name: &str,
    template: &str,
) -> Result<FileHandle> {
    let handle = create(registry, name)?;
    crate::template::apply_template(parser, template)?;
    Ok(handle)
}

/// `spec.md` §4.F's `close`: decrements the reference count, invoking the
/// driver's `close` only once it reaches zero.
pub fn close(handle: FileHandle) -> Result<()> {
    let remaining = handle
        .shared
        .inner
        .open_count
        .fetch_sub(1, Ordering::SeqCst)
        - 1;
    if remaining == 0 {
        dispatch::close(
            handle.shared.inner.driver.as_ref(),
            handle.shared.inner.driver_handle,
        )
        .map_err(|_| Error::FileNotClosed(handle.shared.inner.filename.clone()))?;
    }
    Ok(())
}

/// `spec.md` §4.F's `delete`: closes like [`close`], additionally asking
/// the driver to remove the underlying file by its basename.
pub fn delete(handle: FileHandle) -> Result<()> {
    let parsed: ParsedUrl = parse_input(&handle.shared.inner.filename)?;
    let driver = Arc::clone(&handle.shared.inner.driver);
    let infile = parsed.infile.clone();
    close(handle)?;
    driver.remove(&infile).or(Ok(()))
}

/// `spec.md` §4.F's `truncate`: a silent no-op when the driver doesn't
/// support it (`dispatch::truncate` already absorbs `Unsupported`).
pub fn truncate(handle: &FileHandle, new_size: u64) -> Result<()> {
    dispatch::flush(
        handle.shared.inner.driver.as_ref(),
        handle.shared.inner.driver_handle,
    )?;
    dispatch::truncate(
        handle.shared.inner.driver.as_ref(),
        handle.shared.inner.driver_handle,
        new_size,
    )?;
    handle.shared.inner.filesize.store(new_size, Ordering::SeqCst);
    handle
        .shared
        .inner
        .logfilesize
        .store(new_size, Ordering::SeqCst);
    Ok(())
}

/// `spec.md` §4.F's `extension_of`: resolves a URL to the 1-based HDU
/// number it names without leaving a handle open, or `-99` if it names
/// none.
pub fn extension_of<H: HduBackend>(
    registry: &DriverRegistry,
    hdu: &mut H,
    rowfilter_backend: &mut impl RowFilterBackend,
    histogram_backend: &mut impl HistogramBackend,
    url: &str,
) -> Result<i64> {
    let parsed = parse_input(url)?;

    if !parsed.binspec.is_empty() {
        return Ok(1);
    }

    if parsed.extspec.is_empty() {
        return Ok(-99);
    }

    match parse_extspec(&parsed.extspec)? {
        ExtensionSpec::Index(n) => Ok(n as i64 + 1),
        ExtensionSpec::Named { .. } => {
            if parsed.urltype == "stdin://" {
                return Err(Error::UrlParse(
                    "named extension lookup is not supported on stdin://".to_string(),
                ));
            }
            let handle = open(
                registry,
                hdu,
                rowfilter_backend,
                histogram_backend,
                url,
                OpenMode::ReadOnly,
            )?;
            let n = handle.hdu_position as i64;
            close(handle)?;
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testutil::FakeBackend;
    use crate::drivers;

    fn fresh_registry() -> &'static DriverRegistry {
        DriverRegistry::init_library().unwrap()
    }

    #[test]
    fn open_empty_name_is_an_error() {
        let registry = fresh_registry();
        let mut hdu = FakeBackend::new(1);
        let mut rf = FakeBackend::new(1);
        let mut hist = FakeBackend::new(1);
        let err = open(registry, &mut hdu, &mut rf, &mut hist, "   ", OpenMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, Error::FileNotOpened(_)));
    }

    #[test]
    fn create_then_close_roundtrip() {
        let registry = fresh_registry();
        let handle = create(registry, "mem://scratch.fits").unwrap();
        assert_eq!(handle.shared.open_count(), 1);
        close(handle).unwrap();
    }

    #[test]
    fn reopen_shares_shared_file_and_resets_position() {
        let registry = fresh_registry();
        let handle = create(registry, "mem://scratch2.fits").unwrap();
        let second = reopen(&handle.shared);
        assert_eq!(second.hdu_position, 0);
        assert_eq!(handle.shared.open_count(), 2);
        close(second).unwrap();
        close(handle).unwrap();
    }

    #[test]
    fn extension_of_with_index_does_not_need_a_backend_call() {
        let registry = fresh_registry();
        let mut hdu = FakeBackend::new(3);
        let mut rf = FakeBackend::new(3);
        let mut hist = FakeBackend::new(3);
        let n = extension_of(registry, &mut hdu, &mut rf, &mut hist, "mem://x.fits[2]").unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn extension_of_with_no_extspec_is_sentinel() {
        let registry = fresh_registry();
        let mut hdu = FakeBackend::new(3);
        let mut rf = FakeBackend::new(3);
        let mut hist = FakeBackend::new(3);
        let n = extension_of(registry, &mut hdu, &mut rf, &mut hist, "mem://x.fits").unwrap();
        assert_eq!(n, -99);
    }

    #[test]
    fn extension_of_with_binspec_is_always_one() {
        let registry = fresh_registry();
        let mut hdu = FakeBackend::new(3);
        let mut rf = FakeBackend::new(3);
        let mut hist = FakeBackend::new(3);
        let n = extension_of(
            registry,
            &mut hdu,
            &mut rf,
            &mut hist,
            "mem://x.fits[bin x,y]",
        )
        .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn truncate_is_a_silent_no_op_for_unsupporting_drivers() {
        let registry = fresh_registry();
        let handle = create(registry, "mem://trunc.fits").unwrap();
        // The in-memory driver implements truncate, so this should succeed
        // and update the recorded size.
        truncate(&handle, 128).unwrap();
        assert_eq!(handle.shared.inner.filesize.load(Ordering::SeqCst), 128);
        close(handle).unwrap();
    }

    #[allow(dead_code)]
    fn silence_unused_driver_import() {
        let _ = drivers::mem::MemDriver::keep(false);
    }
}
