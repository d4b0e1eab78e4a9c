//! Ports to the collaborating subsystems `spec.md` §1 treats as already
//! implemented elsewhere: HDU navigation, row-filter evaluation, histogram
//! generation and template-card parsing. This crate only needs to *call*
//! them at the right points in the handle lifecycle; it never implements
//! their internals. Modeled as traits so `handle.rs` can depend on an
//! abstract collaborator rather than a concrete format engine, the same
//! seam the teacher crate draws between its message layer and the
//! transports that carry it.

use crate::binspec::BinSpec;
use crate::error::Result;
use crate::extspec::ExtensionSpec;

/// Moves the "current HDU" pointer of an already-open file and reports
/// what's there. `spec.md` §4.F/§6 calls this collaborator from `reopen`,
/// `create_from_template`'s post-processing, and extension selection.
pub trait HduBackend {
    /// Moves to the primary HDU (HDU #1). Called whenever a handle is
    /// (re)attached to a file with no extension spec in its URL.
    fn move_to_first(&mut self) -> Result<()>;

    /// Moves to the 1-based absolute HDU number `n`.
    fn move_to_absolute(&mut self, n: u32) -> Result<()>;

    /// Moves to the next HDU whose `EXTNAME`/`EXTVER` (or `HDUNAME`) and
    /// kind match `spec`. `HduKind::Any` matches every kind.
    fn move_to_named(&mut self, spec: &ExtensionSpec) -> Result<()>;

    /// 1-based number of the HDU the backend is currently positioned on.
    fn current_hdu_number(&self) -> u32;
}

/// Evaluates a boolean row-selection expression (`spec.md` §4.F's
/// `select_and_replace`) against the rows of a named extension and copies
/// the matching rows into a scratch destination file.
pub trait RowFilterBackend {
    /// Copies every row of `extname` in `source` for which `expression`
    /// evaluates true into `dest`. Returns the number of rows copied.
    fn select_rows(
        &mut self,
        source: &str,
        extname: &str,
        expression: &str,
        dest: &str,
    ) -> Result<u64>;
}

/// Builds a histogram image from a decoded binning specification
/// (`spec.md` §4.C's consumer).
pub trait HistogramBackend {
    /// Writes a new image HDU into `dest`, binning `source`'s rows
    /// according to `spec`. Returns the number of events binned.
    fn make_histogram(&mut self, source: &str, spec: &BinSpec, dest: &str) -> Result<u64>;
}

/// Parses FITS header template files used by `create_from_template`
/// (`spec.md` §4.G). The format-then-text fallback in `template.rs` calls
/// this once per candidate parse strategy.
pub trait TemplateCardParser {
    /// Parses `template_text` as a sequence of header cards, applying them
    /// to the file being created. Returns an error (without partially
    /// applying cards) if any line in the template is malformed for the
    /// strategy this parser implements.
    fn apply_template(&mut self, template_text: &str) -> Result<()>;
}

/// A deterministic, in-memory fake of the four collaborator ports, used
/// only by this crate's own tests. It does not attempt to emulate the
/// real format engine; it just records what it was asked to do so tests
/// can assert on call sequences and return canned results.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    pub struct FakeBackend {
        pub current_hdu: RefCell<u32>,
        pub hdu_count: u32,
        pub selected_rows: RefCell<Vec<(String, String, String, String)>>,
        pub histograms: RefCell<Vec<(String, String)>>,
        pub applied_templates: RefCell<Vec<String>>,
        pub fail_named_lookup: bool,
    }

    impl FakeBackend {
        pub fn new(hdu_count: u32) -> Self {
            FakeBackend {
                current_hdu: RefCell::new(1),
                hdu_count,
                ..Default::default()
            }
        }
    }

    impl HduBackend for FakeBackend {
        fn move_to_first(&mut self) -> Result<()> {
            *self.current_hdu.borrow_mut() = 1;
            Ok(())
        }

        fn move_to_absolute(&mut self, n: u32) -> Result<()> {
            if n == 0 || n > self.hdu_count {
                return Err(crate::error::Error::Collaborator(format!(
                    "HDU number {n} out of range (file has {} HDUs)",
                    self.hdu_count
                )));
            }
            *self.current_hdu.borrow_mut() = n;
            Ok(())
        }

        fn move_to_named(&mut self, _spec: &ExtensionSpec) -> Result<()> {
            if self.fail_named_lookup {
                return Err(crate::error::Error::Collaborator(
                    "no matching HDU found".to_string(),
                ));
            }
            *self.current_hdu.borrow_mut() = 2;
            Ok(())
        }

        fn current_hdu_number(&self) -> u32 {
            *self.current_hdu.borrow()
        }
    }

    impl RowFilterBackend for FakeBackend {
        fn select_rows(
            &mut self,
            source: &str,
            extname: &str,
            expression: &str,
            dest: &str,
        ) -> Result<u64> {
            self.selected_rows.borrow_mut().push((
                source.to_string(),
                extname.to_string(),
                expression.to_string(),
                dest.to_string(),
            ));
            Ok(0)
        }
    }

    impl HistogramBackend for FakeBackend {
        fn make_histogram(&mut self, source: &str, _spec: &BinSpec, dest: &str) -> Result<u64> {
            self.histograms
                .borrow_mut()
                .push((source.to_string(), dest.to_string()));
            Ok(0)
        }
    }

    impl TemplateCardParser for FakeBackend {
        fn apply_template(&mut self, template_text: &str) -> Result<()> {
            self.applied_templates
                .borrow_mut()
                .push(template_text.to_string());
            Ok(())
        }
    }
}
