//! URL parsing, driver dispatch and file-handle lifecycle for a FITS-like
//! binary table/image format.
//!
//! This crate implements three of the seven core components of the
//! reference format library: the URL/filename syntax parser ([`url`]),
//! the transport-prefix driver registry and dispatcher ([`registry`],
//! [`dispatch`], [`driver`], [`drivers`]), and the file-handle lifecycle
//! that orchestrates open-time side effects ([`handle`]). Record-level
//! buffered I/O, HDU navigation, row-filter evaluation, histogram
//! generation and template-card parsing remain external collaborators,
//! represented here as the trait ports in [`backend`].

pub mod backend;
pub mod binspec;
pub mod dispatch;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod extspec;
pub mod handle;
pub mod registry;
pub mod template;
pub mod url;

pub use binspec::{BinSpec, PixelKind};
pub use dispatch as io;
pub use driver::{Driver, DriverHandle, OpenMode};
pub use error::{Error, Result};
pub use extspec::{ExtensionSpec, HduKind};
pub use handle::{FileHandle, SharedFile};
pub use registry::DriverRegistry;
pub use url::{parse_input, parse_output, parse_root, ParsedUrl};
