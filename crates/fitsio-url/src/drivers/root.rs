//! The `root://` driver (feature `network`): registered for prefix-lookup
//! completeness (`spec.md` §4.D lists it among the built-ins) but left
//! deliberately unimplemented. The real ROOT/XRootD wire protocol is out
//! of scope for this crate — no testable property or end-to-end scenario
//! in `spec.md` §8 exercises it, and no example in this corpus speaks it
//! either. See `DESIGN.md` for the scope note.

use crate::driver::Driver;

#[derive(Default)]
pub struct RootDriver;

impl Driver for RootDriver {
    fn prefix(&self) -> &'static str {
        "root://"
    }
}
