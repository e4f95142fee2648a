//! PDF content stream handling.
//!
//! The replacement core only needs a byte-preserving scanner over a narrow
//! operator subset (`Tf`/`Tm`/`Tj`/`TJ`), not a full content-stream
//! interpreter.

/// Byte-preserving scanner used by text replacement.
pub mod replace_scan;

pub use replace_scan::{scan, ShowOp, TextRun, Token};
