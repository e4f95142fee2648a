//! Font handling for the replacement core.
//!
//! Covers the two pieces text replacement actually needs: ToUnicode CMap
//! parsing/synthesis/serialization (`cmap`), document-wide character/code
//! usage aggregation (`catalogue`), and the embedded-TrueType-program pair
//! used when a replacement needs a code the font doesn't already have
//! (`truetype_parser` for native advance widths, `font_subsetter` for
//! extending `glyf`/`loca`/`hmtx`/`cmap` tables in place).

pub mod cmap;
/// Document-wide font character/code usage aggregation for text replacement.
pub mod catalogue;
pub mod font_subsetter;
/// TrueType/OpenType font parser for PDF embedding.
pub mod truetype_parser;

pub use cmap::{parse_tounicode_cmap, synthesize_winansi, CMap, LazyCMap};
pub use font_subsetter::FontSubsetter;
pub use truetype_parser::{FontMetrics, TrueTypeError, TrueTypeFont, TrueTypeResult};
