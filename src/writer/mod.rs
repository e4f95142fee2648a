//! PDF object serialization used by `PdfDocument::save`.
//!
//! The rest of the teacher's creation-side writer stack (content stream
//! builders, annotation/form/image builders, the fluent `DocumentBuilder`
//! API) has no counterpart here: this crate rewrites content streams and
//! font dictionaries in place, it doesn't assemble documents from scratch.

mod object_serializer;

pub use object_serializer::ObjectSerializer;
