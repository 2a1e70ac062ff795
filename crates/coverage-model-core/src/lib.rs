//! Core engine for the coverage model's span metadata layer.
//!
//! This crate tracks, per physical storage unit, the value range each
//! parameter currently holds, and carries the tagged marshalling used to
//! persist coverage-model objects:
//!
//! - Ingest spans (`span`) summarize themselves as per-address range records
//!   (`span_stats`), which collections merge per container and hand out as a
//!   dirty set for persistence (`span_collection`).
//! - Addresses (`address`) name containers and regions; records, addresses
//!   and collections all have exact dict, tuple and literal-text encodings
//!   built on a small non-executing literal codec (`literal`).
//! - Typed columns, values and ranges (`value`).
//! - The Dictable tagged-mapping framework with an explicit type registry
//!   (`dictable`) and the primitives it ships with (`basic_types`).
//!
//! The crate performs no I/O. Callers own persistence: they poll
//! `get_dirty_spans`, write, then clear the flags of what they wrote.
#![deny(missing_docs)]
pub mod address;
pub mod basic_types;
pub mod dictable;
pub mod literal;
pub mod span;
pub mod span_collection;
pub mod span_stats;
pub mod value;
