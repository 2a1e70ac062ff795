//! # coverage-model
//!
//! Span statistics, merge indexing, and tagged object marshalling for a
//! chunked, multi-parameter time-series store.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust
//! use coverage_model::prelude::*;
//! use std::collections::BTreeMap;
//!
//! let mut params = BTreeMap::new();
//! params.insert("time".to_string(), ColumnData::from(vec![0_i64, 99]));
//! let span = Span::with_ingest_time("span-1", "cov-1", params, 0.0);
//!
//! let mut collection = SpanCollectionByFile::new();
//! collection.add_span(span.get_span_stats(None).unwrap()).unwrap();
//! assert_eq!(collection.get_dirty_spans().len(), 1);
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Codec contracts for span payloads.
pub mod codec {
    pub use coverage_model_core::span::codec::{
        CodecError, Compressor, CompressorSet, Decompressor, DecompressorSet,
    };
}

/// Literal codec behind the tuple and string encodings.
pub mod literal {
    pub use coverage_model_core::literal::{Literal, LiteralError};
}

pub use coverage_model_core::address::{Address, AddressError};
pub use coverage_model_core::basic_types::domain::{
    Constraint, DomainError, DomainOfApplication, SliceSpec, get_valid_domain_of_application,
};
pub use coverage_model_core::basic_types::identity::{AbstractBase, AbstractIdentifiable};
pub use coverage_model_core::basic_types::storage::{AbstractStorage, InMemoryStorage, StorageError};
pub use coverage_model_core::basic_types::{AxisType, Mutability, Variability, create_guid};
pub use coverage_model_core::dictable::{
    DictMap, Dictable, DictableError, DictableRegistry, DictableType, FieldValue, RequiredFields,
    TypeTag,
};
pub use coverage_model_core::span::{Span, SpanError};
pub use coverage_model_core::span_collection::{
    CollectionError, SharedSpanCollection, SpanCollectionByFile, SpanStatsCollection,
};
pub use coverage_model_core::span_stats::{SpanStats, SpanStatsError};
pub use coverage_model_core::value::{ColumnData, DType, ParamRange, ParamValue, ValueError};
