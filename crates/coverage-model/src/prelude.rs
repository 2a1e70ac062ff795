//! Wrapper prelude.
//!
//! The `coverage-model` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::codec::{Compressor, CompressorSet, Decompressor, DecompressorSet};
pub use crate::{
    AbstractBase, AbstractIdentifiable, AbstractStorage, Address, CollectionError, ColumnData,
    DType, Dictable, DictableError, DictableRegistry, DictableType, DomainOfApplication,
    InMemoryStorage, ParamRange, ParamValue, SharedSpanCollection, Span, SpanCollectionByFile,
    SpanError, SpanStats, SpanStatsCollection, SpanStatsError,
};
