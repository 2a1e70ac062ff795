//! Per-parameter compressor/decompressor contracts.
//!
//! Codec implementations live outside this crate; a span only needs to look
//! one up by parameter name and call it. Sets are keyed by parameter name and
//! share codecs through `Arc` so one codec instance can serve many
//! parameters.

use std::{collections::HashMap, sync::Arc};

use snafu::prelude::*;

use crate::value::ColumnData;

/// Errors reported by codec implementations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    /// The codec could not encode the column.
    #[snafu(display("Failed to compress parameter data: {message}"))]
    Compress {
        /// Codec-specific description.
        message: String,
    },

    /// The codec could not decode the bytes.
    #[snafu(display("Failed to decompress parameter data: {message}"))]
    Decompress {
        /// Codec-specific description.
        message: String,
    },
}

/// Encodes one parameter's column into bytes.
pub trait Compressor: Send + Sync {
    /// Compress a column.
    fn compress(&self, data: &ColumnData) -> Result<Vec<u8>, CodecError>;
}

/// Decodes bytes produced by the matching [`Compressor`].
pub trait Decompressor: Send + Sync {
    /// Decompress a column.
    fn decompress(&self, bytes: &[u8]) -> Result<ColumnData, CodecError>;
}

/// Compressors keyed by parameter name.
pub type CompressorSet = HashMap<String, Arc<dyn Compressor>>;

/// Decompressors keyed by parameter name.
pub type DecompressorSet = HashMap<String, Arc<dyn Decompressor>>;
