//! Ingest spans: one ingest event's parameter payload.
//!
//! A [`Span`] is created once per ingest and never mutated afterwards (apart
//! from attaching a default compressor set). It knows:
//!
//! - its identity (`id`, `coverage_id`, `ingest_time` in epoch seconds),
//! - the column of data received for every parameter,
//! - how to summarize itself as [`SpanStats`] for the merge index,
//! - how to travel as a JSON envelope.
//!
//! ## JSON envelope
//!
//! ```json
//! {"coverage_id": "cov-1", "id": "span-1", "ingest_time": 1700000000.5,
//!  "params": {"time": "<base64 of compressed bytes>"}}
//! ```
//!
//! `params` is present only when a compressor set is available. A span
//! encoded without compressors carries its metadata but not its payload.

pub mod codec;

use std::{cmp::Ordering, collections::BTreeMap, fmt};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    address::Address,
    span::codec::{CodecError, CompressorSet, DecompressorSet},
    span_stats::{SpanStats, SpanStatsError},
    value::ColumnData,
};

/// Errors raised while summarizing or (de)serializing a span.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SpanError {
    /// Building the statistics record failed.
    #[snafu(transparent)]
    Stats {
        /// Underlying SpanStats error.
        source: SpanStatsError,
    },

    /// No compressor is registered for a parameter being encoded.
    #[snafu(display("No compressor for parameter {param:?}"))]
    MissingCompressor {
        /// Parameter name.
        param: String,
    },

    /// No decompressor is registered for a parameter in the payload.
    #[snafu(display("No decompressor for parameter {param:?}"))]
    MissingDecompressor {
        /// Parameter name.
        param: String,
    },

    /// A codec failed on one parameter.
    #[snafu(display("Codec failure on parameter {param:?}: {source}"))]
    Codec {
        /// Parameter name.
        param: String,
        /// Underlying codec error.
        source: CodecError,
    },

    /// A parameter payload is not valid base64.
    #[snafu(display("Parameter {param:?} payload is not valid base64: {source}"))]
    InvalidPayload {
        /// Parameter name.
        param: String,
        /// Underlying decode error.
        source: base64::DecodeError,
    },

    /// The envelope is not valid JSON or lacks required fields.
    #[snafu(display("Invalid span JSON: {source}"))]
    Json {
        /// Underlying serde_json error.
        source: serde_json::Error,
    },
}

/// Wire layout of the JSON envelope. Fields are declared in sorted order so
/// the output keys are sorted.
#[derive(Debug, Serialize, Deserialize)]
struct SpanEnvelope {
    coverage_id: String,
    id: String,
    ingest_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<BTreeMap<String, String>>,
}

/// One ingest event's payload.
#[derive(Clone)]
pub struct Span {
    id: String,
    coverage_id: String,
    ingest_time: f64,
    param_dict: BTreeMap<String, ColumnData>,
    compressors: Option<CompressorSet>,
}

impl Span {
    /// Create a span stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        coverage_id: impl Into<String>,
        param_dict: BTreeMap<String, ColumnData>,
    ) -> Span {
        let now = Utc::now();
        Span::with_ingest_time(
            id,
            coverage_id,
            param_dict,
            now.timestamp_micros() as f64 / 1_000_000.0,
        )
    }

    /// Create a span with an explicit ingest time (epoch seconds).
    pub fn with_ingest_time(
        id: impl Into<String>,
        coverage_id: impl Into<String>,
        param_dict: BTreeMap<String, ColumnData>,
        ingest_time: f64,
    ) -> Span {
        Span {
            id: id.into(),
            coverage_id: coverage_id.into(),
            ingest_time,
            param_dict,
            compressors: None,
        }
    }

    /// Attach the compressor set used when `as_json` gets none.
    pub fn with_compressors(mut self, compressors: CompressorSet) -> Span {
        self.compressors = Some(compressors);
        self
    }

    /// Replace the default compressor set.
    pub fn set_compressors(&mut self, compressors: Option<CompressorSet>) {
        self.compressors = compressors;
    }

    /// Span identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning coverage.
    pub fn coverage_id(&self) -> &str {
        &self.coverage_id
    }

    /// Ingest time in epoch seconds.
    pub fn ingest_time(&self) -> f64 {
        self.ingest_time
    }

    /// Parameter columns, sorted by name.
    pub fn param_dict(&self) -> &BTreeMap<String, ColumnData> {
        &self.param_dict
    }

    /// Address equivalent to this span's identity.
    pub fn address(&self) -> Address {
        Address::id(self.id.as_str())
    }

    /// Summarize parameter ranges as a clean [`SpanStats`].
    ///
    /// `params` restricts the summary to the named parameters (default: all).
    /// Parameters that are absent or have no data are left out.
    pub fn get_span_stats(&self, params: Option<&[&str]>) -> Result<SpanStats, SpanError> {
        let names: Vec<&str> = match params {
            Some(names) => names.to_vec(),
            None => self.param_dict.keys().map(String::as_str).collect(),
        };

        let ranges: BTreeMap<String, _> = names
            .into_iter()
            .filter_map(|name| {
                let range = self.param_dict.get(name)?.range()?;
                Some((name.to_string(), range))
            })
            .collect();

        Ok(SpanStats::new(self.address(), ranges)?)
    }

    /// Encode the JSON envelope.
    ///
    /// `compressors` overrides the construction-time set. Every parameter
    /// needs a compressor once a set is in play; `indent` pretty-prints with
    /// that many spaces.
    pub fn as_json(
        &self,
        compressors: Option<&CompressorSet>,
        indent: Option<usize>,
    ) -> Result<String, SpanError> {
        let params = match compressors.or(self.compressors.as_ref()) {
            None => None,
            Some(set) => {
                let mut encoded = BTreeMap::new();
                for (param, data) in &self.param_dict {
                    let codec = set
                        .get(param)
                        .context(MissingCompressorSnafu { param })?;
                    let bytes = codec.compress(data).context(CodecSnafu { param })?;
                    encoded.insert(param.clone(), STANDARD.encode(bytes));
                }
                Some(encoded)
            }
        };

        let envelope = SpanEnvelope {
            coverage_id: self.coverage_id.clone(),
            id: self.id.clone(),
            ingest_time: self.ingest_time,
            params,
        };

        match indent {
            None => serde_json::to_string(&envelope).context(JsonSnafu),
            Some(width) => {
                let pad = " ".repeat(width);
                let mut out = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
                let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
                envelope.serialize(&mut ser).context(JsonSnafu)?;
                Ok(String::from_utf8_lossy(&out).into_owned())
            }
        }
    }

    /// Decode a JSON envelope produced by [`Span::as_json`].
    ///
    /// Every parameter in the payload must have a decompressor. An envelope
    /// without `params` decodes to a span with no parameter data.
    pub fn from_json(
        text: &str,
        decompressors: Option<&DecompressorSet>,
    ) -> Result<Span, SpanError> {
        let envelope: SpanEnvelope = serde_json::from_str(text).context(JsonSnafu)?;

        let mut param_dict = BTreeMap::new();
        for (param, payload) in envelope.params.unwrap_or_default() {
            let codec = decompressors
                .and_then(|set| set.get(&param))
                .context(MissingDecompressorSnafu { param: param.as_str() })?;
            let bytes = STANDARD
                .decode(payload.as_bytes())
                .context(InvalidPayloadSnafu { param: param.as_str() })?;
            let data = codec
                .decompress(&bytes)
                .context(CodecSnafu { param: param.as_str() })?;
            param_dict.insert(param, data);
        }

        Ok(Span::with_ingest_time(
            envelope.id,
            envelope.coverage_id,
            param_dict,
            envelope.ingest_time,
        ))
    }

    /// Structural fingerprint over `(id, ingest_time, coverage_id, sorted
    /// parameter names)`.
    ///
    /// Payload values do not take part: two spans with the same metadata and
    /// parameter names hash the same even if their data differ.
    pub fn get_hash(&self) -> String {
        let mut h = blake3::Hasher::new();
        h.update(b"span-hash-v1");
        h.update(b"\0");
        h.update(self.id.as_bytes());
        h.update(b"\0");
        h.update(&self.ingest_time.to_bits().to_le_bytes());
        h.update(b"\0");
        h.update(self.coverage_id.as_bytes());
        for name in self.param_dict.keys() {
            h.update(b"\0");
            h.update(name.as_bytes());
        }
        h.finalize().to_hex().to_string()
    }
}

/// Order spans by ingest time only.
pub fn cmp_span_by_ingest_time(a: &Span, b: &Span) -> Ordering {
    a.ingest_time.total_cmp(&b.ingest_time)
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.coverage_id == other.coverage_id
            && self.ingest_time == other.ingest_time
            && self.param_dict == other.param_dict
    }
}

impl PartialOrd for Span {
    /// Spans order by ingest time; distinct spans ingested at the same
    /// instant are incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.ingest_time.partial_cmp(&other.ingest_time)? {
            Ordering::Equal if self == other => Some(Ordering::Equal),
            Ordering::Equal => None,
            ord => Some(ord),
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codecs: Vec<&String> = self
            .compressors
            .iter()
            .flat_map(|set| set.keys())
            .collect();
        codecs.sort();
        f.debug_struct("Span")
            .field("id", &self.id)
            .field("coverage_id", &self.coverage_id)
            .field("ingest_time", &self.ingest_time)
            .field("param_dict", &self.param_dict)
            .field("compressors", &codecs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        span::codec::{Compressor, Decompressor},
        value::ParamRange,
    };

    struct JsonCodec;

    impl Compressor for JsonCodec {
        fn compress(&self, data: &ColumnData) -> Result<Vec<u8>, CodecError> {
            serde_json::to_vec(data).map_err(|e| CodecError::Compress {
                message: e.to_string(),
            })
        }
    }

    impl Decompressor for JsonCodec {
        fn decompress(&self, bytes: &[u8]) -> Result<ColumnData, CodecError> {
            serde_json::from_slice(bytes).map_err(|e| CodecError::Decompress {
                message: e.to_string(),
            })
        }
    }

    fn sample_span() -> Span {
        let mut params = BTreeMap::new();
        params.insert("time".to_string(), ColumnData::from(vec![5_i64, 1, 9]));
        params.insert("temp".to_string(), ColumnData::from(vec![20.5, 19.0]));
        params.insert("empty".to_string(), ColumnData::Float64(vec![]));
        Span::with_ingest_time("span-1", "cov-1", params, 1_700_000_000.25)
    }

    fn compressors(names: &[&str]) -> CompressorSet {
        let codec = Arc::new(JsonCodec);
        names
            .iter()
            .map(|n| (n.to_string(), codec.clone() as Arc<dyn Compressor>))
            .collect()
    }

    fn decompressors(names: &[&str]) -> DecompressorSet {
        let codec = Arc::new(JsonCodec);
        names
            .iter()
            .map(|n| (n.to_string(), codec.clone() as Arc<dyn Decompressor>))
            .collect()
    }

    #[test]
    fn stats_cover_non_empty_params_only() {
        let stats = sample_span().get_span_stats(None).unwrap();
        assert_eq!(stats.address(), &Address::id("span-1"));
        assert_eq!(stats.param("time"), Some(&ParamRange::ints(1, 9)));
        assert_eq!(stats.param("temp"), Some(&ParamRange::floats(19.0, 20.5)));
        assert_eq!(stats.param("empty"), None);
        assert!(!stats.is_dirty());
    }

    #[test]
    fn stats_respect_requested_params() {
        let stats = sample_span()
            .get_span_stats(Some(&["time", "missing"]))
            .unwrap();
        assert_eq!(stats.params().len(), 1);
        assert!(stats.param("time").is_some());
    }

    #[test]
    fn json_without_compressors_carries_metadata_only() {
        let json = sample_span().as_json(None, None).unwrap();
        assert_eq!(
            json,
            r#"{"coverage_id":"cov-1","id":"span-1","ingest_time":1700000000.25}"#
        );

        let back = Span::from_json(&json, None).unwrap();
        assert_eq!(back.id(), "span-1");
        assert!(back.param_dict().is_empty());
    }

    #[test]
    fn json_round_trip_with_codecs() {
        let span = sample_span();
        let json = span
            .as_json(Some(&compressors(&["time", "temp", "empty"])), Some(2))
            .unwrap();
        assert!(json.contains("\n  \"coverage_id\""));

        let back =
            Span::from_json(&json, Some(&decompressors(&["time", "temp", "empty"]))).unwrap();
        assert_eq!(back, span);
    }

    #[test]
    fn construction_time_compressors_are_the_default() {
        let mut span = sample_span().with_compressors(compressors(&["time", "temp", "empty"]));
        let json = span.as_json(None, None).unwrap();
        assert!(json.contains("\"params\""));

        span.set_compressors(None);
        let json = span.as_json(None, None).unwrap();
        assert!(!json.contains("\"params\""));
    }

    #[test]
    fn stats_ignore_nan_fill() {
        let mut params = BTreeMap::new();
        params.insert("temp".to_string(), ColumnData::from(vec![f64::NAN, 4.0, 1.5]));
        params.insert("gap".to_string(), ColumnData::from(vec![f64::NAN]));
        let span = Span::with_ingest_time("s", "cov", params, 0.0);

        let stats = span.get_span_stats(None).unwrap();
        assert_eq!(stats.param("temp"), Some(&ParamRange::floats(1.5, 4.0)));
        assert!(stats.param("gap").is_none());
    }

    #[test]
    fn missing_codec_is_a_hard_failure() {
        let err = sample_span()
            .as_json(Some(&compressors(&["time"])), None)
            .unwrap_err();
        assert!(matches!(err, SpanError::MissingCompressor { .. }));

        let json = sample_span()
            .as_json(Some(&compressors(&["time", "temp", "empty"])), None)
            .unwrap();
        let err = Span::from_json(&json, Some(&decompressors(&["time", "temp"]))).unwrap_err();
        assert!(matches!(err, SpanError::MissingDecompressor { ref param } if param == "empty"));

        let err = Span::from_json(&json, None).unwrap_err();
        assert!(matches!(err, SpanError::MissingDecompressor { .. }));
    }

    #[test]
    fn hash_ignores_payload_values() {
        let a = sample_span();
        let mut params = a.param_dict().clone();
        params.insert("time".to_string(), ColumnData::from(vec![100_i64]));
        let b = Span::with_ingest_time("span-1", "cov-1", params, a.ingest_time());

        assert_ne!(a, b);
        assert_eq!(a.get_hash(), b.get_hash());

        let c = Span::with_ingest_time("span-2", "cov-1", BTreeMap::new(), 0.0);
        assert_ne!(a.get_hash(), c.get_hash());
    }

    #[test]
    fn ordering_is_by_ingest_time() {
        let early = Span::with_ingest_time("b", "cov", BTreeMap::new(), 1.0);
        let late = Span::with_ingest_time("a", "cov", BTreeMap::new(), 2.0);
        assert!(early < late);

        let twin = Span::with_ingest_time("c", "cov", BTreeMap::new(), 1.0);
        assert_eq!(early.partial_cmp(&twin), None);
        assert_eq!(cmp_span_by_ingest_time(&early, &twin), Ordering::Equal);
    }

    #[test]
    fn new_stamps_current_time() {
        let before = Utc::now().timestamp() as f64;
        let span = Span::new("s", "cov", BTreeMap::new());
        assert!(span.ingest_time() >= before);
    }
}
