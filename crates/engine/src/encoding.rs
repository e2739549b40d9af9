//! Batch encoding for the three output modes
//!
//! | Mode | Each batch becomes |
//! |------|--------------------|
//! | `Objects` | `Chunk::Records` / `Chunk::Report` (no serialization) |
//! | `Fragments` | one standalone JSON text per batch |
//! | `SingleArray` | a comma-joined fragment of one JSON array opened by `[` and closed by `]` |
//!
//! In single-array mode each batch is serialized as an array and its own
//! brackets are stripped; empty batches contribute nothing, so the joined
//! output is always one valid JSON array.

use serde::{Deserialize, Serialize};

use rowstream_core::{Record, StreamResult};

/// How batches are delivered to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Native records, one push per batch
    Objects,
    /// One JSON array text per batch
    Fragments,
    /// One JSON array across the whole stream
    SingleArray,
}

impl OutputMode {
    /// Object mode wins over the single-array flag
    pub fn from_flags(object_mode: bool, single_array: bool) -> Self {
        match (object_mode, single_array) {
            (true, _) => OutputMode::Objects,
            (false, true) => OutputMode::SingleArray,
            (false, false) => OutputMode::Fragments,
        }
    }
}

/// Outcome of one update/destroy window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationReport {
    /// Zero-based window number
    pub window: usize,
    /// Rows affected by this window's mutation
    pub affected: u64,
    /// Rows returned by the store, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Record>,
}

/// One item delivered to a stream consumer
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// A batch of native records
    Records(Vec<Record>),
    /// A native mutation report
    Report(MutationReport),
    /// Serialized JSON text
    Text(String),
}

impl Chunk {
    /// Text payload, if this is a text chunk
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Chunk::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Records payload, if this is a record batch
    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Chunk::Records(records) => Some(records),
            _ => None,
        }
    }
}

/// Stateful encoder for one stream
#[derive(Debug)]
pub struct BatchEncoder {
    mode: OutputMode,
    opened: bool,
    closed: bool,
    wrote_fragment: bool,
}

impl BatchEncoder {
    /// Create an encoder for `mode`
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            opened: false,
            closed: false,
            wrote_fragment: false,
        }
    }

    /// The encoder's mode
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Opening delimiter; `Some` exactly once in single-array mode
    pub fn open(&mut self) -> Option<Chunk> {
        if self.mode != OutputMode::SingleArray || self.opened {
            return None;
        }
        self.opened = true;
        Some(Chunk::Text("[".to_string()))
    }

    /// Encode a record batch. Empty batches produce nothing.
    pub fn records(&mut self, batch: Vec<Record>) -> StreamResult<Option<Chunk>> {
        if batch.is_empty() {
            return Ok(None);
        }
        match self.mode {
            OutputMode::Objects => Ok(Some(Chunk::Records(batch))),
            OutputMode::Fragments => Ok(Some(Chunk::Text(serde_json::to_string(&batch)?))),
            OutputMode::SingleArray => {
                let text = serde_json::to_string(&batch)?;
                Ok(self.fragment(strip_brackets(&text)))
            }
        }
    }

    /// Encode a mutation report
    pub fn report(&mut self, report: MutationReport) -> StreamResult<Option<Chunk>> {
        match self.mode {
            OutputMode::Objects => Ok(Some(Chunk::Report(report))),
            OutputMode::Fragments => Ok(Some(Chunk::Text(serde_json::to_string(&report)?))),
            OutputMode::SingleArray => {
                let text = serde_json::to_string(&report)?;
                Ok(self.fragment(&text))
            }
        }
    }

    /// Closing delimiter; `Some` exactly once in single-array mode
    pub fn finish(&mut self) -> Option<Chunk> {
        if self.mode != OutputMode::SingleArray || self.closed {
            return None;
        }
        self.closed = true;
        Some(Chunk::Text("]".to_string()))
    }

    fn fragment(&mut self, body: &str) -> Option<Chunk> {
        if body.is_empty() {
            return None;
        }
        let text = if self.wrote_fragment {
            format!(",{}", body)
        } else {
            body.to_string()
        };
        self.wrote_fragment = true;
        Some(Chunk::Text(text))
    }
}

fn strip_brackets(text: &str) -> &str {
    text.strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text)
}
