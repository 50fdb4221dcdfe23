//! Identity assignment
//!
//! Derives the activity identifier from the source file name and hands out
//! the 1-based record sequence numbers within a file.

use tracing::warn;

/// Character range of the activity id within a file name
///
/// Observed file names look like `ron@maxseiner.net_12379160600.fit`, with
/// the user id first and the activity id at character offsets 18..29. Files
/// from a different source may need this amended.
const ACTIVITY_ID_START: usize = 18;
const ACTIVITY_ID_LEN: usize = 11;

/// Derive the activity identifier from a file name
///
/// A non-numeric substring is an identity-parse anomaly: it is logged and
/// used as-is, so a naming anomaly never blocks the run.
pub fn activity_id(file_name: &str) -> String {
    let id: String = file_name
        .chars()
        .skip(ACTIVITY_ID_START)
        .take(ACTIVITY_ID_LEN)
        .collect();

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        warn!(
            file_name = %file_name,
            parsed = %id,
            "Potential parse error on activity id"
        );
    }

    id
}

/// Per-file record sequence counter
///
/// Incremented before each message is tagged, so the first message in a
/// file receives record id 1.
#[derive(Debug, Default)]
pub struct RecordCounter {
    current: u32,
}

impl RecordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance and return the next record id
    pub fn next_record_id(&mut self) -> u32 {
        self.current += 1;
        self.current
    }

    /// Number of records assigned so far
    pub fn count(&self) -> u32 {
        self.current
    }
}
