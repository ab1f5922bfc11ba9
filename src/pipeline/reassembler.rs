//! Ordered reassembly of out-of-order segment transcriptions.
//!
//! Workers finish in whatever order the network allows; the reassembler
//! restores capture order before the transcript is assembled. A failed
//! segment occupies its slot as an empty piece so later segments are never
//! blocked behind it.

use crate::pipeline::types::SegmentOutcome;
use std::collections::BTreeMap;

/// Reorders segment outcomes by sequence number.
pub struct OrderedReassembler {
    /// Next sequence number eligible for release.
    next_seq: u64,
    /// Out-of-order outcomes waiting for their predecessors.
    /// `None` marks a permanently failed segment.
    pending: BTreeMap<u64, Option<String>>,
    /// Released pieces in seq order (failed slots omitted).
    pieces: Vec<String>,
}

impl OrderedReassembler {
    pub fn new(first_seq: u64) -> Self {
        Self {
            next_seq: first_seq,
            pending: BTreeMap::new(),
            pieces: Vec::new(),
        }
    }

    /// Accept one outcome; returns the texts released by it, in seq order.
    ///
    /// An outcome for an already-released or duplicate seq is dropped.
    pub fn accept(&mut self, outcome: SegmentOutcome) -> Vec<String> {
        if outcome.seq < self.next_seq || self.pending.contains_key(&outcome.seq) {
            eprintln!(
                "overscribe: dropping duplicate outcome for segment {}",
                outcome.seq
            );
            return Vec::new();
        }

        let piece = match outcome.result {
            Ok(text) => Some(text),
            Err(e) => {
                eprintln!("overscribe: segment {} failed: {}", outcome.seq, e);
                None
            }
        };
        self.pending.insert(outcome.seq, piece);

        let mut released = Vec::new();
        while let Some(piece) = self.pending.remove(&self.next_seq) {
            self.next_seq += 1;
            if let Some(text) = piece {
                if !text.is_empty() {
                    released.push(text.clone());
                }
                self.pieces.push(text);
            }
        }
        released
    }

    /// Next sequence number the reassembler is waiting for.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Number of outcomes buffered out of order.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Transcript released so far: successful texts joined in seq order,
    /// empty pieces skipped.
    pub fn transcript(&self) -> String {
        self.pieces
            .iter()
            .filter(|piece| !piece.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn into_transcript(self) -> String {
        self.transcript()
    }
}
